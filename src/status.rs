use std::collections::BTreeMap;
use std::fmt;

use crossterm::style::{Color, Stylize};

use crate::env_file::EnvMap;
use crate::services::{ServiceDescriptor, SERVICES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthTag {
    Healthy,
    Unhealthy,
    Starting,
    Running,
    Stopped,
    NotFound,
}

impl HealthTag {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthTag::Healthy => "healthy",
            HealthTag::Unhealthy => "unhealthy",
            HealthTag::Starting => "starting",
            HealthTag::Running => "running",
            HealthTag::Stopped => "stopped",
            HealthTag::NotFound => "not found",
        }
    }

    /// Derives a tag from `docker ps` state and status columns,
    /// e.g. `running` / `Up 3 hours (healthy)`.
    pub fn classify(state: &str, status: &str) -> Self {
        let state = state.trim().to_ascii_lowercase();
        let status = status.to_ascii_lowercase();
        if status.contains("unhealthy") {
            HealthTag::Unhealthy
        } else if status.contains("health: starting")
            || matches!(state.as_str(), "restarting" | "created")
        {
            HealthTag::Starting
        } else if status.contains("healthy") {
            HealthTag::Healthy
        } else if state == "running" {
            HealthTag::Running
        } else {
            HealthTag::Stopped
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, HealthTag::Healthy | HealthTag::Running | HealthTag::Starting)
    }

    /// Up and past its startup phase; a restarting container is not serving.
    pub fn is_serving(&self) -> bool {
        matches!(self, HealthTag::Healthy | HealthTag::Running)
    }

    fn color(&self) -> Color {
        match self {
            HealthTag::Healthy | HealthTag::Running => Color::Green,
            HealthTag::Starting => Color::Yellow,
            HealthTag::Unhealthy | HealthTag::Stopped | HealthTag::NotFound => Color::Red,
        }
    }
}

impl fmt::Display for HealthTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerStatus {
    pub status: String,
    pub state: String,
    pub health: HealthTag,
}

/// Point-in-time view of the stack's containers, keyed by container name.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    containers: BTreeMap<String, ContainerStatus>,
}

impl Snapshot {
    /// Parses `name\tstate\tstatus` lines; anything else is skipped.
    pub fn parse(text: &str) -> Self {
        let containers = text
            .lines()
            .filter_map(|line| {
                let mut fields = line.splitn(3, '\t');
                let name = fields.next()?.trim();
                let state = fields.next()?.trim();
                let status = fields.next()?.trim();
                if name.is_empty() {
                    return None;
                }
                Some((
                    name.to_string(),
                    ContainerStatus {
                        status: status.to_string(),
                        state: state.to_string(),
                        health: HealthTag::classify(state, status),
                    },
                ))
            })
            .collect();
        Self { containers }
    }

    pub fn get(&self, container: &str) -> Option<&ContainerStatus> {
        self.containers.get(container)
    }

    pub fn health(&self, container: &str) -> HealthTag {
        self.get(container)
            .map(|c| c.health)
            .unwrap_or(HealthTag::NotFound)
    }

    pub fn is_empty(&self) -> bool {
        self.containers.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ServiceRow {
    pub service: &'static ServiceDescriptor,
    pub state: String,
    pub status: String,
    pub health: HealthTag,
    pub url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StatusReport {
    pub rows: Vec<ServiceRow>,
}

impl StatusReport {
    pub fn build(snapshot: &Snapshot, env: &EnvMap, host: &str) -> Self {
        let rows = SERVICES
            .iter()
            .map(|service| {
                let container = snapshot.get(service.id);
                ServiceRow {
                    service,
                    state: container
                        .map(|c| c.state.clone())
                        .unwrap_or_else(|| "-".to_string()),
                    status: container.map(|c| c.status.clone()).unwrap_or_default(),
                    health: snapshot.health(service.id),
                    url: service.url(host, env),
                }
            })
            .collect();
        Self { rows }
    }

    pub fn running(&self) -> usize {
        self.rows.iter().filter(|row| row.health.is_up()).count()
    }

    /// Critical services that are down, unhealthy or missing.
    pub fn failing_critical(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter(|row| row.service.critical)
            .filter(|row| !row.health.is_up())
            .map(|row| row.service.id.to_string())
            .collect()
    }

    pub fn print(&self) {
        let heading = format!(
            "{:<14} {:<10} {:<11} {:<28} {}",
            "SERVICE", "STATE", "HEALTH", "URL", "STATUS"
        );
        println!("{}", heading.bold());
        for row in &self.rows {
            let health = format!("{:<11}", row.health.as_str()).with(row.health.color());
            let marker = if row.service.critical { "*" } else { " " };
            println!(
                "{:<14} {:<10} {} {:<28} {}",
                format!("{}{}", row.service.id, marker),
                row.state,
                health,
                row.url.as_deref().unwrap_or("-"),
                row.status
            );
        }
        println!();
        println!(
            "{}/{} services up (* = critical)",
            self.running(),
            self.rows.len()
        );
    }
}
