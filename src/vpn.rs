//! VPN sidecar checks: container health, exit IP and recent log errors.

use serde::Deserialize;

use crate::driver::{Compose, Probe, EXEC_TIMEOUT, STATUS_TIMEOUT};
use crate::error::{Result, StackError};
use crate::output;
use crate::services::{VPN_CLIENT, VPN_SIDECAR};
use crate::status::{HealthTag, Snapshot};

const EXTERNAL_IP_URL: &str = "https://ifconfig.me";
const EXIT_NODE_URL: &str = "https://am.i.mullvad.net/json";
const LOG_TAIL: usize = 50;

/// Response of the Mullvad connection check endpoint.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ExitNode {
    pub ip: String,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    pub mullvad_exit_ip: bool,
    #[serde(default)]
    pub mullvad_exit_ip_hostname: Option<String>,
}

impl ExitNode {
    pub fn parse(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(body.trim())?)
    }

    pub fn location(&self) -> String {
        match (&self.city, &self.country) {
            (Some(city), Some(country)) => format!("{city}, {country}"),
            (None, Some(country)) => country.clone(),
            (Some(city), None) => city.clone(),
            (None, None) => "unknown location".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFinding {
    AuthenticationFailed,
    DnsFailure,
}

impl LogFinding {
    pub fn describe(&self) -> &'static str {
        match self {
            LogFinding::AuthenticationFailed => {
                "WireGuard authentication failed: check WIREGUARD_PRIVATE_KEY and WIREGUARD_ADDRESSES"
            }
            LogFinding::DnsFailure => {
                "DNS resolution errors: the tunnel may be down or DNS over TLS is blocked"
            }
        }
    }
}

/// Known failure patterns in the sidecar's log text, each reported once.
///
/// A DNS finding needs `dns` together with `error`, `fail` or `timeout` on the
/// same line: gluetun mentions DNS in its normal startup lines, so the bare
/// substring would flag every healthy tunnel.
pub fn diagnose_logs(logs: &str) -> Vec<LogFinding> {
    let mut findings = Vec::new();
    for line in logs.lines() {
        let line = line.to_ascii_lowercase();
        let finding = if line.contains("authentication failed") {
            Some(LogFinding::AuthenticationFailed)
        } else if line.contains("dns")
            && ["error", "fail", "timeout"].iter().any(|word| line.contains(word))
        {
            Some(LogFinding::DnsFailure)
        } else {
            None
        };
        if let Some(finding) = finding {
            if !findings.contains(&finding) {
                findings.push(finding);
            }
        }
    }
    findings
}

/// Everything the `vpn` command gathered.
#[derive(Debug, Clone)]
pub struct VpnReport {
    pub sidecar: HealthTag,
    pub external_ip: Probe,
    pub exit_node: std::result::Result<ExitNode, String>,
    pub findings: Vec<LogFinding>,
    pub logs_available: bool,
}

impl VpnReport {
    /// Reasons the VPN should be considered broken.
    pub fn problems(&self) -> Vec<String> {
        let mut problems = Vec::new();
        if !self.sidecar.is_serving() {
            problems.push(format!("{VPN_SIDECAR} is {}", self.sidecar));
        }
        match &self.exit_node {
            Ok(node) if !node.mullvad_exit_ip => {
                problems.push(format!("traffic exits via {} which is not a Mullvad server", node.ip))
            }
            Ok(_) => {}
            Err(reason) => problems.push(format!("exit node unavailable ({reason})")),
        }
        problems
    }

    pub fn print(&self) {
        let sidecar = format!("{VPN_SIDECAR} container: {}", self.sidecar);
        if self.sidecar.is_serving() {
            output::success(&sidecar);
        } else {
            output::error(&sidecar);
        }

        match &self.external_ip {
            Probe::Output(ip) => output::info(&format!("External IP of {VPN_CLIENT}: {}", ip.trim())),
            Probe::Unavailable(reason) => {
                output::warning(&format!("External IP of {VPN_CLIENT}: unavailable ({reason})"))
            }
        }

        match &self.exit_node {
            Ok(node) if node.mullvad_exit_ip => {
                let host = node.mullvad_exit_ip_hostname.as_deref().unwrap_or("unknown relay");
                output::success(&format!(
                    "Connected through Mullvad relay {host} ({}, {})",
                    node.ip,
                    node.location()
                ));
            }
            Ok(node) => output::error(&format!(
                "NOT using a Mullvad exit: {} ({})",
                node.ip,
                node.location()
            )),
            Err(reason) => output::error(&format!("Exit node check unavailable: {reason}")),
        }

        if !self.logs_available {
            output::warning(&format!("Could not read {VPN_SIDECAR} logs"));
        } else if self.findings.is_empty() {
            output::success(&format!("No known errors in the last {LOG_TAIL} log lines"));
        } else {
            for finding in &self.findings {
                output::error(finding.describe());
            }
        }
    }
}

fn parse_exit_node(probe: Probe) -> std::result::Result<ExitNode, String> {
    match probe {
        Probe::Output(body) => {
            ExitNode::parse(&body).map_err(|err| format!("malformed response: {err}"))
        }
        Probe::Unavailable(reason) => Err(reason),
    }
}

pub async fn check(compose: &Compose) -> Result<VpnReport> {
    let snapshot = match compose.ps().await {
        Probe::Output(text) => Snapshot::parse(&text),
        Probe::Unavailable(reason) => {
            return Err(StackError::Unavailable(format!("container status: {reason}")));
        }
    };
    let sidecar = snapshot.health(VPN_SIDECAR);

    let external_ip = compose
        .exec_in_container(VPN_CLIENT, &["curl", "-s", "--max-time", "10", EXTERNAL_IP_URL], EXEC_TIMEOUT)
        .await;
    let exit_node = parse_exit_node(
        compose
            .exec_in_container(VPN_CLIENT, &["curl", "-s", "--max-time", "10", EXIT_NODE_URL], EXEC_TIMEOUT)
            .await,
    );
    let logs = compose.container_logs(VPN_SIDECAR, LOG_TAIL, STATUS_TIMEOUT).await;

    Ok(VpnReport {
        sidecar,
        external_ip,
        exit_node,
        findings: logs.output().map(diagnose_logs).unwrap_or_default(),
        logs_available: logs.is_available(),
    })
}
