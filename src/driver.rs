use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{Result, StackError};
use crate::util::StackPaths;

pub const STATUS_TIMEOUT: Duration = Duration::from_secs(10);
pub const DOCKER_INFO_TIMEOUT: Duration = Duration::from_secs(5);
pub const EXEC_TIMEOUT: Duration = Duration::from_secs(15);

/// Outcome of a captured command. Every failure mode collapses into
/// `Unavailable`; callers treat it as "no answer".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    Output(String),
    Unavailable(String),
}

impl Probe {
    pub fn output(&self) -> Option<&str> {
        match self {
            Probe::Output(text) => Some(text),
            Probe::Unavailable(_) => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Probe::Output(_))
    }
}

/// Runs `program args...` and returns its stdout, killing it after `timeout`.
pub async fn capture(program: &str, args: &[&str], timeout: Duration) -> Probe {
    run_captured(program, args, timeout, false).await
}

/// Like [`capture`], but stderr is appended to stdout. `docker logs` replays a
/// container's stderr on its own stderr, so log text needs both streams.
pub async fn capture_combined(program: &str, args: &[&str], timeout: Duration) -> Probe {
    run_captured(program, args, timeout, true).await
}

async fn run_captured(program: &str, args: &[&str], timeout: Duration, with_stderr: bool) -> Probe {
    let rendered = render_command(program, args);
    debug!(command = %rendered, ?timeout, "capturing command");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let child = match cmd.spawn() {
        Ok(child) => child,
        Err(err) => {
            warn!(command = %rendered, error = %err, "failed to spawn");
            return Probe::Unavailable(format!("failed to run {program}: {err}"));
        }
    };

    match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Err(_) => {
            warn!(command = %rendered, ?timeout, "command timed out");
            Probe::Unavailable(format!("timed out after {}s", timeout.as_secs_f32()))
        }
        Ok(Err(err)) => {
            warn!(command = %rendered, error = %err, "failed to wait for command");
            Probe::Unavailable(err.to_string())
        }
        Ok(Ok(output)) if !output.status.success() => {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!(command = %rendered, status = ?output.status.code(), "command failed");
            if stderr.is_empty() {
                Probe::Unavailable(format!("exited with {}", output.status))
            } else {
                Probe::Unavailable(stderr)
            }
        }
        Ok(Ok(output)) => {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            if with_stderr {
                text.push_str(&String::from_utf8_lossy(&output.stderr));
            } else if !output.stderr.is_empty() {
                debug!(command = %rendered, stderr = %String::from_utf8_lossy(&output.stderr).trim(), "ignored stderr");
            }
            Probe::Output(text)
        }
    }
}

fn render_command(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drives `docker compose` and plain `docker` for the stack in `paths`.
#[derive(Debug, Clone)]
pub struct Compose {
    docker: String,
    paths: StackPaths,
}

impl Compose {
    pub fn new(docker: impl Into<String>, paths: StackPaths) -> Self {
        Self {
            docker: docker.into(),
            paths,
        }
    }

    fn base_args(&self) -> Vec<String> {
        vec![
            "compose".to_string(),
            "--project-directory".to_string(),
            self.paths.project_dir.display().to_string(),
            "--env-file".to_string(),
            self.paths.env_file.display().to_string(),
            "-f".to_string(),
            self.paths.compose_file.display().to_string(),
        ]
    }

    pub fn compose_args(&self, args: &[&str]) -> Vec<String> {
        let mut full = self.base_args();
        full.extend(args.iter().map(|arg| arg.to_string()));
        full
    }

    /// Runs a compose verb attached to the terminal.
    pub async fn run(&self, args: &[&str]) -> Result<()> {
        let full = self.compose_args(args);
        let rendered = format!("{} compose {}", self.docker, args.join(" "));
        debug!(command = %rendered, "running compose");

        let status = Command::new(&self.docker)
            .args(&full)
            .current_dir(&self.paths.project_dir)
            .status()
            .await?;
        if status.success() {
            Ok(())
        } else {
            Err(StackError::CommandFailed {
                command: rendered,
                code: status.code().unwrap_or(1),
            })
        }
    }

    pub async fn pull(&self) -> Result<()> {
        self.run(&["pull"]).await
    }

    pub async fn up(&self) -> Result<()> {
        self.run(&["up", "-d"]).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.run(&["stop"]).await
    }

    pub async fn down(&self, remove_orphans: bool) -> Result<()> {
        if remove_orphans {
            self.run(&["down", "--remove-orphans"]).await
        } else {
            self.run(&["down"]).await
        }
    }

    pub async fn logs(&self, service: Option<&str>, follow: bool, tail: usize) -> Result<()> {
        let tail = format!("--tail={tail}");
        let mut args = vec!["logs"];
        if follow {
            args.push("-f");
        }
        args.push(&tail);
        if let Some(service) = service {
            args.push(service);
        }
        self.run(&args).await
    }

    /// Captured `ps` listing: one `name\tstate\tstatus` line per container.
    pub async fn ps(&self) -> Probe {
        let full = self.compose_args(&[
            "ps",
            "-a",
            "--format",
            "{{.Name}}\t{{.State}}\t{{.Status}}",
        ]);
        let args: Vec<&str> = full.iter().map(String::as_str).collect();
        capture(&self.docker, &args, STATUS_TIMEOUT).await
    }

    pub async fn prune_images(&self) -> Result<()> {
        debug!(docker = %self.docker, "pruning dangling images");
        let status = Command::new(&self.docker)
            .args(["image", "prune", "-f"])
            .status()
            .await?;
        if status.success() {
            Ok(())
        } else {
            Err(StackError::CommandFailed {
                command: format!("{} image prune -f", self.docker),
                code: status.code().unwrap_or(1),
            })
        }
    }

    pub async fn daemon_running(&self) -> bool {
        capture(&self.docker, &["info"], DOCKER_INFO_TIMEOUT)
            .await
            .is_available()
    }

    pub async fn exec_in_container(&self, container: &str, cmd: &[&str], timeout: Duration) -> Probe {
        let mut args = vec!["exec", container];
        args.extend_from_slice(cmd);
        capture(&self.docker, &args, timeout).await
    }

    pub async fn container_logs(&self, container: &str, tail: usize, timeout: Duration) -> Probe {
        let tail = tail.to_string();
        capture_combined(&self.docker, &["logs", "--tail", &tail, container], timeout).await
    }
}
