use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, StackError>;

#[derive(Error, Debug)]
pub enum StackError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Env file not found: {0}")]
    EnvFileNotFound(PathBuf),
    #[error("Compose file not found: {0}")]
    ComposeNotFound(PathBuf),
    #[error("Invalid compose file: {0}")]
    InvalidCompose(String),
    #[error("Validation failed with {0} issue(s)")]
    ValidationFailed(usize),
    #[error("`{command}` exited with status {code}")]
    CommandFailed { command: String, code: i32 },
    #[error("Unable to query {0}")]
    Unavailable(String),
    #[error("Unhealthy services: {}", .0.join(", "))]
    Unhealthy(Vec<String>),
    #[error("VPN check failed: {0}")]
    Vpn(String),
    #[error("CLI usage error: {0}")]
    Usage(String),
}
