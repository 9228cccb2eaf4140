use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, StackError};
use crate::services::{SERVICES, VPN_CLIENT, VPN_SIDECAR};

/// The parts of `docker-compose.yml` the controller cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct ComposeFile {
    #[serde(default)]
    pub services: BTreeMap<String, ServiceConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfig {
    pub container_name: Option<String>,
    pub network_mode: Option<String>,
}

pub fn load_compose(path: &Path) -> Result<ComposeFile> {
    if !path.exists() {
        return Err(StackError::ComposeNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path)?;
    let compose: ComposeFile = serde_yaml::from_str(&content)?;
    validate_compose(&compose)?;
    Ok(compose)
}

fn validate_compose(compose: &ComposeFile) -> Result<()> {
    let missing: Vec<&str> = SERVICES
        .iter()
        .map(|svc| svc.id)
        .filter(|id| !compose.services.contains_key(*id))
        .collect();
    if !missing.is_empty() {
        return Err(StackError::InvalidCompose(format!(
            "missing services: {}",
            missing.join(", ")
        )));
    }

    for svc in SERVICES {
        // Status and exec calls address containers by service id.
        let name = compose.services[svc.id].container_name.as_deref();
        if name != Some(svc.id) {
            return Err(StackError::InvalidCompose(format!(
                "service '{}' must set container_name: {} (found {})",
                svc.id,
                svc.id,
                name.unwrap_or("none")
            )));
        }
    }

    let client_mode = compose.services[VPN_CLIENT].network_mode.as_deref();
    let routed = [format!("service:{VPN_SIDECAR}"), format!("container:{VPN_SIDECAR}")];
    if !routed.iter().any(|mode| Some(mode.as_str()) == client_mode) {
        return Err(StackError::InvalidCompose(format!(
            "'{VPN_CLIENT}' must use network_mode 'service:{VPN_SIDECAR}'"
        )));
    }

    Ok(())
}
