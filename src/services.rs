use crate::env_file::EnvMap;

/// Static description of one service in the stack. The id doubles as the
/// compose service name and the container name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServiceDescriptor {
    pub id: &'static str,
    pub display_name: &'static str,
    pub port: Option<PortSpec>,
    pub critical: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortSpec {
    pub env_var: &'static str,
    pub default: u16,
}

pub const VPN_SIDECAR: &str = "gluetun";
/// Container whose traffic is routed through the sidecar.
pub const VPN_CLIENT: &str = "qbittorrent";

pub const SERVICES: &[ServiceDescriptor] = &[
    ServiceDescriptor {
        id: VPN_SIDECAR,
        display_name: "Gluetun (VPN)",
        port: None,
        critical: true,
    },
    ServiceDescriptor {
        id: VPN_CLIENT,
        display_name: "qBittorrent (via VPN)",
        port: Some(PortSpec { env_var: "QBITTORRENT_PORT", default: 8080 }),
        critical: true,
    },
    ServiceDescriptor {
        id: "jellyfin",
        display_name: "Jellyfin (Media Server)",
        port: Some(PortSpec { env_var: "JELLYFIN_PORT", default: 8096 }),
        critical: true,
    },
    ServiceDescriptor {
        id: "jellyseerr",
        display_name: "Jellyseerr (Content Requests)",
        port: Some(PortSpec { env_var: "JELLYSEERR_PORT", default: 5055 }),
        critical: false,
    },
    ServiceDescriptor {
        id: "radarr",
        display_name: "Radarr (Movies)",
        port: Some(PortSpec { env_var: "RADARR_PORT", default: 7878 }),
        critical: false,
    },
    ServiceDescriptor {
        id: "sonarr",
        display_name: "Sonarr (TV Shows)",
        port: Some(PortSpec { env_var: "SONARR_PORT", default: 8989 }),
        critical: false,
    },
    ServiceDescriptor {
        id: "prowlarr",
        display_name: "Prowlarr (Indexers)",
        port: Some(PortSpec { env_var: "PROWLARR_PORT", default: 9696 }),
        critical: false,
    },
    ServiceDescriptor {
        id: "bazarr",
        display_name: "Bazarr (Subtitles)",
        port: Some(PortSpec { env_var: "BAZARR_PORT", default: 6767 }),
        critical: false,
    },
];

pub fn find(id: &str) -> Option<&'static ServiceDescriptor> {
    SERVICES.iter().find(|svc| svc.id == id)
}

impl ServiceDescriptor {
    /// Port from the env map, falling back to the built-in default when the
    /// variable is unset or not a number.
    pub fn resolve_port(&self, env: &EnvMap) -> Option<u16> {
        let spec = self.port?;
        let port = env
            .get(spec.env_var)
            .and_then(|value| value.trim().parse::<u16>().ok())
            .unwrap_or(spec.default);
        Some(port)
    }

    pub fn url(&self, host: &str, env: &EnvMap) -> Option<String> {
        self.resolve_port(env).map(|port| format!("http://{host}:{port}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ports_come_from_env_with_defaults() {
        let mut env = EnvMap::new();
        env.insert("JELLYFIN_PORT".to_string(), "18096".to_string());
        env.insert("RADARR_PORT".to_string(), "not-a-port".to_string());

        assert_eq!(find("jellyfin").unwrap().resolve_port(&env), Some(18096));
        assert_eq!(find("radarr").unwrap().resolve_port(&env), Some(7878));
        assert_eq!(find(VPN_SIDECAR).unwrap().resolve_port(&env), None);
        assert_eq!(
            find("sonarr").unwrap().url("10.0.0.2", &env).as_deref(),
            Some("http://10.0.0.2:8989")
        );
    }

    #[test]
    fn service_ids_are_unique() {
        let mut ids: Vec<_> = SERVICES.iter().map(|svc| svc.id).collect();
        ids.sort_unstable();
        ids.dedup();
        assert_eq!(ids.len(), SERVICES.len());
    }
}
