//! Fixtures shared by the command-level tests: a throwaway project directory
//! and a fake `docker` executable answering the calls the controller makes.

use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tempfile::TempDir;

use crate::driver::Compose;
use crate::services::{SERVICES, VPN_CLIENT};
use crate::util::StackPaths;

pub const HEALTHY_PS: &str = "\
gluetun\trunning\tUp 2 hours (healthy)
qbittorrent\trunning\tUp 2 hours
jellyfin\trunning\tUp 2 hours (healthy)
jellyseerr\trunning\tUp 2 hours
radarr\trunning\tUp 2 hours
sonarr\trunning\tUp 2 hours
prowlarr\trunning\tUp 2 hours
bazarr\trunning\tUp 2 hours
";

pub const MULLVAD_EXIT: &str = r#"{"ip":"185.65.134.10","country":"Sweden","city":"Stockholm","mullvad_exit_ip":true,"mullvad_exit_ip_hostname":"se-sto-wg-001"}"#;

pub const VALID_KEY: &str = "aGVsbG8td29ybGQtdGhpcy1pcy1hLWZha2Uta2V5MTI=";

/// Script body answering `compose ps`, the two in-container curl calls,
/// `docker logs` and `docker info`. The exit-node call also writes a
/// warning to stderr, like curl does behind a flaky resolver.
pub fn docker_script(ps: &str, exit_json: &str, logs: &str) -> String {
    format!(
        r#"case "$*" in
  *" ps "*)
    cat <<'PS'
{ps}
PS
    ;;
  *am.i.mullvad.net*)
    echo 'curl: warning: resolver is slow' >&2
    cat <<'JSON'
{exit_json}
JSON
    ;;
  *ifconfig.me*)
    echo 185.65.134.10
    ;;
  logs*)
    cat <<'LOGS'
{logs}
LOGS
    ;;
  info*)
    echo 'Server Version: 27.0.0'
    ;;
  *)
    echo "unexpected call: $*" >&2
    exit 1
    ;;
esac
"#,
        ps = ps.trim_end(),
        exit_json = exit_json,
        logs = logs.trim_end(),
    )
}

pub struct FakeStack {
    pub dir: TempDir,
    pub paths: StackPaths,
    pub compose: Compose,
}

impl FakeStack {
    pub fn new(script_body: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("bin");
        std::fs::create_dir(&bin).unwrap();
        let docker = bin.join("docker");
        std::fs::write(&docker, format!("#!/bin/sh\n{script_body}")).unwrap();
        std::fs::set_permissions(&docker, std::fs::Permissions::from_mode(0o755)).unwrap();

        let paths = StackPaths::resolve(Some(dir.path().to_path_buf()), None).unwrap();
        let compose = Compose::new(docker.display().to_string(), paths.clone());
        Self { dir, paths, compose }
    }

    pub fn healthy() -> Self {
        Self::new(&docker_script(HEALTHY_PS, MULLVAD_EXIT, "INFO [healthcheck] healthy!"))
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Writes a complete `.env` and `docker-compose.yml` into the project
    /// directory. Storage roots are relative to it.
    pub fn write_project(&self) {
        let env = format!(
            "PUID=1000\nPGID=1000\nRENDER_GID=993\nTZ=Europe/Amsterdam\n\
             LAN_SUBNET=192.168.1.0/24\nDATA_ROOT=./data\nCONFIG_ROOT=./config\n\
             WIREGUARD_PRIVATE_KEY={key}\nWIREGUARD_ADDRESSES=10.64.12.7/32\n\
             VPN_PROVIDER=mullvad\nVPN_TYPE=wireguard\n",
            key = VALID_KEY
        );
        std::fs::write(&self.paths.env_file, env).unwrap();
        std::fs::create_dir(self.root().join("data")).unwrap();

        let mut yaml = String::from("services:\n");
        for svc in SERVICES {
            yaml.push_str(&format!(
                "  {id}:\n    image: example/{id}\n    container_name: {id}\n",
                id = svc.id
            ));
            if svc.id == VPN_CLIENT {
                yaml.push_str("    network_mode: service:gluetun\n");
            }
        }
        std::fs::write(&self.paths.compose_file, yaml).unwrap();
    }
}
