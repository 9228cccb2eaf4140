use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tracing::debug;

use crate::compose::load_compose;
use crate::driver::{capture, Compose};
use crate::env_file::{self, EnvMap};
use crate::output;
use crate::util::{is_writable, StackPaths};

pub const REQUIRED_VARS: &[&str] = &[
    "PUID",
    "PGID",
    "RENDER_GID",
    "TZ",
    "LAN_SUBNET",
    "DATA_ROOT",
    "CONFIG_ROOT",
    "WIREGUARD_PRIVATE_KEY",
    "WIREGUARD_ADDRESSES",
    "VPN_PROVIDER",
    "VPN_TYPE",
];

const DATA_SUBDIRS: &[&str] = &["torrents", "media"];
const RENDER_DEVICE: &str = "/dev/dri/renderD128";
const CARD_DEVICE: &str = "/dev/dri/card0";
const GETENT_TIMEOUT: Duration = Duration::from_secs(5);

static WIREGUARD_KEY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9+/]{43}=$").expect("valid regex"));
static WIREGUARD_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^10\.\d{1,3}\.\d{1,3}\.\d{1,3}/32$").expect("valid regex"));
static SUBNET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}/\d{1,2}$").expect("valid regex"));

pub fn is_placeholder(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value.ends_with("-here") || value.starts_with("your-")
}

/// Required variables that are absent, empty or still hold a template placeholder.
pub fn missing_required(env: &EnvMap) -> Vec<&'static str> {
    REQUIRED_VARS
        .iter()
        .copied()
        .filter(|var| env.get(*var).is_none_or(|value| is_placeholder(value)))
        .collect()
}

pub fn vpn_issues(env: &EnvMap) -> Vec<String> {
    let mut issues = Vec::new();
    let get = |key: &str| env.get(key).map(String::as_str).unwrap_or_default();

    let key = get("WIREGUARD_PRIVATE_KEY");
    if key.len() != 44 || !WIREGUARD_KEY.is_match(key) {
        issues.push(
            "WIREGUARD_PRIVATE_KEY: Invalid format (should be 44 characters base64)".to_string(),
        );
    }
    if !WIREGUARD_ADDRESS.is_match(get("WIREGUARD_ADDRESSES")) {
        issues.push("WIREGUARD_ADDRESSES: Invalid format (should be 10.x.x.x/32)".to_string());
    }
    if !get("VPN_PROVIDER").eq_ignore_ascii_case("mullvad") {
        issues.push("VPN_PROVIDER: Should be \"mullvad\"".to_string());
    }
    if !get("VPN_TYPE").eq_ignore_ascii_case("wireguard") {
        issues.push("VPN_TYPE: Should be \"wireguard\"".to_string());
    }
    issues
}

pub fn network_issues(env: &EnvMap) -> Vec<String> {
    let subnet = env.get("LAN_SUBNET").map(String::as_str).unwrap_or_default();
    if SUBNET.is_match(subnet) {
        Vec::new()
    } else {
        vec!["LAN_SUBNET: Invalid format (should be x.x.x.x/xx, e.g., 192.168.1.0/24)".to_string()]
    }
}

#[derive(Debug, Default)]
pub struct PathCheck {
    /// `(variable, problem)` pairs.
    pub issues: Vec<(String, String)>,
    pub created: Vec<PathBuf>,
}

/// Resolves a storage root the way compose does: relative to the project
/// directory, not the caller's working directory.
fn storage_root(base: &Path, value: &str) -> PathBuf {
    let root = Path::new(value);
    if root.is_relative() {
        base.join(root)
    } else {
        root.to_path_buf()
    }
}

/// Checks the storage roots, creating the directories the stack expects.
pub fn check_paths(env: &EnvMap, base: &Path) -> PathCheck {
    let mut check = PathCheck::default();

    match env.get("DATA_ROOT").map(|v| v.trim()).filter(|v| !is_placeholder(v)) {
        None => check.issues.push(("DATA_ROOT".to_string(), "Not set".to_string())),
        Some(root) => {
            let root = storage_root(base, root);
            if !root.exists() {
                check.issues.push((
                    "DATA_ROOT".to_string(),
                    format!("Directory does not exist: {}", root.display()),
                ));
            } else if !is_writable(&root) {
                check.issues.push((
                    "DATA_ROOT".to_string(),
                    format!("Directory not writable: {}", root.display()),
                ));
            } else {
                for subdir in DATA_SUBDIRS {
                    let path = root.join(subdir);
                    if path.exists() {
                        continue;
                    }
                    match std::fs::create_dir_all(&path) {
                        Ok(()) => check.created.push(path),
                        Err(err) => check
                            .issues
                            .push((format!("DATA_ROOT/{subdir}"), err.to_string())),
                    }
                }
            }
        }
    }

    match env.get("CONFIG_ROOT").map(|v| v.trim()).filter(|v| !is_placeholder(v)) {
        None => check.issues.push(("CONFIG_ROOT".to_string(), "Not set".to_string())),
        Some(root) => {
            let root = storage_root(base, root);
            if !root.exists() {
                match std::fs::create_dir_all(&root) {
                    Ok(()) => check.created.push(root),
                    Err(err) => check.issues.push(("CONFIG_ROOT".to_string(), err.to_string())),
                }
            } else if !is_writable(&root) {
                check.issues.push((
                    "CONFIG_ROOT".to_string(),
                    format!("Directory not writable: {}", root.display()),
                ));
            }
        }
    }

    check
}

/// Group id of the host's `render` group, if it has one.
pub async fn render_group_gid() -> Option<String> {
    let group = capture("getent", &["group", "render"], GETENT_TIMEOUT).await;
    group.output().and_then(parse_group_gid)
}

fn parse_group_gid(line: &str) -> Option<String> {
    line.trim()
        .split(':')
        .nth(2)
        .filter(|gid| !gid.is_empty())
        .map(str::to_string)
}

#[derive(Debug)]
pub struct GpuCheck {
    pub available: bool,
    pub message: String,
    pub render_gid: Option<String>,
}

pub async fn check_gpu() -> GpuCheck {
    if !Path::new(RENDER_DEVICE).exists() || !Path::new(CARD_DEVICE).exists() {
        return GpuCheck {
            available: false,
            message: format!("Intel GPU devices not found ({RENDER_DEVICE}, {CARD_DEVICE})"),
            render_gid: None,
        };
    }
    match render_group_gid().await {
        Some(gid) => GpuCheck {
            available: true,
            message: "Intel GPU detected and accessible".to_string(),
            render_gid: Some(gid),
        },
        None => GpuCheck {
            available: false,
            message: "Render group not found on system".to_string(),
            render_gid: None,
        },
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineKind {
    Success,
    Error,
    Warning,
    Info,
}

#[derive(Debug)]
pub struct Section {
    pub title: &'static str,
    lines: Vec<(LineKind, String)>,
    failed: bool,
}

impl Section {
    fn new(title: &'static str) -> Self {
        Self {
            title,
            lines: Vec::new(),
            failed: false,
        }
    }

    fn success(&mut self, text: impl Into<String>) {
        self.lines.push((LineKind::Success, text.into()));
    }

    fn error(&mut self, text: impl Into<String>) {
        self.failed = true;
        self.lines.push((LineKind::Error, text.into()));
    }

    fn warning(&mut self, text: impl Into<String>) {
        self.lines.push((LineKind::Warning, text.into()));
    }

    fn info(&mut self, text: impl Into<String>) {
        self.lines.push((LineKind::Info, text.into()));
    }

    pub fn failed(&self) -> bool {
        self.failed
    }
}

/// Outcome of every configuration check, in the order they ran.
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub sections: Vec<Section>,
}

impl ValidationReport {
    pub fn passed(&self) -> bool {
        !self.sections.iter().any(Section::failed)
    }

    pub fn issue_count(&self) -> usize {
        self.sections
            .iter()
            .flat_map(|section| section.lines.iter())
            .filter(|(kind, _)| *kind == LineKind::Error)
            .count()
    }

    pub fn render(&self) {
        output::header("MEDIA SERVER STACK - CONFIGURATION VALIDATION");
        for section in &self.sections {
            output::info(&format!("{}...", section.title));
            for (kind, text) in &section.lines {
                match kind {
                    LineKind::Success => output::success(text),
                    LineKind::Error => output::error(text),
                    LineKind::Warning => output::warning(text),
                    LineKind::Info => output::info(text),
                }
            }
            println!();
        }

        output::header("VALIDATION SUMMARY");
        if self.passed() {
            output::success("All critical validations passed!");
            output::info("You can now start the stack with:");
            output::info("  mediastack start");
        } else {
            output::error("Validation failed - fix the issues above before starting");
        }
    }
}

/// Checks that only need the env map and the filesystem. Relative storage
/// roots resolve against `base`.
pub fn check_env(env: &EnvMap, base: &Path) -> Vec<Section> {
    let mut sections = Vec::new();

    let mut required = Section::new("Validating required variables");
    let missing = missing_required(env);
    if missing.is_empty() {
        required.success("All required variables are set");
    } else {
        required.error(format!("Missing or invalid variables: {}", missing.join(", ")));
        required.info("Edit .env and set these variables properly");
    }
    sections.push(required);

    let mut vpn = Section::new("Validating Mullvad WireGuard configuration");
    let issues = vpn_issues(env);
    if issues.is_empty() {
        vpn.success("Mullvad configuration looks valid");
    } else {
        for issue in issues {
            vpn.error(issue);
        }
        vpn.info("Get correct values from: https://mullvad.net/en/account/wireguard-config");
    }
    sections.push(vpn);

    let mut network = Section::new("Validating network configuration");
    let issues = network_issues(env);
    if issues.is_empty() {
        network.success(format!("LAN subnet: {}", env["LAN_SUBNET"]));
    } else {
        for issue in issues {
            network.error(issue);
        }
    }
    sections.push(network);

    let mut storage = Section::new("Validating storage paths");
    let paths = check_paths(env, base);
    for created in &paths.created {
        storage.warning(format!("Created directory: {}", created.display()));
    }
    if paths.issues.is_empty() {
        storage.success(format!("DATA_ROOT: {}", env["DATA_ROOT"]));
        storage.success(format!("CONFIG_ROOT: {}", env["CONFIG_ROOT"]));
    } else {
        for (var, issue) in paths.issues {
            storage.error(format!("{var}: {issue}"));
        }
    }
    sections.push(storage);

    sections
}

pub async fn run_validation(paths: &StackPaths, compose: &Compose) -> crate::error::Result<ValidationReport> {
    let mut report = ValidationReport::default();

    let mut load = Section::new("Loading env file");
    if !paths.env_file.exists() {
        load.error(format!("{} not found!", paths.env_file.display()));
        load.info("Copy .env.example to .env and fill in your values (or run `mediastack setup`)");
        report.sections.push(load);
        return Ok(report);
    }
    let env = env_file::load(&paths.env_file)?;
    load.success(format!("Loaded {} environment variables", env.len()));
    report.sections.push(load);

    report.sections.extend(check_env(&env, &paths.project_dir));

    let mut compose_section = Section::new("Checking compose file");
    match load_compose(&paths.compose_file) {
        Ok(file) => compose_section.success(format!(
            "{} declares {} services",
            paths.compose_file.display(),
            file.services.len()
        )),
        Err(err) => compose_section.error(err.to_string()),
    }
    report.sections.push(compose_section);

    let mut docker = Section::new("Checking Docker");
    if compose.daemon_running().await {
        docker.success("Docker is installed and running");
    } else {
        docker.error("Docker is not running or not installed");
        docker.info("Install: curl -fsSL https://get.docker.com | sh");
    }
    report.sections.push(docker);

    let mut gpu = Section::new("Checking Intel GPU for hardware transcoding");
    let gpu_check = check_gpu().await;
    if gpu_check.available {
        gpu.success(gpu_check.message);
        if let Some(host_gid) = gpu_check.render_gid {
            gpu.info(format!("Render group GID: {host_gid}"));
            let configured = env.get("RENDER_GID").map(|v| v.trim()).unwrap_or_default();
            if configured != host_gid && !is_placeholder(configured) {
                gpu.warning(format!(
                    "RENDER_GID is {configured} but the host render group is {host_gid}"
                ));
            }
        }
    } else {
        gpu.warning(gpu_check.message);
        gpu.info("Hardware transcoding will not be available");
    }
    report.sections.push(gpu);

    debug!(passed = report.passed(), issues = report.issue_count(), "validation finished");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{docker_script, FakeStack, HEALTHY_PS, MULLVAD_EXIT, VALID_KEY};

    fn valid_env(data: &Path, config: &Path) -> EnvMap {
        let mut env = EnvMap::new();
        for (key, value) in [
            ("PUID", "1000"),
            ("PGID", "1000"),
            ("RENDER_GID", "993"),
            ("TZ", "Europe/Amsterdam"),
            ("LAN_SUBNET", "192.168.1.0/24"),
            ("WIREGUARD_PRIVATE_KEY", VALID_KEY),
            ("WIREGUARD_ADDRESSES", "10.64.12.7/32"),
            ("VPN_PROVIDER", "Mullvad"),
            ("VPN_TYPE", "wireguard"),
        ] {
            env.insert(key.to_string(), value.to_string());
        }
        env.insert("DATA_ROOT".to_string(), data.display().to_string());
        env.insert("CONFIG_ROOT".to_string(), config.display().to_string());
        env
    }

    #[test]
    fn valid_env_passes_every_env_check() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join("data");
        std::fs::create_dir(&data).unwrap();
        let config = dir.path().join("config");
        let env = valid_env(&data, &config);

        assert_eq!(VALID_KEY.len(), 44);
        assert!(missing_required(&env).is_empty());
        assert!(vpn_issues(&env).is_empty());
        assert!(network_issues(&env).is_empty());

        let sections = check_env(&env, dir.path());
        assert!(sections.iter().all(|s| !s.failed()));
        assert!(data.join("torrents").is_dir());
        assert!(data.join("media").is_dir());
        assert!(config.is_dir());
    }

    #[test]
    fn every_missing_or_placeholder_var_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let env = valid_env(dir.path(), dir.path());

        for var in REQUIRED_VARS {
            for bad in [None, Some(""), Some("   "), Some("your-key"), Some("paste-here")] {
                let mut env = env.clone();
                match bad {
                    None => {
                        env.remove(*var);
                    }
                    Some(value) => {
                        env.insert(var.to_string(), value.to_string());
                    }
                }
                assert_eq!(missing_required(&env), vec![*var], "{var} = {bad:?}");
                let sections = check_env(&env, dir.path());
                let report = ValidationReport { sections };
                assert!(!report.passed(), "{var} = {bad:?}");
            }
        }
    }

    #[test]
    fn wireguard_formats_are_checked() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = valid_env(dir.path(), dir.path());
        env.insert("WIREGUARD_PRIVATE_KEY".to_string(), "short=".to_string());
        env.insert("WIREGUARD_ADDRESSES".to_string(), "192.168.0.2/32".to_string());
        env.insert("VPN_PROVIDER".to_string(), "protonvpn".to_string());
        env.insert("VPN_TYPE".to_string(), "openvpn".to_string());

        let issues = vpn_issues(&env);
        assert_eq!(issues.len(), 4);
        assert!(issues[0].starts_with("WIREGUARD_PRIVATE_KEY"));
        assert!(issues[1].starts_with("WIREGUARD_ADDRESSES"));
    }

    #[test]
    fn key_without_padding_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = valid_env(dir.path(), dir.path());
        let unpadded = format!("{}A", &VALID_KEY[..43]);
        env.insert("WIREGUARD_PRIVATE_KEY".to_string(), unpadded);
        assert_eq!(vpn_issues(&env).len(), 1);
    }

    #[test]
    fn subnet_format_is_checked() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = valid_env(dir.path(), dir.path());
        env.insert("LAN_SUBNET".to_string(), "192.168.1.0".to_string());
        assert_eq!(network_issues(&env).len(), 1);
    }

    #[test]
    fn missing_data_root_is_an_issue() {
        let dir = tempfile::tempdir().unwrap();
        let env = valid_env(&dir.path().join("nope"), &dir.path().join("config"));
        let check = check_paths(&env, dir.path());
        assert_eq!(check.issues.len(), 1);
        assert_eq!(check.issues[0].0, "DATA_ROOT");
        assert_eq!(check.created, vec![dir.path().join("config")]);
    }

    #[test]
    fn relative_roots_resolve_against_the_project_dir() {
        let project = tempfile::tempdir().unwrap();
        std::fs::create_dir(project.path().join("data")).unwrap();
        let env = valid_env(Path::new("./data"), Path::new("./config"));

        let check = check_paths(&env, project.path());
        assert!(check.issues.is_empty(), "{:?}", check.issues);
        assert!(project.path().join("data/torrents").is_dir());
        assert!(project.path().join("config").is_dir());
        assert!(check.created.iter().all(|p| p.starts_with(project.path())));
    }

    #[tokio::test]
    async fn complete_project_passes_validation() {
        let stack = FakeStack::healthy();
        stack.write_project();

        let report = run_validation(&stack.paths, &stack.compose).await.unwrap();
        assert!(report.passed(), "{} issues", report.issue_count());
        assert!(stack.root().join("data/media").is_dir());
        assert!(stack.root().join("config").is_dir());
    }

    #[tokio::test]
    async fn stopped_docker_daemon_fails_validation() {
        let stack = FakeStack::new("exit 1\n");
        stack.write_project();

        let report = run_validation(&stack.paths, &stack.compose).await.unwrap();
        assert!(!report.passed());
        assert_eq!(report.issue_count(), 1);
    }

    #[tokio::test]
    async fn missing_env_file_fails_validation() {
        let stack = FakeStack::new(&docker_script(HEALTHY_PS, MULLVAD_EXIT, ""));

        let report = run_validation(&stack.paths, &stack.compose).await.unwrap();
        assert!(!report.passed());
        assert_eq!(report.sections.len(), 1);
    }

    #[test]
    fn group_line_yields_gid() {
        assert_eq!(parse_group_gid("render:x:993:\n").as_deref(), Some("993"));
        assert_eq!(parse_group_gid("garbage"), None);
    }
}
