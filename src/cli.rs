use std::path::PathBuf;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use crossterm::style::Stylize;
use tracing::info;

use crate::driver::{capture, Compose, Probe};
use crate::env_file::{self, EnvMap};
use crate::error::{Result, StackError};
use crate::output;
use crate::services::{self, SERVICES};
use crate::status::{Snapshot, StatusReport};
use crate::util::{current_gid, current_uid, StackPaths};
use crate::validate::{is_placeholder, render_group_gid, run_validation, ValidationReport};
use crate::vpn;

const DEFAULT_LOG_TAIL: usize = 100;
const HOST_IP_FALLBACK: &str = "YOUR_SERVER_IP";

#[derive(Parser)]
#[command(
    name = "mediastack",
    version,
    about = "Validate and manage the media server docker compose stack"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub verbose: bool,
    /// Directory holding docker-compose.yml and .env
    #[arg(long, global = true, env = "MEDIASTACK_DIR")]
    pub project_dir: Option<PathBuf>,
    /// Env file, relative to the project directory unless absolute
    #[arg(long, global = true, env = "MEDIASTACK_ENV_FILE")]
    pub env_file: Option<PathBuf>,
    /// Docker binary to invoke
    #[arg(long, global = true, env = "MEDIASTACK_DOCKER", default_value = "docker")]
    pub docker: String,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create .env from the example, fill host ids and validate
    Setup,
    /// Validate the configuration
    Validate,
    /// Validate, pull images and start every container
    Start {
        #[arg(long)]
        skip_pull: bool,
    },
    Stop,
    Restart,
    /// Show container state and health
    Status,
    Logs {
        service: Option<String>,
        #[arg(long)]
        no_follow: bool,
        #[arg(long, default_value_t = DEFAULT_LOG_TAIL)]
        tail: usize,
    },
    /// Check the VPN sidecar and exit IP
    Vpn,
    /// Print service URLs
    Info,
    /// Remove orphaned containers and dangling images
    Clean {
        #[arg(long)]
        yes: bool,
    },
    /// Stop and remove all containers, keeping config and data
    #[command(visible_alias = "down")]
    Reset {
        #[arg(long)]
        yes: bool,
    },
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

pub async fn execute(cli: Cli) -> Result<()> {
    let paths = StackPaths::resolve(cli.project_dir, cli.env_file)?;
    let compose = Compose::new(cli.docker, paths.clone());
    info!(project = %paths.project_dir.display(), env = %paths.env_file.display(), "resolved stack paths");

    match cli.command {
        Commands::Setup => {
            setup(&paths, &compose).await?;
        }
        Commands::Validate => {
            let report = run_validation(&paths, &compose).await?;
            report.render();
            require_passed(&report)?;
        }
        Commands::Start { skip_pull } => {
            output::header("STARTING MEDIA SERVER STACK");
            let report = run_validation(&paths, &compose).await?;
            report.render();
            require_passed(&report)?;

            if !skip_pull {
                output::info("Pulling latest images...");
                compose.pull().await?;
            }
            output::info("Starting containers...");
            if let Err(err) = compose.up().await {
                output::error("Failed to start containers");
                return Err(err);
            }
            output::success("All containers started!");
            show_access_info(&paths).await?;
            println!();
            output::info("View logs: mediastack logs");
            output::info("Check VPN: mediastack vpn");
        }
        Commands::Stop => {
            output::info("Stopping all containers...");
            compose.stop().await?;
        }
        Commands::Restart => {
            output::info("Restarting all containers...");
            compose.stop().await?;
            compose.up().await?;
            show_access_info(&paths).await?;
        }
        Commands::Status => {
            status(&paths, &compose).await?;
        }
        Commands::Logs {
            service,
            no_follow,
            tail,
        } => {
            if let Some(name) = service.as_deref() {
                if services::find(name).is_none() {
                    let known: Vec<&str> = SERVICES.iter().map(|svc| svc.id).collect();
                    return Err(StackError::Usage(format!(
                        "unknown service '{name}', expected one of: {}",
                        known.join(", ")
                    )));
                }
            }
            compose.logs(service.as_deref(), !no_follow, tail).await?;
        }
        Commands::Vpn => {
            output::header("VPN DIAGNOSTICS");
            output::info(&format!("Checked at {}", timestamp()));
            let report = vpn::check(&compose).await?;
            report.print();
            let problems = report.problems();
            if !problems.is_empty() {
                return Err(StackError::Vpn(problems.join("; ")));
            }
        }
        Commands::Info => {
            show_access_info(&paths).await?;
        }
        Commands::Clean { yes } => {
            output::warning("This will remove the stack's containers and all dangling images");
            output::warning("Config and data will be preserved");
            if !yes && !output::confirm("Continue?")? {
                output::info("Cancelled");
                return Ok(());
            }
            compose.down(true).await?;
            compose.prune_images().await?;
            output::success("Cleaned up containers and images");
        }
        Commands::Reset { yes } => {
            output::warning("This will stop and remove all containers");
            output::warning("Config and data will be preserved");
            if !yes && !output::confirm("Continue?")? {
                output::info("Cancelled");
                return Ok(());
            }
            compose.down(false).await?;
        }
        Commands::Completions { shell } => {
            clap_complete::generate(shell, &mut Cli::command(), "mediastack", &mut std::io::stdout());
        }
    }
    Ok(())
}

fn require_passed(report: &ValidationReport) -> Result<()> {
    if report.passed() {
        Ok(())
    } else {
        Err(StackError::ValidationFailed(report.issue_count()))
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

async fn setup(paths: &StackPaths, compose: &Compose) -> Result<()> {
    output::header("MEDIA SERVER STACK - SETUP");

    if !paths.env_file.exists() {
        let example = paths.example_env_file();
        if !example.exists() {
            return Err(StackError::EnvFileNotFound(example));
        }
        std::fs::copy(&example, &paths.env_file)?;
        output::success(&format!(
            "Created {} from {}",
            paths.env_file.display(),
            example.display()
        ));
    }

    let env = env_file::load(&paths.env_file)?;
    let unset = |key: &str| env.get(key).is_none_or(|value| is_placeholder(value));
    let mut fills = Vec::new();
    if unset("PUID") {
        fills.push(("PUID", current_uid().to_string()));
    }
    if unset("PGID") {
        fills.push(("PGID", current_gid().to_string()));
    }
    if unset("RENDER_GID") {
        if let Some(gid) = render_group_gid().await {
            fills.push(("RENDER_GID", gid));
        }
    }
    if !fills.is_empty() {
        env_file::set_values(&paths.env_file, &fills)?;
        for (key, value) in &fills {
            output::success(&format!("Set {key}={value}"));
        }
    }

    let report = run_validation(paths, compose).await?;
    report.render();
    require_passed(&report)
}

async fn status(paths: &StackPaths, compose: &Compose) -> Result<()> {
    output::header("MEDIA SERVER STACK - STATUS");
    output::info(&format!("Checked at {}", timestamp()));
    println!();

    let snapshot = match compose.ps().await {
        Probe::Output(text) => Snapshot::parse(&text),
        Probe::Unavailable(reason) => {
            return Err(StackError::Unavailable(format!("container status: {reason}")));
        }
    };
    if snapshot.is_empty() {
        output::warning("No containers found - is the stack running?");
    }

    let env = env_file::load(&paths.env_file)?;
    let host = host_ip().await;
    let report = StatusReport::build(&snapshot, &env, &host);
    report.print();

    let failing = report.failing_critical();
    if failing.is_empty() {
        Ok(())
    } else {
        Err(StackError::Unhealthy(failing))
    }
}

async fn host_ip() -> String {
    capture("hostname", &["-I"], Duration::from_secs(2))
        .await
        .output()
        .and_then(|out| out.split_whitespace().next())
        .map(str::to_string)
        .unwrap_or_else(|| HOST_IP_FALLBACK.to_string())
}

async fn show_access_info(paths: &StackPaths) -> Result<()> {
    let env: EnvMap = env_file::load(&paths.env_file)?;
    let host = host_ip().await;

    output::header("SERVICE ACCESS INFORMATION");
    for service in SERVICES {
        if let Some(url) = service.url(&host, &env) {
            let name = format!("{:<30}", service.display_name);
            println!("{} {} {}", "•".green(), name.bold(), url);
        }
    }

    println!();
    println!("{}", "IMPORTANT:".yellow());
    println!("  • qBittorrent traffic is VPN-protected (Mullvad)");
    println!("  • Default qBittorrent credentials: admin / adminadmin");
    println!("  • Change qBittorrent password immediately!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{docker_script, FakeStack, HEALTHY_PS, MULLVAD_EXIT};

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_logs_with_service_and_flags() {
        let cli = Cli::try_parse_from(["mediastack", "logs", "gluetun", "--no-follow", "--tail", "20"])
            .unwrap();
        match cli.command {
            Commands::Logs {
                service,
                no_follow,
                tail,
            } => {
                assert_eq!(service.as_deref(), Some("gluetun"));
                assert!(no_follow);
                assert_eq!(tail, 20);
            }
            _ => panic!("expected logs"),
        }
    }

    #[test]
    fn down_is_an_alias_for_reset() {
        let cli = Cli::try_parse_from(["mediastack", "down", "--yes"]).unwrap();
        assert!(matches!(cli.command, Commands::Reset { yes: true }));
    }

    #[test]
    fn global_flags_work_after_the_verb() {
        let cli = Cli::try_parse_from(["mediastack", "status", "--project-dir", "/srv/media", "--docker", "podman"])
            .unwrap();
        assert_eq!(cli.project_dir, Some(PathBuf::from("/srv/media")));
        assert_eq!(cli.docker, "podman");
    }

    #[tokio::test]
    async fn status_succeeds_when_every_critical_service_is_up() {
        let stack = FakeStack::healthy();
        assert!(status(&stack.paths, &stack.compose).await.is_ok());
    }

    #[tokio::test]
    async fn status_names_unhealthy_critical_services() {
        let ps = HEALTHY_PS.replace(
            "jellyfin\trunning\tUp 2 hours (healthy)",
            "jellyfin\trunning\tUp 2 hours (unhealthy)",
        );
        let stack = FakeStack::new(&docker_script(&ps, MULLVAD_EXIT, ""));

        match status(&stack.paths, &stack.compose).await {
            Err(StackError::Unhealthy(failing)) => assert_eq!(failing, vec!["jellyfin".to_string()]),
            other => panic!("expected unhealthy jellyfin, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn status_fails_when_compose_cannot_be_queried() {
        let stack = FakeStack::new("echo 'Cannot connect to the Docker daemon' >&2\nexit 1\n");
        assert!(matches!(
            status(&stack.paths, &stack.compose).await,
            Err(StackError::Unavailable(_))
        ));
    }
}
