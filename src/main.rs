mod cli;
mod compose;
mod driver;
mod env_file;
mod error;
mod output;
mod services;
mod status;
#[cfg(test)]
mod test_utils;
mod util;
mod validate;
mod vpn;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = cli::Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = cli::execute(cli).await {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
