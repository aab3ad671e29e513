// ABOUTME: Entry point for the ferry CLI application.
// ABOUTME: Parses arguments, installs logging and Ctrl-C handling, and dispatches commands.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use ferry::config::{self, Config};
use ferry::error::Result;
use ferry::output::Output;
use std::env;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping at the next step");
            on_signal.cancel();
        }
    });

    let output = Output::new(cli.output_mode());
    let error_output = Output::new(cli.output_mode());

    if let Err(e) = run(cli, output, cancel).await {
        error_output.error(&e.to_string());
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli, output: Output, cancel: CancellationToken) -> Result<()> {
    let cwd = env::current_dir()?;

    match cli.command {
        Commands::Init { target, force } => {
            config::init_config(&cwd, target.as_deref(), force)?;
            output.success(&format!("Created {}", config::CONFIG_FILENAME));
            Ok(())
        }
        Commands::Deploy {
            target,
            dry_run,
            retries,
            timeout,
            force,
        } => {
            let config = load_config(cli.config.as_deref(), &cwd)?;
            let args = commands::DeployArgs {
                target,
                dry_run,
                retries,
                timeout,
                force,
            };
            commands::deploy(config, args, output, cancel).await
        }
        Commands::Targets => {
            let config = load_config(cli.config.as_deref(), &cwd)?;
            commands::targets(&config, &output)
        }
        Commands::History { target, limit } => {
            let config = load_config(cli.config.as_deref(), &cwd)?;
            commands::history(&config, target.as_deref(), limit, &output)
        }
    }
}

fn load_config(path: Option<&std::path::Path>, cwd: &std::path::Path) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::discover(cwd),
    }
}
