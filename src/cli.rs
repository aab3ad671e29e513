// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ferry")]
#[command(about = "Build an artifact and ship it to a host over SSH")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Only print the final result
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Print progress as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    /// Path to the configuration file (default: discover in current directory)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new ferry.yml configuration file
    Init {
        /// Name of the first target
        #[arg(short, long)]
        target: Option<String>,

        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },

    /// Build, copy, and restart on one target
    Deploy {
        /// Target to deploy to (defined in config)
        #[arg(short, long)]
        target: String,

        /// Build and resolve the target, then stop before copying
        #[arg(long)]
        dry_run: bool,

        /// Maximum copy attempts (overrides config)
        #[arg(long)]
        retries: Option<u32>,

        /// Timeout in seconds for each remote operation (overrides config)
        #[arg(long)]
        timeout: Option<u64>,

        /// Break a lock held by another deployment
        #[arg(long)]
        force: bool,
    },

    /// List configured targets
    Targets,

    /// Show recorded deployment attempts
    History {
        /// Only show attempts for this target
        #[arg(short, long)]
        target: Option<String>,

        /// Show at most this many attempts, newest last
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}

impl Cli {
    pub fn output_mode(&self) -> ferry::output::OutputMode {
        use ferry::output::OutputMode;
        if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Normal
        }
    }
}
