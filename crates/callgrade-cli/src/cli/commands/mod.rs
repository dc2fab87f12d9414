//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod check;
mod config_cmd;
mod helpers;
mod once;
mod run;
mod status;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use callgrade::config::Settings;

#[derive(Parser)]
#[command(name = "callgrade")]
#[command(about = "Background quality scoring for recorded sales calls")]
#[command(version)]
pub struct Cli {
    /// Settings file path (overrides auto-discovery of callgrade.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Use a JSON fixture of call rows instead of the remote store, and grade
    /// transcripts locally instead of calling the scoring function
    #[arg(long, global = true, value_name = "FIXTURE")]
    offline: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Run the scheduler until interrupted (Ctrl-C)
    Run,

    /// Run a single analysis cycle now
    Once {
        /// Re-score calls that already have an analysis
        #[arg(short, long)]
        force: bool,
        /// Maximum calls to score (defaults to the configured batch size)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Evaluate a transcript file with the quality heuristics
    Check {
        /// Transcript text file
        file: PathBuf,
        /// Print the full report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Worker configuration stored in the database
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Show the stored configuration and how many calls are waiting
    Status,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the current worker configuration
    Show,

    /// Update worker configuration fields
    Set {
        /// Enable or disable the background worker
        #[arg(long)]
        enabled: Option<bool>,
        /// Seconds between cycles
        #[arg(long)]
        interval: Option<u64>,
        /// Calls scored per cycle
        #[arg(long)]
        batch_size: Option<usize>,
        /// Minimum call duration in seconds
        #[arg(long)]
        min_duration: Option<u64>,
        /// Scoring attempts per call
        #[arg(long)]
        max_retries: Option<u32>,
        /// Timeout for one scoring attempt, in seconds
        #[arg(long)]
        score_timeout: Option<u64>,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())?;
    let offline = cli.offline.as_deref();

    match cli.command {
        Commands::Run => run::cmd_run(&settings, offline).await,
        Commands::Once { force, limit } => once::cmd_once(&settings, offline, force, limit).await,
        Commands::Check { file, json } => check::cmd_check(&file, json),
        Commands::Config { command } => match command {
            ConfigCommands::Show => config_cmd::cmd_config_show(&settings, offline).await,
            ConfigCommands::Set {
                enabled,
                interval,
                batch_size,
                min_duration,
                max_retries,
                score_timeout,
            } => {
                let patch = callgrade::config::WorkerConfigPatch {
                    enabled,
                    interval_secs: interval,
                    batch_size,
                    min_duration_secs: min_duration,
                    max_retries,
                    score_timeout_secs: score_timeout,
                };
                config_cmd::cmd_config_set(&settings, offline, &patch).await
            }
        },
        Commands::Status => status::cmd_status(&settings, offline).await,
    }
}
