//! QBall CLI - Q-learning on a ball-balancing simulation
//!
//! Trains a tabular Q-learning agent to keep a ball on a tilting platform and
//! writes one CSV record per completed episode.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::unused_async)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::float_cmp)]

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use qball_core::util::load_env_file;

mod commands;
mod config;
mod episode_log;
mod sim;

use commands::{config as config_cmd, train};
use crate::config::Config;

#[derive(Parser)]
#[command(name = "qball")]
#[command(author, version, about = "QBall - tabular Q-learning ball balancer", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to QBALL_CONFIG, ./qball.toml, ~/.config/qball/qball.toml)
    #[arg(short, long, global = true, env = "QBALL_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Train an agent on the ball-balancing simulation
    Train(train::TrainArgs),

    /// Configuration management
    #[command(subcommand)]
    Config(config_cmd::ConfigCommands),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from qball.env file (before parsing args)
    let env_file = load_env_file();

    let cli = Cli::parse();
    let (config, source) = load_config(&cli.command, cli.config.as_deref())?;

    let level = if cli.verbose {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    let _guard = init_tracing(level, &config.logging.file);

    match &env_file {
        Some((path, Ok(applied))) => {
            debug!("Loaded {} variables from {}", applied, path.display());
        }
        Some((path, Err(e))) => warn!("Could not read env file {}: {}", path.display(), e),
        None => {}
    }
    match &source {
        ConfigSource::File(path) => info!("Loaded config from: {}", path.display()),
        ConfigSource::Defaults => info!("No config file found, using defaults"),
        ConfigSource::Skipped => {}
    }

    match cli.command {
        Commands::Train(args) => train::run(args, config).await,
        Commands::Config(cmd) => config_cmd::run(cmd, &config).await,
    }
}

/// Where the configuration came from
#[derive(Debug, PartialEq, Eq)]
enum ConfigSource {
    File(PathBuf),
    Defaults,
    /// Not loaded: `config init` writes a fresh file and must work even when
    /// the current one is broken
    Skipped,
}

/// Load configuration for `command`. Values are validated by the commands
/// that use them, not here.
fn load_config(command: &Commands, explicit: Option<&Path>) -> Result<(Config, ConfigSource)> {
    if matches!(command, Commands::Config(config_cmd::ConfigCommands::Init { .. })) {
        return Ok((Config::default(), ConfigSource::Skipped));
    }

    let path = Config::resolve_path(explicit);
    let config = Config::load(path.as_deref(), explicit.is_some())?;
    let source = path.map_or(ConfigSource::Defaults, ConfigSource::File);
    Ok((config, source))
}

/// Initialize tracing to stdout and, when configured, to a log file.
/// The returned guard must live until exit so buffered lines are flushed.
fn init_tracing(level: &str, log_file: &str) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("qball={level},qball_rl={level},qball_core={level}").into()
    });

    if log_file.is_empty() {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
        return None;
    }

    let log_path = Path::new(log_file);
    let log_dir = log_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let log_filename = log_path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("qball.log");

    match std::fs::create_dir_all(log_dir) {
        Ok(()) => {
            let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

            // Log to both file and stdout
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(non_blocking),
                )
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stdout))
                .init();
            Some(guard)
        }
        Err(e) => {
            // Fall back to stdout-only logging
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer())
                .init();
            eprintln!(
                "Warning: Could not set up file logging to '{log_file}': {e}. Using stdout only."
            );
            None
        }
    }
}
