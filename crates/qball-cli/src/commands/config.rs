//! Configuration management commands

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::config::Config;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration (file, environment, defaults)
    Show,
    /// Print the configuration file that would be loaded
    Path,
    /// Initialize a configuration file with default values
    Init {
        /// Where to write the file
        #[arg(long, default_value = "qball.toml")]
        path: PathBuf,
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },
}

pub async fn run(cmd: ConfigCommands, config: &Config) -> Result<()> {
    match cmd {
        ConfigCommands::Show => show(config),
        ConfigCommands::Path => path(),
        ConfigCommands::Init { path, force } => init(&path, force).map(|_| ()),
    }
}

fn show(config: &Config) -> Result<()> {
    println!("Current Configuration");
    println!("=====================\n");

    match Config::find_config_file() {
        Some(path) => println!("# Config file: {}\n", path.display()),
        None => println!("# No configuration file found. Using defaults.\n"),
    }
    if let Err(e) = config.validate() {
        println!("# Warning: {e}\n");
    }
    println!("{}", config.to_toml()?);
    Ok(())
}

fn path() -> Result<()> {
    match Config::find_config_file() {
        Some(path) => println!("{}", path.display()),
        None => println!("No configuration file found"),
    }
    Ok(())
}

/// Write the default configuration; returns false if the file was kept
fn init(path: &Path, force: bool) -> Result<bool> {
    if path.exists() && !force {
        println!("Configuration file already exists: {}", path.display());
        println!("Use --force to overwrite");
        return Ok(false);
    }

    let contents = Config::default().to_toml()?;
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Configuration written to {}", path.display());
    Ok(true)
}
