//! Configuration loading for the QBall CLI

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use qball_core::{Hyperparameters, QBallError};
use qball_rl::{ActionGrid, RewardScheme};

/// Configuration for a training run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub learning: LearningConfig,
    pub simulation: SimulationConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearningConfig {
    pub alpha: f64,
    pub gamma: f64,
    pub epsilon: f64,
    pub action_grid: ActionGrid,
    pub step_reward: f64,
    pub terminal_penalty: f64,
}

impl Default for LearningConfig {
    fn default() -> Self {
        let params = Hyperparameters::default();
        let scheme = RewardScheme::default();
        Self {
            alpha: params.alpha,
            gamma: params.gamma,
            epsilon: params.epsilon,
            action_grid: ActionGrid::default(),
            step_reward: scheme.step_reward,
            terminal_penalty: scheme.terminal_penalty,
        }
    }
}

impl LearningConfig {
    pub fn hyperparameters(&self) -> Hyperparameters {
        Hyperparameters {
            alpha: self.alpha,
            gamma: self.gamma,
            epsilon: self.epsilon,
        }
    }

    pub fn reward_scheme(&self) -> RewardScheme {
        RewardScheme {
            step_reward: self.step_reward,
            terminal_penalty: self.terminal_penalty,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Fixed simulation steps per second at speed 1.0
    pub tick_rate_hz: f64,
    /// Speed multiplier; 0 runs as fast as possible
    pub speed: f64,
    pub max_episodes: Option<u64>,
    pub max_steps: Option<u64>,
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 50.0,
            speed: 1.0,
            max_episodes: None,
            max_steps: None,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub enabled: bool,
    pub directory: PathBuf,
    pub file_stem: String,
    /// Episode records the log writer may hold in memory
    pub buffered_lines_limit: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            directory: PathBuf::from("."),
            file_stem: "episodes".to_string(),
            buffered_lines_limit: 1024,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Optional log file; empty logs to stdout only
    pub file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: String::new(),
        }
    }
}

impl Config {
    /// Config file to load: the explicit path if given, otherwise the first
    /// one found by [`find_config_file`](Self::find_config_file)
    pub fn resolve_path(explicit: Option<&Path>) -> Option<PathBuf> {
        explicit.map(Path::to_path_buf).or_else(Self::find_config_file)
    }

    /// Load configuration from an optional file and the environment.
    ///
    /// Values are not validated here so that a broken file can still be shown
    /// and rewritten; call [`validate`](Self::validate) before training.
    pub fn load(path: Option<&Path>, required: bool) -> Result<Self> {
        let mut builder = ConfigBuilder::<config::builder::DefaultState>::default();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path.to_path_buf()).required(required));
        }

        // Environment variables with QBALL_ prefix, e.g. QBALL_LEARNING__ALPHA
        builder = builder.add_source(
            Environment::with_prefix("QBALL")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder
            .build()?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Parse configuration from a TOML string, without environment overrides
    pub fn from_toml(contents: &str) -> Result<Self> {
        ConfigBuilder::<config::builder::DefaultState>::default()
            .add_source(File::from_str(contents, FileFormat::Toml))
            .build()?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Reject values the learner must never see
    pub fn validate(&self) -> Result<(), QBallError> {
        self.learning.hyperparameters().validate()?;

        for (name, value) in [
            ("learning.step_reward", self.learning.step_reward),
            ("learning.terminal_penalty", self.learning.terminal_penalty),
        ] {
            if !value.is_finite() {
                return Err(QBallError::Config(format!("{name} must be finite")));
            }
        }
        let tick_rate_hz = self.simulation.tick_rate_hz;
        if !(tick_rate_hz.is_finite() && tick_rate_hz > 0.0) {
            return Err(QBallError::Config(format!(
                "simulation.tick_rate_hz must be positive, got {tick_rate_hz}"
            )));
        }
        if Duration::try_from_secs_f64(1.0 / tick_rate_hz).is_err() {
            return Err(QBallError::Config(format!(
                "simulation.tick_rate_hz {tick_rate_hz} gives a tick period too long to represent"
            )));
        }
        if !self.simulation.speed.is_finite() || self.simulation.speed < 0.0 {
            return Err(QBallError::Config(format!(
                "simulation.speed must be finite and >= 0, got {}",
                self.simulation.speed
            )));
        }
        if self.output.file_stem.is_empty() {
            return Err(QBallError::Config(
                "output.file_stem must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Find the configuration file
    pub fn find_config_file() -> Option<PathBuf> {
        // Check in order: QBALL_CONFIG env, ./qball.toml, ~/.config/qball/qball.toml
        if let Ok(path) = std::env::var("QBALL_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let local = PathBuf::from("qball.toml");
        if local.exists() {
            return Some(local);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".config").join("qball").join("qball.toml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }
}
