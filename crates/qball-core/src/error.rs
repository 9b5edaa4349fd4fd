//! Error types for QBall

use thiserror::Error;

/// Main error type for QBall
#[derive(Error, Debug)]
pub enum QBallError {
    #[error("Invalid hyperparameter: {name} = {value} (expected a value in [0, 1])")]
    InvalidHyperparameter { name: String, value: f64 },

    #[error("Environment desync: {0}")]
    EnvironmentDesync(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for QBall operations
pub type Result<T> = std::result::Result<T, QBallError>;
