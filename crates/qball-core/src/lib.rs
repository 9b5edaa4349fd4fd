//! QBall Core - Core types and shared functionality
//!
//! This crate provides the error type, the hyperparameter model, and the
//! environment-file loader used by the learning engine and the CLI.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod hyperparams;
pub mod util;

pub use error::{QBallError, Result};
pub use hyperparams::{Hyperparameter, HyperparameterControl, Hyperparameters};
