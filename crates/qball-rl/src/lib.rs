//! QBall RL - Tabular Q-learning engine
//!
//! This crate holds the learning core: discretization of observations into
//! table keys, the sparse Q-table, the epsilon-greedy policy, the one-step
//! temporal-difference update, episode bookkeeping, and the per-tick
//! training loop that drives an external environment.

// Clippy pedantic allows - these are intentional design choices
#![allow(clippy::doc_markdown)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::float_cmp)]
#![allow(clippy::similar_names)]

pub mod algorithm;
pub mod engine;
pub mod episode;
pub mod experience;
pub mod policy;
pub mod q_table;
pub mod state;

pub use algorithm::{QLearning, UpdateOutcome};
pub use engine::{
    EngineStats, Environment, Observation, QLearner, TickOutcome, TrainingLoop, TrainingObserver,
};
pub use episode::{EpisodeCounters, EpisodeRecord, EpisodeTracker, RewardScheme};
pub use experience::Transition;
pub use policy::EpsilonGreedy;
pub use q_table::QTable;
pub use state::{discretize_action, discretize_state, Action, ActionGrid, Reward, State, Vec2};
