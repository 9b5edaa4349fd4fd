//! The one pending transition consumed by the TD update

use serde::{Deserialize, Serialize};

use crate::state::{Action, Reward, State};

/// A single transition tuple (s, a, r, s')
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub state: State,
    pub action: Action,
    pub reward: Reward,
    pub next_state: State,
}

impl Transition {
    pub fn new(state: State, action: Action, reward: Reward, next_state: State) -> Self {
        Self {
            state,
            action,
            reward,
            next_state,
        }
    }

    /// Complete a pending (state, action) pair with this tick's reward and state.
    /// Returns `None` when there is no previous pair yet.
    pub fn from_pending(
        pending: Option<(State, Action)>,
        reward: Reward,
        next_state: State,
    ) -> Option<Self> {
        pending.map(|(state, action)| Self::new(state, action, reward, next_state))
    }
}
