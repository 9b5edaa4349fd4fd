//! One-step Q-learning update

use serde::Serialize;
use tracing::debug;

use qball_core::Hyperparameters;

use crate::experience::Transition;
use crate::q_table::QTable;

/// Result of asking the learner to apply a transition
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UpdateOutcome {
    /// The value was written
    Applied { old_value: f64, new_value: f64 },
    /// No previous (state, action) existed, so nothing was written
    Skipped,
}

impl UpdateOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, UpdateOutcome::Applied { .. })
    }
}

/// Tabular Q-learning: `Q(s,a) += alpha * (r + gamma * max_a' Q(s',a') - Q(s,a))`
///
/// Holds no parameters of its own; alpha and gamma are passed in on each call
/// so that runtime changes take effect immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct QLearning {
    updates: u64,
}

impl QLearning {
    pub fn new() -> Self {
        Self::default()
    }

    /// Algorithm name
    pub fn name(&self) -> &str {
        "q_learning"
    }

    /// Apply one TD update, returning the new value
    pub fn update(
        &mut self,
        table: &mut QTable,
        transition: &Transition,
        params: &Hyperparameters,
    ) -> UpdateOutcome {
        let old_value = table.get(&transition.state, &transition.action);
        let target = transition.reward + params.gamma * table.max_value(&transition.next_state);
        let new_value = old_value + params.alpha * (target - old_value);
        table.set(transition.state, transition.action, new_value);
        self.updates += 1;

        debug!(
            "Q{} {} : {:.4} -> {:.4}",
            transition.state, transition.action, old_value, new_value
        );

        UpdateOutcome::Applied {
            old_value,
            new_value,
        }
    }

    /// Apply the update if a transition exists, otherwise skip it
    pub fn update_pending(
        &mut self,
        table: &mut QTable,
        transition: Option<&Transition>,
        params: &Hyperparameters,
    ) -> UpdateOutcome {
        match transition {
            Some(transition) => self.update(table, transition, params),
            None => UpdateOutcome::Skipped,
        }
    }

    /// Number of updates applied so far
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Get algorithm parameters as JSON
    pub fn get_params(&self, table: &QTable, params: &Hyperparameters) -> serde_json::Value {
        serde_json::json!({
            "algorithm": self.name(),
            "learning_rate": params.alpha,
            "discount_factor": params.gamma,
            "epsilon": params.epsilon,
            "action_grid": table.grid().as_str(),
            "q_table_size": table.len(),
            "updates": self.updates,
        })
    }
}
