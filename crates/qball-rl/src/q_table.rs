//! Sparse action-value table
//!
//! Absent entries read as 0.0. Value lookup and greedy selection range over
//! the whole [`ActionGrid`], not only the actions stored so far, so a state
//! whose stored values are all negative still has a maximum of 0.0.

use std::collections::HashMap;

use crate::state::{Action, ActionGrid, State};

/// Argmax of one state over the grid
#[derive(Debug, Clone, Copy, PartialEq)]
struct Best {
    action: Action,
    value: f64,
}

/// Q-table keyed by discretized (state, action) pairs
#[derive(Debug, Clone)]
pub struct QTable {
    values: HashMap<(State, Action), f64>,
    // One entry per state with at least one stored on-grid action. Kept equal
    // to `scan_best` after every `set`.
    best: HashMap<State, Best>,
    grid: ActionGrid,
}

impl QTable {
    pub fn new(grid: ActionGrid) -> Self {
        Self {
            values: HashMap::new(),
            best: HashMap::new(),
            grid,
        }
    }

    pub fn grid(&self) -> ActionGrid {
        self.grid
    }

    /// Stored value, or 0.0 if the pair was never set
    pub fn get(&self, state: &State, action: &Action) -> f64 {
        self.values.get(&(*state, *action)).copied().unwrap_or(0.0)
    }

    /// Insert or overwrite a value
    pub fn set(&mut self, state: State, action: Action, value: f64) {
        self.values.insert((state, action), value);

        if !self.grid.contains(&action) {
            return;
        }

        let best = match self.best.get(&state).copied() {
            Some(best) if best.action == action => {
                if value >= best.value {
                    Best { action, value }
                } else {
                    self.scan(&state)
                }
            }
            Some(best) => {
                if value > best.value || (value == best.value && action < best.action) {
                    Best { action, value }
                } else {
                    best
                }
            }
            None => self.scan(&state),
        };
        self.best.insert(state, best);
    }

    /// Maximum value over the whole action grid
    pub fn max_value(&self, state: &State) -> f64 {
        self.best.get(state).map_or(0.0, |best| best.value)
    }

    /// Action achieving [`max_value`](Self::max_value); the first one in grid
    /// order wins ties
    pub fn best_action(&self, state: &State) -> Action {
        self.best
            .get(state)
            .map_or_else(|| self.grid.first(), |best| best.action)
    }

    /// Brute-force argmax over the grid with a strict `>` comparison
    pub fn scan_best(&self, state: &State) -> (Action, f64) {
        let best = self.scan(state);
        (best.action, best.value)
    }

    fn scan(&self, state: &State) -> Best {
        let mut best = Best {
            action: self.grid.first(),
            value: f64::MIN,
        };
        for action in self.grid.iter() {
            let value = self.get(state, &action);
            if value > best.value {
                best = Best { action, value };
            }
        }
        best
    }

    /// Number of stored entries
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of distinct states with at least one stored on-grid action
    pub fn states_tracked(&self) -> usize {
        self.best.len()
    }

    /// Iterate over stored entries in arbitrary order
    pub fn iter(&self) -> impl Iterator<Item = (&State, &Action, f64)> {
        self.values.iter().map(|((s, a), v)| (s, a, *v))
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.best.clear();
    }
}

impl Default for QTable {
    fn default() -> Self {
        Self::new(ActionGrid::default())
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    use super::*;
    use crate::state::{discretize_action, discretize_state, Vec2};

    fn state(x: f64) -> State {
        discretize_state(Vec2::new(x, 0.0), Vec2::default())
    }

    #[test]
    fn test_fresh_table_reads_zero() {
        let table = QTable::new(ActionGrid::Symmetric);
        let s = state(1.0);
        for action in ActionGrid::Symmetric.iter().step_by(97) {
            assert_eq!(table.get(&s, &action), 0.0);
        }
        assert_eq!(table.max_value(&s), 0.0);
        assert!(table.is_empty());
    }

    #[test]
    fn test_set_and_get() {
        let mut table = QTable::default();
        let s = state(2.0);
        let a = discretize_action(0.3, -0.2);

        table.set(s, a, 1.5);
        assert_eq!(table.get(&s, &a), 1.5);
        table.set(s, a, -0.5);
        assert_eq!(table.get(&s, &a), -0.5);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_max_value_covers_unvisited_actions() {
        let mut table = QTable::new(ActionGrid::Reference);
        let s = state(0.0);
        table.set(s, discretize_action(0.5, 0.5), -2.0);

        // Every other grid action is implicitly 0.0
        assert_eq!(table.max_value(&s), 0.0);
        assert_eq!(table.best_action(&s), discretize_action(0.0, 0.0));
    }

    #[test]
    fn test_best_action_on_empty_state_is_first_grid_point() {
        let symmetric = QTable::new(ActionGrid::Symmetric);
        let reference = QTable::new(ActionGrid::Reference);
        let s = state(3.0);
        assert_eq!(symmetric.best_action(&s), discretize_action(-1.0, -1.0));
        assert_eq!(reference.best_action(&s), discretize_action(0.0, 0.0));
    }

    #[test]
    fn test_best_action_tie_break_prefers_first_enumerated() {
        let mut table = QTable::new(ActionGrid::Symmetric);
        let s = state(0.0);
        let later = discretize_action(0.4, 0.1);
        let earlier = discretize_action(0.2, 0.9);

        table.set(s, later, 1.0);
        table.set(s, earlier, 1.0);
        assert_eq!(table.best_action(&s), earlier);

        // Same outcome when inserted in the opposite order
        let mut table = QTable::new(ActionGrid::Symmetric);
        table.set(s, earlier, 1.0);
        table.set(s, later, 1.0);
        assert_eq!(table.best_action(&s), earlier);
        assert_eq!(table.scan_best(&s), (earlier, 1.0));
    }

    #[test]
    fn test_lowering_best_value_rescans() {
        let mut table = QTable::new(ActionGrid::Symmetric);
        let s = state(0.0);
        let a = discretize_action(0.1, 0.1);
        let b = discretize_action(0.9, 0.9);

        table.set(s, a, 3.0);
        table.set(s, b, 2.0);
        assert_eq!(table.best_action(&s), a);

        table.set(s, a, 1.0);
        assert_eq!(table.best_action(&s), b);
        assert_eq!(table.max_value(&s), 2.0);

        table.set(s, b, -1.0);
        table.set(s, a, -1.0);
        assert_eq!(table.max_value(&s), 0.0);
        assert_eq!(table.best_action(&s), ActionGrid::Symmetric.first());
    }

    #[test]
    fn test_reference_grid_ignores_negative_actions() {
        let mut table = QTable::new(ActionGrid::Reference);
        let s = state(0.0);
        let off_grid = discretize_action(-0.5, 0.5);

        table.set(s, off_grid, 10.0);
        assert_eq!(table.get(&s, &off_grid), 10.0);
        assert_eq!(table.max_value(&s), 0.0);
        assert_eq!(table.best_action(&s), discretize_action(0.0, 0.0));
        assert_eq!(table.states_tracked(), 0);
    }

    #[test]
    fn test_states_are_independent() {
        let mut table = QTable::default();
        let a = discretize_action(0.0, 0.0);
        table.set(state(1.0), a, 5.0);
        assert_eq!(table.max_value(&state(1.0)), 5.0);
        assert_eq!(table.max_value(&state(2.0)), 0.0);
    }

    #[test]
    fn test_cache_matches_brute_force_scan() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut table = QTable::new(ActionGrid::Reference);
        let states: Vec<State> = (0..3).map(|i| state(f64::from(i))).collect();
        // Small pool of actions so overwrites and ties are frequent
        let pool: Vec<Action> = (0..6)
            .map(|i| discretize_action(f64::from(i) * 0.1, 0.2))
            .collect();

        for _ in 0..400 {
            let s = states[rng.gen_range(0..states.len())];
            let a = pool[rng.gen_range(0..pool.len())];
            let value = f64::from(rng.gen_range(-3..=3)) * 0.5;
            table.set(s, a, value);

            for s in &states {
                assert_eq!(
                    (table.best_action(s), table.max_value(s)),
                    table.scan_best(s)
                );
            }
        }
    }

    #[test]
    fn test_clear() {
        let mut table = QTable::default();
        table.set(state(0.0), discretize_action(0.1, 0.1), 1.0);
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.max_value(&state(0.0)), 0.0);
    }
}
