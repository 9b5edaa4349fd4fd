//! RL Engine - Coordinates action selection, learning, and episode flow
//!
//! [`QLearner`] owns the Q-table and is shared by every agent that learns into
//! it. [`TrainingLoop`] drives one agent's environment one tick at a time.
//! Several loops may share a learner as long as they are ticked one after
//! another on the same thread.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use qball_core::{HyperparameterControl, Hyperparameters, QBallError, Result};

use crate::algorithm::{QLearning, UpdateOutcome};
use crate::episode::{EpisodeCounters, EpisodeRecord, EpisodeTracker, RewardScheme};
use crate::experience::Transition;
use crate::policy::EpsilonGreedy;
use crate::q_table::QTable;
use crate::state::{discretize_state, Action, ActionGrid, Reward, State, Vec2};

/// Raw observation reported by the environment
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Observation {
    /// Tracked object position relative to the agent
    pub position_delta: Vec2,
    /// Agent orientation
    pub orientation: Vec2,
}

/// The simulated world an agent acts in
pub trait Environment {
    fn observe(&self) -> Observation;

    fn apply_action(&mut self, action: Action);

    fn is_terminal(&self) -> bool;

    /// Move to a new initial condition. After this returns, `is_terminal`
    /// must be false.
    fn reset(&mut self);
}

/// Hook for display and telemetry collaborators
pub trait TrainingObserver {
    fn on_step(&mut self, _counters: EpisodeCounters) {}

    fn on_episode_end(&mut self, _record: &EpisodeRecord) {}
}

/// Shared learning state: table, update rule, policy, and live hyperparameters
pub struct QLearner<R = StdRng> {
    table: QTable,
    algorithm: QLearning,
    policy: EpsilonGreedy<R>,
    hyperparameters: HyperparameterControl,
}

impl QLearner<StdRng> {
    /// Create a learner with an entropy-seeded policy
    pub fn new(grid: ActionGrid, hyperparameters: HyperparameterControl) -> Self {
        Self::with_policy(grid, hyperparameters, EpsilonGreedy::new())
    }

    /// Create a learner whose exploration is reproducible
    pub fn seeded(grid: ActionGrid, hyperparameters: HyperparameterControl, seed: u64) -> Self {
        Self::with_policy(grid, hyperparameters, EpsilonGreedy::seeded(seed))
    }
}

impl<R: Rng> QLearner<R> {
    pub fn with_policy(
        grid: ActionGrid,
        hyperparameters: HyperparameterControl,
        policy: EpsilonGreedy<R>,
    ) -> Self {
        info!(
            "Q-learner initialized with grid: {} ({} actions), {:?}",
            grid,
            grid.len(),
            hyperparameters.snapshot()
        );
        Self {
            table: QTable::new(grid),
            algorithm: QLearning::new(),
            policy,
            hyperparameters,
        }
    }

    /// Pick an action with the current epsilon
    pub fn select_action(&mut self, state: &State) -> Action {
        let epsilon = self.hyperparameters.snapshot().epsilon;
        self.policy.select_action(&self.table, state, epsilon)
    }

    /// Apply the TD update for the pending transition, if there is one
    pub fn update(&mut self, transition: Option<&Transition>) -> UpdateOutcome {
        let params = self.hyperparameters.snapshot();
        self.algorithm
            .update_pending(&mut self.table, transition, &params)
    }

    pub fn value(&self, state: &State, action: &Action) -> f64 {
        self.table.get(state, action)
    }

    pub fn max_value(&self, state: &State) -> f64 {
        self.table.max_value(state)
    }

    pub fn best_action(&self, state: &State) -> Action {
        self.table.best_action(state)
    }

    pub fn table(&self) -> &QTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut QTable {
        &mut self.table
    }

    /// Handle for reading and tuning alpha, gamma, and epsilon
    pub fn hyperparameters(&self) -> &HyperparameterControl {
        &self.hyperparameters
    }

    pub fn updates(&self) -> u64 {
        self.algorithm.updates()
    }

    /// Get algorithm parameters as JSON
    pub fn get_algorithm_params(&self) -> serde_json::Value {
        self.algorithm
            .get_params(&self.table, &self.hyperparameters.snapshot())
    }
}

/// What happened during one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TickOutcome {
    pub state: State,
    pub action: Action,
    pub reward: Reward,
    pub terminal: bool,
    pub update: UpdateOutcome,
    /// Set when this tick ended an episode
    pub episode: Option<EpisodeRecord>,
}

/// Per-agent driver of the observe / act / learn cycle
pub struct TrainingLoop<E> {
    env: E,
    tracker: EpisodeTracker,
    pending: Option<(State, Action)>,
    reset_requested: bool,
    observers: Vec<Box<dyn TrainingObserver + Send>>,
    run_id: Uuid,
    started_at: DateTime<Utc>,
}

impl<E: Environment> TrainingLoop<E> {
    pub fn new(env: E, scheme: RewardScheme) -> Self {
        let run_id = Uuid::new_v4();
        info!("Training run {} started", run_id);
        Self {
            env,
            tracker: EpisodeTracker::new(scheme),
            pending: None,
            reset_requested: false,
            observers: Vec::new(),
            run_id,
            started_at: Utc::now(),
        }
    }

    /// Register an observer notified on every step and episode end
    pub fn add_observer(&mut self, observer: Box<dyn TrainingObserver + Send>) {
        self.observers.push(observer);
    }

    /// Advance the simulation by one tick.
    ///
    /// Fails only if the environment is still terminal after being reset on
    /// the previous tick.
    pub fn tick<R: Rng>(&mut self, learner: &mut QLearner<R>) -> Result<TickOutcome> {
        if self.reset_requested {
            if self.env.is_terminal() {
                return Err(QBallError::EnvironmentDesync(format!(
                    "environment still terminal after reset (episode {})",
                    self.tracker.episodes()
                )));
            }
            self.reset_requested = false;
        }

        let observation = self.env.observe();
        let state = discretize_state(observation.position_delta, observation.orientation);

        let action = learner.select_action(&state);
        self.env.apply_action(action);

        let terminal = self.env.is_terminal();
        let reward = self.tracker.reward_for_tick(terminal);

        let mut episode = None;
        if terminal {
            let record = self
                .tracker
                .on_episode_end(self.tracker.accumulated_reward());
            debug!(
                "Episode {} finished, total reward: {:.2}",
                record.episode, record.total_reward
            );
            for observer in &mut self.observers {
                observer.on_episode_end(&record);
            }
            self.env.reset();
            self.reset_requested = true;
            episode = Some(record);
        }

        let transition = Transition::from_pending(self.pending, reward, state);
        let update = learner.update(transition.as_ref());

        self.tracker.on_step();
        let counters = self.tracker.counters();
        for observer in &mut self.observers {
            observer.on_step(counters);
        }

        self.pending = Some((state, action));

        Ok(TickOutcome {
            state,
            action,
            reward,
            terminal,
            update,
            episode,
        })
    }

    /// Tick until `episodes` more episodes complete or `max_ticks` ticks pass,
    /// whichever comes first. Returns the number of ticks run.
    pub fn run_episodes<R: Rng>(
        &mut self,
        learner: &mut QLearner<R>,
        episodes: u64,
        max_ticks: u64,
    ) -> Result<u64> {
        let target = self.tracker.episodes() + episodes;
        let mut ticks = 0;
        while self.tracker.episodes() < target && ticks < max_ticks {
            self.tick(learner)?;
            ticks += 1;
        }
        Ok(ticks)
    }

    pub fn counters(&self) -> EpisodeCounters {
        self.tracker.counters()
    }

    pub fn tracker(&self) -> &EpisodeTracker {
        &self.tracker
    }

    /// The (state, action) pair the next update will be applied to
    pub fn pending(&self) -> Option<(State, Action)> {
        self.pending
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn env_mut(&mut self) -> &mut E {
        &mut self.env
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Get statistics
    pub fn stats<R: Rng>(&self, learner: &QLearner<R>) -> EngineStats {
        let counters = self.tracker.counters();
        EngineStats {
            run_id: self.run_id,
            started_at: self.started_at,
            steps: counters.steps,
            episodes: counters.episodes,
            updates: learner.updates(),
            table_entries: learner.table().len(),
            states_tracked: learner.table().states_tracked(),
            last_episode_reward: self.tracker.last_episode().map(|r| r.total_reward),
            best_episode_reward: self.tracker.best_episode().map(|r| r.total_reward),
            action_grid: learner.table().grid(),
            hyperparameters: learner.hyperparameters().snapshot(),
        }
    }
}

/// Engine statistics
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub steps: u64,
    pub episodes: u64,
    pub updates: u64,
    pub table_entries: usize,
    pub states_tracked: usize,
    pub last_episode_reward: Option<f64>,
    pub best_episode_reward: Option<f64>,
    pub action_grid: ActionGrid,
    pub hyperparameters: Hyperparameters,
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::state::discretize_action;

    /// Replays a fixed list of (observation, terminal) ticks
    struct Scripted {
        ticks: VecDeque<(Observation, bool)>,
        current: (Observation, bool),
        applied: Vec<Action>,
        resets: usize,
        honor_reset: bool,
    }

    impl Scripted {
        fn new(ticks: Vec<(f64, bool)>) -> Self {
            let ticks: VecDeque<_> = ticks
                .into_iter()
                .map(|(x, t)| {
                    (
                        Observation {
                            position_delta: Vec2::new(x, 0.0),
                            orientation: Vec2::default(),
                        },
                        t,
                    )
                })
                .collect();
            Self {
                ticks,
                current: (Observation::default(), false),
                applied: Vec::new(),
                resets: 0,
                honor_reset: true,
            }
        }
    }

    impl Environment for Scripted {
        fn observe(&self) -> Observation {
            self.ticks.front().map_or(self.current.0, |t| t.0)
        }

        fn apply_action(&mut self, action: Action) {
            self.applied.push(action);
            if let Some(next) = self.ticks.pop_front() {
                self.current = next;
            }
        }

        fn is_terminal(&self) -> bool {
            self.current.1
        }

        fn reset(&mut self) {
            self.resets += 1;
            if self.honor_reset {
                self.current.1 = false;
            }
        }
    }

    fn learner(epsilon: f64) -> QLearner {
        let control =
            HyperparameterControl::new(Hyperparameters::new(0.5, 0.9, epsilon).unwrap()).unwrap();
        QLearner::seeded(ActionGrid::Symmetric, control, 11)
    }

    #[test]
    fn test_first_tick_skips_update() {
        let mut learner = learner(0.0);
        let mut training =
            TrainingLoop::new(Scripted::new(vec![(0.0, false)]), RewardScheme::default());

        let outcome = training.tick(&mut learner).unwrap();
        assert_eq!(outcome.update, UpdateOutcome::Skipped);
        assert!(learner.table().is_empty());
        assert_eq!(training.counters().steps, 1);
        assert_eq!(training.pending(), Some((outcome.state, outcome.action)));
    }

    #[test]
    fn test_second_tick_updates_previous_pair() {
        let mut learner = learner(0.0);
        let mut training = TrainingLoop::new(
            Scripted::new(vec![(0.0, false), (1.0, false)]),
            RewardScheme::default(),
        );

        let first = training.tick(&mut learner).unwrap();
        let second = training.tick(&mut learner).unwrap();

        assert!(second.update.is_applied());
        // Q(s0, a0) = 0 + 0.5 * (0.1 + 0.9 * 0 - 0)
        assert_eq!(learner.value(&first.state, &first.action), 0.05);
    }

    #[test]
    fn test_terminal_tick_ends_episode_and_resets() {
        let mut learner = learner(0.0);
        let mut training = TrainingLoop::new(
            Scripted::new(vec![(0.0, false), (0.0, false), (4.0, true), (0.0, false)]),
            RewardScheme::default(),
        );

        training.tick(&mut learner).unwrap();
        training.tick(&mut learner).unwrap();
        let terminal = training.tick(&mut learner).unwrap();

        assert!(terminal.terminal);
        assert_eq!(terminal.reward, -1.0);
        let record = terminal.episode.unwrap();
        assert_eq!(record.episode, 0);
        assert!((record.total_reward - 0.2).abs() < 1e-12);
        assert_eq!(training.tracker().accumulated_reward(), 0.0);
        assert_eq!(training.env().resets, 1);

        let next = training.tick(&mut learner).unwrap();
        assert!(!next.terminal);
        assert_eq!(training.counters().episodes, 1);
        assert_eq!(training.counters().steps, 4);
    }

    #[test]
    fn test_environment_desync_is_fatal() {
        let mut learner = learner(0.0);
        let mut env = Scripted::new(vec![(0.0, true), (0.0, false)]);
        env.honor_reset = false;
        let mut training = TrainingLoop::new(env, RewardScheme::default());

        let first = training.tick(&mut learner).unwrap();
        assert!(first.terminal);

        let err = training.tick(&mut learner).unwrap_err();
        assert!(matches!(err, QBallError::EnvironmentDesync(_)));
    }

    #[test]
    fn test_epsilon_change_applies_next_tick() {
        let mut learner = learner(1.0);
        let ui = learner.hyperparameters().clone();
        let state = discretize_state(Vec2::default(), Vec2::default());
        let best = discretize_action(0.55, 0.55);
        learner.table_mut().set(state, best, 5.0);

        ui.set(qball_core::Hyperparameter::Epsilon, 0.0).unwrap();
        assert_eq!(learner.select_action(&state), best);
    }

    struct Recorder(Arc<Mutex<Vec<EpisodeRecord>>>, Arc<Mutex<u64>>);

    impl TrainingObserver for Recorder {
        fn on_step(&mut self, counters: EpisodeCounters) {
            *self.1.lock().unwrap() = counters.steps;
        }

        fn on_episode_end(&mut self, record: &EpisodeRecord) {
            self.0.lock().unwrap().push(*record);
        }
    }

    #[test]
    fn test_observers_are_notified() {
        let episodes = Arc::new(Mutex::new(Vec::new()));
        let steps = Arc::new(Mutex::new(0));
        let mut learner = learner(0.0);
        let mut training = TrainingLoop::new(
            Scripted::new(vec![(0.0, false), (9.0, true), (0.0, true)]),
            RewardScheme::default(),
        );
        training.add_observer(Box::new(Recorder(episodes.clone(), steps.clone())));

        for _ in 0..3 {
            training.tick(&mut learner).unwrap();
        }

        assert_eq!(*steps.lock().unwrap(), 3);
        let episodes = episodes.lock().unwrap();
        assert_eq!(episodes.len(), 2);
        assert_eq!(episodes[1].episode, 1);
        assert_eq!(episodes[1].total_reward, 0.0);
    }

    #[test]
    fn test_stats() {
        let mut learner = learner(0.0);
        let mut training = TrainingLoop::new(
            Scripted::new(vec![(0.0, false), (5.0, true), (0.0, false)]),
            RewardScheme::default(),
        );
        training.run_episodes(&mut learner, 1, 100).unwrap();

        let stats = training.stats(&learner);
        assert_eq!(stats.steps, 2);
        assert_eq!(stats.episodes, 1);
        assert_eq!(stats.updates, 1);
        assert_eq!(stats.last_episode_reward, Some(0.1));
        assert_eq!(stats.action_grid, ActionGrid::Symmetric);
        assert_eq!(stats.run_id, training.run_id());

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["hyperparameters"]["alpha"], 0.5);
    }
}
