//! Episode bookkeeping: step/episode counters and per-episode reward

use serde::{Deserialize, Serialize};

use crate::state::Reward;

/// Fixed rewards handed out per tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RewardScheme {
    /// Reward for every tick that does not end the episode
    pub step_reward: Reward,
    /// Reward for the tick that ends the episode
    pub terminal_penalty: Reward,
}

impl Default for RewardScheme {
    fn default() -> Self {
        Self {
            step_reward: 0.1,
            terminal_penalty: -1.0,
        }
    }
}

/// Counters surfaced for display
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeCounters {
    pub steps: u64,
    pub episodes: u64,
}

/// Summary of one completed episode
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    /// Zero-based episode index
    pub episode: u64,
    pub total_reward: Reward,
}

/// Tracks counters and the running reward of the current episode.
///
/// The terminal penalty is returned as that tick's reward but is not added to
/// the running total, so an episode summary is the pre-terminal accumulation.
#[derive(Debug, Clone, Default)]
pub struct EpisodeTracker {
    scheme: RewardScheme,
    counters: EpisodeCounters,
    accumulated: Reward,
    last: Option<EpisodeRecord>,
    best: Option<EpisodeRecord>,
}

impl EpisodeTracker {
    pub fn new(scheme: RewardScheme) -> Self {
        Self {
            scheme,
            ..Self::default()
        }
    }

    pub fn scheme(&self) -> RewardScheme {
        self.scheme
    }

    /// Reward for the current tick. Non-terminal ticks also add to the
    /// running total.
    pub fn reward_for_tick(&mut self, terminal: bool) -> Reward {
        if terminal {
            self.scheme.terminal_penalty
        } else {
            self.accumulated += self.scheme.step_reward;
            self.scheme.step_reward
        }
    }

    /// Running reward of the current episode
    pub fn accumulated_reward(&self) -> Reward {
        self.accumulated
    }

    pub fn on_step(&mut self) {
        self.counters.steps += 1;
    }

    /// Close the current episode with the given total and start a new one
    pub fn on_episode_end(&mut self, total_reward: Reward) -> EpisodeRecord {
        let record = EpisodeRecord {
            episode: self.counters.episodes,
            total_reward,
        };
        self.counters.episodes += 1;
        self.accumulated = 0.0;
        self.last = Some(record);
        if self.best.map_or(true, |best| total_reward > best.total_reward) {
            self.best = Some(record);
        }
        record
    }

    pub fn counters(&self) -> EpisodeCounters {
        self.counters
    }

    pub fn steps(&self) -> u64 {
        self.counters.steps
    }

    pub fn episodes(&self) -> u64 {
        self.counters.episodes
    }

    pub fn last_episode(&self) -> Option<EpisodeRecord> {
        self.last
    }

    pub fn best_episode(&self) -> Option<EpisodeRecord> {
        self.best
    }
}
