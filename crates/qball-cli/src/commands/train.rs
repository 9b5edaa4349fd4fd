//! Training command: runs the ball-balancing simulation with a Q-learner

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tracing::{info, warn};

use qball_core::HyperparameterControl;
use qball_rl::{
    ActionGrid, EngineStats, Environment, EpisodeRecord, QLearner, TrainingLoop, TrainingObserver,
};

use crate::config::{Config, SimulationConfig};
use crate::episode_log::EpisodeLog;
use crate::sim::BallPlatform;

#[derive(Args, Debug, Default)]
pub struct TrainArgs {
    /// Learning rate in [0, 1]
    #[arg(long)]
    pub alpha: Option<f64>,

    /// Discount factor in [0, 1]
    #[arg(long)]
    pub gamma: Option<f64>,

    /// Exploration probability in [0, 1]
    #[arg(long)]
    pub epsilon: Option<f64>,

    /// Stop after this many episodes
    #[arg(long)]
    pub episodes: Option<u64>,

    /// Stop after this many simulation steps
    #[arg(long)]
    pub steps: Option<u64>,

    /// Simulation speed multiplier (0 = unthrottled)
    #[arg(long)]
    pub speed: Option<f64>,

    /// Seed for exploration and environment resets
    #[arg(long)]
    pub seed: Option<u64>,

    /// Action grid scanned for greedy choices (symmetric or reference)
    #[arg(long)]
    pub grid: Option<ActionGrid>,

    /// Directory for the episode CSV log
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    /// Do not write an episode log
    #[arg(long)]
    pub no_log: bool,

    /// Print final statistics as JSON
    #[arg(long)]
    pub json: bool,

    /// Log a progress summary every N episodes
    #[arg(long, default_value_t = 100)]
    pub report_every: u64,
}

impl TrainArgs {
    /// Overlay command-line values on the loaded configuration
    pub fn apply(&self, config: &mut Config) {
        if let Some(alpha) = self.alpha {
            config.learning.alpha = alpha;
        }
        if let Some(gamma) = self.gamma {
            config.learning.gamma = gamma;
        }
        if let Some(epsilon) = self.epsilon {
            config.learning.epsilon = epsilon;
        }
        if let Some(grid) = self.grid {
            config.learning.action_grid = grid;
        }
        if self.episodes.is_some() {
            config.simulation.max_episodes = self.episodes;
        }
        if self.steps.is_some() {
            config.simulation.max_steps = self.steps;
        }
        if let Some(speed) = self.speed {
            config.simulation.speed = speed;
        }
        if self.seed.is_some() {
            config.simulation.seed = self.seed;
        }
        if let Some(dir) = &self.output_dir {
            config.output.directory.clone_from(dir);
        }
        if self.no_log {
            config.output.enabled = false;
        }
    }
}

/// Why a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EpisodeLimit,
    StepLimit,
    Interrupted,
}

pub async fn run(args: TrainArgs, mut config: Config) -> Result<()> {
    args.apply(&mut config);
    let (stats, reason) = execute(&config, args.report_every).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Training stopped ({reason:?})");
        println!("  Run:        {}", stats.run_id);
        println!("  Steps:      {}", stats.steps);
        println!("  Episodes:   {}", stats.episodes);
        println!("  Q entries:  {}", stats.table_entries);
        if let Some(best) = stats.best_episode_reward {
            println!("  Best total: {best:.2}");
        }
    }
    Ok(())
}

/// Run training with the given configuration until a limit or Ctrl-C
pub async fn execute(config: &Config, report_every: u64) -> Result<(EngineStats, StopReason)> {
    config.validate()?;

    let control = HyperparameterControl::new(config.learning.hyperparameters())?;
    control.set_speed(config.simulation.speed)?;

    let grid = config.learning.action_grid;
    let seed = config.simulation.seed;
    let mut learner = match seed {
        Some(seed) => QLearner::seeded(grid, control.clone(), seed),
        None => QLearner::new(grid, control.clone()),
    };

    let env = BallPlatform::new(
        config.simulation.tick_rate_hz,
        seed.map(|s| s.wrapping_add(1)),
    );
    let mut training = TrainingLoop::new(env, config.learning.reward_scheme());

    if config.output.enabled {
        let log = EpisodeLog::create(
            &config.output.directory,
            &config.output.file_stem,
            config.output.buffered_lines_limit,
        )
        .context("Failed to open episode log")?;
        info!("Writing episode log to {}", log.path().display());
        training.add_observer(Box::new(log));
    }
    if report_every > 0 {
        training.add_observer(Box::new(ProgressReporter::new(report_every)));
    }

    let reason = drive(&mut training, &mut learner, &control, &config.simulation).await?;
    let stats = training.stats(&learner);
    info!(
        "Run {} finished after {} steps and {} episodes ({:?})",
        stats.run_id, stats.steps, stats.episodes, reason
    );
    // The episode log flushes when `training` is dropped on return
    Ok((stats, reason))
}

async fn drive<E: Environment>(
    training: &mut TrainingLoop<E>,
    learner: &mut QLearner,
    control: &HyperparameterControl,
    sim: &SimulationConfig,
) -> Result<StopReason> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut pacer = Pacer::new(sim.tick_rate_hz);

    loop {
        let counters = training.counters();
        if sim.max_episodes.is_some_and(|max| counters.episodes >= max) {
            return Ok(StopReason::EpisodeLimit);
        }
        if sim.max_steps.is_some_and(|max| counters.steps >= max) {
            return Ok(StopReason::StepLimit);
        }

        tokio::select! {
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                info!("Interrupted, stopping training");
                return Ok(StopReason::Interrupted);
            }
            () = pacer.wait(control.speed()) => {}
        }

        training.tick(learner)?;
    }
}

/// Longest wait between two ticks, however slow the configured pace
const MAX_TICK_PERIOD: Duration = Duration::from_secs(3600);

/// Time between ticks at `tick_rate_hz * speed`; `None` runs unthrottled.
///
/// Periods below one nanosecond run unthrottled and periods too long for a
/// `Duration` are capped at [`MAX_TICK_PERIOD`].
fn tick_period(tick_rate_hz: f64, speed: f64) -> Option<Duration> {
    if speed <= 0.0 {
        return None;
    }
    match Duration::try_from_secs_f64(1.0 / (tick_rate_hz * speed)) {
        Ok(period) if period.is_zero() => None,
        Ok(period) => Some(period.min(MAX_TICK_PERIOD)),
        Err(_) => Some(MAX_TICK_PERIOD),
    }
}

/// Paces ticks at `tick_rate_hz * speed`, rebuilding the timer when the
/// speed multiplier changes
struct Pacer {
    tick_rate_hz: f64,
    speed: f64,
    interval: Option<Interval>,
}

impl Pacer {
    fn new(tick_rate_hz: f64) -> Self {
        Self {
            tick_rate_hz,
            speed: f64::NAN,
            interval: None,
        }
    }

    async fn wait(&mut self, speed: f64) {
        if speed != self.speed {
            self.speed = speed;
            self.interval = tick_period(self.tick_rate_hz, speed).map(|period| {
                let mut interval = interval(period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                interval
            });
        }

        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => tokio::task::yield_now().await,
        }
    }
}

/// Logs a summary of recent episodes
struct ProgressReporter {
    every: u64,
    window_total: f64,
    window_len: u64,
}

impl ProgressReporter {
    fn new(every: u64) -> Self {
        Self {
            every,
            window_total: 0.0,
            window_len: 0,
        }
    }
}

impl TrainingObserver for ProgressReporter {
    fn on_episode_end(&mut self, record: &EpisodeRecord) {
        self.window_total += record.total_reward;
        self.window_len += 1;
        if self.window_len >= self.every {
            info!(
                "Episode {}: average total reward {:.3} over last {}",
                record.episode,
                self.window_total / self.window_len as f64,
                self.window_len
            );
            self.window_total = 0.0;
            self.window_len = 0;
        }
    }
}
