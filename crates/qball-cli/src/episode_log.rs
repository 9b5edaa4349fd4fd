//! Append-only CSV log of completed episodes
//!
//! Each run writes to a fresh `<stem>_<n>.csv`, where `n` is the first unused
//! suffix starting at 0. Records are handed to a background writer so the
//! tick loop never waits on the disk. The writer is non-lossy: on a normal
//! shutdown every record is flushed when the log is dropped; if the process is
//! killed, at most `buffered_lines_limit` records still queued are lost.

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::warn;
use tracing_appender::non_blocking::{NonBlocking, NonBlockingBuilder, WorkerGuard};

use qball_rl::{EpisodeRecord, TrainingObserver};

pub const HEADER: &str = "Episode,Total Reward";

/// Format one record as a CSV line (without the newline).
///
/// Rewards are rounded to six decimals so accumulated float noise does not
/// leak into the file, and always carry a decimal point (`-1.0`, not `-1`).
pub fn format_record(record: &EpisodeRecord) -> String {
    let rounded = (record.total_reward * 1e6).round() / 1e6;
    // Avoid printing "-0.0"
    let rounded = if rounded == 0.0 { 0.0 } else { rounded };
    format!("{},{:?}", record.episode, rounded)
}

/// Create `<dir>/<stem>_<n>.csv` for the first `n` that does not exist yet.
/// Creation uses `create_new`, so a file appearing concurrently is skipped
/// rather than overwritten.
pub fn create_next_log_file(dir: &Path, stem: &str) -> Result<(PathBuf, File)> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory {}", dir.display()))?;

    for n in 0u32.. {
        let path = dir.join(format!("{stem}_{n}.csv"));
        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to create {}", path.display()))
            }
        }
    }

    anyhow::bail!("No free log file name for stem '{stem}' in {}", dir.display())
}

/// Episode log writer; an observer of the training loop
pub struct EpisodeLog {
    path: PathBuf,
    writer: NonBlocking,
    _guard: WorkerGuard,
}

impl EpisodeLog {
    /// Open a fresh log file in `dir` and write the header
    pub fn create(dir: &Path, stem: &str, buffered_lines_limit: usize) -> Result<Self> {
        let (path, file) = create_next_log_file(dir, stem)?;

        let (writer, guard) = NonBlockingBuilder::default()
            .lossy(false)
            .buffered_lines_limit(buffered_lines_limit.max(1))
            .thread_name("qball-episode-log")
            .finish(file);

        let mut log = Self {
            path,
            writer,
            _guard: guard,
        };
        log.write_line(HEADER)?;
        Ok(log)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, record: &EpisodeRecord) -> Result<()> {
        self.write_line(&format_record(record))
    }

    fn write_line(&mut self, line: &str) -> Result<()> {
        // One write call per line keeps each record in a single queued message
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');
        self.writer
            .write_all(buf.as_bytes())
            .with_context(|| format!("Failed to queue write to {}", self.path.display()))
    }
}

impl TrainingObserver for EpisodeLog {
    fn on_episode_end(&mut self, record: &EpisodeRecord) {
        if let Err(e) = self.append(record) {
            warn!("Episode {} not logged: {:#}", record.episode, e);
        }
    }
}
