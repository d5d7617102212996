use crate::report::format_duration;
use crate::stats::LoadStats;

use std::fs::{ self, File, OpenOptions };
use std::io::Write;
use std::path::Path;
use std::sync::{ Arc, Mutex, PoisonError };
use std::time::Duration;
use chrono::Local;
use tokio::time::{ interval_at, Instant, MissedTickBehavior };
use tokio_util::sync::CancellationToken;
use tracing::warn;

pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Append-only progress log with millisecond timestamps.
///
/// A log that failed to open (or was created with [`ProgressLog::disabled`])
/// silently drops lines; write failures are logged and never abort the run.
#[derive(Debug, Default)]
pub struct ProgressLog {
    file: Mutex<Option<File>>,
}

impl ProgressLog {
    /// Open `path` for appending, creating parent directories as needed
    pub fn open(path: &Path) -> Self {
        if let Some(parent) = path.parent() {
            if let Err(err) = fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %err, "failed to create progress log directory");
            }
        }

        let file = match OpenOptions::new().create(true).append(true).open(path) {
            Ok(file) => Some(file),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to open progress file");
                None
            }
        };

        Self { file: Mutex::new(file) }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.file.lock().unwrap_or_else(PoisonError::into_inner).is_some()
    }

    /// Append `[YYYY-MM-DD HH:MM:SS.mmm] line` and flush it to disk
    pub fn write_line(&self, line: &str) {
        let mut guard = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(file) = guard.as_mut() else {
            return;
        };

        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let result = writeln!(file, "[{}] {}", timestamp, line).and_then(|_| file.sync_data());
        if let Err(err) = result {
            warn!(error = %err, "failed to write progress line");
        }
    }
}

/// Periodically prints a status line built from the shared stats
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    stats: Arc<LoadStats>,
    log: Arc<ProgressLog>,
    interval: Duration,
}

impl ProgressReporter {
    pub fn new(stats: Arc<LoadStats>, log: Arc<ProgressLog>) -> Self {
        Self { stats, log, interval: PROGRESS_INTERVAL }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Emit one line per interval until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => self.report_once(),
            }
        }
    }

    pub fn report_once(&self) {
        let line = self.progress_line();
        println!("[{}] {}", Local::now().format("%H:%M:%S%.3f"), line);
        self.log.write_line(&line);
    }

    /// `Req: N | OK: N | ERR: N`, plus percentiles once anything succeeded
    pub fn progress_line(&self) -> String {
        let counts = self.stats.snapshot_counts();
        if counts.success == 0 {
            return format!("Req: {} | OK: {} | ERR: {}", counts.total, counts.success, counts.failed);
        }

        let p = self.stats.percentiles();
        format!(
            "Req: {} | OK: {} | ERR: {} | P50: {} | P95: {} | P99: {}",
            counts.total,
            counts.success,
            counts.failed,
            format_duration(p.p50),
            format_duration(p.p95),
            format_duration(p.p99)
        )
    }
}
