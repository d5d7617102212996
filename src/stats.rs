//! Shared request statistics.
//!
//! Counters are plain atomics so workers never contend on them. Latency data
//! (running sum, extrema and the raw samples used for percentiles) sits behind
//! a single mutex that is held only long enough to append or copy.

use std::sync::atomic::{ AtomicU64, Ordering };
use std::sync::{ Mutex, MutexGuard, PoisonError };
use std::time::Duration;

/// Counter values read at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountSnapshot {
    pub total: u64,
    pub success: u64,
    pub failed: u64,
}

/// Nearest-rank latency percentiles over successful requests
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Percentiles {
    pub p50: Duration,
    pub p95: Duration,
    pub p99: Duration,
}

/// Average and extrema over successful requests (all zero when there are none)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LatencySummary {
    pub average: Duration,
    pub min: Duration,
    pub max: Duration,
}

#[derive(Debug)]
struct LatencyStore {
    total_duration: Duration,
    min: Duration,
    max: Duration,
    samples: Vec<Duration>, // completion order
}

impl Default for LatencyStore {
    fn default() -> Self {
        LatencyStore {
            total_duration: Duration::ZERO,
            min: Duration::MAX, // replaced by the first sample
            max: Duration::ZERO,
            samples: Vec::new(),
        }
    }
}

/// Aggregated outcome of every request in one test run.
///
/// One instance is shared (behind an `Arc`) between all request drivers, the
/// progress reporter and the final summary step.
#[derive(Debug, Default)]
pub struct LoadStats {
    total: AtomicU64,
    success: AtomicU64,
    failed: AtomicU64,
    latencies: Mutex<LatencyStore>,
}

impl LoadStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful request that took `duration`
    pub fn record_success(&self, duration: Duration) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.success.fetch_add(1, Ordering::Relaxed);

        let mut store = self.lock_latencies();
        store.total_duration += duration;
        store.min = store.min.min(duration);
        store.max = store.max.max(duration);
        store.samples.push(duration);
    }

    /// Record a failed request; failures carry no latency sample
    pub fn record_failure(&self) {
        self.total.fetch_add(1, Ordering::Relaxed);
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot_counts(&self) -> CountSnapshot {
        CountSnapshot {
            total: self.total.load(Ordering::Relaxed),
            success: self.success.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    /// p50/p95/p99 using the element at `floor(p * n)` of the sorted samples.
    ///
    /// The lock is held only while the samples are copied; sorting happens on
    /// the copy so writers are not held up by it.
    pub fn percentiles(&self) -> Percentiles {
        let mut sorted = self.lock_latencies().samples.clone();
        if sorted.is_empty() {
            return Percentiles::default();
        }
        sorted.sort_unstable();

        let rank = |p: f64| -> Duration {
            let idx = ((sorted.len() as f64) * p) as usize;
            sorted[idx.min(sorted.len() - 1)]
        };

        Percentiles {
            p50: rank(0.5),
            p95: rank(0.95),
            p99: rank(0.99),
        }
    }

    pub fn latency_summary(&self) -> LatencySummary {
        let store = self.lock_latencies();
        let count = store.samples.len() as u32;
        if count == 0 {
            return LatencySummary::default();
        }
        LatencySummary {
            average: store.total_duration / count,
            min: store.min,
            max: store.max,
        }
    }

    /// Number of latency samples currently stored
    pub fn sample_count(&self) -> usize {
        self.lock_latencies().samples.len()
    }

    // A panic while holding the lock cannot leave the store half-written
    // (every mutation is a single push or assignment), so poisoning is ignored.
    fn lock_latencies(&self) -> MutexGuard<'_, LatencyStore> {
        self.latencies.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    #[test]
    fn empty_stats_report_zeroes() {
        let stats = LoadStats::new();
        assert_eq!(stats.percentiles(), Percentiles::default());
        assert_eq!(stats.latency_summary(), LatencySummary::default());
        assert_eq!(stats.snapshot_counts(), CountSnapshot::default());
    }

    #[test]
    fn percentiles_use_floor_rank() {
        let stats = LoadStats::new();
        // insert out of order, percentiles must not depend on completion order
        for value in [70, 10, 100, 40, 20, 90, 30, 60, 50, 80] {
            stats.record_success(ms(value));
        }

        let p = stats.percentiles();
        assert_eq!(p.p50, ms(60));
        assert_eq!(p.p95, ms(100));
        assert_eq!(p.p99, ms(100));
    }

    #[test]
    fn percentiles_single_sample() {
        let stats = LoadStats::new();
        stats.record_success(ms(7));
        let p = stats.percentiles();
        assert_eq!((p.p50, p.p95, p.p99), (ms(7), ms(7), ms(7)));
    }

    #[test]
    fn percentiles_hundred_samples() {
        let stats = LoadStats::new();
        for value in 1..=100 {
            stats.record_success(ms(value));
        }
        let p = stats.percentiles();
        // indices 50, 95 and 99 of 1..=100
        assert_eq!(p.p50, ms(51));
        assert_eq!(p.p95, ms(96));
        assert_eq!(p.p99, ms(100));
    }

    #[test]
    fn reads_are_idempotent() {
        let stats = LoadStats::new();
        stats.record_success(ms(12));
        stats.record_success(ms(3));
        stats.record_failure();

        assert_eq!(stats.percentiles(), stats.percentiles());
        assert_eq!(stats.snapshot_counts(), stats.snapshot_counts());
        assert_eq!(stats.latency_summary(), stats.latency_summary());
    }

    #[test]
    fn latency_summary_tracks_successes_only() {
        let stats = LoadStats::new();
        stats.record_success(ms(10));
        stats.record_failure();
        stats.record_success(ms(30));
        stats.record_failure();

        let summary = stats.latency_summary();
        assert_eq!(summary.average, ms(20));
        assert_eq!(summary.min, ms(10));
        assert_eq!(summary.max, ms(30));

        let counts = stats.snapshot_counts();
        assert_eq!(counts, CountSnapshot { total: 4, success: 2, failed: 2 });
        assert_eq!(stats.sample_count(), 2);
    }

    #[test]
    fn concurrent_recording_loses_nothing() {
        const THREADS: u64 = 8;
        const PER_THREAD: u64 = 2_000;

        let stats = Arc::new(LoadStats::new());
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let stats = Arc::clone(&stats);
                thread::spawn(move || {
                    for i in 0..PER_THREAD {
                        if (i + t) % 3 == 0 {
                            stats.record_failure();
                        } else {
                            stats.record_success(Duration::from_micros(i + 1));
                        }
                        if i % 250 == 0 {
                            // readers interleaved with writers
                            let _ = stats.percentiles();
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let counts = stats.snapshot_counts();
        assert_eq!(counts.total, THREADS * PER_THREAD);
        assert_eq!(counts.total, counts.success + counts.failed);
        assert_eq!(stats.sample_count() as u64, counts.success);

        let expected_failed: u64 = (0..THREADS)
            .map(|t| (0..PER_THREAD).filter(|i| (i + t) % 3 == 0).count() as u64)
            .sum();
        assert_eq!(counts.failed, expected_failed);
    }
}
