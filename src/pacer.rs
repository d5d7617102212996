use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{ interval_at, Instant, Interval, MissedTickBehavior };

/// Fixed-rate tick source shared by every request driver.
///
/// Each call to [`Pacer::tick`] consumes exactly one tick, so N workers
/// sharing a pacer still issue at most one request per tick between them.
#[derive(Debug)]
pub struct Pacer {
    period: Duration,
    interval: Mutex<Interval>,
}

impl Pacer {
    /// Pacer issuing `requests_per_second` ticks per second (must be > 0)
    pub fn new(requests_per_second: u32) -> Self {
        Self::with_period(Duration::from_secs(1) / requests_per_second.max(1))
    }

    /// Pacer ticking once every `period`; the first tick is one period from now
    pub fn with_period(period: Duration) -> Self {
        let period = period.max(Duration::from_nanos(1));
        let mut interval = interval_at(Instant::now() + period, period);
        // a slow request drops the ticks it overran instead of bursting afterwards
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        Self {
            period,
            interval: Mutex::new(interval),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Wait for the next tick. Cancel-safe: dropping the future before it
    /// completes does not consume a tick.
    pub async fn tick(&self) -> Instant {
        self.interval.lock().await.tick().await
    }
}
