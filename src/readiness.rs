use crate::error::{ LoadTestError, Result };
use crate::reporter::ProgressLog;

use std::sync::Arc;
use std::time::Duration;
use isahc::{ AsyncReadResponseExt, HttpClient };
use isahc::http::StatusCode;
use tokio::time::{ sleep, Instant };
use tracing::{ info, warn };

pub const HEALTH_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);
pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Polls a health endpoint until it answers 200 or the timeout elapses.
///
/// Network errors and non-200 statuses mean "not ready yet" and are only
/// logged; the gate fails solely on timeout.
#[derive(Debug, Clone)]
pub struct ReadinessGate {
    client: HttpClient,
    health_url: String,
    timeout: Duration,
    poll_interval: Duration,
    log: Arc<ProgressLog>,
}

impl ReadinessGate {
    /// `client` should carry a short per-request timeout ([`HEALTH_REQUEST_TIMEOUT`])
    pub fn new(client: HttpClient, health_url: String, timeout: Duration, log: Arc<ProgressLog>) -> Self {
        Self {
            client,
            health_url,
            timeout,
            poll_interval: HEALTH_POLL_INTERVAL,
            log,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Block until healthy; returns the time spent waiting
    pub async fn wait(&self) -> Result<Duration> {
        self.emit_info(&format!("Waiting for service to be available at {}...", self.health_url));
        let start = Instant::now();

        loop {
            let elapsed = start.elapsed();
            if self.probe(elapsed).await {
                self.emit_info("Service is now available and healthy!");
                return Ok(start.elapsed());
            }

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                let message = format!("service health check timeout after {:?}", self.timeout);
                warn!(health_url = %self.health_url, ?elapsed, "{}", message);
                self.log.write_line(&message);
                return Err(LoadTestError::HealthCheckTimeout { elapsed });
            }

            // never sleep past the deadline, the final probe happens right at it
            sleep(self.poll_interval.min(self.timeout - elapsed)).await;
        }
    }

    /// One GET against the health URL; true on HTTP 200
    async fn probe(&self, elapsed: Duration) -> bool {
        let secs = elapsed.as_secs();
        match self.client.get_async(self.health_url.as_str()).await {
            Ok(mut response) => {
                let status = response.status();
                let _ = response.consume().await;
                if status == StatusCode::OK {
                    self.emit_info(&format!("Time: {}s - OK (HTTP {})", secs, status.as_u16()));
                    true
                } else {
                    self.emit_warn(&format!("Time: {}s - FAILED (HTTP {})", secs, status.as_u16()));
                    false
                }
            }
            Err(err) => {
                self.emit_warn(&format!("Time: {}s - FAILED: {}", secs, err));
                false
            }
        }
    }

    fn emit_info(&self, line: &str) {
        info!("{}", line);
        self.log.write_line(line);
    }

    fn emit_warn(&self, line: &str) {
        warn!("{}", line);
        self.log.write_line(line);
    }
}
