use crate::config::Config;
use crate::driver::RequestDriver;
use crate::error::{ LoadTestError, Result };
use crate::pacer::Pacer;
use crate::readiness::{ ReadinessGate, HEALTH_REQUEST_TIMEOUT };
use crate::report::{ format_duration, TestSummary };
use crate::reporter::{ ProgressLog, ProgressReporter, PROGRESS_INTERVAL };
use crate::stats::LoadStats;

use std::sync::Arc;
use std::time::Duration;
use isahc::{ HttpClient, HttpClientBuilder, config::Configurable };
use tokio::runtime::{ Builder, Runtime };
use tokio::time::{ sleep, Instant };
use tokio_util::sync::CancellationToken;
use tracing::{ info, warn };

/// Owns everything one test run shares: configuration, HTTP clients, the
/// stats aggregate and the progress log.
#[derive(Debug, Clone)]
pub struct Runner {
    config: Config,
    stats: Arc<LoadStats>,
    progress: Arc<ProgressLog>,
    client: HttpClient, // load requests
    health_client: HttpClient, // readiness probes
    shutdown: CancellationToken,
    progress_interval: Duration,
    health_poll_interval: Option<Duration>,
}

impl Runner {
    /*------------------==| Public Functions |==-------------------------*/
    /// Create a new Runner instance; opens the progress log under the results directory
    pub fn new(config: Config) -> Result<Self> {
        let client = HttpClientBuilder::new().timeout(config.request_timeout).build()?;
        let health_client = HttpClientBuilder::new().timeout(HEALTH_REQUEST_TIMEOUT).build()?;
        let progress = Arc::new(ProgressLog::open(&config.progress_file()));

        Ok(Self {
            config,
            stats: Arc::new(LoadStats::new()),
            progress,
            client,
            health_client,
            shutdown: CancellationToken::new(),
            progress_interval: PROGRESS_INTERVAL,
            health_poll_interval: None,
        })
    }

    /// Override the one second progress cadence
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// Override the one second readiness poll cadence
    pub fn with_health_poll_interval(mut self, interval: Duration) -> Self {
        self.health_poll_interval = Some(interval);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn stats(&self) -> Arc<LoadStats> {
        Arc::clone(&self.stats)
    }

    /// Cancelling this token ends the run early (e.g. on Ctrl+C); the summary
    /// is still produced if the load phase had started
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Main entry point: wait for readiness, drive load, write the summary
    pub async fn run(&self) -> Result<TestSummary> {
        self.log_start();

        let gate = self.readiness_gate();
        tokio::select! {
            result = gate.wait() => {
                if let Err(err) = result {
                    self.progress.write_line(&format!("Service health check failed: {}", err));
                    return Err(err);
                }
            }
            _ = self.shutdown.cancelled() => {
                warn!("shutdown requested while waiting for the service");
                return Err(LoadTestError::Interrupted);
            }
        }

        let elapsed = self.run_load_phase().await;
        self.progress.write_line("=== Load Test Completed ===");

        let summary = TestSummary::from_stats(&self.stats, &self.config, elapsed);
        summary.print();
        self.save_summary(&summary);
        println!("Progress log saved to: {}", self.config.progress_file().display());

        Ok(summary)
    }

    /// Spawn the workers and the reporter, stop them after the configured
    /// duration (or on shutdown) and wait until every one has exited.
    /// Returns the wall clock time of the phase.
    pub async fn run_load_phase(&self) -> Duration {
        let phase = self.shutdown.child_token();
        let pacer = Arc::new(Pacer::new(self.config.requests_per_second));
        let start = Instant::now();

        let mut handles = Vec::with_capacity(self.config.workers + 1);
        for id in 1..=self.config.workers {
            let driver = RequestDriver::new(
                id,
                self.client.clone(),
                self.config.target_url.clone(),
                Arc::clone(&self.stats)
            );
            handles.push(tokio::spawn(driver.run(Arc::clone(&pacer), phase.clone())));
        }

        let reporter = ProgressReporter::new(Arc::clone(&self.stats), Arc::clone(&self.progress))
            .with_interval(self.progress_interval);
        handles.push(tokio::spawn(reporter.run(phase.clone())));

        tokio::select! {
            _ = sleep(self.config.test_duration) => {}
            _ = phase.cancelled() => {
                info!(elapsed = ?start.elapsed(), "shutdown requested, stopping load early");
            }
        }

        // stop workers and reporter, then drain in-flight requests
        phase.cancel();
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "load task ended abnormally");
            }
        }

        start.elapsed()
    }

    /// Helper function to create the multi-threaded tokio runtime
    pub fn build_runtime() -> Result<Runtime> {
        Ok(Builder::new_multi_thread().enable_all().build()?)
    }

    /*-------------------==| Private/Helpers |==----------------------- */
    fn readiness_gate(&self) -> ReadinessGate {
        let gate = ReadinessGate::new(
            self.health_client.clone(),
            self.config.health_url.clone(),
            self.config.health_timeout,
            Arc::clone(&self.progress)
        );
        match self.health_poll_interval {
            Some(interval) => gate.with_poll_interval(interval),
            None => gate,
        }
    }

    fn log_start(&self) {
        let config = &self.config;
        self.progress.write_line("=== Load Test Started ===");
        self.progress.write_line(&format!("Target: {}", config.target_url));
        self.progress.write_line(&format!("Rate: {} requests per second", config.requests_per_second));
        self.progress.write_line(&format!("Duration: {}", format_duration(config.test_duration)));

        println!("Starting load test:");
        println!("  Target: {}", config.target_url);
        println!("  Rate: {} requests per second", config.requests_per_second);
        println!("  Duration: {}", format_duration(config.test_duration));
        println!("  Workers: {}", config.workers);
        println!("Progress updates every {}:", format_duration(self.progress_interval));
        println!(
            "Format: [Time] Req: total | OK: success | ERR: failed | P50: 50th percentile | P95: 95th percentile | P99: 99th percentile"
        );
    }

    // write failures are reported but never fail the run
    fn save_summary(&self, summary: &TestSummary) {
        for path in [self.config.summary_file(), self.config.results_file()] {
            match summary.write_json(&path) {
                Ok(()) => println!("Summary saved to: {}", path.display()),
                Err(err) => warn!(path = %path.display(), error = %err, "failed to save summary"),
            }
        }
    }
}
