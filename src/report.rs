use crate::config::Config;
use crate::error::Result;
use crate::stats::LoadStats;

use std::fs;
use std::path::Path;
use std::time::Duration;
use chrono::{ SecondsFormat, Utc };
use serde::{ Serialize, Serializer };

/// Copy of the run configuration embedded in the summary
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestConfigRecord {
    pub target_url: String,
    pub health_url: String,
    pub service: String,
    pub test_number: String,
}

/// Final result of one load test, written as JSON
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestSummary {
    pub total_requests: u64,
    pub success_requests: u64,
    pub failed_requests: u64,
    pub success_rate: f64, // percent

    #[serde(serialize_with = "as_duration_string")]
    pub average_duration: Duration,
    #[serde(serialize_with = "as_duration_string")]
    pub min_duration: Duration,
    #[serde(serialize_with = "as_duration_string")]
    pub max_duration: Duration,
    #[serde(rename = "p50_duration", serialize_with = "as_duration_string")]
    pub p50: Duration,
    #[serde(rename = "p95_duration", serialize_with = "as_duration_string")]
    pub p95: Duration,
    #[serde(rename = "p99_duration", serialize_with = "as_duration_string")]
    pub p99: Duration,

    #[serde(serialize_with = "as_duration_string")]
    pub test_duration: Duration, // wall clock of the load phase
    pub requests_per_second: u32, // configured rate
    pub actual_requests_per_second: f64,
    pub timestamp: String,
    pub test_config: TestConfigRecord,
}

impl TestSummary {
    /// Build the summary from the final stats. Call only after every worker
    /// has stopped so nothing is still being recorded.
    pub fn from_stats(stats: &LoadStats, config: &Config, elapsed: Duration) -> Self {
        let counts = stats.snapshot_counts();
        let latency = stats.latency_summary();
        let percentiles = stats.percentiles();

        let success_rate = if counts.total > 0 {
            (counts.success as f64) / (counts.total as f64) * 100.0
        } else {
            0.0
        };
        let actual_requests_per_second = if elapsed.is_zero() {
            0.0
        } else {
            (counts.total as f64) / elapsed.as_secs_f64()
        };

        TestSummary {
            total_requests: counts.total,
            success_requests: counts.success,
            failed_requests: counts.failed,
            success_rate,
            average_duration: latency.average,
            min_duration: latency.min,
            max_duration: latency.max,
            p50: percentiles.p50,
            p95: percentiles.p95,
            p99: percentiles.p99,
            test_duration: elapsed,
            requests_per_second: config.requests_per_second,
            actual_requests_per_second,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            test_config: TestConfigRecord {
                target_url: config.target_url.clone(),
                health_url: config.health_url.clone(),
                service: config.service.clone(),
                test_number: config.test_number.clone(),
            },
        }
    }

    /// Human readable summary, as printed at the end of a run
    pub fn render(&self) -> String {
        let mut text = String::from("\n=== Load Test Summary ===\n");
        text += &format!("Total requests: {}\n", self.total_requests);
        text += &format!("Successful: {}\n", self.success_requests);
        text += &format!("Failed: {}\n", self.failed_requests);

        if self.success_requests > 0 {
            text += &format!("Average response time: {}\n", format_duration(self.average_duration));
            text += &format!("Min response time: {}\n", format_duration(self.min_duration));
            text += &format!("Max response time: {}\n", format_duration(self.max_duration));
            text += &format!("50th percentile: {}\n", format_duration(self.p50));
            text += &format!("95th percentile: {}\n", format_duration(self.p95));
            text += &format!("99th percentile: {}\n", format_duration(self.p99));
        }
        text += &format!("Success rate: {:.2}%\n", self.success_rate);
        text += &format!(
            "Requests/sec: {:.2} (target {})\n",
            self.actual_requests_per_second,
            self.requests_per_second
        );
        text += &format!("Test duration: {}\n", format_duration(self.test_duration));
        text
    }

    pub fn print(&self) {
        print!("{}", self.render());
    }

    /// Write pretty-printed JSON to `path`, creating parent directories
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

fn as_duration_string<S: Serializer>(value: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_duration(*value))
}

/// Compact duration string: `0s`, `750ns`, `1.5µs`, `5ms`, `2.25s`, `1m30s`, `1h0m5s`
pub fn format_duration(value: Duration) -> String {
    let nanos = value.as_nanos();
    if nanos == 0 {
        return "0s".to_string();
    }
    if nanos < 1_000 {
        return format!("{}ns", nanos);
    }
    if nanos < 1_000_000 {
        return format!("{}µs", decimal(nanos, 1_000, 3));
    }
    if nanos < 1_000_000_000 {
        return format!("{}ms", decimal(nanos, 1_000_000, 6));
    }

    let secs = value.as_secs();
    let (hours, minutes, seconds) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let seconds = decimal(
        (seconds as u128) * 1_000_000_000 + (value.subsec_nanos() as u128),
        1_000_000_000,
        9
    );

    if hours > 0 {
        format!("{}h{}m{}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}

// `value / unit` with the remainder as a fraction, trailing zeros trimmed
fn decimal(value: u128, unit: u128, digits: usize) -> String {
    let (whole, fraction) = (value / unit, value % unit);
    if fraction == 0 {
        return whole.to_string();
    }
    let fraction = format!("{:0width$}", fraction, width = digits);
    format!("{}.{}", whole, fraction.trim_end_matches('0'))
}
