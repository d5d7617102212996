//! Run configuration sourced from environment variables.
//!
//! | Variable              | Default                                 | Rejected when            |
//! |-----------------------|-----------------------------------------|--------------------------|
//! | `TARGET_URL`          | `http://envoy:8090/api/crypto/encrypt`  | not an absolute URL      |
//! | `HEALTH_URL`          | `http://envoy:8090/api/crypto/health`   | not an absolute URL      |
//! | `REQUESTS_PER_SECOND` | `20`                                    | not an integer > 0       |
//! | `TEST_DURATION`       | `10m`                                   | not a duration > 0       |
//! | `HEALTH_TIMEOUT`      | `5m`                                    | not a duration > 0       |
//! | `REQUEST_TIMEOUT`     | `5s`                                    | not a duration > 0       |
//! | `WORKERS`             | `1`                                     | not an integer > 0       |
//! | `RESULTS_BASE_PATH`   | `/results`                              | never                    |
//! | `TEST_NUMBER_ENV`     | `1`                                     | never                    |
//! | `SERVICE`             | `unknown-service`                       | never                    |
//!
//! Unset or empty variables take the default. Rejected values also take the
//! default and log a warning; loading never fails.

use crate::error::ConfigError;

use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;
use url::Url;

const DEFAULT_TARGET_URL: &str = "http://envoy:8090/api/crypto/encrypt";
const DEFAULT_HEALTH_URL: &str = "http://envoy:8090/api/crypto/health";

pub const PROGRESS_FILE: &str = "load_test_progress.log";
pub const SUMMARY_FILE: &str = "load_test_summary.json";
pub const RESULTS_FILE: &str = "load_test_results.json";

/// Validated settings for one load test run
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub target_url: String,
    pub health_url: String,
    pub requests_per_second: u32,
    pub test_duration: Duration,
    pub health_timeout: Duration,
    pub request_timeout: Duration, // whole request/response cycle of one load request
    pub workers: usize,

    pub results_base_path: PathBuf,
    pub test_number: String,
    pub service: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            target_url: DEFAULT_TARGET_URL.to_string(),
            health_url: DEFAULT_HEALTH_URL.to_string(),
            requests_per_second: 20,
            test_duration: Duration::from_secs(10 * 60),
            health_timeout: Duration::from_secs(5 * 60),
            request_timeout: Duration::from_secs(5),
            workers: 1,
            results_base_path: PathBuf::from("/results"),
            test_number: "1".to_string(),
            service: "unknown-service".to_string(),
        }
    }
}

impl Config {
    /*-------------------- Public Functions -------------------*/
    pub fn from_env() -> Config {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load from any key/value source; `lookup` returns `None` for unset keys
    pub fn from_lookup<F>(lookup: F) -> Config where F: Fn(&str) -> Option<String> {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());

        Config {
            target_url: Self::resolve(get("TARGET_URL"), "TARGET_URL", parse_url, defaults.target_url),
            health_url: Self::resolve(get("HEALTH_URL"), "HEALTH_URL", parse_url, defaults.health_url),
            requests_per_second: Self::resolve(
                get("REQUESTS_PER_SECOND"),
                "REQUESTS_PER_SECOND",
                parse_positive::<u32>,
                defaults.requests_per_second
            ),
            test_duration: Self::resolve(
                get("TEST_DURATION"),
                "TEST_DURATION",
                parse_positive_duration,
                defaults.test_duration
            ),
            health_timeout: Self::resolve(
                get("HEALTH_TIMEOUT"),
                "HEALTH_TIMEOUT",
                parse_positive_duration,
                defaults.health_timeout
            ),
            request_timeout: Self::resolve(
                get("REQUEST_TIMEOUT"),
                "REQUEST_TIMEOUT",
                parse_positive_duration,
                defaults.request_timeout
            ),
            workers: Self::resolve(get("WORKERS"), "WORKERS", parse_positive::<usize>, defaults.workers),
            results_base_path: get("RESULTS_BASE_PATH").map(PathBuf::from).unwrap_or(defaults.results_base_path),
            test_number: get("TEST_NUMBER_ENV").unwrap_or(defaults.test_number),
            service: get("SERVICE").unwrap_or(defaults.service),
        }
    }

    /// `<base>/test_<number>/<service>`
    pub fn results_dir(&self) -> PathBuf {
        self.results_base_path.join(format!("test_{}", self.test_number)).join(&self.service)
    }

    pub fn progress_file(&self) -> PathBuf {
        self.results_dir().join(PROGRESS_FILE)
    }

    pub fn summary_file(&self) -> PathBuf {
        self.results_dir().join(SUMMARY_FILE)
    }

    /// Duplicate of the summary kept for tools that read the older file name
    pub fn results_file(&self) -> PathBuf {
        self.results_dir().join(RESULTS_FILE)
    }

    /*---------------- Private/Helpers ------------------*/
    fn resolve<T>(
        raw: Option<String>,
        key: &str,
        parse: fn(&str) -> Result<T, ConfigError>,
        default: T
    ) -> T {
        let Some(raw) = raw else {
            return default;
        };
        match parse(&raw) {
            Ok(value) => value,
            Err(err) => {
                warn!(variable = key, error = %err, "using default value");
                default
            }
        }
    }
}

fn parse_url(value: &str) -> Result<String, ConfigError> {
    Url::parse(value)
        .map(|_| value.to_string())
        .map_err(|err| ConfigError::InvalidUrl { value: value.to_string(), reason: err.to_string() })
}

fn parse_positive<T>(value: &str) -> Result<T, ConfigError> where T: std::str::FromStr + Default + PartialEq {
    match value.trim().parse::<T>() {
        Ok(parsed) if parsed != T::default() => Ok(parsed),
        _ => Err(ConfigError::InvalidNumber(value.to_string())),
    }
}

fn parse_positive_duration(value: &str) -> Result<Duration, ConfigError> {
    match parse_duration(value)? {
        duration if duration.is_zero() => Err(ConfigError::InvalidDuration(value.to_string())),
        duration => Ok(duration),
    }
}

/// Parse durations such as `30s`, `300ms`, `1m30s` or `1.5h`.
/// A bare number is taken as seconds.
pub fn parse_duration(value: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration(value.to_string());
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }

    // if no unit is provided use seconds
    let with_unit = if trimmed.ends_with(|c: char| c.is_ascii_digit() || c == '.') {
        format!("{}s", trimmed)
    } else {
        trimmed.to_string()
    };

    let mut total_nanos: u128 = 0;
    let mut rest = with_unit.as_str();
    while !rest.is_empty() {
        // split into value and unit, e.g. "1.5" + "h"
        let number_len = rest.find(|c: char| !(c.is_ascii_digit() || c == '.')).unwrap_or(rest.len());
        let (number, tail) = rest.split_at(number_len);
        let unit_len = tail.find(|c: char| c.is_ascii_digit() || c == '.').unwrap_or(tail.len());
        let (unit, tail) = tail.split_at(unit_len);

        let unit_nanos: u128 = match unit {
            "ns" => 1,
            "us" | "µs" => 1_000,
            "ms" => 1_000_000,
            "s" => 1_000_000_000,
            "m" => 60 * 1_000_000_000,
            "h" => 3600 * 1_000_000_000,
            _ => {
                return Err(invalid());
            }
        };

        let nanos = scaled_nanos(number, unit_nanos).ok_or_else(invalid)?;
        total_nanos = total_nanos.checked_add(nanos).ok_or_else(invalid)?;
        rest = tail;
    }

    let secs = u64::try_from(total_nanos / 1_000_000_000).map_err(|_| invalid())?;
    Ok(Duration::new(secs, (total_nanos % 1_000_000_000) as u32))
}

// "1.5" with a unit of one hour -> nanoseconds, without going through floats
fn scaled_nanos(number: &str, unit_nanos: u128) -> Option<u128> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }
    if !fraction.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let whole: u128 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
    let mut nanos = whole.checked_mul(unit_nanos)?;

    // digits beyond nanosecond precision cannot change the result
    let fraction = &fraction[..fraction.len().min(18)];
    if !fraction.is_empty() {
        let scale = 10u128.pow(fraction.len() as u32);
        let fraction: u128 = fraction.parse().ok()?;
        nanos = nanos.checked_add(fraction * unit_nanos / scale)?;
    }
    Some(nanos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(from_pairs(&[]), Config::default());
    }

    #[test]
    fn overrides_are_applied() {
        let config = from_pairs(&[
            ("TARGET_URL", "http://localhost:8080/api/crypto/encrypt"),
            ("HEALTH_URL", "http://localhost:8080/api/crypto/health"),
            ("REQUESTS_PER_SECOND", "50"),
            ("TEST_DURATION", "1m30s"),
            ("HEALTH_TIMEOUT", "30s"),
            ("REQUEST_TIMEOUT", "2500ms"),
            ("WORKERS", "4"),
            ("RESULTS_BASE_PATH", "/tmp/results"),
            ("TEST_NUMBER_ENV", "7"),
            ("SERVICE", "quarkus"),
        ]);

        assert_eq!(config.target_url, "http://localhost:8080/api/crypto/encrypt");
        assert_eq!(config.health_url, "http://localhost:8080/api/crypto/health");
        assert_eq!(config.requests_per_second, 50);
        assert_eq!(config.test_duration, Duration::from_secs(90));
        assert_eq!(config.health_timeout, Duration::from_secs(30));
        assert_eq!(config.request_timeout, Duration::from_millis(2500));
        assert_eq!(config.workers, 4);
        assert_eq!(config.results_dir(), PathBuf::from("/tmp/results/test_7/quarkus"));
        assert_eq!(
            config.summary_file(),
            PathBuf::from("/tmp/results/test_7/quarkus/load_test_summary.json")
        );
    }

    #[test]
    fn invalid_values_fall_back() {
        let config = from_pairs(&[
            ("TARGET_URL", "not a url"),
            ("REQUESTS_PER_SECOND", "fast"),
            ("TEST_DURATION", "soon"),
            ("REQUEST_TIMEOUT", "0s"),
            ("WORKERS", "0"),
            ("SERVICE", ""),
        ]);
        let defaults = Config::default();

        assert_eq!(config.target_url, defaults.target_url);
        assert_eq!(config.requests_per_second, defaults.requests_per_second);
        assert_eq!(config.test_duration, defaults.test_duration);
        assert_eq!(config.request_timeout, defaults.request_timeout);
        assert_eq!(config.workers, defaults.workers);
        assert_eq!(config.service, defaults.service);
    }

    #[test]
    fn negative_rate_falls_back() {
        assert_eq!(from_pairs(&[("REQUESTS_PER_SECOND", "-5")]).requests_per_second, 20);
    }

    #[test]
    fn duration_formats() {
        assert_eq!(parse_duration("30"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("30s"), Ok(Duration::from_secs(30)));
        assert_eq!(parse_duration("300ms"), Ok(Duration::from_millis(300)));
        assert_eq!(parse_duration("10m"), Ok(Duration::from_secs(600)));
        assert_eq!(parse_duration("1.5h"), Ok(Duration::from_secs(5400)));
        assert_eq!(parse_duration("2h45m"), Ok(Duration::from_secs(9900)));
        assert_eq!(parse_duration("250us"), Ok(Duration::from_micros(250)));
        assert_eq!(parse_duration("1m30s"), Ok(Duration::from_secs(90)));
        assert_eq!(parse_duration("0.5"), Ok(Duration::from_millis(500)));
    }

    #[test]
    fn duration_rejects_garbage() {
        for value in ["", "s", "10x", "1d", "abc", "-5s", "1..5s"] {
            assert!(parse_duration(value).is_err(), "{value:?} should be rejected");
        }
    }
}
