use std::time::Duration;
use thiserror::Error;

/// Errors produced while checking readiness or driving load
#[derive(Error, Debug)]
pub enum LoadTestError {
    /// The health endpoint never reported ready within the configured bound
    #[error("service health check timeout after {elapsed:?}")]
    HealthCheckTimeout { elapsed: Duration },

    /// Shutdown was requested before the load phase started
    #[error("interrupted before the load phase started")]
    Interrupted,

    /// Network-level failure (connect, timeout, reset)
    #[error("request failed: {0}")]
    RequestSend(#[from] isahc::Error),

    /// The outbound request could not be assembled
    #[error("invalid request: {0}")]
    RequestBuild(#[from] isahc::http::Error),

    /// Non-200 status from the target
    #[error("HTTP {status}: {message}")]
    RequestApplication { status: u16, message: String },

    /// 200 status with a body that is not a valid encryption response
    #[error("failed to parse response: {0}")]
    ResponseParse(#[source] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, LoadTestError>;

/// Reasons an environment value was rejected in favour of its default
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid number {0:?}, expected a positive integer")]
    InvalidNumber(String),

    #[error("invalid duration {0:?}")]
    InvalidDuration(String),

    #[error("invalid URL {value:?}: {reason}")]
    InvalidUrl { value: String, reason: String },
}
