//! Fixed-rate load tester for HTTP encryption endpoints.
//!
//! A run waits for the target's health endpoint ([`readiness`]), then paces
//! encryption requests at a configured rate ([`pacer`], [`driver`]) while a
//! reporter prints progress ([`reporter`]). All outcomes land in one shared
//! [`stats::LoadStats`], from which the final [`report::TestSummary`] is built.

pub mod config;
pub mod driver;
pub mod error;
pub mod pacer;
pub mod readiness;
pub mod report;
pub mod reporter;
pub mod runner;
pub mod stats;

pub use config::Config;
pub use error::{ LoadTestError, Result };
pub use runner::Runner;
