//! Probe module for endpoint monitoring.
//!
//! A probe is one timed GET against a monitored endpoint. Every attempt
//! produces a [`Metric`], including attempts that never got a response.

mod http;

pub use http::*;

use crate::db::{Metric, MonitoredEndpoint};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Hard limit on a single probe attempt.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Probe error types.
///
/// These never leave a prober; they are logged and recorded as status 0.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid request: {0}")]
    Config(String),
}

/// Something that can check an endpoint once.
#[async_trait]
pub trait Prober: Send + Sync + 'static {
    /// Run a single attempt and describe its outcome.
    async fn probe(&self, endpoint: &MonitoredEndpoint) -> Metric;
}

/// Convert an elapsed time to whole milliseconds, rounding to nearest.
pub fn elapsed_ms(elapsed: Duration) -> u32 {
    (elapsed.as_secs_f64() * 1000.0).round() as u32
}
