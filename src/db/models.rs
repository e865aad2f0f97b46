//! Database model types.

use chrono::{DateTime, Utc};
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

/// Reasons an endpoint descriptor cannot be scheduled.
#[derive(Error, Debug)]
pub enum EndpointError {
    #[error("invalid url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("unsupported url scheme {0:?}, expected http or https")]
    UnsupportedScheme(String),
    #[error("poll interval {0:?} is shorter than one second")]
    IntervalTooShort(Duration),
    #[error("invalid header {0:?}")]
    InvalidHeader(String),
}

/// An HTTP endpoint checked on a fixed interval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoredEndpoint {
    pub id: Uuid,
    pub url: String,
    pub interval: Duration,
    pub headers: BTreeMap<String, String>,
}

impl MonitoredEndpoint {
    /// Create a descriptor with a fresh ID and no headers.
    pub fn new(url: impl Into<String>, interval: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            url: url.into(),
            interval,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Check that the descriptor can be polled.
    ///
    /// Intervals are persisted as whole seconds, so anything under one second
    /// is refused rather than reloaded later as zero.
    pub fn validate(&self) -> Result<(), EndpointError> {
        let url = Url::parse(&self.url).map_err(|e| EndpointError::InvalidUrl {
            url: self.url.clone(),
            reason: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(EndpointError::UnsupportedScheme(url.scheme().to_string()));
        }

        if self.interval < Duration::from_secs(1) {
            return Err(EndpointError::IntervalTooShort(self.interval));
        }

        for (name, value) in &self.headers {
            if HeaderName::from_bytes(name.as_bytes()).is_err() || HeaderValue::from_str(value).is_err() {
                return Err(EndpointError::InvalidHeader(name.clone()));
            }
        }

        Ok(())
    }
}

/// The outcome of one probe attempt.
///
/// `status_code` is 0 when no response was obtained.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub id: Uuid,
    pub endpoint_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub status_code: u16,
    pub latency_ms: u32,
    pub url: String,
}

impl Metric {
    pub fn is_failure(&self) -> bool {
        self.status_code == 0
    }
}

/// Number of metrics sharing a (url, status code) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCodeCount {
    pub url: String,
    pub status_code: u16,
    pub count: u64,
}

/// Status code counts keyed by endpoint URL.
pub type StatusDistribution = BTreeMap<String, Vec<StatusCodeCount>>;
