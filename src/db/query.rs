//! Read-side queries over the metric store.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use thiserror::Error;

use super::models::{Metric, StatusDistribution};
use super::store::{DbError, Store};

/// Query error types.
///
/// An empty result is never an error; `Store` means the data could not be read.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("invalid RFC3339 date {0:?}")]
    InvalidDate(String),
    #[error("store error: {0}")]
    Store(#[from] DbError),
}

/// An inclusive time window. A start after the end matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// The window of the given length ending now.
    pub fn last(window: ChronoDuration) -> Self {
        let end = Utc::now();
        Self { start: end - window, end }
    }

    /// Build a range from optional RFC3339 strings.
    ///
    /// A missing end means now; a missing start means one hour before the end.
    pub fn parse(start: Option<&str>, end: Option<&str>) -> Result<Self, QueryError> {
        let end = match end.filter(|s| !s.is_empty()) {
            Some(s) => parse_rfc3339(s)?,
            None => Utc::now(),
        };
        let start = match start.filter(|s| !s.is_empty()) {
            Some(s) => parse_rfc3339(s)?,
            None => end - ChronoDuration::hours(1),
        };
        Ok(Self::new(start, end))
    }
}

fn parse_rfc3339(s: &str) -> Result<DateTime<Utc>, QueryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| QueryError::InvalidDate(s.to_string()))
}

/// The two read shapes offered to API callers.
#[derive(Clone)]
pub struct QueryEngine {
    store: Arc<Store>,
}

impl QueryEngine {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Metrics in the range, oldest first, capped at 100.
    pub fn latency_metrics(&self, range: TimeRange) -> Result<Vec<Metric>, QueryError> {
        Ok(self.store.query_metrics(range.start, range.end)?)
    }

    /// Status code counts in the range, keyed by endpoint URL.
    pub fn status_distribution(&self, range: TimeRange) -> Result<StatusDistribution, QueryError> {
        Ok(self.store.query_status_distribution(range.start, range.end)?)
    }
}
