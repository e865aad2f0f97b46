//! SQLite database store implementation.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Result as SqlResult, Row};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use super::models::*;

/// Upper bound on rows returned by a range query.
pub const MAX_QUERY_RESULTS: i64 = 100;

const SCHEMA_UP: &str = include_str!("../../migrations/000001_init.up.sql");
const SCHEMA_DOWN: &str = include_str!("../../migrations/000001_init.down.sql");

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("invalid id: {0}")]
    InvalidId(String),
    #[error("invalid stored timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("database connection lock poisoned")]
    Poisoned,
}

/// Thread-safe database store.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Create a store backed by a private in-memory database.
    #[cfg(test)]
    pub fn in_memory() -> Result<Self, DbError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, DbError> {
        // The bundled SQLite enforces foreign keys by default; metrics must
        // still be writable for endpoints that are gone.
        conn.pragma_update(None, "foreign_keys", false)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init()?;
        Ok(store)
    }

    fn init(&self) -> Result<(), DbError> {
        let conn = self.conn()?;
        conn.execute_batch(SCHEMA_UP)
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, DbError> {
        self.conn.lock().map_err(|_| DbError::Poisoned)
    }

    /// Drop and recreate both tables.
    ///
    /// Runs in a single transaction, so a failure leaves the previous schema
    /// and data in place.
    pub fn reset(&self) -> Result<(), DbError> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(SCHEMA_DOWN)?;
        tx.execute_batch(SCHEMA_UP)?;
        tx.commit()?;
        Ok(())
    }

    // --- Endpoints ---

    /// Insert an endpoint, replacing any existing row with the same ID.
    ///
    /// Re-registering a known endpoint overwrites its url, interval and headers.
    pub fn insert_endpoint(&self, endpoint: &MonitoredEndpoint) -> Result<(), DbError> {
        let headers = serde_json::to_string(&endpoint.headers)?;
        let frequency = endpoint.interval.as_secs() as i64;

        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO monitored_endpoints (id, url, frequency, headers) VALUES (?1, ?2, ?3, ?4)",
            params![endpoint.id.to_string(), endpoint.url, frequency, headers],
        )?;
        Ok(())
    }

    /// Get all endpoints.
    pub fn list_endpoints(&self) -> Result<Vec<MonitoredEndpoint>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, url, frequency, COALESCE(headers, '{}') FROM monitored_endpoints ORDER BY rowid",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        rows.into_iter()
            .map(|(id, url, frequency, headers)| -> Result<MonitoredEndpoint, DbError> {
                Ok(MonitoredEndpoint {
                    id: parse_id(&id)?,
                    url,
                    interval: Duration::from_secs(frequency.max(0) as u64),
                    headers: serde_json::from_str(&headers)?,
                })
            })
            .collect()
    }

    // --- Metrics ---

    /// Append a metric.
    ///
    /// The endpoint is not required to exist. The metric's URL is kept as a
    /// snapshot and reported when the endpoint row has been removed.
    pub fn insert_metric(&self, metric: &Metric) -> Result<(), DbError> {
        if metric.id.is_nil() {
            return Err(DbError::InvalidId("metric id is nil".to_string()));
        }
        if metric.endpoint_id.is_nil() {
            return Err(DbError::InvalidId("endpoint id is nil".to_string()));
        }

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO api_metrics (id, endpoint_id, timestamp, status_code, latency_ms, url)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                metric.id.to_string(),
                metric.endpoint_id.to_string(),
                format_db_time(metric.timestamp),
                metric.status_code,
                metric.latency_ms,
                metric.url,
            ],
        )?;
        Ok(())
    }

    /// Get metrics with a timestamp in `[start, end]`, oldest first.
    ///
    /// At most [`MAX_QUERY_RESULTS`] rows are returned; callers needing more
    /// narrow the range.
    pub fn query_metrics(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Vec<Metric>, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT m.id, m.endpoint_id, m.timestamp, m.status_code, m.latency_ms, COALESCE(e.url, m.url)
             FROM api_metrics m
             LEFT JOIN monitored_endpoints e ON m.endpoint_id = e.id
             WHERE m.timestamp BETWEEN ?1 AND ?2
             ORDER BY m.timestamp ASC, m.id ASC
             LIMIT ?3",
        )?;

        let rows = stmt
            .query_map(
                params![format_db_time(start), format_db_time(end), MAX_QUERY_RESULTS],
                read_metric_row,
            )?
            .collect::<SqlResult<Vec<_>>>()?;

        rows.into_iter().map(MetricRow::into_metric).collect()
    }

    /// Count metrics in `[start, end]` grouped by endpoint URL and status code.
    pub fn query_status_distribution(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<StatusDistribution, DbError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT COALESCE(e.url, m.url) AS url, m.status_code, COUNT(*) AS count
             FROM api_metrics m
             LEFT JOIN monitored_endpoints e ON m.endpoint_id = e.id
             WHERE m.timestamp BETWEEN ?1 AND ?2
             GROUP BY COALESCE(e.url, m.url), m.status_code
             ORDER BY 1 ASC, 2 ASC",
        )?;

        let counts = stmt
            .query_map(params![format_db_time(start), format_db_time(end)], |row| {
                Ok(StatusCodeCount {
                    url: row.get(0)?,
                    status_code: row.get(1)?,
                    count: row.get::<_, i64>(2)? as u64,
                })
            })?
            .collect::<SqlResult<Vec<_>>>()?;

        let mut result: StatusDistribution = BTreeMap::new();
        for count in counts {
            result.entry(count.url.clone()).or_default().push(count);
        }
        Ok(result)
    }

    /// Count every stored metric.
    pub fn metric_count(&self) -> Result<i64, DbError> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM api_metrics", [], |r| r.get(0))?)
    }
}

struct MetricRow {
    id: String,
    endpoint_id: String,
    timestamp: String,
    status_code: u16,
    latency_ms: u32,
    url: String,
}

impl MetricRow {
    fn into_metric(self) -> Result<Metric, DbError> {
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| DbError::InvalidTimestamp(format!("{:?}: {}", self.timestamp, e)))?
            .with_timezone(&Utc);
        Ok(Metric {
            id: parse_id(&self.id)?,
            endpoint_id: parse_id(&self.endpoint_id)?,
            timestamp,
            status_code: self.status_code,
            latency_ms: self.latency_ms,
            url: self.url,
        })
    }
}

fn read_metric_row(row: &Row<'_>) -> SqlResult<MetricRow> {
    Ok(MetricRow {
        id: row.get(0)?,
        endpoint_id: row.get(1)?,
        timestamp: row.get(2)?,
        status_code: row.get(3)?,
        latency_ms: row.get(4)?,
        url: row.get(5)?,
    })
}

fn parse_id(s: &str) -> Result<Uuid, DbError> {
    Uuid::parse_str(s).map_err(|e| DbError::InvalidId(format!("{:?}: {}", s, e)))
}

/// Format a time for storage.
///
/// Fixed-width RFC3339 with nanoseconds, so string order matches time order.
fn format_db_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}
