//! Default endpoints and synthetic demo data.

use chrono::{Duration as ChronoDuration, Utc};
use rand::Rng;
use std::time::Duration;
use uuid::Uuid;

use super::models::{Metric, MonitoredEndpoint};
use super::store::{DbError, Store};

/// Status codes drawn for synthetic metrics.
pub const DEMO_STATUS_CODES: [u16; 6] = [200, 201, 400, 401, 500, 503];

/// Synthetic metrics generated per demo endpoint.
pub const DEMO_METRICS_PER_ENDPOINT: usize = 20;

/// Endpoints polled when the store has none.
pub fn default_endpoints() -> Vec<MonitoredEndpoint> {
    vec![
        MonitoredEndpoint::new("https://api.github.com", Duration::from_secs(30))
            .with_header("User-Agent", "Pulseboard-Poller"),
        MonitoredEndpoint::new("https://httpstat.us/503", Duration::from_secs(60)),
        MonitoredEndpoint::new("https://httpstat.us/200?sleep=10000", Duration::from_secs(10)),
    ]
}

fn demo_endpoint(id: u128, url: &str, secs: u64, header: (&str, &str)) -> MonitoredEndpoint {
    MonitoredEndpoint {
        id: Uuid::from_u128(id),
        ..MonitoredEndpoint::new(url, Duration::from_secs(secs)).with_header(header.0, header.1)
    }
}

/// Fixed endpoints used for demo data.
pub fn demo_endpoints() -> Vec<MonitoredEndpoint> {
    vec![
        demo_endpoint(
            0x550e8400_e29b_41d4_a716_446655440000,
            "https://api.github.com",
            10,
            ("Authorization", "Bearer token"),
        ),
        demo_endpoint(
            0x550e8400_e29b_41d4_a716_446655440001,
            "https://httpstat.us/200",
            15,
            ("Content-Type", "application/json"),
        ),
        demo_endpoint(
            0x550e8400_e29b_41d4_a716_446655440002,
            "https://httpstat.us/503",
            20,
            ("Cache-Control", "no-cache"),
        ),
    ]
}

/// Store the default endpoints if none exist and return what should be polled.
pub fn ensure_default_endpoints(store: &Store) -> Result<Vec<MonitoredEndpoint>, DbError> {
    let endpoints = store.list_endpoints()?;
    if !endpoints.is_empty() {
        return Ok(endpoints);
    }

    let defaults = default_endpoints();
    for ep in &defaults {
        tracing::info!("Adding default endpoint: {}", ep.url);
        store.insert_endpoint(ep)?;
    }
    Ok(defaults)
}

/// Wipe the store and fill it with demo endpoints and synthetic metrics.
///
/// Metrics are spaced hourly starting 24 hours ago. Returns the number of
/// metrics written.
pub fn generate_test_data(store: &Store, rng: &mut impl Rng) -> Result<usize, DbError> {
    store.reset()?;

    let endpoints = demo_endpoints();
    for ep in &endpoints {
        store.insert_endpoint(ep)?;
    }

    let start = Utc::now() - ChronoDuration::hours(24);
    let mut written = 0;
    for ep in &endpoints {
        for i in 0..DEMO_METRICS_PER_ENDPOINT {
            let metric = Metric {
                id: Uuid::new_v4(),
                endpoint_id: ep.id,
                timestamp: start + ChronoDuration::hours(i as i64),
                status_code: DEMO_STATUS_CODES[rng.gen_range(0..DEMO_STATUS_CODES.len())],
                latency_ms: rng.gen_range(0..1000),
                url: ep.url.clone(),
            };
            store.insert_metric(&metric)?;
            written += 1;
        }
    }

    tracing::info!("Generated {} synthetic metrics for {} endpoints", written, endpoints.len());
    Ok(written)
}
