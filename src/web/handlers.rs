//! HTTP request handlers.

use super::AppState;
use crate::db::{generate_test_data, QueryError, TimeRange};

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Deserialize;

// ============================================================================
// API: Metrics
// ============================================================================

/// Date range parameters shared by the query endpoints.
#[derive(Debug, Deserialize)]
pub struct RangeQuery {
    #[serde(rename = "startDate", default)]
    pub start_date: Option<String>,
    #[serde(rename = "endDate", default)]
    pub end_date: Option<String>,
}

impl RangeQuery {
    fn range(&self) -> Result<TimeRange, QueryError> {
        TimeRange::parse(self.start_date.as_deref(), self.end_date.as_deref())
    }
}

fn query_error_response(e: QueryError, what: &str) -> Response {
    match e {
        QueryError::InvalidDate(_) => {
            (StatusCode::BAD_REQUEST, e.to_string()).into_response()
        }
        QueryError::Store(e) => {
            tracing::error!("Database error while fetching {}: {}", what, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal server error while fetching {}", what),
            )
                .into_response()
        }
    }
}

pub async fn handle_get_latency(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Response {
    tracing::debug!("Latency query: start={:?} end={:?}", query.start_date, query.end_date);

    let metrics = match query.range().and_then(|r| state.queries.latency_metrics(r)) {
        Ok(m) => m,
        Err(e) => return query_error_response(e, "metrics"),
    };

    tracing::debug!("Fetched {} metrics", metrics.len());
    Json(metrics).into_response()
}

pub async fn handle_get_status_distribution(
    State(state): State<AppState>,
    Query(query): Query<RangeQuery>,
) -> Response {
    tracing::debug!(
        "Status distribution query: start={:?} end={:?}",
        query.start_date,
        query.end_date
    );

    let distribution = match query.range().and_then(|r| state.queries.status_distribution(r)) {
        Ok(d) => d,
        Err(e) => return query_error_response(e, "status code distribution"),
    };

    // Consumers expect an empty array rather than an empty object.
    if distribution.is_empty() {
        return Json(serde_json::json!([])).into_response();
    }

    Json(distribution).into_response()
}

// ============================================================================
// API: Test data
// ============================================================================

pub async fn handle_generate_test_data(State(state): State<AppState>) -> Response {
    tracing::info!("Generating test data...");

    let mut rng = StdRng::from_entropy();
    match generate_test_data(&state.store, &mut rng) {
        Ok(_) => (StatusCode::OK, "Test data generated successfully").into_response(),
        Err(e) => {
            tracing::error!("Failed to generate test data: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to generate test data").into_response()
        }
    }
}
