//! Live metrics feed over WebSocket.

use super::AppState;
use crate::db::{QueryEngine, QueryError, TimeRange};

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use chrono::Duration as ChronoDuration;
use thiserror::Error;

/// How far back each snapshot looks.
const SNAPSHOT_WINDOW_MINUTES: i64 = 5;

/// Live feed error types.
#[derive(Error, Debug)]
pub enum LiveFeedError {
    #[error("query failed: {0}")]
    Query(#[from] QueryError),
    #[error("encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

pub async fn handle_live_feed(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| run_live_feed(socket, state))
}

/// Serialize the metrics recorded over the last few minutes.
pub fn live_snapshot(queries: &QueryEngine) -> Result<String, LiveFeedError> {
    let window = TimeRange::last(ChronoDuration::minutes(SNAPSHOT_WINDOW_MINUTES));
    let metrics = queries.latency_metrics(window)?;
    Ok(serde_json::to_string(&metrics)?)
}

async fn run_live_feed(mut socket: WebSocket, state: AppState) {
    tracing::info!("Live feed connection established");
    let mut interval = tokio::time::interval(state.config.live_interval);

    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!("Live feed receive error: {}", e);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
            _ = interval.tick() => {
                let payload = match live_snapshot(&state.queries) {
                    Ok(p) => p,
                    Err(e) => {
                        tracing::error!("Live feed snapshot failed: {}", e);
                        continue;
                    }
                };
                if let Err(e) = socket.send(Message::Text(payload.into())).await {
                    tracing::debug!("Live feed send failed: {}", e);
                    break;
                }
            }
        }
    }

    tracing::info!("Live feed connection closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Metric, MonitoredEndpoint, Store};
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    #[test]
    fn test_live_snapshot_reads_recent_metrics() {
        let store = Arc::new(Store::in_memory().unwrap());
        let ep = MonitoredEndpoint::new("https://api.github.com", Duration::from_secs(30));
        store.insert_endpoint(&ep).unwrap();

        let recent = Metric {
            id: Uuid::new_v4(),
            endpoint_id: ep.id,
            timestamp: Utc::now() - ChronoDuration::minutes(1),
            status_code: 200,
            latency_ms: 87,
            url: String::new(),
        };
        let stale = Metric {
            id: Uuid::new_v4(),
            timestamp: Utc::now() - ChronoDuration::hours(2),
            ..recent.clone()
        };
        store.insert_metric(&recent).unwrap();
        store.insert_metric(&stale).unwrap();

        let queries = QueryEngine::new(store);
        let snapshot: Vec<Metric> = serde_json::from_str(&live_snapshot(&queries).unwrap()).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id, recent.id);
        assert_eq!(snapshot[0].url, ep.url);
    }

    #[test]
    fn test_live_snapshot_empty() {
        let queries = QueryEngine::new(Arc::new(Store::in_memory().unwrap()));
        assert_eq!(live_snapshot(&queries).unwrap(), "[]");
    }
}
