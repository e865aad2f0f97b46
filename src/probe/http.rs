//! HTTP probe implementation.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Request, Response};
use uuid::Uuid;

use super::{elapsed_ms, ProbeError, Prober, PROBE_TIMEOUT};
use crate::db::{Metric, MonitoredEndpoint};

/// Prober that issues a GET with the endpoint's headers.
///
/// One client is shared by every endpoint task.
#[derive(Clone)]
pub struct HttpProber {
    client: Client,
    timeout: Duration,
}

impl HttpProber {
    pub fn new() -> Result<Self, ProbeError> {
        Self::with_timeout(PROBE_TIMEOUT)
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self, ProbeError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProbeError::Config(e.to_string()))?;
        Ok(Self { client, timeout })
    }

    fn build_request(&self, endpoint: &MonitoredEndpoint) -> Result<Request, ProbeError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &endpoint.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ProbeError::Config(format!("header {:?}: {}", name, e)))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ProbeError::Config(format!("header {:?}: {}", name, e)))?;
            headers.insert(name, value);
        }

        self.client
            .get(&endpoint.url)
            .headers(headers)
            .build()
            .map_err(|e| ProbeError::Config(e.to_string()))
    }

    async fn send(&self, endpoint: &MonitoredEndpoint) -> Result<Response, ProbeError> {
        let request = self.build_request(endpoint)?;
        self.client.execute(request).await.map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout(self.timeout)
            } else {
                ProbeError::Network(e.to_string())
            }
        })
    }
}

#[async_trait]
impl Prober for HttpProber {
    async fn probe(&self, endpoint: &MonitoredEndpoint) -> Metric {
        let start = Instant::now();
        let result = self.send(endpoint).await;
        let latency_ms = elapsed_ms(start.elapsed());

        let status_code = match result {
            Ok(response) => {
                let status = response.status().as_u16();
                if let Err(e) = drain_body(response).await {
                    tracing::debug!("Failed to drain body from {}: {}", endpoint.url, e);
                }
                status
            }
            Err(e) => {
                tracing::warn!("Probe failed for {}: {}", endpoint.url, e);
                0
            }
        };

        Metric {
            id: Uuid::new_v4(),
            endpoint_id: endpoint.id,
            timestamp: Utc::now(),
            status_code,
            latency_ms,
            url: endpoint.url.clone(),
        }
    }
}

/// Read the body to the end without buffering it.
async fn drain_body(mut response: Response) -> Result<(), reqwest::Error> {
    while response.chunk().await?.is_some() {}
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{http::StatusCode, routing::get, Router};
    use std::net::SocketAddr;

    async fn serve(router: Router) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    fn endpoint(url: String) -> MonitoredEndpoint {
        MonitoredEndpoint::new(url, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn test_http_probe_invalid_url() {
        let prober = HttpProber::with_timeout(Duration::from_millis(100)).unwrap();
        let ep = endpoint("http://256.256.256.256".to_string());
        let metric = prober.probe(&ep).await;
        assert_eq!(metric.status_code, 0);
        assert_eq!(metric.endpoint_id, ep.id);
        assert!(metric.latency_ms <= 5_000);
    }

    #[tokio::test]
    async fn test_http_probe_malformed_url() {
        let prober = HttpProber::new().unwrap();
        let metric = prober.probe(&endpoint("not a url".to_string())).await;
        assert_eq!(metric.status_code, 0);
        assert!(!metric.id.is_nil());
    }

    #[tokio::test]
    async fn test_http_probe_connection_refused() {
        // Bind then drop to get a port nobody is listening on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let prober = HttpProber::with_timeout(Duration::from_millis(500)).unwrap();
        let metric = prober.probe(&endpoint(format!("http://{}/", addr))).await;
        assert_eq!(metric.status_code, 0);
    }

    #[tokio::test]
    async fn test_http_probe_records_error_status() {
        let router = Router::new().route(
            "/down",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "x".repeat(256 * 1024)) }),
        );
        let addr = serve(router).await;

        let prober = HttpProber::new().unwrap();
        let before = Utc::now();
        let metric = prober.probe(&endpoint(format!("http://{}/down", addr))).await;
        assert_eq!(metric.status_code, 503);
        assert!(metric.timestamp >= before);
        assert_eq!(metric.url, format!("http://{}/down", addr));
    }

    #[tokio::test]
    async fn test_http_probe_sends_headers() {
        let router = Router::new().route(
            "/auth",
            get(|headers: axum::http::HeaderMap| async move {
                match headers.get("x-probe-token").and_then(|v| v.to_str().ok()) {
                    Some("secret") => StatusCode::OK,
                    _ => StatusCode::UNAUTHORIZED,
                }
            }),
        );
        let addr = serve(router).await;
        let prober = HttpProber::new().unwrap();

        let plain = endpoint(format!("http://{}/auth", addr));
        assert_eq!(prober.probe(&plain).await.status_code, 401);

        let with_token = plain.clone().with_header("X-Probe-Token", "secret");
        assert_eq!(prober.probe(&with_token).await.status_code, 200);
    }

    #[tokio::test]
    async fn test_http_probe_timeout() {
        let router = Router::new().route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                "late"
            }),
        );
        let addr = serve(router).await;

        let prober = HttpProber::with_timeout(Duration::from_millis(100)).unwrap();
        let metric = prober.probe(&endpoint(format!("http://{}/slow", addr))).await;
        assert_eq!(metric.status_code, 0);
        assert!(metric.latency_ms >= 100);
        assert!(metric.latency_ms < 2_000);
    }
}
