//! Web server module.

mod handlers;
mod live;

pub use handlers::*;
pub use live::*;

use crate::config::ServerConfig;
use crate::db::{QueryEngine, Store};

use axum::{routing::get, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: ServerConfig,
    pub store: Arc<Store>,
    pub queries: QueryEngine,
}

/// Web server for the metrics API.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a new server with the given dependencies.
    pub fn new(config: ServerConfig, store: Arc<Store>) -> Self {
        let queries = QueryEngine::new(store.clone());
        Self {
            state: AppState {
                config,
                store,
                queries,
            },
        }
    }

    /// Build the router with all routes.
    fn routes(&self) -> Router {
        let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);

        Router::new()
            .route("/getlatency", get(handlers::handle_get_latency))
            .route("/statuscodedistribution", get(handlers::handle_get_status_distribution))
            .route(
                "/generatetestdata",
                get(handlers::handle_generate_test_data).post(handlers::handle_generate_test_data),
            )
            .route("/ws", get(live::handle_live_feed))
            .layer(cors)
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Serve on the configured port until `shutdown` resolves.
    pub async fn start<F>(&self, shutdown: F) -> Result<(), Box<dyn std::error::Error + Send + Sync>>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.state.config.http_port));
        let router = self.routes();

        tracing::info!("API server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}
