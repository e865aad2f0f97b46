//! Pulseboard - HTTP Endpoint Monitor
//!
//! Polls a set of HTTP endpoints on independent schedules, records status
//! and latency in SQLite and serves range and distribution queries.

mod config;
mod db;
mod probe;
mod scheduler;
mod web;

use config::ServerConfig;
use db::Store;
use probe::HttpProber;
use scheduler::Scheduler;
use web::Server;

use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env()
            .add_directive("pulseboard=info".parse()?))
        .init();

    // Load configuration
    let cfg = ServerConfig::load();
    tracing::info!("Starting Pulseboard on port {}...", cfg.http_port);
    tracing::info!("Using database at {}", cfg.db_path);

    // Initialize database
    let store = Arc::new(Store::new(&cfg.db_path)?);
    tracing::info!("Database initialized with {} stored metrics", store.metric_count()?);

    // Seed defaults if nothing is registered yet
    let endpoints = db::ensure_default_endpoints(&store)?;
    tracing::info!("Loaded {} endpoints from the database", endpoints.len());

    // Start scheduler; invalid endpoints abort startup here
    let prober = Arc::new(HttpProber::new()?);
    let mut scheduler = Scheduler::new(prober, store.clone());
    scheduler.start(endpoints)?;
    tracing::info!("Polling {} endpoints", scheduler.endpoint_count());

    // Serve until SIGINT/SIGTERM
    let server = Server::new(cfg, store);
    server.start(shutdown_signal()).await?;

    tracing::info!("Shutting down poller...");
    scheduler.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
