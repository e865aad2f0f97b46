//! Scheduler module for running one probe loop per endpoint.

use crate::db::{DbError, EndpointError, Metric, MonitoredEndpoint, Store};
use crate::probe::Prober;

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio::time::{Instant, MissedTickBehavior};
use uuid::Uuid;

/// Scheduler error types.
#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("endpoint {id} cannot be scheduled: {source}")]
    InvalidEndpoint {
        id: Uuid,
        #[source]
        source: EndpointError,
    },
}

/// Destination for probe results.
pub trait MetricSink: Send + Sync + 'static {
    fn insert_metric(&self, metric: &Metric) -> Result<(), DbError>;
}

impl MetricSink for Store {
    fn insert_metric(&self, metric: &Metric) -> Result<(), DbError> {
        Store::insert_metric(self, metric)
    }
}

/// Runs an independent periodic probe task for each endpoint.
pub struct Scheduler<P, S> {
    prober: Arc<P>,
    sink: Arc<S>,
    stop_tx: broadcast::Sender<()>,
    tasks: JoinSet<()>,
}

impl<P: Prober, S: MetricSink> Scheduler<P, S> {
    /// Create a new scheduler writing to the given sink.
    pub fn new(prober: Arc<P>, sink: Arc<S>) -> Self {
        let (stop_tx, _) = broadcast::channel(1);
        Self {
            prober,
            sink,
            stop_tx,
            tasks: JoinSet::new(),
        }
    }

    /// Begin polling every endpoint.
    ///
    /// All descriptors are validated before any task is spawned. Returns as
    /// soon as the tasks are launched.
    pub fn start(&mut self, endpoints: Vec<MonitoredEndpoint>) -> Result<(), SchedulerError> {
        for ep in &endpoints {
            ep.validate()
                .map_err(|source| SchedulerError::InvalidEndpoint { id: ep.id, source })?;
        }

        tracing::info!("Starting scheduler with {} endpoints", endpoints.len());

        for ep in endpoints {
            tracing::info!("Scheduler: Adding endpoint {} every {:?}", ep.url, ep.interval);
            let prober = self.prober.clone();
            let sink = self.sink.clone();
            let stop_rx = self.stop_tx.subscribe();
            self.tasks.spawn(run_probe_loop(ep, prober, sink, stop_rx));
        }

        Ok(())
    }

    /// Number of probe tasks still running.
    pub fn endpoint_count(&self) -> usize {
        self.tasks.len()
    }

    /// Stop every task and wait for them to finish.
    ///
    /// Timer waits end immediately; a probe already in flight completes first.
    pub async fn shutdown(mut self) {
        let _ = self.stop_tx.send(());
        while let Some(res) = self.tasks.join_next().await {
            if let Err(e) = res {
                tracing::error!("Probe task ended abnormally: {}", e);
            }
        }
        tracing::info!("Scheduler stopped");
    }
}

/// Run the probe loop for a single endpoint.
///
/// The first probe fires one full interval after start. Ticks missed while a
/// probe overran are skipped rather than fired back to back.
async fn run_probe_loop<P: Prober, S: MetricSink>(
    endpoint: MonitoredEndpoint,
    prober: Arc<P>,
    sink: Arc<S>,
    mut stop_rx: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval_at(Instant::now() + endpoint.interval, endpoint.interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = stop_rx.recv() => {
                break;
            }
            _ = interval.tick() => {
                let metric = prober.probe(&endpoint).await;
                if metric.is_failure() {
                    tracing::warn!("{} | no response | {}ms", endpoint.url, metric.latency_ms);
                } else {
                    tracing::info!("{} | {} | {}ms", endpoint.url, metric.status_code, metric.latency_ms);
                }

                if let Err(e) = sink.insert_metric(&metric) {
                    tracing::error!("Failed to store metric for {}: {}", endpoint.url, e);
                }
            }
        }
    }

    tracing::debug!("Probe loop for {} stopped", endpoint.url);
}
