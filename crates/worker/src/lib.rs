//! Veristream Worker
//!
//! Stream-queue worker for the content-verification pipeline.
//!
//! This crate provides:
//! - Redis Streams consumer-group polling across multiple broker deployments
//! - At-least-once job processing with pending-entry recovery after crashes
//! - Callback delivery of results with optional HMAC signing
//! - Idle backoff and per-source failure isolation
//! - Metrics and monitoring

pub mod callback;
pub mod config;
pub mod engine;
pub mod metrics;
pub mod processor;
pub mod stream;

pub use config::{SourceConfig, WorkerConfig};
pub use engine::{Dispatcher, WorkerEngine};
pub use metrics::WorkerMetrics;

use crate::callback::CallbackPublisher;
use crate::processor::Processor;
use crate::stream::RedisFactory;
use anyhow::{bail, Result};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};
use veristream_domain::JobKind;

/// Long-running worker process for one job kind.
///
/// Wires configuration, the processing collaborator and the delivery layer
/// into a [`WorkerEngine`] with a stable consumer identity, and runs it
/// until shutdown is signalled.
pub struct WorkerRuntime<K: JobKind> {
    engine: WorkerEngine<K, RedisFactory>,
    metrics: WorkerMetrics,
    shutdown_tx: Arc<watch::Sender<bool>>,
    shutdown_rx: watch::Receiver<bool>,
}

impl<K: JobKind> WorkerRuntime<K> {
    pub fn new(config: WorkerConfig, processor: Arc<dyn Processor<K::Payload>>) -> Result<Self> {
        if config.sources.is_empty() {
            // The only class of error that should take the process down
            bail!("no broker sources configured");
        }

        let metrics = WorkerMetrics::new();
        let publisher = CallbackPublisher::new(&config.callback)?;
        let dispatcher = Dispatcher::new(processor, publisher, metrics.clone());
        let engine = WorkerEngine::new(config, RedisFactory, dispatcher, metrics.clone());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            engine,
            metrics,
            shutdown_tx: Arc::new(shutdown_tx),
            shutdown_rx,
        })
    }

    /// Handle for signalling shutdown from another task.
    pub fn shutdown_handle(&self) -> Arc<watch::Sender<bool>> {
        self.shutdown_tx.clone()
    }

    pub fn metrics(&self) -> &WorkerMetrics {
        &self.metrics
    }

    /// Run the source loops to completion. Returns once all loops have
    /// observed the shutdown signal.
    pub async fn run(self) -> Result<()> {
        let handles = self.engine.start(self.shutdown_rx.clone());
        info!(kind = K::NAME, "worker started");

        for result in futures::future::join_all(handles).await {
            if let Err(e) = result {
                error!(error = %e, "source loop task panicked");
            }
        }

        info!(kind = K::NAME, "worker stopped");
        Ok(())
    }
}
