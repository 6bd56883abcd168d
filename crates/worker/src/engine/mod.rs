//! Multi-source worker engine.
//!
//! One independent polling loop per configured broker source. Sources share
//! nothing but read-only configuration, the metrics handle and the shutdown
//! channel, so an unreachable broker can never stall its siblings. A loop
//! has no terminal state: every error is caught at the loop boundary, logged
//! and retried after a backoff sleep, until shutdown is signalled.

pub mod dispatch;

pub use dispatch::{DispatchOutcome, Dispatcher};

use crate::config::{ConsumerIdentity, SourceConfig, WorkerConfig};
use crate::metrics::WorkerMetrics;
use crate::stream::{recover_pending, Backoff, BrokerFactory, RawEntry, StreamBroker};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use veristream_domain::JobKind;

/// Runs one polling loop per broker source for a single job kind.
pub struct WorkerEngine<K: JobKind, F: BrokerFactory> {
    config: Arc<WorkerConfig>,
    factory: Arc<F>,
    dispatcher: Arc<Dispatcher<K>>,
    metrics: WorkerMetrics,
    stream: String,
    identity: ConsumerIdentity,
}

impl<K: JobKind, F: BrokerFactory> WorkerEngine<K, F> {
    pub fn new(
        config: WorkerConfig,
        factory: F,
        dispatcher: Dispatcher<K>,
        metrics: WorkerMetrics,
    ) -> Self {
        let stream = config
            .stream_key
            .clone()
            .unwrap_or_else(|| K::STREAM_KEY.to_string());
        let identity = ConsumerIdentity::new(&config);

        Self {
            config: Arc::new(config),
            factory: Arc::new(factory),
            dispatcher: Arc::new(dispatcher),
            metrics,
            stream,
            identity,
        }
    }

    pub fn metrics(&self) -> &WorkerMetrics {
        &self.metrics
    }

    /// Spawn one task per source. The tasks run until `shutdown` flips to
    /// true; a task never exits on its own because of broker errors.
    pub fn start(&self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        info!(
            kind = K::NAME,
            stream = %self.stream,
            group = %self.identity.group,
            consumer = %self.identity.consumer,
            sources = self.config.sources.len(),
            "starting worker engine"
        );

        self.config
            .sources
            .iter()
            .cloned()
            .map(|source| {
                let loop_state = SourceLoop {
                    config: self.config.clone(),
                    factory: self.factory.clone(),
                    dispatcher: self.dispatcher.clone(),
                    metrics: self.metrics.clone(),
                    stream: self.stream.clone(),
                    identity: self.identity.clone(),
                    source,
                };
                let shutdown = shutdown.clone();
                tokio::spawn(async move { loop_state.run(shutdown).await })
            })
            .collect()
    }
}

/// Everything one source loop owns.
struct SourceLoop<K: JobKind, F: BrokerFactory> {
    config: Arc<WorkerConfig>,
    factory: Arc<F>,
    dispatcher: Arc<Dispatcher<K>>,
    metrics: WorkerMetrics,
    stream: String,
    identity: ConsumerIdentity,
    source: SourceConfig,
}

impl<K: JobKind, F: BrokerFactory> SourceLoop<K, F> {
    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut backoff = Backoff::from_config(&self.config.backoff);

        loop {
            if *shutdown.borrow() {
                break;
            }

            let broker = match self.factory.connect(&self.source).await {
                Ok(broker) => broker,
                Err(e) => {
                    warn!(
                        source = %self.source.name,
                        error = %e,
                        "broker unreachable, retrying"
                    );
                    if sleep_or_shutdown(&mut shutdown, backoff.next_delay()).await {
                        break;
                    }
                    continue;
                }
            };
            info!(source = %self.source.name, "connected to broker");

            match self.poll(&broker, &mut backoff, &mut shutdown).await {
                Ok(()) => break, // shutdown requested
                Err(e) => {
                    error!(
                        source = %self.source.name,
                        error = %e,
                        "source loop error, backing off"
                    );
                    if sleep_or_shutdown(&mut shutdown, backoff.next_delay()).await {
                        break;
                    }
                }
            }
        }

        info!(source = %self.source.name, "source loop stopped");
    }

    /// Group setup, one recovery pass, then the read loop. Returns `Ok` only
    /// on shutdown; any broker error bubbles up to the loop boundary in
    /// [`Self::run`].
    async fn poll(
        &self,
        broker: &F::Broker,
        backoff: &mut Backoff,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<()> {
        broker.ensure_group(&self.stream, &self.identity.group).await?;

        let recovered =
            recover_pending(broker, &self.stream, &self.identity, &self.config.recovery).await?;
        if !recovered.is_empty() {
            self.metrics.add_jobs_recovered(recovered.len() as u64);
            self.handle_entries(broker, recovered).await?;
        }

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            let entries = tokio::select! {
                _ = shutdown.changed() => return Ok(()),
                result = broker.read_group(
                    &self.stream,
                    &self.identity.group,
                    &self.identity.consumer,
                    self.config.read_count,
                    self.source.block(),
                ) => result?,
            };

            if entries.is_empty() {
                let delay = backoff.next_delay();
                debug!(
                    source = %self.source.name,
                    sleep_secs = delay.as_secs(),
                    "no new entries"
                );
                if sleep_or_shutdown(shutdown, delay).await {
                    return Ok(());
                }
                continue;
            }

            backoff.reset();
            self.handle_entries(broker, entries).await?;
        }
    }

    /// Dispatch entries sequentially, preserving broker delivery order
    /// within this source. Only an acknowledged entry is deleted.
    async fn handle_entries(&self, broker: &F::Broker, entries: Vec<RawEntry>) -> Result<()> {
        for entry in entries {
            let outcome = self.dispatcher.dispatch(&self.source.name, &entry).await;
            if outcome.ack {
                broker
                    .ack(&self.stream, &self.identity.group, &entry.id)
                    .await?;
                broker.delete(&self.stream, &entry.id).await?;
                debug!(
                    source = %self.source.name,
                    entry_id = %entry.id,
                    "entry acknowledged and deleted"
                );
            }
        }
        Ok(())
    }
}

/// Sleep for `delay`, returning early (true) when shutdown is signalled.
async fn sleep_or_shutdown(shutdown: &mut watch::Receiver<bool>, delay: Duration) -> bool {
    tokio::select! {
        _ = shutdown.changed() => true,
        _ = tokio::time::sleep(delay) => false,
    }
}
