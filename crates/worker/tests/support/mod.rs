//! Test doubles for driving the engine without a real broker.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use veristream_domain::{TextPayload, Verdict};
use veristream_worker::config::SourceConfig;
use veristream_worker::processor::Processor;
use veristream_worker::stream::{BrokerFactory, PendingEntry, RawEntry, StreamBroker};

#[derive(Default)]
struct State {
    queued: VecDeque<RawEntry>,
    pending: Vec<PendingRecord>,
    acks: Vec<String>,
    deletes: Vec<String>,
    groups: Vec<(String, String)>,
}

struct PendingRecord {
    entry: RawEntry,
    /// Idle time as the broker would report it right now
    idle: Duration,
    times_delivered: usize,
}

/// In-process stand-in for one broker deployment.
#[derive(Clone, Default)]
pub struct MemoryBroker {
    state: Arc<Mutex<State>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue an entry as a producer would.
    pub fn push(&self, entry: RawEntry) {
        self.state.lock().queued.push_back(entry);
    }

    /// Seed an entry already delivered to this consumer but never
    /// acknowledged, as left behind by a crashed instance.
    pub fn push_pending(&self, entry: RawEntry, idle: Duration) {
        self.state.lock().pending.push(PendingRecord {
            entry,
            idle,
            times_delivered: 1,
        });
    }

    pub fn pending_ids(&self) -> Vec<String> {
        self.state
            .lock()
            .pending
            .iter()
            .map(|record| record.entry.id.clone())
            .collect()
    }

    pub fn acks(&self) -> Vec<String> {
        self.state.lock().acks.clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.state.lock().deletes.clone()
    }

    pub fn groups(&self) -> Vec<(String, String)> {
        self.state.lock().groups.clone()
    }
}

#[async_trait]
impl StreamBroker for MemoryBroker {
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<()> {
        let mut state = self.state.lock();
        let key = (stream.to_string(), group.to_string());
        if !state.groups.contains(&key) {
            state.groups.push(key);
        }
        Ok(())
    }

    async fn read_group(
        &self,
        _stream: &str,
        _group: &str,
        _consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<RawEntry>> {
        let entries: Vec<RawEntry> = {
            let mut state = self.state.lock();
            let take = count.min(state.queued.len());
            let entries: Vec<RawEntry> = state.queued.drain(..take).collect();
            for entry in &entries {
                state.pending.push(PendingRecord {
                    entry: entry.clone(),
                    idle: Duration::ZERO,
                    times_delivered: 1,
                });
            }
            entries
        };

        if entries.is_empty() {
            tokio::time::sleep(block.min(Duration::from_millis(20))).await;
        }
        Ok(entries)
    }

    async fn ack(&self, _stream: &str, _group: &str, entry_id: &str) -> Result<()> {
        let mut state = self.state.lock();
        state.acks.push(entry_id.to_string());
        state.pending.retain(|record| record.entry.id != entry_id);
        Ok(())
    }

    async fn delete(&self, _stream: &str, entry_id: &str) -> Result<()> {
        self.state.lock().deletes.push(entry_id.to_string());
        Ok(())
    }

    async fn list_pending(
        &self,
        _stream: &str,
        _group: &str,
        _consumer: &str,
        limit: usize,
    ) -> Result<Vec<PendingEntry>> {
        Ok(self
            .state
            .lock()
            .pending
            .iter()
            .take(limit)
            .map(|record| PendingEntry {
                id: record.entry.id.clone(),
                times_delivered: record.times_delivered,
            })
            .collect())
    }

    async fn claim(
        &self,
        _stream: &str,
        _group: &str,
        _consumer: &str,
        min_idle: Duration,
        entry_ids: &[String],
    ) -> Result<Vec<RawEntry>> {
        let mut state = self.state.lock();
        let mut claimed = Vec::new();
        for record in state.pending.iter_mut() {
            if entry_ids.contains(&record.entry.id) && record.idle >= min_idle {
                record.idle = Duration::ZERO;
                record.times_delivered += 1;
                claimed.push(record.entry.clone());
            }
        }
        Ok(claimed)
    }
}

/// Hands out [`MemoryBroker`]s by source name; sources marked as failing
/// refuse every connection attempt.
#[derive(Default)]
pub struct MemoryFactory {
    brokers: HashMap<String, MemoryBroker>,
    failing: HashSet<String>,
}

impl MemoryFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &str, broker: MemoryBroker) {
        self.brokers.insert(name.to_string(), broker);
    }

    pub fn fail(&mut self, name: &str) {
        self.failing.insert(name.to_string());
    }
}

#[async_trait]
impl BrokerFactory for MemoryFactory {
    type Broker = MemoryBroker;

    async fn connect(&self, source: &SourceConfig) -> Result<Self::Broker> {
        if self.failing.contains(&source.name) {
            bail!("connection refused");
        }
        self.brokers
            .get(&source.name)
            .cloned()
            .context("unknown source")
    }
}

/// Returns a fixed verdict and counts invocations.
pub struct CountingProcessor {
    pub verdict: Verdict,
    pub calls: AtomicUsize,
}

impl CountingProcessor {
    pub fn new(verdict: Verdict) -> Arc<Self> {
        Arc::new(Self {
            verdict,
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl Processor<TextPayload> for CountingProcessor {
    async fn process(&self, _payload: &TextPayload) -> Result<Verdict> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.verdict.clone())
    }
}

/// Fails every attempt, as a collaborator timing out would.
pub struct AlwaysFailProcessor;

#[async_trait]
impl Processor<TextPayload> for AlwaysFailProcessor {
    async fn process(&self, _payload: &TextPayload) -> Result<Verdict> {
        bail!("inference timed out")
    }
}

/// A stream entry carrying a well-formed text job.
pub fn text_entry(entry_id: &str, job_id: &str, callback_url: &str) -> RawEntry {
    let data = serde_json::json!({
        "jobId": job_id,
        "clientId": "c1",
        "callback_url": callback_url,
        "text": "Apples are not blue"
    });
    RawEntry {
        id: entry_id.to_string(),
        data: Some(data.to_string()),
    }
}

/// Poll until `predicate` holds or the deadline passes.
pub async fn wait_for(predicate: impl Fn() -> bool, deadline: Duration) -> bool {
    let result = tokio::time::timeout(deadline, async {
        while !predicate() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await;
    result.is_ok()
}
