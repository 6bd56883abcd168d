//! Broker access.
//!
//! [`StreamBroker`] is the thin contract the engine needs from one broker
//! connection: group creation, blocking group reads, acknowledgement, and the
//! pending-entry operations used by recovery. [`RedisBroker`] implements it
//! over Redis Streams consumer groups.
//!
//! The broker never retries internally; connection-level errors propagate to
//! the source loop, which owns the resilience policy.

use crate::config::SourceConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{
    StreamClaimReply, StreamId, StreamPendingCountReply, StreamReadOptions, StreamReadReply,
};
use redis::AsyncCommands;
use std::time::Duration;
use tracing::warn;

/// One entry as pulled from a stream.
///
/// `id` is broker-assigned and only ordered within its source. `data` is the
/// raw JSON job envelope; `None` when the entry has no `data` field at all,
/// which the dispatcher reports as a malformed job.
#[derive(Debug, Clone)]
pub struct RawEntry {
    pub id: String,
    pub data: Option<String>,
}

/// A pending entry as reported by the broker.
#[derive(Debug, Clone)]
pub struct PendingEntry {
    pub id: String,
    /// How often the entry has been delivered; > 1 suggests a repeatedly
    /// failing job
    pub times_delivered: usize,
}

/// Contract for one broker connection.
#[async_trait]
pub trait StreamBroker: Send + Sync + 'static {
    /// Create the consumer group at the stream tail if it does not exist.
    /// Idempotent: an already-existing group is not an error.
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<()>;

    /// Blocking read of new entries assigned to this consumer. An empty vec
    /// means the block duration elapsed without traffic, not an error.
    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<RawEntry>>;

    /// Acknowledge one entry for this group.
    async fn ack(&self, stream: &str, group: &str, entry_id: &str) -> Result<()>;

    /// Delete one entry from the stream. Bounds stream growth; only safe
    /// after acknowledgement.
    async fn delete(&self, stream: &str, entry_id: &str) -> Result<()>;

    /// List up to `limit` entries pending for this consumer.
    async fn list_pending(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        limit: usize,
    ) -> Result<Vec<PendingEntry>>;

    /// Claim the given pending entries if they have been idle for at least
    /// `min_idle`, returning the claimed messages.
    async fn claim(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        entry_ids: &[String],
    ) -> Result<Vec<RawEntry>>;
}

/// Produces broker connections for source loops.
///
/// Factored out so the engine can be driven against an in-process broker in
/// tests, and so a source that is down at startup can keep retrying its
/// connection without touching its siblings.
#[async_trait]
pub trait BrokerFactory: Send + Sync + 'static {
    type Broker: StreamBroker;

    async fn connect(&self, source: &SourceConfig) -> Result<Self::Broker>;
}

/// Redis Streams implementation of [`StreamBroker`].
#[derive(Clone)]
pub struct RedisBroker {
    conn: ConnectionManager,
}

impl RedisBroker {
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).context("invalid broker URL")?;
        let conn = ConnectionManager::new(client)
            .await
            .context("failed to connect to broker")?;
        Ok(Self { conn })
    }
}

#[async_trait]
impl StreamBroker for RedisBroker {
    async fn ensure_group(&self, stream: &str, group: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        match conn
            .xgroup_create_mkstream::<_, _, _, String>(stream, group, "$")
            .await
        {
            Ok(_) => Ok(()),
            // Group already exists: expected on every restart
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(e).context("failed to create consumer group"),
        }
    }

    async fn read_group(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<RawEntry>> {
        let mut conn = self.conn.clone();
        let options = StreamReadOptions::default()
            .group(group, consumer)
            .count(count)
            .block(block.as_millis() as usize);

        let reply: Option<StreamReadReply> = conn
            .xread_options(&[stream], &[">"], &options)
            .await
            .context("blocking group read failed")?;

        Ok(reply.map(entries_from_reply).unwrap_or_default())
    }

    async fn ack(&self, stream: &str, group: &str, entry_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let acked: i64 = conn
            .xack(stream, group, &[entry_id])
            .await
            .context("failed to acknowledge entry")?;
        if acked == 0 {
            // Already acknowledged or never pending; harmless either way
            warn!(entry_id, "acknowledgement was a no-op");
        }
        Ok(())
    }

    async fn delete(&self, stream: &str, entry_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .xdel(stream, &[entry_id])
            .await
            .context("failed to delete entry")?;
        Ok(())
    }

    async fn list_pending(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        limit: usize,
    ) -> Result<Vec<PendingEntry>> {
        let mut conn = self.conn.clone();
        let reply: StreamPendingCountReply = conn
            .xpending_consumer_count(stream, group, "-", "+", limit, consumer)
            .await
            .context("failed to list pending entries")?;

        Ok(reply
            .ids
            .into_iter()
            .map(|pending| PendingEntry {
                id: pending.id,
                times_delivered: pending.times_delivered,
            })
            .collect())
    }

    async fn claim(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle: Duration,
        entry_ids: &[String],
    ) -> Result<Vec<RawEntry>> {
        let mut conn = self.conn.clone();
        let reply: StreamClaimReply = conn
            .xclaim(
                stream,
                group,
                consumer,
                min_idle.as_millis() as usize,
                entry_ids,
            )
            .await
            .context("failed to claim pending entries")?;

        Ok(reply.ids.into_iter().map(entry_from_stream_id).collect())
    }
}

fn entries_from_reply(reply: StreamReadReply) -> Vec<RawEntry> {
    reply
        .keys
        .into_iter()
        .flat_map(|key| key.ids)
        .map(entry_from_stream_id)
        .collect()
}

fn entry_from_stream_id(id: StreamId) -> RawEntry {
    let data: Option<String> = id.get("data");
    RawEntry { id: id.id, data }
}

/// Connects [`RedisBroker`]s for source loops.
pub struct RedisFactory;

#[async_trait]
impl BrokerFactory for RedisFactory {
    type Broker = RedisBroker;

    async fn connect(&self, source: &SourceConfig) -> Result<Self::Broker> {
        RedisBroker::connect(&source.url).await
    }
}
