//! Pending-entry recovery.
//!
//! A prior process instance may have died after reading an entry but before
//! acknowledging it. The broker guarantees delivery, not completion, so
//! without this pass such a job would stay pending forever. Because the
//! consumer name is stable across restarts, those orphaned entries are
//! attributable to this consumer and can be reclaimed.

use crate::config::{ConsumerIdentity, RecoveryConfig};
use crate::stream::broker::{RawEntry, StreamBroker};
use anyhow::Result;
use tracing::{debug, info, warn};

/// Reclaim entries left unacknowledged by a previous instance of this
/// consumer, returning them for dispatch through the normal path.
///
/// Entries idle for less than the configured threshold are left alone: they
/// may belong to a slow-but-alive attempt. Idempotent: with nothing newly
/// pending, a second pass claims zero entries. No prior instance is a no-op,
/// not an error.
pub async fn recover_pending<B: StreamBroker>(
    broker: &B,
    stream: &str,
    identity: &ConsumerIdentity,
    config: &RecoveryConfig,
) -> Result<Vec<RawEntry>> {
    let pending = broker
        .list_pending(stream, &identity.group, &identity.consumer, config.limit)
        .await?;

    if pending.is_empty() {
        debug!(stream, "no pending entries to recover");
        return Ok(Vec::new());
    }

    for entry in &pending {
        if entry.times_delivered > 1 {
            warn!(
                entry_id = %entry.id,
                times_delivered = entry.times_delivered,
                "entry has been redelivered repeatedly"
            );
        }
    }

    let ids: Vec<String> = pending.into_iter().map(|entry| entry.id).collect();
    let claimed = broker
        .claim(
            stream,
            &identity.group,
            &identity.consumer,
            config.min_idle(),
            &ids,
        )
        .await?;

    if !claimed.is_empty() {
        info!(
            stream,
            consumer = %identity.consumer,
            recovered = claimed.len(),
            "recovered pending entries from a previous instance"
        );
    }

    Ok(claimed)
}
