//! Stream-queue plumbing: broker access, pending recovery, idle backoff.

pub mod backoff;
pub mod broker;
pub mod recovery;

pub use backoff::Backoff;
pub use broker::{BrokerFactory, PendingEntry, RawEntry, RedisBroker, RedisFactory, StreamBroker};
pub use recovery::recover_pending;
