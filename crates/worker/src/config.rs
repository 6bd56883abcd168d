//! Worker configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Broker sources to poll, each one an independent loop
    pub sources: Vec<SourceConfig>,

    /// Consumer group name, shared by all worker instances of one kind
    pub group: String,

    /// Consumer name. Must stay stable across restarts: pending entries left
    /// by a crashed instance are only reclaimable under the same name.
    pub consumer: String,

    /// Stream key override; defaults to the job kind's stream
    #[serde(default)]
    pub stream_key: Option<String>,

    /// Maximum entries fetched per blocking read
    #[serde(default = "default_read_count")]
    pub read_count: usize,

    /// Idle backoff settings
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// Pending-entry recovery settings
    #[serde(default)]
    pub recovery: RecoveryConfig,

    /// Callback delivery settings
    #[serde(default)]
    pub callback: CallbackConfig,

    /// Inference endpoint settings
    #[serde(default)]
    pub inference: InferenceConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            group: "workers".to_string(),
            consumer: "worker-1".to_string(),
            stream_key: None,
            read_count: default_read_count(),
            backoff: BackoffConfig::default(),
            recovery: RecoveryConfig::default(),
            callback: CallbackConfig::default(),
            inference: InferenceConfig::default(),
        }
    }
}

impl WorkerConfig {
    /// Load configuration from an optional file plus `VERISTREAM_*`
    /// environment variables, layered over the defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let defaults = config::Config::try_from(&WorkerConfig::default())
            .context("failed to build default configuration")?;

        let mut builder = config::Config::builder().add_source(defaults);
        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("VERISTREAM").separator("__"),
        );

        builder
            .build()
            .context("failed to load configuration")?
            .try_deserialize()
            .context("invalid worker configuration")
    }
}

/// One broker source: an independently hosted deployment of the logical queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Name used in logs ("primary", "fallback", ...)
    pub name: String,

    /// Broker connection URL
    pub url: String,

    /// How long one blocking read waits for new entries (milliseconds)
    #[serde(default = "default_block_ms")]
    pub block_ms: u64,
}

impl SourceConfig {
    /// Build sources from a comma-separated URL list. The first URL is the
    /// primary deployment, the second the fallback; further URLs are numbered.
    pub fn from_url_list(urls: &str) -> Vec<SourceConfig> {
        urls.split(',')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .enumerate()
            .map(|(index, url)| SourceConfig {
                name: match index {
                    0 => "primary".to_string(),
                    1 => "fallback".to_string(),
                    n => format!("source-{}", n + 1),
                },
                url: url.to_string(),
                block_ms: default_block_ms(),
            })
            .collect()
    }

    /// Block duration for reads against this source.
    pub fn block(&self) -> Duration {
        Duration::from_millis(self.block_ms)
    }
}

/// Idle backoff between empty polls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Initial sleep after the first empty poll (seconds)
    pub floor_secs: u64,

    /// Sleep ceiling (seconds)
    pub ceiling_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            floor_secs: 1,
            ceiling_secs: 60,
        }
    }
}

/// Pending-entry recovery at source startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoveryConfig {
    /// Maximum pending entries listed per recovery pass
    pub limit: usize,

    /// Minimum idle time before an entry is claimed (milliseconds). Keeps a
    /// slow-but-alive attempt from being stolen from itself.
    pub min_idle_ms: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            limit: 10,
            min_idle_ms: 120_000,
        }
    }
}

impl RecoveryConfig {
    pub fn min_idle(&self) -> Duration {
        Duration::from_millis(self.min_idle_ms)
    }
}

/// Callback delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackConfig {
    /// Timeout for the single POST attempt (seconds)
    pub timeout_secs: u64,

    /// Secret for HMAC-signing outbound payloads; unsigned when absent
    #[serde(default)]
    pub hmac_secret: Option<String>,
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            hmac_secret: None,
        }
    }
}

impl CallbackConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// The external inference collaborator, reached over HTTP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// Endpoint the job payload is POSTed to
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Timeout for one inference call (seconds); inference may take minutes
    pub timeout_secs: u64,

    /// API tokens rotated through on auth or rate-limit rejections
    #[serde(default)]
    pub tokens: Vec<String>,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: 300,
            tokens: Vec::new(),
        }
    }
}

impl InferenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_read_count() -> usize {
    5
}

fn default_block_ms() -> u64 {
    5000
}

/// The `(group, consumer)` pair, static for the process lifetime.
#[derive(Debug, Clone)]
pub struct ConsumerIdentity {
    pub group: String,
    pub consumer: String,
}

impl ConsumerIdentity {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            group: config.group.clone(),
            consumer: config.consumer.clone(),
        }
    }
}
