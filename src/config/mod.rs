//! Configuration for the veil sync daemon.

use crate::error::{Result, VeilError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration for a veil process.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct VeilConfig {
    /// Source and target collection names.
    pub collections: CollectionsConfig,
    /// Sync pipeline configuration.
    pub sync: SyncConfig,
    /// Synthetic producer configuration.
    pub producer: ProducerConfig,
    /// Observability configuration.
    pub observability: ObservabilityConfig,
}

impl VeilConfig {
    /// Load configuration from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| VeilError::Config(format!("failed to read config file: {}", e)))?;

        let config: Self = serde_json::from_str(&content)
            .map_err(|e| VeilError::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.collections.source == self.collections.target {
            return Err(VeilError::InvalidConfig {
                field: "collections.target".to_string(),
                reason: "source and target collections must differ".to_string(),
            });
        }

        if self.sync.flush_interval.is_zero() {
            return Err(VeilError::InvalidConfig {
                field: "sync.flush_interval".to_string(),
                reason: "flush interval must be non-zero".to_string(),
            });
        }

        if self.sync.eager_flush_threshold == 0 {
            return Err(VeilError::InvalidConfig {
                field: "sync.eager_flush_threshold".to_string(),
                reason: "eager flush threshold must be non-zero".to_string(),
            });
        }

        if self.sync.reindex_page_size == 0 || self.sync.reindex_chunk_size == 0 {
            return Err(VeilError::InvalidConfig {
                field: "sync.reindex_chunk_size".to_string(),
                reason: "reindex page and chunk sizes must be non-zero".to_string(),
            });
        }

        if self.producer.min_batch == 0 || self.producer.max_batch < self.producer.min_batch {
            return Err(VeilError::InvalidConfig {
                field: "producer.max_batch".to_string(),
                reason: "producer batch range must satisfy 1 <= min <= max".to_string(),
            });
        }

        Ok(())
    }

    /// Create a development configuration with fast timers, for local
    /// runs against the in-memory store.
    pub fn development() -> Self {
        Self {
            sync: SyncConfig {
                flush_interval: Duration::from_millis(200),
                ..SyncConfig::default()
            },
            producer: ProducerConfig {
                interval: Duration::from_millis(50),
                ..ProducerConfig::default()
            },
            ..Self::default()
        }
    }
}

/// Collection names on either end of the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionsConfig {
    /// Collection holding the raw customer records.
    pub source: String,
    /// Collection receiving the anonymized copies.
    pub target: String,
}

impl Default for CollectionsConfig {
    fn default() -> Self {
        Self {
            source: "customers".to_string(),
            target: "customers_anonymised".to_string(),
        }
    }
}

/// Sync pipeline tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Interval between scheduled buffer flushes.
    #[serde(with = "humantime_serde")]
    pub flush_interval: Duration,
    /// Pending entries beyond which the listener flushes eagerly.
    pub eager_flush_threshold: usize,
    /// Fixed delay before re-subscribing after a feed disruption.
    #[serde(with = "humantime_serde")]
    pub reconnect_backoff: Duration,
    /// Server-side page size for the reindex scan.
    pub reindex_page_size: usize,
    /// Records per reindex chunk between synchronous flushes.
    pub reindex_chunk_size: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(1),
            eager_flush_threshold: 1000,
            reconnect_backoff: Duration::from_secs(5),
            reindex_page_size: 1000,
            reindex_chunk_size: 1000,
        }
    }
}

/// Synthetic customer producer tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Interval between generated batches.
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Minimum customers per batch.
    pub min_batch: usize,
    /// Maximum customers per batch.
    pub max_batch: usize,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(200),
            min_batch: 1,
            max_batch: 10,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default log level when RUST_LOG is unset.
    pub log_level: String,
    /// Emit logs as JSON lines instead of human-readable text.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}
