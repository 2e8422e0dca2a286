//! Orderer configuration with TOML file support.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::logging::LogFormat;
use crate::OrdererError;

/// Limits that decide when the batch cutter closes a batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSize {
    /// Cut as soon as a batch holds this many envelopes.
    #[serde(default = "default_max_message_count")]
    pub max_message_count: u32,

    /// Largest envelope accepted onto the channel, in bytes.
    #[serde(default = "default_absolute_max_bytes")]
    pub absolute_max_bytes: u64,

    /// Target batch size in bytes. Batches are cut before they would exceed
    /// it; a single larger envelope travels alone.
    #[serde(default = "default_preferred_max_bytes")]
    pub preferred_max_bytes: u64,
}

impl BatchSize {
    pub fn validate(&self) -> Result<(), String> {
        if self.max_message_count == 0 {
            return Err("max_message_count must be greater than zero".into());
        }
        if self.preferred_max_bytes == 0 {
            return Err("preferred_max_bytes must be greater than zero".into());
        }
        if self.preferred_max_bytes > self.absolute_max_bytes {
            return Err(format!(
                "preferred_max_bytes ({}) exceeds absolute_max_bytes ({})",
                self.preferred_max_bytes, self.absolute_max_bytes
            ));
        }
        Ok(())
    }
}

impl Default for BatchSize {
    fn default() -> Self {
        Self {
            max_message_count: default_max_message_count(),
            absolute_max_bytes: default_absolute_max_bytes(),
            preferred_max_bytes: default_preferred_max_bytes(),
        }
    }
}

/// Configuration for an orderer serving one channel.
///
/// Can be loaded from a TOML file via [`OrdererConfig::from_toml_file`] or
/// built programmatically (e.g. for tests).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrdererConfig {
    /// Data directory for ledger and history storage.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Channel this orderer sequences.
    #[serde(default = "default_channel_id")]
    pub channel_id: String,

    /// Capacity of the submission queue; submissions beyond it are rejected.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Initial batch timeout in milliseconds (config blocks may change it).
    #[serde(default = "default_batch_timeout_ms")]
    pub batch_timeout_ms: u64,

    /// Initial batch size limits (config blocks may change them).
    #[serde(default)]
    pub batch_size: BatchSize,

    /// Whether the per-key history index is maintained.
    #[serde(default = "default_true")]
    pub history_enabled: bool,

    /// Extra attempts at writing a block before it is dropped.
    #[serde(default = "default_max_write_retries")]
    pub max_write_retries: u32,

    /// LMDB map size in bytes.
    #[serde(default = "default_lmdb_map_size")]
    pub lmdb_map_size: usize,

    /// Open LMDB without per-commit fsync; durable writes then sync explicitly.
    #[serde(default)]
    pub lmdb_no_sync: bool,

    /// Log format: "human" or "json".
    #[serde(default = "default_log_format")]
    pub log_format: String,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Whether Prometheus metrics can be gathered.
    #[serde(default)]
    pub enable_metrics: bool,
}

// ── Serde default helpers ──────────────────────────────────────────────

fn default_max_message_count() -> u32 {
    10
}

fn default_absolute_max_bytes() -> u64 {
    10 * 1024 * 1024
}

fn default_preferred_max_bytes() -> u64 {
    2 * 1024 * 1024
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./ledgerline_data")
}

fn default_channel_id() -> String {
    "system-channel".to_string()
}

fn default_queue_capacity() -> usize {
    1000
}

fn default_batch_timeout_ms() -> u64 {
    2000
}

fn default_true() -> bool {
    true
}

fn default_max_write_retries() -> u32 {
    3
}

fn default_lmdb_map_size() -> usize {
    1024 * 1024 * 1024
}

fn default_log_format() -> String {
    "human".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

// ── Impl ───────────────────────────────────────────────────────────────

impl OrdererConfig {
    /// Load configuration from a TOML file.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, OrdererError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| OrdererError::Config(e.to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self, OrdererError> {
        let config: Self = toml::from_str(s).map_err(|e| OrdererError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize the configuration to a TOML string.
    pub fn to_toml_string(&self) -> Result<String, OrdererError> {
        toml::to_string_pretty(self).map_err(|e| OrdererError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), OrdererError> {
        if self.channel_id.is_empty() {
            return Err(OrdererError::Config("channel_id must not be empty".into()));
        }
        if self.queue_capacity == 0 {
            return Err(OrdererError::Config(
                "queue_capacity must be greater than zero".into(),
            ));
        }
        if self.batch_timeout_ms == 0 {
            return Err(OrdererError::Config(
                "batch_timeout_ms must be greater than zero".into(),
            ));
        }
        self.batch_size.validate().map_err(OrdererError::Config)?;
        self.log_format()?;
        Ok(())
    }

    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }

    pub fn log_format(&self) -> Result<LogFormat, OrdererError> {
        self.log_format.parse()
    }
}

impl Default for OrdererConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            channel_id: default_channel_id(),
            queue_capacity: default_queue_capacity(),
            batch_timeout_ms: default_batch_timeout_ms(),
            batch_size: BatchSize::default(),
            history_enabled: default_true(),
            max_write_retries: default_max_write_retries(),
            lmdb_map_size: default_lmdb_map_size(),
            lmdb_no_sync: false,
            log_format: default_log_format(),
            log_level: default_log_level(),
            enable_metrics: false,
        }
    }
}
