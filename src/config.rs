//! # Runtime configuration.
//!
//! Provides [`Config`] centralized settings for the pipeline, with nested
//! [`QueueConfig`] (applied to every telemetry queue) and [`RetentionConfig`]
//! (the sweeper).
//!
//! Config is read once at startup, either built in code or loaded from TOML:
//!
//! ```toml
//! bus_capacity = 2048
//!
//! [queue]
//! capacity = 5000
//! batch_size = 50
//! flush_interval_ms = 500
//! drain_timeout_ms = 3000
//!
//! [retention]
//! purge_interval = "6h"
//! mode = "full_wipe"
//! failure_backoff_ms = 60000
//! ```
//!
//! ## Sentinel values
//! - `capacity = 0` / `batch_size = 0` → clamped to 1 by the helper accessors
//! - an unparsable `purge_interval` disables the sweeper (logged, not fatal)

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::ConfigError;
use crate::policies::{BackoffPolicy, JitterPolicy};
use crate::retention::PurgeMode;

/// Global configuration for the pipeline runtime.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Settings shared by the message, build, and transaction queues.
    pub queue: QueueConfig,

    /// Retention sweeper settings.
    pub retention: RetentionConfig,

    /// Capacity of the event bus broadcast channel ring buffer.
    ///
    /// Slow receivers that lag behind more than `bus_capacity` messages
    /// skip older items. Minimum value is 1.
    pub bus_capacity: usize,
}

impl Config {
    /// Parses a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            retention: RetentionConfig::default(),
            bus_capacity: 1024,
        }
    }
}

/// Sizing and timing for a [`BatchingIngestQueue`](crate::BatchingIngestQueue).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum number of items waiting in the queue; further enqueues are dropped.
    pub capacity: usize,

    /// Flush as soon as this many items are batched.
    pub batch_size: usize,

    /// Flush a non-empty batch at least this often.
    #[serde(rename = "flush_interval_ms", deserialize_with = "duration_ms")]
    pub flush_interval: Duration,

    /// How long `stop` waits for the consumer before force-cancelling it.
    #[serde(rename = "drain_timeout_ms", deserialize_with = "duration_ms")]
    pub drain_timeout: Duration,
}

impl QueueConfig {
    /// Queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn capacity_clamped(&self) -> usize {
        self.capacity.max(1)
    }

    /// Batch size clamped to a minimum of 1.
    #[inline]
    pub fn batch_size_clamped(&self) -> usize {
        self.batch_size.max(1)
    }
}

impl Default for QueueConfig {
    /// - `capacity = 10_000`
    /// - `batch_size = 100`
    /// - `flush_interval = 1s`
    /// - `drain_timeout = 5s`
    fn default() -> Self {
        Self {
            capacity: 10_000,
            batch_size: 100,
            flush_interval: Duration::from_secs(1),
            drain_timeout: Duration::from_secs(5),
        }
    }
}

/// Settings for the [`RetentionSweeper`](crate::RetentionSweeper).
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RetentionConfig {
    /// Sweep cadence as `<integer><m|h|d>`, e.g. `"2h"`.
    pub purge_interval: String,

    /// Which rows a sweep removes.
    pub mode: PurgeMode,

    /// Delay before retrying after a failed purge.
    #[serde(rename = "failure_backoff_ms", deserialize_with = "duration_ms")]
    pub failure_backoff: Duration,

    /// Jitter applied to the failure backoff.
    pub failure_jitter: JitterPolicy,
}

impl RetentionConfig {
    /// The retry policy the sweeper uses after a failed purge.
    pub fn backoff(&self) -> BackoffPolicy {
        BackoffPolicy {
            jitter: self.failure_jitter,
            ..BackoffPolicy::constant(self.failure_backoff)
        }
    }
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            purge_interval: "2h".to_string(),
            mode: PurgeMode::default(),
            failure_backoff: Duration::from_secs(60),
            failure_jitter: JitterPolicy::None,
        }
    }
}

fn duration_ms<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}
