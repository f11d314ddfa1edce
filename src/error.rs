//! Error types used by the flowtrail runtime.
//!
//! One enum per failure domain:
//!
//! - [`StorageError`] raised by a [`Storage`](crate::storage::Storage) backend.
//! - [`SinkError`] raised when a batch flush fails.
//! - [`EnqueueError`] raised when a producer's item is refused by a queue.
//! - [`FanoutError`] raised by task mutations (surfaced to the caller).
//! - [`RetentionError`] raised by interval parsing and purge sweeps.
//! - [`ConfigError`] raised while loading configuration.
//! - [`RuntimeError`] raised by the [`Pipeline`](crate::Pipeline) host lifecycle.
//!
//! Every enum provides `as_label()`, a short stable snake_case label for logs/metrics.

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

/// # Errors produced by a storage backend.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StorageError {
    /// The table has not been created yet (telemetry storage not initialised).
    ///
    /// This is an expected soft condition during startup; callers route it to a
    /// no-op/log path instead of treating it as a failure.
    #[error("table {table:?} is not ready")]
    NotReady {
        /// Name of the missing table.
        table: String,
    },

    /// A row could not be encoded to or decoded from its stored form.
    #[error("row codec failed: {0}")]
    Codec(#[from] serde_json::Error),

    /// Backend-specific failure.
    #[error("storage backend failed: {error}")]
    Backend {
        /// The underlying error message.
        error: String,
    },
}

impl StorageError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use flowtrail::StorageError;
    ///
    /// let err = StorageError::NotReady { table: "message".into() };
    /// assert_eq!(err.as_label(), "storage_not_ready");
    /// assert!(err.is_not_ready());
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StorageError::NotReady { .. } => "storage_not_ready",
            StorageError::Codec(_) => "storage_codec",
            StorageError::Backend { .. } => "storage_backend",
        }
    }

    /// True for the "table does not exist yet" condition.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, StorageError::NotReady { .. })
    }
}

/// # Errors produced while flushing a batch to its sink.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum SinkError {
    /// The durable write failed inside the storage layer.
    #[error("sink storage write failed: {0}")]
    Storage(#[from] StorageError),

    /// Sink-specific failure.
    #[error("sink write failed: {error}")]
    Write {
        /// The underlying error message.
        error: String,
    },

    /// The sink panicked while writing.
    #[error("sink panicked: {info}")]
    Panicked {
        /// Panic payload rendered as text.
        info: String,
    },
}

impl SinkError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            SinkError::Storage(_) => "sink_storage",
            SinkError::Write { .. } => "sink_write",
            SinkError::Panicked { .. } => "sink_panicked",
        }
    }

    /// True when the destination table does not exist yet.
    ///
    /// The queue counts such a batch as skipped, not as failed.
    pub fn is_not_ready(&self) -> bool {
        matches!(self, SinkError::Storage(err) if err.is_not_ready())
    }

    /// Builds a [`SinkError::Write`] from any displayable error.
    pub fn write(error: impl std::fmt::Display) -> Self {
        SinkError::Write {
            error: error.to_string(),
        }
    }
}

/// # Reasons an item was refused by a queue.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// The queue holds `capacity` items already; the item was dropped.
    #[error("queue capacity exceeded")]
    CapacityExceeded,

    /// The queue was stopped; it no longer accepts items.
    #[error("queue closed")]
    Closed,
}

impl EnqueueError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            EnqueueError::CapacityExceeded => "enqueue_capacity_exceeded",
            EnqueueError::Closed => "enqueue_closed",
        }
    }
}

/// # Errors produced by task mutations.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum FanoutError {
    /// No task with this id exists.
    #[error("task with id {id} not found")]
    NotFound {
        /// The unknown task id.
        id: Uuid,
    },

    /// The storage layer failed.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl FanoutError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use flowtrail::FanoutError;
    ///
    /// let err = FanoutError::NotFound { id: uuid::Uuid::nil() };
    /// assert_eq!(err.as_label(), "task_not_found");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            FanoutError::NotFound { .. } => "task_not_found",
            FanoutError::Storage(_) => "task_storage",
        }
    }
}

/// # Errors produced by the retention sweeper.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RetentionError {
    /// The purge cadence string is not `<integer><m|h|d>`.
    #[error("invalid purge interval {input:?}; expected <integer><m|h|d>")]
    InvalidInterval {
        /// The rejected input.
        input: String,
    },

    /// A sweep tick failed in the storage layer.
    #[error("purge failed: {0}")]
    Purge(#[from] StorageError),
}

impl RetentionError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            RetentionError::InvalidInterval { .. } => "retention_invalid_interval",
            RetentionError::Purge(_) => "retention_purge_failed",
        }
    }
}

/// # Errors produced while loading configuration.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration text is not valid TOML for [`Config`](crate::Config).
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::Io(_) => "config_io",
            ConfigError::Parse(_) => "config_parse",
        }
    }
}

/// # Errors produced by the pipeline host lifecycle.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// One or more queue consumers did not drain within the timeout and were force-cancelled.
    #[error("drain timeout {timeout:?} exceeded; force-cancelled: {stuck:?}")]
    DrainExceeded {
        /// The configured drain timeout.
        timeout: Duration,
        /// Names of the queues whose consumers were cancelled.
        stuck: Vec<String>,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use flowtrail::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::DrainExceeded { timeout: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_drain_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::DrainExceeded { .. } => "runtime_drain_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::DrainExceeded { timeout, stuck } => {
                format!("drain exceeded after {timeout:?}; cancelled queues={stuck:?}")
            }
        }
    }
}
