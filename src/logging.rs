//! Structured logging for flowtrail hosts.
//!
//! The library itself only emits `tracing` records; a host process calls
//! [`init_logging`] once at startup to install a `tracing-subscriber` fmt
//! subscriber. `RUST_LOG` overrides [`LogConfig::level`] when set.
//!
//! ```no_run
//! use flowtrail::logging::{init_logging, LogConfig, LogFormat};
//!
//! init_logging(&LogConfig { level: "debug".into(), format: LogFormat::Json })?;
//! # Ok::<(), flowtrail::logging::LogError>(())
//! ```
//!
//! Field names used across the crate: `queue`, `table`, `items`, `task_id`,
//! `sweeper`, `rows`.

use serde::Deserialize;
use tracing_subscriber::{EnvFilter, fmt};

/// Output format for log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-friendly output for interactive use.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive (`trace`, `debug`, `info`, `flowtrail=debug,warn`, ...).
    pub level: String,
    /// Output format.
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Error type for logging initialization.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("logging already initialized")]
    AlreadyInitialized,

    #[error("invalid log filter {0:?}")]
    InvalidLevel(String),
}

/// Installs the global `tracing` subscriber.
pub fn init_logging(config: &LogConfig) -> Result<(), LogError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|_| LogError::InvalidLevel(config.level.clone()))?,
    };

    let builder = fmt().with_env_filter(filter).with_target(true);
    let installed = match config.format {
        LogFormat::Pretty => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|_| LogError::AlreadyInitialized)
}
