//! Retry policies.
//!
//! ## Contents
//! - [`BackoffPolicy`] how long to wait after consecutive failures (first / factor / max + jitter)
//! - [`JitterPolicy`]  randomization strategy to avoid synchronized retries
//!
//! ## Wiring
//! ```text
//! RetentionConfig { failure_backoff_ms, failure_jitter }
//!      └─► RetentionSweeper loop:
//!           - purge() Ok  → reset failure count, sleep(interval)
//!           - purge() Err → sleep(backoff.next(failures)), failures += 1
//! ```

mod backoff;
mod jitter;

pub use backoff::BackoffPolicy;
pub use jitter::JitterPolicy;
