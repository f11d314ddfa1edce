//! Retention: purge cadence parsing and the periodic sweeper.
//!
//! - [`parse_interval`] `<integer><m|h|d>` → [`Duration`](std::time::Duration)
//! - [`RetentionPolicy`], [`PurgeMode`] what a sweep removes and how often
//! - [`RetentionSweeper`] the timer loop with failure backoff

mod policy;
mod sweeper;

pub use policy::{PurgeMode, RetentionPolicy, parse_interval};
pub use sweeper::RetentionSweeper;
