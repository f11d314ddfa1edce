//! # Event subscribers for the flowtrail runtime.
//!
//! This module provides the [`Subscribe`] trait and built-in implementations
//! for handling runtime events broadcast through the [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! Event flow:
//!   queue consumer ── publish(Event) ──► Bus ──► Pipeline listener ──► SubscriberSet::emit
//!                                                                          │
//!                                                                ┌─────────┼─────────┐
//!                                                                ▼         ▼         ▼
//!                                                            LogWriter   Metrics   Custom
//! ```

#[cfg(feature = "logging")]
mod log;
mod subscriber;
mod subscriber_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use subscriber::Subscribe;
pub use subscriber_set::SubscriberSet;
pub(crate) use subscriber_set::panic_message;
