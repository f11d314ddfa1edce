//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by queue consumers, the task
//! fan-out, the retention sweeper and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `BatchingIngestQueue` consumers, `TaskNotificationFanout`,
//!   `RetentionSweeper`, `SubscriberSet` workers (overflow/panic), `Pipeline`.
//! - **Consumers**: the `Pipeline` listener (fans out to `SubscriberSet`).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
