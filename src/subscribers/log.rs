//! # LogWriter: renders runtime events through `tracing`
//!
//! A subscriber that turns each incoming [`Event`] into one structured
//! `tracing` record. Flush and purge successes log at `debug`, drops and
//! overflows at `warn`, failures at `error`.
//!
//! ## Example output (fmt layer)
//! ```text
//! DEBUG flowtrail::events: batch flushed queue="message" items=100
//!  WARN flowtrail::events: item dropped queue="build" reason="enqueue_capacity_exceeded"
//! ERROR flowtrail::events: batch failed queue="transaction" items=12 err="disk full"
//!  INFO flowtrail::events: purge completed sweeper="retention" rows=4812
//! ```

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

const TARGET: &str = "flowtrail::events";

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let source = e.source.as_deref().unwrap_or("-");
        let reason = e.reason.as_deref().unwrap_or("-");

        match e.kind {
            EventKind::ConsumerStarted => {
                debug!(target: TARGET, queue = source, "consumer started");
            }
            EventKind::ConsumerStopped => {
                debug!(target: TARGET, queue = source, "consumer stopped");
            }
            EventKind::DrainTimedOut => {
                warn!(target: TARGET, queue = source, timeout_ms = ?e.timeout_ms, "drain timed out; consumer cancelled");
            }
            EventKind::ItemDropped => {
                warn!(target: TARGET, queue = source, reason, "item dropped");
            }
            EventKind::BatchFlushed => {
                debug!(target: TARGET, queue = source, items = ?e.items, "batch flushed");
            }
            EventKind::BatchFailed => {
                error!(target: TARGET, queue = source, items = ?e.items, err = reason, "batch failed");
            }
            EventKind::TaskCreated => {
                debug!(target: TARGET, task_id = ?e.task_id, "task created");
            }
            EventKind::TaskUpdated => {
                debug!(target: TARGET, task_id = ?e.task_id, "task updated");
            }
            EventKind::TaskDeleted => {
                debug!(target: TARGET, task_id = ?e.task_id, "task deleted");
            }
            EventKind::NotificationsAppended => {
                debug!(target: TARGET, task_id = ?e.task_id, count = ?e.items, "notifications appended");
            }
            EventKind::PurgeCompleted => {
                info!(target: TARGET, sweeper = source, rows = ?e.items, "purge completed");
            }
            EventKind::PurgeFailed => {
                error!(
                    target: TARGET,
                    sweeper = source,
                    err = reason,
                    retry_in_ms = ?e.delay_ms,
                    failures = ?e.attempt,
                    "purge failed"
                );
            }
            EventKind::SweeperDisabled => {
                warn!(target: TARGET, sweeper = source, interval = reason, "sweeper disabled");
            }
            EventKind::ShutdownRequested => {
                info!(target: TARGET, "shutdown requested");
            }
            EventKind::SubscriberOverflow => {
                warn!(target: TARGET, subscriber = source, reason, "subscriber overflow");
            }
            EventKind::SubscriberPanicked => {
                error!(target: TARGET, subscriber = source, info = reason, "subscriber panicked");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
