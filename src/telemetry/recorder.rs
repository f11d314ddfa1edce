//! # TelemetryRecorder: three ingest queues, one per telemetry table.
//!
//! ```text
//! record(TelemetryEvent) ─┬─ Message     ─► queue "message"      ─► TableSink<MessageEvent>
//!                         ├─ Build       ─► queue "vertex_build" ─► TableSink<BuildEvent>
//!                         └─ Transaction ─► queue "transaction"  ─► TableSink<TransactionEvent>
//! ```
//!
//! Recording is fire-and-forget: a refused event is counted as dropped by its
//! queue and logged at debug; nothing is returned to the caller. There is no
//! ordering across the three queues.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::model::{BuildEvent, MessageEvent, TelemetryEvent, TransactionEvent};
use super::sink::TableSink;
use crate::config::QueueConfig;
use crate::events::Bus;
use crate::queue::{BatchingIngestQueue, QueueStats, StopOutcome};
use crate::storage::{Record, Storage};

/// Per-queue stats of a [`TelemetryRecorder`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryStats {
    pub messages: QueueStats,
    pub builds: QueueStats,
    pub transactions: QueueStats,
}

impl TelemetryStats {
    /// Dropped items across all three queues.
    pub fn total_dropped(&self) -> u64 {
        self.messages.dropped + self.builds.dropped + self.transactions.dropped
    }
}

/// Persists message, build, and transaction events through dedicated queues.
pub struct TelemetryRecorder {
    messages: BatchingIngestQueue<MessageEvent>,
    builds: BatchingIngestQueue<BuildEvent>,
    transactions: BatchingIngestQueue<TransactionEvent>,
}

impl TelemetryRecorder {
    /// Builds the three queues with the same `cfg`; none is started yet.
    pub fn new(storage: Arc<dyn Storage>, cfg: &QueueConfig, bus: &Bus) -> Self {
        Self {
            messages: table_queue(&storage, cfg, bus),
            builds: table_queue(&storage, cfg, bus),
            transactions: table_queue(&storage, cfg, bus),
        }
    }

    /// Enqueues `event` on its queue. Never fails back to the caller.
    pub fn record(&self, event: impl Into<TelemetryEvent>) {
        let event = event.into();
        let table = event.table();
        let accepted = match event {
            TelemetryEvent::Message(ev) => self.messages.enqueue(ev),
            TelemetryEvent::Build(ev) => self.builds.enqueue(ev),
            TelemetryEvent::Transaction(ev) => self.transactions.enqueue(ev),
        };
        if !accepted {
            debug!(table, "telemetry event dropped");
        }
    }

    pub fn record_message(&self, event: MessageEvent) {
        self.record(event);
    }

    pub fn record_build(&self, event: BuildEvent) {
        self.record(event);
    }

    pub fn record_transaction(&self, event: TransactionEvent) {
        self.record(event);
    }

    /// Starts every consumer. Idempotent.
    pub fn start(&self) {
        self.messages.start();
        self.builds.start();
        self.transactions.start();
    }

    /// Stops the three queues concurrently, each bounded by `drain_timeout`.
    ///
    /// Returns the names of queues whose consumers had to be force-cancelled.
    pub async fn stop(&self, drain_timeout: Duration) -> Vec<String> {
        let (m, b, t) = tokio::join!(
            self.messages.stop(drain_timeout),
            self.builds.stop(drain_timeout),
            self.transactions.stop(drain_timeout),
        );

        [
            (self.messages.name(), m),
            (self.builds.name(), b),
            (self.transactions.name(), t),
        ]
        .into_iter()
        .filter(|(_, outcome)| *outcome == StopOutcome::Cancelled)
        .map(|(name, _)| name.to_string())
        .collect()
    }

    pub fn stats(&self) -> TelemetryStats {
        TelemetryStats {
            messages: self.messages.stats(),
            builds: self.builds.stats(),
            transactions: self.transactions.stats(),
        }
    }
}

fn table_queue<R>(storage: &Arc<dyn Storage>, cfg: &QueueConfig, bus: &Bus) -> BatchingIngestQueue<R>
where
    R: Record + std::fmt::Debug,
{
    BatchingIngestQueue::new(
        R::TABLE,
        cfg.clone(),
        Arc::new(TableSink::<R>::new(Arc::clone(storage))),
        bus.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, tables};
    use uuid::Uuid;

    fn cfg() -> QueueConfig {
        QueueConfig {
            capacity: 16,
            batch_size: 10,
            flush_interval: Duration::from_secs(60),
            drain_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn events_reach_their_tables_on_stop() {
        let storage = Arc::new(MemoryStorage::initialized());
        let rec = TelemetryRecorder::new(storage.clone(), &cfg(), &Bus::new(64));
        rec.start();

        let flow = Uuid::new_v4();
        rec.record_message(MessageEvent::new("User", "Ada", "hi", "s1").with_flow(flow));
        rec.record_build(BuildEvent::new(flow, "A", true));
        rec.record_transaction(TransactionEvent::new(flow, "A", "success").with_target("B"));
        rec.record_transaction(TransactionEvent::new(flow, "B", "error").with_error("boom"));

        let stuck = rec.stop(Duration::from_secs(1)).await;
        assert!(stuck.is_empty());

        assert_eq!(storage.rows(tables::MESSAGE).len(), 1);
        assert_eq!(storage.rows(tables::VERTEX_BUILD).len(), 1);
        assert_eq!(storage.rows(tables::TRANSACTION).len(), 2);
        assert_eq!(rec.stats().transactions.processed, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn uninitialised_storage_never_surfaces_errors() {
        let storage = Arc::new(MemoryStorage::new());
        let rec = TelemetryRecorder::new(storage, &cfg(), &Bus::new(64));
        rec.start();
        rec.record_message(MessageEvent::new("User", "Ada", "hi", "s1"));

        rec.stop(Duration::from_secs(1)).await;
        let stats = rec.stats();
        assert_eq!(stats.messages.failed, 0);
        assert_eq!(stats.messages.processed, 0);
        assert_eq!(stats.messages.skipped, 1);
        assert_eq!(stats.total_dropped(), 0);
    }
}
