//! # Consumer loop: the single background task of one queue.
//!
//! ```text
//! loop {
//!   ├─► wait = max(MIN_WAIT, flush_interval − since_last_flush)
//!   ├─► select (biased):
//!   │     ├─ shutdown token cancelled       → break
//!   │     ├─ item received                  → push, greedily take more (≤ batch_size)
//!   │     ├─ channel closed                 → break
//!   │     └─ wait elapsed                   → (no item)
//!   ├─► due = batch.len() ≥ batch_size
//!   │       ∨ since_last_flush ≥ flush_interval
//!   └─► if due: flush(batch) (if non-empty), last_flush = now
//! }
//! final drain:
//!   rx.close() ─► recv() remaining items ─► flush per batch_size ─► flush rest
//! ```
//!
//! ## Rules
//! - Exactly one consumer per queue; sink calls never overlap.
//! - Items are flushed in enqueue order.
//! - A failed flush is logged and discarded: at-most-once, no retry.
//! - A panicking sink counts as a failed flush; the loop keeps running.
//! - A batch whose table is not ready is counted as skipped, not processed.

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use super::sink::BatchSink;
use super::stats::Counters;
use crate::error::SinkError;
use crate::events::{Bus, Event, EventKind};
use crate::subscribers::panic_message;

/// Lower bound on a single wait, so an overdue window never busy-loops.
pub(crate) const MIN_WAIT: Duration = Duration::from_millis(100);

/// Items included in a failed-flush log line.
const FAILED_SAMPLE: usize = 3;

/// Everything the consumer needs besides the receiver.
pub(crate) struct Flusher<T: Send + Sync + 'static> {
    pub(crate) queue: Arc<str>,
    pub(crate) sink: Arc<dyn BatchSink<T>>,
    pub(crate) counters: Arc<Counters>,
    pub(crate) bus: Bus,
    pub(crate) batch_size: usize,
    pub(crate) flush_interval: Duration,
}

impl<T> Flusher<T>
where
    T: Debug + Send + Sync + 'static,
{
    /// Runs until `token` is cancelled or the channel closes, then drains.
    pub(crate) async fn run(self, mut rx: mpsc::Receiver<T>, token: CancellationToken) {
        self.bus
            .publish(Event::new(EventKind::ConsumerStarted).with_source(Arc::clone(&self.queue)));

        let mut batch: Vec<T> = Vec::with_capacity(self.batch_size);
        let mut last_flush = Instant::now();

        loop {
            let wait = self
                .flush_interval
                .saturating_sub(last_flush.elapsed())
                .max(MIN_WAIT);

            let shutdown = tokio::select! {
                biased;
                _ = token.cancelled() => true,
                res = time::timeout(wait, rx.recv()) => match res {
                    Ok(Some(item)) => {
                        batch.push(item);
                        while batch.len() < self.batch_size {
                            match rx.try_recv() {
                                Ok(next) => batch.push(next),
                                Err(_) => break,
                            }
                        }
                        false
                    }
                    Ok(None) => true,
                    Err(_elapsed) => false,
                },
            };
            if shutdown {
                break;
            }

            let window_elapsed = last_flush.elapsed() >= self.flush_interval;
            if batch.len() >= self.batch_size || window_elapsed {
                self.flush(&mut batch).await;
                last_flush = Instant::now();
            }
        }

        self.drain(rx, batch).await;
    }

    /// Closes the channel and flushes everything still buffered.
    pub(crate) async fn drain(&self, mut rx: mpsc::Receiver<T>, mut batch: Vec<T>) {
        rx.close();
        while let Some(item) = rx.recv().await {
            batch.push(item);
            if batch.len() >= self.batch_size {
                self.flush(&mut batch).await;
            }
        }
        self.flush(&mut batch).await;

        debug!(queue = %self.queue, "consumer drained");
        self.bus
            .publish(Event::new(EventKind::ConsumerStopped).with_source(Arc::clone(&self.queue)));
    }

    /// Hands `batch` to the sink and empties it. No-op for an empty batch.
    async fn flush(&self, batch: &mut Vec<T>) {
        if batch.is_empty() {
            return;
        }
        let len = batch.len();

        let write = std::panic::AssertUnwindSafe(self.sink.write_batch(batch.as_slice()))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(SinkError::Panicked {
                    info: panic_message(&*payload),
                })
            });

        match write {
            Ok(()) => {
                Counters::add(&self.counters.processed, len);
                Counters::add(&self.counters.flushes, 1);
                self.bus.publish(
                    Event::new(EventKind::BatchFlushed)
                        .with_source(Arc::clone(&self.queue))
                        .with_items(len as u64),
                );
            }
            Err(err) if err.is_not_ready() => {
                debug!(
                    queue = %self.queue,
                    sink = self.sink.name(),
                    items = len,
                    "table not ready; skipping batch"
                );
                Counters::add(&self.counters.skipped, len);
            }
            Err(err) => {
                let sample = &batch[..len.min(FAILED_SAMPLE)];
                error!(
                    queue = %self.queue,
                    sink = self.sink.name(),
                    items = len,
                    err = %err,
                    sample = ?sample,
                    "batch flush failed; discarding batch"
                );
                Counters::add(&self.counters.failed, len);
                self.bus.publish(
                    Event::new(EventKind::BatchFailed)
                        .with_source(Arc::clone(&self.queue))
                        .with_items(len as u64)
                        .with_reason(err.to_string()),
                );
            }
        }
        batch.clear();
    }
}
