//! # BatchingIngestQueue: bounded, non-blocking, batch-flushing queue.
//!
//! Producers call [`BatchingIngestQueue::enqueue`] from the request path; it
//! never waits. A single consumer task (spawned by
//! [`start`](BatchingIngestQueue::start)) accumulates items and flushes them to
//! a [`BatchSink`] by size or by time.
//!
//! ## Architecture
//! ```text
//! producer ─┐                          ┌────────── consumer task ──────────┐
//! producer ─┼─► try_send ─► [mpsc(capacity)] ─► batch ─► sink.write_batch()│
//! producer ─┘      │                   └───────────────────────────────────┘
//!                  └─ full/closed → dropped += 1, ItemDropped
//! ```
//!
//! ## Lifecycle
//! ```text
//! new() ──► start() ──► … enqueue … ──► stop(drain_timeout)
//!   │          │                            ├─ cancel token, close channel
//!   │          └─ idempotent                ├─ consumer drains + final flush
//!   │                                       └─ not done in time → abort (partial batch lost)
//!   └─ items enqueued before start() wait in the channel
//! ```
//!
//! A stopped queue stays stopped: `start()` after `stop()` returns `false`.

use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::consumer::Flusher;
use super::sink::BatchSink;
use super::stats::{Counters, QueueStats};
use crate::config::QueueConfig;
use crate::error::EnqueueError;
use crate::events::{Bus, Event, EventKind};

/// How a call to [`BatchingIngestQueue::stop`] ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The consumer finished its final flush within the drain timeout.
    Drained,
    /// The consumer was force-cancelled; its partial batch may be lost.
    Cancelled,
    /// The queue had already been stopped.
    AlreadyStopped,
}

/// Handle to the running consumer.
struct Worker {
    join: JoinHandle<()>,
    token: CancellationToken,
}

/// Bounded producer/consumer queue that flushes batches to a pluggable sink.
pub struct BatchingIngestQueue<T: Send + Sync + 'static> {
    name: Arc<str>,
    cfg: QueueConfig,
    tx: mpsc::Sender<T>,
    rx: Mutex<Option<mpsc::Receiver<T>>>,
    sink: Arc<dyn BatchSink<T>>,
    counters: Arc<Counters>,
    bus: Bus,
    worker: Mutex<Option<Worker>>,
    closed: AtomicBool,
}

impl<T> BatchingIngestQueue<T>
where
    T: Debug + Send + Sync + 'static,
{
    /// Creates a stopped queue. Call [`start`](Self::start) to spawn the consumer.
    pub fn new(
        name: impl Into<Arc<str>>,
        cfg: QueueConfig,
        sink: Arc<dyn BatchSink<T>>,
        bus: Bus,
    ) -> Self {
        let (tx, rx) = mpsc::channel(cfg.capacity_clamped());
        Self {
            name: name.into(),
            cfg,
            tx,
            rx: Mutex::new(Some(rx)),
            sink,
            counters: Arc::new(Counters::default()),
            bus,
            worker: Mutex::new(None),
            closed: AtomicBool::new(false),
        }
    }

    /// Queue name used in logs and events.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Offers an item without waiting. Returns `false` if it was dropped.
    pub fn enqueue(&self, item: T) -> bool {
        self.try_enqueue(item).is_ok()
    }

    /// Offers an item without waiting, reporting why a refused item was dropped.
    ///
    /// Every refusal increments `dropped` by exactly one.
    pub fn try_enqueue(&self, item: T) -> Result<(), EnqueueError> {
        let refused = if self.closed.load(Ordering::Acquire) {
            EnqueueError::Closed
        } else {
            match self.tx.try_send(item) {
                Ok(()) => return Ok(()),
                Err(mpsc::error::TrySendError::Full(_)) => EnqueueError::CapacityExceeded,
                Err(mpsc::error::TrySendError::Closed(_)) => EnqueueError::Closed,
            }
        };

        Counters::add(&self.counters.dropped, 1);
        self.bus.publish(
            Event::new(EventKind::ItemDropped)
                .with_source(Arc::clone(&self.name))
                .with_reason(refused.as_label()),
        );
        Err(refused)
    }

    /// Spawns the consumer if it is not running. Idempotent.
    ///
    /// Returns `true` if this call spawned it. Must be called within a tokio runtime.
    pub fn start(&self) -> bool {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return false;
        }
        let Some(rx) = self.rx.lock().take() else {
            warn!(queue = %self.name, "queue was stopped; refusing to restart");
            return false;
        };

        let token = CancellationToken::new();
        let join = tokio::spawn(self.flusher().run(rx, token.clone()));
        *worker = Some(Worker { join, token });
        debug!(queue = %self.name, "consumer spawned");
        true
    }

    /// Stops the queue, draining buffered items to the sink.
    ///
    /// Waits up to `drain_timeout` for the consumer to flush its current batch and
    /// everything still queued; aborts it afterwards. If the consumer was never
    /// started, buffered items are flushed inline.
    pub async fn stop(&self, drain_timeout: Duration) -> StopOutcome {
        if self.closed.swap(true, Ordering::AcqRel) {
            return StopOutcome::AlreadyStopped;
        }

        let worker = self.worker.lock().take();
        let Some(Worker { mut join, token }) = worker else {
            let rx = self.rx.lock().take();
            if let Some(rx) = rx {
                self.flusher().drain(rx, Vec::new()).await;
            }
            return StopOutcome::Drained;
        };

        token.cancel();
        match time::timeout(drain_timeout, &mut join).await {
            Ok(_) => StopOutcome::Drained,
            Err(_) => {
                join.abort();
                let _ = join.await;
                warn!(queue = %self.name, timeout = ?drain_timeout, "consumer did not drain in time; cancelled");
                self.bus.publish(
                    Event::new(EventKind::DrainTimedOut)
                        .with_source(Arc::clone(&self.name))
                        .with_timeout(drain_timeout),
                );
                StopOutcome::Cancelled
            }
        }
    }

    /// True while the consumer task is alive.
    pub fn is_running(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|w| !w.join.is_finished())
    }

    /// Read-only snapshot of sizes and counters.
    pub fn stats(&self) -> QueueStats {
        let capacity = self.cfg.capacity_clamped();
        QueueStats {
            queue_size: capacity.saturating_sub(self.tx.capacity()),
            processed: Counters::get(&self.counters.processed),
            dropped: Counters::get(&self.counters.dropped),
            failed: Counters::get(&self.counters.failed),
            skipped: Counters::get(&self.counters.skipped),
            flushes: Counters::get(&self.counters.flushes),
            capacity,
            batch_size: self.cfg.batch_size_clamped(),
            flush_interval: self.cfg.flush_interval,
        }
    }

    fn flusher(&self) -> Flusher<T> {
        Flusher {
            queue: Arc::clone(&self.name),
            sink: Arc::clone(&self.sink),
            counters: Arc::clone(&self.counters),
            bus: self.bus.clone(),
            batch_size: self.cfg.batch_size_clamped(),
            flush_interval: self.cfg.flush_interval,
        }
    }
}

impl<T: Send + Sync + 'static> Drop for BatchingIngestQueue<T> {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.get_mut().take() {
            worker.token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use crate::queue::SinkFn;
    use tracing_test::traced_test;

    type Seen = Arc<Mutex<Vec<Vec<u32>>>>;

    fn recording_sink(seen: Seen) -> Arc<dyn BatchSink<u32>> {
        SinkFn::arc("recording", move |batch: Vec<u32>| {
            let seen = Arc::clone(&seen);
            async move {
                seen.lock().push(batch);
                Ok::<_, SinkError>(())
            }
        })
    }

    fn cfg(capacity: usize, batch_size: usize, flush_ms: u64) -> QueueConfig {
        QueueConfig {
            capacity,
            batch_size,
            flush_interval: Duration::from_millis(flush_ms),
            drain_timeout: Duration::from_secs(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn refusals_beyond_capacity_are_counted_once_each() {
        let seen = Seen::default();
        let q = BatchingIngestQueue::new("t", cfg(3, 10, 1000), recording_sink(seen), Bus::new(8));

        let accepted = (0..5).filter(|&n| q.enqueue(n)).count();
        assert_eq!(accepted, 3);
        assert_eq!(q.try_enqueue(9), Err(EnqueueError::CapacityExceeded));

        let stats = q.stats();
        assert_eq!(stats.dropped, 3);
        assert_eq!(stats.queue_size, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent() {
        let q = BatchingIngestQueue::new("t", cfg(8, 2, 1000), recording_sink(Seen::default()), Bus::new(8));
        assert!(q.start());
        assert!(!q.start());
        assert!(q.is_running());
        assert_eq!(q.stop(Duration::from_secs(1)).await, StopOutcome::Drained);
        assert!(!q.start());
        assert_eq!(q.stop(Duration::from_secs(1)).await, StopOutcome::AlreadyStopped);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_without_start_flushes_inline() {
        let seen = Seen::default();
        let q = BatchingIngestQueue::new("t", cfg(8, 10, 1000), recording_sink(seen.clone()), Bus::new(8));
        q.enqueue(1);
        q.enqueue(2);

        assert_eq!(q.stop(Duration::from_secs(1)).await, StopOutcome::Drained);
        assert_eq!(*seen.lock(), vec![vec![1, 2]]);
        assert!(!q.enqueue(3));
        assert_eq!(q.stats().dropped, 1);
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn failed_flush_is_logged_and_not_retried() {
        let calls = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&calls);
        let sink: Arc<dyn BatchSink<u32>> = SinkFn::arc("broken", move |_batch: Vec<u32>| {
            let counter = Arc::clone(&counter);
            async move {
                *counter.lock() += 1;
                Err(SinkError::write("disk full"))
            }
        });
        let q = BatchingIngestQueue::new("t", cfg(8, 2, 1000), sink, Bus::new(8));
        q.start();
        q.enqueue(41);
        q.enqueue(42);

        time::sleep(Duration::from_millis(50)).await;
        q.stop(Duration::from_secs(1)).await;

        assert_eq!(*calls.lock(), 1);
        let stats = q.stats();
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.processed, 0);
        assert!(logs_contain("batch flush failed"));
        assert!(logs_contain("[41, 42]"));
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn panicking_sink_fails_the_batch_and_keeps_consuming() {
        let calls = Arc::new(Mutex::new(0u32));
        let counter = Arc::clone(&calls);
        let sink: Arc<dyn BatchSink<u32>> = SinkFn::arc("fragile", move |_batch: Vec<u32>| {
            let counter = Arc::clone(&counter);
            async move {
                let call = {
                    let mut n = counter.lock();
                    *n += 1;
                    *n
                };
                if call == 1 {
                    panic!("sink exploded");
                }
                Ok::<_, SinkError>(())
            }
        });
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let q = BatchingIngestQueue::new("t", cfg(8, 1, 1000), sink, bus);
        q.start();

        assert!(q.enqueue(1));
        time::sleep(Duration::from_millis(10)).await;
        assert!(q.is_running());
        assert!(q.enqueue(2));
        time::sleep(Duration::from_millis(10)).await;
        assert_eq!(q.stop(Duration::from_secs(1)).await, StopOutcome::Drained);

        assert_eq!(*calls.lock(), 2);
        let stats = q.stats();
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.processed, 1);
        assert_eq!(stats.dropped, 0);
        assert!(logs_contain("sink exploded"));

        let mut failed = None;
        while let Ok(ev) = rx.try_recv() {
            if ev.kind == EventKind::BatchFailed {
                failed = ev.reason.clone();
            }
        }
        assert_eq!(failed.as_deref(), Some("sink panicked: sink exploded"));
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn not_ready_batches_are_skipped_not_processed() {
        let sink: Arc<dyn BatchSink<u32>> = SinkFn::arc("unmigrated", |_batch: Vec<u32>| async {
            Err(SinkError::Storage(crate::error::StorageError::NotReady {
                table: "message".into(),
            }))
        });
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let q = BatchingIngestQueue::new("t", cfg(8, 2, 1000), sink, bus);
        q.start();
        q.enqueue(1);
        q.enqueue(2);
        time::sleep(Duration::from_millis(10)).await;
        q.stop(Duration::from_secs(1)).await;

        let stats = q.stats();
        assert_eq!(stats.skipped, 2);
        assert_eq!(stats.processed, 0);
        assert_eq!(stats.failed, 0);
        assert_eq!(stats.flushes, 0);
        assert!(logs_contain("table not ready"));
        assert!(!logs_contain("batch flush failed"));

        while let Ok(ev) = rx.try_recv() {
            assert_ne!(ev.kind, EventKind::BatchFlushed);
            assert_ne!(ev.kind, EventKind::BatchFailed);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_sink_is_cancelled_after_drain_timeout() {
        let sink: Arc<dyn BatchSink<u32>> = SinkFn::arc("slow", |_batch: Vec<u32>| async {
            time::sleep(Duration::from_secs(3600)).await;
            Ok::<_, SinkError>(())
        });
        let bus = Bus::new(16);
        let mut rx = bus.subscribe();
        let q = BatchingIngestQueue::new("slow", cfg(8, 1, 1000), sink, bus);
        q.start();
        q.enqueue(1);
        time::sleep(Duration::from_millis(10)).await;

        assert_eq!(q.stop(Duration::from_millis(500)).await, StopOutcome::Cancelled);
        assert!(!q.is_running());

        let mut saw_timeout = false;
        while let Ok(ev) = rx.try_recv() {
            saw_timeout |= ev.kind == EventKind::DrainTimedOut;
        }
        assert!(saw_timeout);
    }
}
