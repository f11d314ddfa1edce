use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Read-only snapshot of a queue's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueStats {
    /// Items waiting in the queue (not yet taken by the consumer).
    pub queue_size: usize,
    /// Items handed to the sink in successful flushes.
    pub processed: u64,
    /// Items refused at enqueue (capacity or closed).
    pub dropped: u64,
    /// Items discarded with a failed flush.
    pub failed: u64,
    /// Items discarded because their table did not exist yet.
    pub skipped: u64,
    /// Successful sink calls.
    pub flushes: u64,
    /// Configured capacity.
    pub capacity: usize,
    /// Configured batch size.
    pub batch_size: usize,
    /// Configured flush interval.
    pub flush_interval: Duration,
}

/// Shared counters updated by producers and the consumer.
#[derive(Debug, Default)]
pub(crate) struct Counters {
    pub(crate) processed: AtomicU64,
    pub(crate) dropped: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) skipped: AtomicU64,
    pub(crate) flushes: AtomicU64,
}

impl Counters {
    pub(crate) fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub(crate) fn get(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}
