//! # Runtime events emitted by queues, the fan-out, and the sweeper.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Ingest events**: queue consumer flow (started, flushed, failed, dropped, stopped)
//! - **Task events**: task mutations and the notifications they produced
//! - **Retention events**: sweep outcomes
//! - **Runtime events**: shutdown and subscriber health
//!
//! The [`Event`] struct carries additional metadata such as timestamps, the
//! emitting component, item counts, and reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use flowtrail::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::BatchFailed)
//!     .with_source("message")
//!     .with_items(3)
//!     .with_reason("disk full");
//!
//! assert_eq!(ev.kind, EventKind::BatchFailed);
//! assert_eq!(ev.source.as_deref(), Some("message"));
//! assert_eq!(ev.items, Some(3));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::{Duration, SystemTime};

use uuid::Uuid;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `source`: subscriber name
    /// - `reason`: panic info/message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `source`: subscriber name
    /// - `reason`: reason string (e.g., "full", "closed")
    SubscriberOverflow,

    // === Ingest events ===
    /// A queue consumer was spawned.
    ///
    /// Sets:
    /// - `source`: queue name
    ConsumerStarted,

    /// A queue consumer finished its final flush and exited.
    ///
    /// Sets:
    /// - `source`: queue name
    ConsumerStopped,

    /// A consumer did not finish within the drain timeout and was cancelled.
    ///
    /// Sets:
    /// - `source`: queue name
    /// - `timeout_ms`: drain timeout (ms)
    DrainTimedOut,

    /// An item was refused by a queue (capacity or closed).
    ///
    /// Sets:
    /// - `source`: queue name
    /// - `reason`: refusal label
    ItemDropped,

    /// A batch was written to its sink.
    ///
    /// Sets:
    /// - `source`: queue name
    /// - `items`: batch length
    BatchFlushed,

    /// A batch flush failed; the batch was discarded.
    ///
    /// Sets:
    /// - `source`: queue name
    /// - `items`: batch length
    /// - `reason`: sink error message
    BatchFailed,

    // === Task events ===
    /// A task was created.
    ///
    /// Sets:
    /// - `task_id`: task id
    TaskCreated,

    /// A task was updated.
    ///
    /// Sets:
    /// - `task_id`: task id
    TaskUpdated,

    /// A task was deleted.
    ///
    /// Sets:
    /// - `task_id`: task id
    TaskDeleted,

    /// Notifications were appended to the notification log.
    ///
    /// Sets:
    /// - `task_id`: task id
    /// - `items`: number of notifications appended
    NotificationsAppended,

    // === Retention events ===
    /// A sweep tick completed.
    ///
    /// Sets:
    /// - `source`: sweeper name
    /// - `items`: rows deleted
    PurgeCompleted,

    /// A sweep tick failed; the loop retries after a backoff.
    ///
    /// Sets:
    /// - `source`: sweeper name
    /// - `reason`: error message
    /// - `delay_ms`: backoff before the next attempt (ms)
    /// - `attempt`: consecutive failures so far
    PurgeFailed,

    /// The sweeper will not run because its interval is unusable.
    ///
    /// Sets:
    /// - `source`: sweeper name
    /// - `reason`: rejected interval
    SweeperDisabled,

    // === Runtime events ===
    /// Shutdown requested (OS signal observed or `Pipeline::stop` called).
    ShutdownRequested,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Name of the emitting component (queue, sweeper, subscriber).
    pub source: Option<Arc<str>>,
    /// Human-readable reason (errors, overflow details, etc.).
    pub reason: Option<Arc<str>>,
    /// Item/row count the event refers to.
    pub items: Option<u64>,
    /// Task the event refers to.
    pub task_id: Option<Uuid>,
    /// Timeout in milliseconds (compact).
    pub timeout_ms: Option<u32>,
    /// Delay before the next attempt in milliseconds (compact).
    pub delay_ms: Option<u32>,
    /// Attempt/failure count (starting from 1).
    pub attempt: Option<u32>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            source: None,
            reason: None,
            items: None,
            task_id: None,
            timeout_ms: None,
            delay_ms: None,
            attempt: None,
        }
    }

    /// Attaches the emitting component's name.
    #[inline]
    pub fn with_source(mut self, source: impl Into<Arc<str>>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches an item/row count.
    #[inline]
    pub fn with_items(mut self, n: u64) -> Self {
        self.items = Some(n);
        self
    }

    /// Attaches a task id.
    #[inline]
    pub fn with_task(mut self, id: Uuid) -> Self {
        self.task_id = Some(id);
        self
    }

    /// Attaches a timeout duration (stored as milliseconds).
    #[inline]
    pub fn with_timeout(mut self, d: Duration) -> Self {
        self.timeout_ms = Some(compact_ms(d));
        self
    }

    /// Attaches a retry delay (stored as milliseconds).
    #[inline]
    pub fn with_delay(mut self, d: Duration) -> Self {
        self.delay_ms = Some(compact_ms(d));
        self
    }

    /// Attaches an attempt count.
    #[inline]
    pub fn with_attempt(mut self, n: u32) -> Self {
        self.attempt = Some(n);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_source(subscriber)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_source(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panicked(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}

fn compact_ms(d: Duration) -> u32 {
    d.as_millis().min(u128::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_numbers_increase() {
        let a = Event::new(EventKind::BatchFlushed);
        let b = Event::new(EventKind::BatchFlushed);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn durations_saturate_at_u32_millis() {
        let ev = Event::new(EventKind::DrainTimedOut).with_timeout(Duration::from_secs(u64::MAX / 2));
        assert_eq!(ev.timeout_ms, Some(u32::MAX));
    }
}
