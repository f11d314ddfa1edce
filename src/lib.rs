//! # flowtrail
//!
//! **Flowtrail** is the in-process telemetry and notification backbone of a
//! flow-execution service.
//!
//! It records high-volume execution telemetry without blocking the request
//! path, fans task-lifecycle changes out to interested flows, and reclaims
//! storage with periodic retention sweeps.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   request handlers / execution engine callbacks
//!        │ record(event)            │ create/update/delete_task
//!        ▼                          ▼
//! ┌───────────────────────┐   ┌─────────────────────────┐   ┌──────────────────┐
//! │ TelemetryRecorder     │   │ TaskNotificationFanout  │   │ RetentionSweeper │
//! │  ├ queue "message"    │   │  task rows              │   │  timer loop      │
//! │  ├ queue "vertex_build│   │  subscriptions          │   │  purge() every   │
//! │  └ queue "transaction"│   │  notification log (FIFO)│   │  purge_interval  │
//! └──────────┬────────────┘   └────────────┬────────────┘   └────────┬─────────┘
//!            │ batch per transaction       │ append / drain          │ delete
//!            ▼                             ▼                         ▼
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                         Storage (injected by the host)                      │
//! └─────────────────────────────────────────────────────────────────────────────┘
//!
//!   every component ── publish(Event) ──► Bus ──► Pipeline listener ──► SubscriberSet
//!                                                                   ┌──────┼──────┐
//!                                                                   ▼      ▼      ▼
//!                                                               LogWriter  ...  custom
//! ```
//!
//! ### Ingest queue
//! ```text
//! enqueue(item) ──try_send──► [bounded channel] ──► consumer ──► batch ──► BatchSink
//!      │ full / closed                               flush when len ≥ batch_size
//!      └─► dropped += 1                               or flush_interval elapsed
//! ```
//!
//! ## Features
//! | Area          | Description                                                         | Key types                                  |
//! |---------------|---------------------------------------------------------------------|--------------------------------------------|
//! | **Ingest**    | Bounded, drop-on-full queue with size/time batching and drain       | [`BatchingIngestQueue`], [`BatchSink`]      |
//! | **Telemetry** | Message, build, and transaction records persisted per table         | [`TelemetryRecorder`], [`TelemetryEvent`]   |
//! | **Tasks**     | Task lifecycle with author/assignee/subscription fan-out            | [`TaskNotificationFanout`], [`Subscription`] |
//! | **Retention** | Minute/hour/day cadence, full-wipe or age-based purge, backoff      | [`RetentionSweeper`], [`PurgeMode`]         |
//! | **Events**    | Runtime events on a broadcast bus, isolated subscriber workers      | [`Event`], [`Subscribe`]                    |
//! | **Lifecycle** | Explicit start/stop owned by the host process                       | [`Pipeline`], [`PipelineBuilder`]           |
//!
//! ## Optional features
//! - `logging`: exports the built-in [`LogWriter`] subscriber _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use flowtrail::{Config, Pipeline, MessageEvent, TaskCreate};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = Pipeline::builder(Config::default()).build();
//!     pipeline.start();
//!
//!     pipeline.telemetry().record(MessageEvent::new("User", "Ada", "hello", "session-1"));
//!
//!     let task = pipeline.tasks().create_task(TaskCreate {
//!         category: "billing".into(),
//!         state: "open".into(),
//!         ..TaskCreate::default()
//!     }).await?;
//!     let notes = pipeline.tasks().get_notifications().await?;
//!     assert_eq!(notes.len(), 2);
//!     assert!(notes.iter().all(|n| n.task_id == task.id));
//!
//!     pipeline.stop().await?;
//!     assert_eq!(pipeline.telemetry().stats().messages.processed, 1);
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
pub mod events;
pub mod logging;
pub mod notify;
pub mod policies;
pub mod queue;
pub mod retention;
pub mod storage;
mod subscribers;
pub mod telemetry;

// ---- Public re-exports ----

pub use config::{Config, QueueConfig, RetentionConfig};
pub use self::core::{Pipeline, PipelineBuilder, wait_for_shutdown_signal};
pub use error::{
    ConfigError, EnqueueError, FanoutError, RetentionError, RuntimeError, SinkError, StorageError,
};
pub use events::{Bus, Event, EventKind};
pub use notify::{
    Subscription, TaskCreate, TaskNotification, TaskNotificationFanout, TaskRecord, TaskUpdate,
};
pub use policies::{BackoffPolicy, JitterPolicy};
pub use queue::{BatchSink, BatchingIngestQueue, QueueStats, SinkFn, StopOutcome};
pub use retention::{PurgeMode, RetentionSweeper};
pub use storage::{MemoryStorage, Storage};
pub use subscribers::{Subscribe, SubscriberSet};
pub use telemetry::{
    BuildEvent, MessageEvent, TelemetryEvent, TelemetryRecorder, TransactionEvent,
};

#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
