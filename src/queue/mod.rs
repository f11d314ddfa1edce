//! Batching ingest: a generic bounded queue that flushes to a pluggable sink.
//!
//! ## Contents
//! - [`BatchingIngestQueue`] producer-facing queue with `enqueue`/`start`/`stop`/`stats`
//! - [`BatchSink`], [`SinkFn`] batch destinations
//! - [`QueueStats`] read-only snapshot, [`StopOutcome`] result of `stop`
//!
//! The queue never inspects its items beyond `Debug` formatting in failure logs.

mod consumer;
mod ingest;
mod sink;
mod stats;

pub use ingest::{BatchingIngestQueue, StopOutcome};
pub use sink::{BatchSink, SinkFn};
pub use stats::QueueStats;
