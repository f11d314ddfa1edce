//! Execution telemetry: record types, the table sink, and the recorder.
//!
//! - [`MessageEvent`], [`BuildEvent`], [`TransactionEvent`] (and [`TelemetryEvent`])
//! - [`TableSink`] batch-per-transaction writer
//! - [`TelemetryRecorder`] fire-and-forget front door

mod model;
mod recorder;
mod sink;

pub use model::{BuildEvent, MessageEvent, TelemetryEvent, TransactionEvent};
pub use recorder::{TelemetryRecorder, TelemetryStats};
pub use sink::TableSink;
