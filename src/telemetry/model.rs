//! Telemetry event records.
//!
//! Each record is immutable once built; the constructors stamp `timestamp`
//! with the current UTC time. Free-form payloads (`params`, `inputs`, ...) are
//! stored as JSON values untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::storage::{Record, tables};

/// A chat message exchanged during a flow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEvent {
    pub sender: String,
    pub sender_name: String,
    pub text: String,
    pub session_id: String,
    #[serde(default)]
    pub files: Vec<String>,
    pub flow_id: Option<Uuid>,
    pub timestamp: DateTime<Utc>,
}

impl MessageEvent {
    pub fn new(
        sender: impl Into<String>,
        sender_name: impl Into<String>,
        text: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            sender: sender.into(),
            sender_name: sender_name.into(),
            text: text.into(),
            session_id: session_id.into(),
            files: Vec::new(),
            flow_id: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_flow(mut self, flow_id: Uuid) -> Self {
        self.flow_id = Some(flow_id);
        self
    }

    pub fn with_files(mut self, files: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }
}

impl Record for MessageEvent {
    const TABLE: &'static str = tables::MESSAGE;
}

/// The outcome of building one vertex of a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildEvent {
    pub flow_id: Uuid,
    pub vertex_id: String,
    pub valid: bool,
    pub params: Option<String>,
    pub result_data: Value,
    pub artifacts: Value,
    pub timestamp: DateTime<Utc>,
}

impl BuildEvent {
    pub fn new(flow_id: Uuid, vertex_id: impl Into<String>, valid: bool) -> Self {
        Self {
            flow_id,
            vertex_id: vertex_id.into(),
            valid,
            params: None,
            result_data: Value::Null,
            artifacts: Value::Null,
            timestamp: Utc::now(),
        }
    }

    pub fn with_params(mut self, params: impl Into<String>) -> Self {
        self.params = Some(params.into());
        self
    }

    pub fn with_result(mut self, result_data: Value, artifacts: Value) -> Self {
        self.result_data = result_data;
        self.artifacts = artifacts;
        self
    }
}

impl Record for BuildEvent {
    const TABLE: &'static str = tables::VERTEX_BUILD;
}

/// Data handed from one vertex to the next during execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionEvent {
    pub flow_id: Uuid,
    pub vertex_id: String,
    pub target_id: Option<String>,
    pub inputs: Value,
    pub outputs: Value,
    pub status: String,
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl TransactionEvent {
    pub fn new(flow_id: Uuid, vertex_id: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            flow_id,
            vertex_id: vertex_id.into(),
            target_id: None,
            inputs: Value::Null,
            outputs: Value::Null,
            status: status.into(),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_target(mut self, target_id: impl Into<String>) -> Self {
        self.target_id = Some(target_id.into());
        self
    }

    pub fn with_io(mut self, inputs: Value, outputs: Value) -> Self {
        self.inputs = inputs;
        self.outputs = outputs;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

impl Record for TransactionEvent {
    const TABLE: &'static str = tables::TRANSACTION;
}

/// Any telemetry record, dispatched to its own queue by
/// [`TelemetryRecorder::record`](crate::TelemetryRecorder::record).
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryEvent {
    Message(MessageEvent),
    Build(BuildEvent),
    Transaction(TransactionEvent),
}

impl TelemetryEvent {
    /// Destination table of the wrapped record.
    pub fn table(&self) -> &'static str {
        match self {
            TelemetryEvent::Message(_) => MessageEvent::TABLE,
            TelemetryEvent::Build(_) => BuildEvent::TABLE,
            TelemetryEvent::Transaction(_) => TransactionEvent::TABLE,
        }
    }
}

impl From<MessageEvent> for TelemetryEvent {
    fn from(ev: MessageEvent) -> Self {
        TelemetryEvent::Message(ev)
    }
}

impl From<BuildEvent> for TelemetryEvent {
    fn from(ev: BuildEvent) -> Self {
        TelemetryEvent::Build(ev)
    }
}

impl From<TransactionEvent> for TelemetryEvent {
    fn from(ev: TransactionEvent) -> Self {
        TelemetryEvent::Transaction(ev)
    }
}
