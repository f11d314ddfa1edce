use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::storage::{Record, tables};

/// Status given to tasks created without one.
pub const DEFAULT_STATUS: &str = "pending";

/// A task owned by the fan-out.
///
/// Author and assignee are flow identities: notifications for them are
/// addressed to `author_id` / `assignee_id` directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub flow_id: Uuid,
    pub author_id: Uuid,
    pub assignee_id: Uuid,
    pub category: String,
    pub state: String,
    pub status: String,
    pub result: Option<Value>,
    #[serde(default)]
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Record for TaskRecord {
    const TABLE: &'static str = tables::TASK;
}

/// Input of [`TaskNotificationFanout::create_task`](crate::TaskNotificationFanout::create_task).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TaskCreate {
    pub title: String,
    pub description: String,
    pub flow_id: Uuid,
    pub author_id: Uuid,
    pub assignee_id: Uuid,
    pub category: String,
    pub state: String,
    /// Defaults to [`DEFAULT_STATUS`].
    pub status: Option<String>,
    pub attachments: Vec<String>,
}

impl TaskCreate {
    pub(crate) fn into_record(self, now: DateTime<Utc>) -> TaskRecord {
        TaskRecord {
            id: Uuid::new_v4(),
            title: self.title,
            description: self.description,
            flow_id: self.flow_id,
            author_id: self.author_id,
            assignee_id: self.assignee_id,
            category: self.category,
            state: self.state,
            status: self.status.unwrap_or_else(|| DEFAULT_STATUS.to_string()),
            result: None,
            attachments: self.attachments,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Partial update: only the fields that are `Some` change.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TaskUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub assignee_id: Option<Uuid>,
    pub category: Option<String>,
    pub state: Option<String>,
    pub status: Option<String>,
    pub result: Option<Value>,
    pub attachments: Option<Vec<String>>,
}

impl TaskUpdate {
    /// True when no field is supplied.
    pub fn is_empty(&self) -> bool {
        *self == TaskUpdate::default()
    }

    pub(crate) fn apply(&self, task: &mut TaskRecord, now: DateTime<Utc>) {
        if let Some(v) = &self.title {
            task.title.clone_from(v);
        }
        if let Some(v) = &self.description {
            task.description.clone_from(v);
        }
        if let Some(v) = self.assignee_id {
            task.assignee_id = v;
        }
        if let Some(v) = &self.category {
            task.category.clone_from(v);
        }
        if let Some(v) = &self.state {
            task.state.clone_from(v);
        }
        if let Some(v) = &self.status {
            task.status.clone_from(v);
        }
        if let Some(v) = &self.result {
            task.result = Some(v.clone());
        }
        if let Some(v) = &self.attachments {
            task.attachments.clone_from(v);
        }
        task.updated_at = now;
    }
}

/// Interest of one flow in task mutations.
///
/// `category` and `state` are independent matchers: an unset one matches any
/// value, a set one matches only an equal value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub flow_id: Uuid,
    pub event_type: String,
    pub category: Option<String>,
    pub state: Option<String>,
}

impl Subscription {
    pub fn new(flow_id: Uuid, event_type: impl Into<String>) -> Self {
        Self {
            flow_id,
            event_type: event_type.into(),
            category: None,
            state: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    /// True if this subscription is interested in `task`.
    pub fn matches(&self, task: &TaskRecord) -> bool {
        let category = self.category.as_ref().is_none_or(|c| *c == task.category);
        let state = self.state.as_ref().is_none_or(|s| *s == task.state);
        category && state
    }
}

impl Record for Subscription {
    const TABLE: &'static str = tables::SUBSCRIPTION;
}

/// One entry of the notification log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskNotification {
    pub task_id: Uuid,
    /// Recipient flow.
    pub flow_id: Uuid,
    pub event_type: String,
    pub category: String,
    pub state: String,
    pub status: String,
}

impl Record for TaskNotification {
    const TABLE: &'static str = tables::TASK_NOTIFICATION;
}
