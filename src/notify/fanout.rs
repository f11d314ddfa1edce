//! Recipient computation for one task mutation.
//!
//! ```text
//! record (post-write) ─► author_id ─────────────┐
//!                     ├► assignee_id ───────────┼─► [TaskNotification]
//!                     └► subs.filter(matches) ──┘
//! ```
//!
//! Pure: no storage access, no deduplication.

use super::model::{Subscription, TaskNotification, TaskRecord};

/// The mutation that triggered a fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskMutation {
    Created,
    Updated,
}

impl TaskMutation {
    /// Event type carried by the produced notifications.
    pub fn event_type(self) -> &'static str {
        match self {
            TaskMutation::Created => "TaskCreated",
            TaskMutation::Updated => "TaskUpdated",
        }
    }
}

/// Computes the notifications for `record` after `mutation`.
///
/// Author first, then assignee, then every matching subscription in the order given.
pub fn fan_out(
    record: &TaskRecord,
    mutation: TaskMutation,
    subscriptions: &[Subscription],
) -> Vec<TaskNotification> {
    let direct = [record.author_id, record.assignee_id];
    let subscribed = subscriptions
        .iter()
        .filter(|sub| sub.matches(record))
        .map(|sub| sub.flow_id);

    direct
        .into_iter()
        .chain(subscribed)
        .map(|flow_id| TaskNotification {
            task_id: record.id,
            flow_id,
            event_type: mutation.event_type().to_string(),
            category: record.category.clone(),
            state: record.state.clone(),
            status: record.status.clone(),
        })
        .collect()
}
