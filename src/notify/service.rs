//! # TaskNotificationFanout: task lifecycle plus the notification log.
//!
//! ```text
//! create_task / update_task
//!   ├─► write task row (append / atomic update)
//!   ├─► read subscriptions
//!   ├─► fan_out(post-write record)          (pure)
//!   ├─► append notifications (one transaction)
//!   └─► bus: TaskCreated|TaskUpdated, NotificationsAppended
//!
//! get_notifications ─► drain(task_notification)   single consumer
//! ```
//!
//! Delete produces no notification. Errors from the task write and unknown ids
//! are returned to the caller. Once the task write has committed, a failure to
//! append its notifications is logged and the mutation still succeeds.

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::fanout::{TaskMutation, fan_out};
use super::model::{Subscription, TaskCreate, TaskNotification, TaskRecord, TaskUpdate};
use crate::error::FanoutError;
use crate::events::{Bus, Event, EventKind};
use crate::storage::{Record, Row, Storage, WriteOp};

/// Owns tasks and subscriptions and produces task notifications.
pub struct TaskNotificationFanout {
    storage: Arc<dyn Storage>,
    bus: Bus,
}

impl TaskNotificationFanout {
    pub fn new(storage: Arc<dyn Storage>, bus: Bus) -> Self {
        Self { storage, bus }
    }

    /// Persists a new task and notifies its author, assignee, and matching subscribers.
    pub async fn create_task(&self, spec: TaskCreate) -> Result<TaskRecord, FanoutError> {
        let task = spec.into_record(Utc::now());
        self.storage.append(TaskRecord::TABLE, task.to_row()?).await?;

        info!(task_id = %task.id, flow_id = %task.flow_id, "task created");
        self.bus
            .publish(Event::new(EventKind::TaskCreated).with_task(task.id));

        self.notify_committed(&task, TaskMutation::Created).await;
        Ok(task)
    }

    /// Applies the supplied fields of `update` and notifies using the updated record.
    ///
    /// The read-modify-write runs as one [`Storage::update`], so concurrent
    /// updates of different fields all land.
    pub async fn update_task(&self, id: Uuid, update: TaskUpdate) -> Result<TaskRecord, FanoutError> {
        let now = Utc::now();
        let rows = self
            .storage
            .update(TaskRecord::TABLE, &has_id(id), &|row: &mut Row| {
                let mut task = TaskRecord::from_row(row.take())?;
                update.apply(&mut task, now);
                *row = task.to_row()?;
                Ok(())
            })
            .await?;
        let row = rows.into_iter().next().ok_or(FanoutError::NotFound { id })?;
        let task = TaskRecord::from_row(row)?;

        info!(task_id = %id, status = %task.status, "task updated");
        self.bus
            .publish(Event::new(EventKind::TaskUpdated).with_task(id));

        self.notify_committed(&task, TaskMutation::Updated).await;
        Ok(task)
    }

    /// Removes a task. No notification is produced.
    pub async fn delete_task(&self, id: Uuid) -> Result<(), FanoutError> {
        let removed = self.storage.delete(TaskRecord::TABLE, &has_id(id)).await?;
        if removed == 0 {
            return Err(FanoutError::NotFound { id });
        }
        info!(task_id = %id, "task deleted");
        self.bus
            .publish(Event::new(EventKind::TaskDeleted).with_task(id));
        Ok(())
    }

    pub async fn get_task(&self, id: Uuid) -> Result<Option<TaskRecord>, FanoutError> {
        let rows = self.storage.query(TaskRecord::TABLE, &has_id(id)).await?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(TaskRecord::from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Tasks authored by `flow_id`, in creation order.
    pub async fn tasks_for_flow(&self, flow_id: Uuid) -> Result<Vec<TaskRecord>, FanoutError> {
        let key = flow_id.to_string();
        let rows = self
            .storage
            .query(TaskRecord::TABLE, &|row: &Row| str_field(row, "author_id") == Some(key.as_str()))
            .await?;
        decode_all(rows)
    }

    /// Registers interest of `flow_id` in task mutations.
    pub async fn subscribe_flow(
        &self,
        flow_id: Uuid,
        event_type: &str,
        category: Option<&str>,
        state: Option<&str>,
    ) -> Result<Subscription, FanoutError> {
        let sub = Subscription {
            flow_id,
            event_type: event_type.to_string(),
            category: category.map(str::to_string),
            state: state.map(str::to_string),
        };
        self.storage.append(Subscription::TABLE, sub.to_row()?).await?;
        debug!(flow_id = %flow_id, event_type, ?category, ?state, "flow subscribed");
        Ok(sub)
    }

    /// Removes subscriptions of `flow_id` for `event_type`, narrowed by
    /// `category`/`state` when given. Returns how many were removed.
    pub async fn unsubscribe_flow(
        &self,
        flow_id: Uuid,
        event_type: &str,
        category: Option<&str>,
        state: Option<&str>,
    ) -> Result<u64, FanoutError> {
        let flow = flow_id.to_string();
        let removed = self
            .storage
            .delete(Subscription::TABLE, &|row: &Row| {
                str_field(row, "flow_id") == Some(flow.as_str())
                    && str_field(row, "event_type") == Some(event_type)
                    && category.is_none_or(|c| str_field(row, "category") == Some(c))
                    && state.is_none_or(|s| str_field(row, "state") == Some(s))
            })
            .await?;
        debug!(flow_id = %flow_id, event_type, removed, "flow unsubscribed");
        Ok(removed)
    }

    /// Removes and returns every pending notification, oldest first.
    ///
    /// Single-consumer: concurrent drainers each get a disjoint share.
    pub async fn get_notifications(&self) -> Result<Vec<TaskNotification>, FanoutError> {
        let rows = self.storage.drain(TaskNotification::TABLE).await?;
        decode_all(rows)
    }

    /// Number of notifications waiting in the log.
    pub async fn pending_notifications(&self) -> Result<u64, FanoutError> {
        Ok(self.storage.count(TaskNotification::TABLE).await?)
    }

    /// Fans out a mutation whose task write already committed.
    ///
    /// A failure here is logged; the caller still gets the committed task.
    async fn notify_committed(&self, task: &TaskRecord, mutation: TaskMutation) {
        if let Err(err) = self.notify(task, mutation).await {
            error!(
                task_id = %task.id,
                event_type = mutation.event_type(),
                err = %err,
                "task committed but notifications were not appended"
            );
        }
    }

    async fn notify(&self, task: &TaskRecord, mutation: TaskMutation) -> Result<(), FanoutError> {
        let rows = self.storage.query(Subscription::TABLE, &|_: &Row| true).await?;
        let subscriptions: Vec<Subscription> = decode_all(rows)?;

        let notifications = fan_out(task, mutation, &subscriptions);
        let ops = notifications
            .iter()
            .map(WriteOp::append)
            .collect::<Result<Vec<_>, _>>()?;
        let count = ops.len() as u64;
        self.storage.transaction(ops).await?;

        debug!(task_id = %task.id, event_type = mutation.event_type(), count, "notifications appended");
        self.bus.publish(
            Event::new(EventKind::NotificationsAppended)
                .with_task(task.id)
                .with_items(count),
        );
        Ok(())
    }
}

fn has_id(id: Uuid) -> impl Fn(&Row) -> bool + Send + Sync {
    let key = id.to_string();
    move |row: &Row| str_field(row, "id") == Some(key.as_str())
}

fn str_field<'a>(row: &'a Row, field: &str) -> Option<&'a str> {
    row.get(field).and_then(Value::as_str)
}

fn decode_all<R: Record>(rows: Vec<Row>) -> Result<Vec<R>, FanoutError> {
    rows.into_iter()
        .map(|row| R::from_row(row).map_err(FanoutError::from))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::{MemoryStorage, Mutator, Predicate, tables};
    use async_trait::async_trait;
    use tracing_test::traced_test;

    /// Yields to the scheduler before every call, like a networked backend.
    struct Yielding(MemoryStorage);

    #[async_trait]
    impl Storage for Yielding {
        async fn append(&self, table: &str, row: Row) -> Result<(), StorageError> {
            tokio::task::yield_now().await;
            self.0.append(table, row).await
        }
        async fn transaction(&self, ops: Vec<WriteOp>) -> Result<(), StorageError> {
            tokio::task::yield_now().await;
            self.0.transaction(ops).await
        }
        async fn query(&self, table: &str, p: Predicate<'_>) -> Result<Vec<Row>, StorageError> {
            tokio::task::yield_now().await;
            self.0.query(table, p).await
        }
        async fn update(&self, table: &str, p: Predicate<'_>, f: Mutator<'_>) -> Result<Vec<Row>, StorageError> {
            tokio::task::yield_now().await;
            self.0.update(table, p, f).await
        }
        async fn delete(&self, table: &str, p: Predicate<'_>) -> Result<u64, StorageError> {
            tokio::task::yield_now().await;
            self.0.delete(table, p).await
        }
        async fn delete_all(&self, table: &str) -> Result<u64, StorageError> {
            self.0.delete_all(table).await
        }
        async fn drain(&self, table: &str) -> Result<Vec<Row>, StorageError> {
            self.0.drain(table).await
        }
        async fn count(&self, table: &str) -> Result<u64, StorageError> {
            self.0.count(table).await
        }
    }

    fn fanout() -> TaskNotificationFanout {
        TaskNotificationFanout::new(Arc::new(MemoryStorage::initialized()), Bus::new(64))
    }

    fn spec(category: &str, state: &str) -> TaskCreate {
        TaskCreate {
            title: "triage".into(),
            flow_id: Uuid::new_v4(),
            author_id: Uuid::new_v4(),
            assignee_id: Uuid::new_v4(),
            category: category.into(),
            state: state.into(),
            ..TaskCreate::default()
        }
    }

    #[tokio::test]
    async fn create_defaults_status_and_notifies_author_and_assignee() {
        let f = fanout();
        let task = f.create_task(spec("x", "open")).await.expect("create");
        assert_eq!(task.status, "pending");

        let out = f.get_notifications().await.expect("drain");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].flow_id, task.author_id);
        assert_eq!(out[1].flow_id, task.assignee_id);
        assert!(out.iter().all(|n| n.event_type == "TaskCreated"));
        assert_eq!(f.pending_notifications().await.expect("count"), 0);
    }

    #[tokio::test]
    async fn update_changes_only_supplied_fields_and_uses_new_values() {
        let f = fanout();
        let task = f.create_task(spec("x", "open")).await.expect("create");
        f.get_notifications().await.expect("drain");

        let updated = f
            .update_task(
                task.id,
                TaskUpdate {
                    state: Some("done".into()),
                    ..TaskUpdate::default()
                },
            )
            .await
            .expect("update");
        assert_eq!(updated.state, "done");
        assert_eq!(updated.category, "x");
        assert_eq!(updated.title, "triage");

        let stored = f.get_task(task.id).await.expect("get").expect("present");
        assert_eq!(stored, updated);

        let out = f.get_notifications().await.expect("drain");
        assert!(out.iter().all(|n| n.state == "done" && n.event_type == "TaskUpdated"));
    }

    #[tokio::test]
    async fn concurrent_updates_of_different_fields_both_land() {
        let f = TaskNotificationFanout::new(
            Arc::new(Yielding(MemoryStorage::initialized())),
            Bus::new(64),
        );
        let task = f.create_task(spec("x", "open")).await.expect("create");

        let (a, b) = tokio::join!(
            f.update_task(
                task.id,
                TaskUpdate {
                    state: Some("closed".into()),
                    ..TaskUpdate::default()
                },
            ),
            f.update_task(
                task.id,
                TaskUpdate {
                    status: Some("done".into()),
                    ..TaskUpdate::default()
                },
            ),
        );
        a.expect("state update");
        b.expect("status update");

        let stored = f.get_task(task.id).await.expect("get").expect("present");
        assert_eq!(stored.state, "closed");
        assert_eq!(stored.status, "done");
    }

    #[tokio::test]
    async fn update_of_unknown_task_is_not_found() {
        let f = fanout();
        let id = Uuid::new_v4();
        let err = f
            .update_task(id, TaskUpdate::default())
            .await
            .expect_err("unknown");
        assert!(matches!(err, FanoutError::NotFound { id: missing } if missing == id));
    }

    #[tokio::test]
    #[traced_test]
    async fn committed_task_survives_a_failed_fan_out() {
        // no subscription table: reading subscriptions fails after the task write
        let storage = Arc::new(MemoryStorage::with_tables([tables::TASK, tables::TASK_NOTIFICATION]));
        let f = TaskNotificationFanout::new(storage, Bus::new(64));

        let task = f.create_task(spec("x", "open")).await.expect("create");
        assert_eq!(f.get_task(task.id).await.expect("get"), Some(task.clone()));
        assert_eq!(f.pending_notifications().await.expect("count"), 0);
        assert!(logs_contain("notifications were not appended"));

        let updated = f
            .update_task(
                task.id,
                TaskUpdate {
                    status: Some("done".into()),
                    ..TaskUpdate::default()
                },
            )
            .await
            .expect("update");
        assert_eq!(updated.status, "done");
    }

    #[tokio::test]
    async fn delete_is_silent_and_unknown_ids_fail() {
        let f = fanout();
        let task = f.create_task(spec("x", "open")).await.expect("create");
        f.get_notifications().await.expect("drain");

        f.delete_task(task.id).await.expect("delete");
        assert_eq!(f.pending_notifications().await.expect("count"), 0);

        let err = f.delete_task(task.id).await.expect_err("gone");
        assert!(matches!(err, FanoutError::NotFound { id } if id == task.id));
        assert!(f.get_task(task.id).await.expect("get").is_none());
    }

    #[tokio::test]
    async fn unsubscribe_narrows_by_category() {
        let f = fanout();
        let c = Uuid::new_v4();
        f.subscribe_flow(c, "TaskCreated", Some("x"), None).await.expect("sub");
        f.subscribe_flow(c, "TaskCreated", Some("y"), None).await.expect("sub");

        let removed = f
            .unsubscribe_flow(c, "TaskCreated", Some("x"), None)
            .await
            .expect("unsub");
        assert_eq!(removed, 1);

        f.create_task(spec("y", "open")).await.expect("create");
        assert_eq!(f.pending_notifications().await.expect("count"), 3);

        assert_eq!(f.unsubscribe_flow(c, "TaskCreated", None, None).await.expect("unsub"), 1);
    }

    #[tokio::test]
    async fn tasks_for_flow_lists_authored_tasks() {
        let f = fanout();
        let mut first = spec("x", "open");
        let author = first.author_id;
        first.title = "one".into();
        f.create_task(first).await.expect("create");
        f.create_task(spec("x", "open")).await.expect("create");

        let mine = f.tasks_for_flow(author).await.expect("list");
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].title, "one");
    }
}
