use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SinkError;
use crate::queue::BatchSink;
use crate::storage::{Record, Storage, WriteOp};

/// Writes each batch of records to their table in one storage transaction.
///
/// A table that does not exist yet surfaces as a not-ready [`SinkError`]; the
/// queue counts that batch as skipped.
pub struct TableSink<R> {
    storage: Arc<dyn Storage>,
    _record: PhantomData<fn() -> R>,
}

impl<R: Record> TableSink<R> {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            _record: PhantomData,
        }
    }
}

#[async_trait]
impl<R: Record> BatchSink<R> for TableSink<R> {
    async fn write_batch(&self, batch: &[R]) -> Result<(), SinkError> {
        let ops = batch
            .iter()
            .map(WriteOp::append)
            .collect::<Result<Vec<_>, _>>()?;

        self.storage.transaction(ops).await?;
        Ok(())
    }

    fn name(&self) -> &'static str {
        R::TABLE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemoryStorage, tables};
    use crate::telemetry::MessageEvent;

    #[tokio::test]
    async fn batch_lands_in_one_table() {
        let storage = Arc::new(MemoryStorage::initialized());
        let sink = TableSink::<MessageEvent>::new(storage.clone());

        let batch = vec![
            MessageEvent::new("User", "Ada", "one", "s"),
            MessageEvent::new("Machine", "AI", "two", "s"),
        ];
        sink.write_batch(&batch).await.expect("write");

        let rows = storage.rows(tables::MESSAGE);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1]["text"], "two");
    }

    #[tokio::test]
    async fn missing_table_reports_not_ready() {
        let storage = Arc::new(MemoryStorage::new());
        let sink = TableSink::<MessageEvent>::new(storage);

        let err = sink
            .write_batch(&[MessageEvent::new("User", "Ada", "lost", "s")])
            .await
            .expect_err("no table");
        assert!(err.is_not_ready());
    }
}
