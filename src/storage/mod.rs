//! # Durable storage contract.
//!
//! Every background component writes through the [`Storage`] trait; the concrete
//! engine (relational, embedded analytical store, in-memory) is supplied by the
//! host. Rows are JSON objects ([`Row`]); typed records convert through
//! [`Record`].
//!
//! ## Operations
//! ```text
//! append(table, row)            one row at the tail of `table`
//! transaction(ops)              all-or-nothing batch of appends
//! query(table, predicate)       rows matching `predicate`, insertion order
//! update(table, predicate, f)    rewrite matching rows in place, atomically
//! delete(table, predicate)      remove matching rows
//! delete_all(table)             remove every row
//! drain(table)                  remove and return every row, insertion order
//! ```
//!
//! ## Rules
//! - A table that has not been created yet yields [`StorageError::NotReady`].
//! - `drain` and `update` are atomic relative to other storage calls.
//! - Implementations serialize their own access; callers hold no locks.

mod memory;

pub use memory::MemoryStorage;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::StorageError;

/// One stored row: a JSON object.
pub type Row = serde_json::Value;

/// Row filter passed to [`Storage::query`], [`Storage::update`], and [`Storage::delete`].
pub type Predicate<'a> = &'a (dyn Fn(&Row) -> bool + Send + Sync);

/// In-place row rewrite passed to [`Storage::update`].
pub type Mutator<'a> = &'a (dyn Fn(&mut Row) -> Result<(), StorageError> + Send + Sync);

/// Table names used by this crate.
pub mod tables {
    /// Chat messages.
    pub const MESSAGE: &str = "message";
    /// Per-vertex build results.
    pub const VERTEX_BUILD: &str = "vertex_build";
    /// Execution transactions.
    pub const TRANSACTION: &str = "transaction";
    /// Task records.
    pub const TASK: &str = "task";
    /// Flow subscriptions.
    pub const SUBSCRIPTION: &str = "subscription";
    /// Pending task notifications (FIFO log).
    pub const TASK_NOTIFICATION: &str = "task_notification";

    /// The telemetry tables swept by retention.
    pub const TELEMETRY: [&str; 3] = [MESSAGE, VERTEX_BUILD, TRANSACTION];

    /// Every table this crate touches.
    pub const ALL: [&str; 6] = [
        MESSAGE,
        VERTEX_BUILD,
        TRANSACTION,
        TASK,
        SUBSCRIPTION,
        TASK_NOTIFICATION,
    ];
}

/// A write applied inside [`Storage::transaction`].
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Append `row` to `table`.
    Append {
        /// Destination table.
        table: String,
        /// Row to append.
        row: Row,
    },
}

impl WriteOp {
    /// Encodes `record` as an append to its own table.
    pub fn append<R: Record>(record: &R) -> Result<Self, StorageError> {
        Ok(WriteOp::Append {
            table: R::TABLE.to_string(),
            row: record.to_row()?,
        })
    }

    /// The table this op writes to.
    pub fn table(&self) -> &str {
        match self {
            WriteOp::Append { table, .. } => table,
        }
    }
}

/// A typed row bound to one table.
pub trait Record: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Table the record lives in.
    const TABLE: &'static str;

    /// Encodes the record as a row.
    fn to_row(&self) -> Result<Row, StorageError> {
        Ok(serde_json::to_value(self)?)
    }

    /// Decodes a row of this table.
    fn from_row(row: Row) -> Result<Self, StorageError> {
        Ok(serde_json::from_value(row)?)
    }
}

/// Durable storage consumed by queues sinks, the fan-out, and the sweeper.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Appends one row to `table`.
    async fn append(&self, table: &str, row: Row) -> Result<(), StorageError>;

    /// Applies every op or none of them.
    async fn transaction(&self, ops: Vec<WriteOp>) -> Result<(), StorageError>;

    /// Returns the rows of `table` matching `predicate`, in insertion order.
    async fn query(&self, table: &str, predicate: Predicate<'_>) -> Result<Vec<Row>, StorageError>;

    /// Applies `mutate` to every row matching `predicate` as one atomic step and
    /// returns the rewritten rows.
    ///
    /// No other call observes a partial result. If `mutate` fails for any row,
    /// the table is left unchanged and the error is returned.
    async fn update(
        &self,
        table: &str,
        predicate: Predicate<'_>,
        mutate: Mutator<'_>,
    ) -> Result<Vec<Row>, StorageError>;

    /// Removes every row matching `predicate`; returns how many were removed.
    async fn delete(&self, table: &str, predicate: Predicate<'_>) -> Result<u64, StorageError>;

    /// Removes every row of `table`; returns how many were removed.
    async fn delete_all(&self, table: &str) -> Result<u64, StorageError>;

    /// Removes and returns every row of `table`, in insertion order.
    async fn drain(&self, table: &str) -> Result<Vec<Row>, StorageError>;

    /// Number of rows in `table`.
    async fn count(&self, table: &str) -> Result<u64, StorageError>;
}
