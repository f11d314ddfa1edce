//! In-process [`Storage`] backed by a `HashMap` of row vectors.
//!
//! Tables must be created before use; until then every call on them returns
//! [`StorageError::NotReady`], matching a relational store whose schema has
//! not been migrated yet.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Mutator, Predicate, Row, Storage, WriteOp, tables};
use crate::error::StorageError;

/// In-memory storage engine.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    tables: Mutex<HashMap<String, Vec<Row>>>,
}

impl MemoryStorage {
    /// Creates a storage with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a storage with every table this crate uses.
    pub fn initialized() -> Self {
        Self::with_tables(tables::ALL)
    }

    /// Creates a storage with the given tables.
    pub fn with_tables<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let storage = Self::new();
        for name in names {
            storage.create_table(name);
        }
        storage
    }

    /// Creates `name` if it does not exist yet.
    pub fn create_table(&self, name: impl Into<String>) {
        self.tables.lock().entry(name.into()).or_default();
    }

    /// Drops `name` and its rows.
    pub fn drop_table(&self, name: &str) {
        self.tables.lock().remove(name);
    }

    /// Copies every row of `name` (test and operator convenience).
    pub fn rows(&self, name: &str) -> Vec<Row> {
        self.tables.lock().get(name).cloned().unwrap_or_default()
    }
}

fn not_ready(table: &str) -> StorageError {
    StorageError::NotReady {
        table: table.to_string(),
    }
}

fn table_mut<'a>(
    tables: &'a mut HashMap<String, Vec<Row>>,
    name: &str,
) -> Result<&'a mut Vec<Row>, StorageError> {
    tables.get_mut(name).ok_or_else(|| not_ready(name))
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn append(&self, table: &str, row: Row) -> Result<(), StorageError> {
        table_mut(&mut self.tables.lock(), table)?.push(row);
        Ok(())
    }

    async fn transaction(&self, ops: Vec<WriteOp>) -> Result<(), StorageError> {
        let mut guard = self.tables.lock();
        if let Some(missing) = ops.iter().find(|op| !guard.contains_key(op.table())) {
            return Err(not_ready(missing.table()));
        }
        for op in ops {
            match op {
                WriteOp::Append { table, row } => table_mut(&mut guard, &table)?.push(row),
            }
        }
        Ok(())
    }

    async fn query(&self, table: &str, predicate: Predicate<'_>) -> Result<Vec<Row>, StorageError> {
        let guard = self.tables.lock();
        let rows = guard.get(table).ok_or_else(|| not_ready(table))?;
        Ok(rows.iter().filter(|r| predicate(r)).cloned().collect())
    }

    async fn update(
        &self,
        table: &str,
        predicate: Predicate<'_>,
        mutate: Mutator<'_>,
    ) -> Result<Vec<Row>, StorageError> {
        let mut guard = self.tables.lock();
        let rows = table_mut(&mut guard, table)?;

        let mut staged = Vec::new();
        for (idx, row) in rows.iter().enumerate() {
            if predicate(row) {
                let mut next = row.clone();
                mutate(&mut next)?;
                staged.push((idx, next));
            }
        }
        for (idx, next) in &staged {
            rows[*idx] = next.clone();
        }
        Ok(staged.into_iter().map(|(_, row)| row).collect())
    }

    async fn delete(&self, table: &str, predicate: Predicate<'_>) -> Result<u64, StorageError> {
        let mut guard = self.tables.lock();
        let rows = table_mut(&mut guard, table)?;
        let before = rows.len();
        rows.retain(|r| !predicate(r));
        Ok((before - rows.len()) as u64)
    }

    async fn delete_all(&self, table: &str) -> Result<u64, StorageError> {
        let mut guard = self.tables.lock();
        let rows = table_mut(&mut guard, table)?;
        let removed = rows.len() as u64;
        rows.clear();
        Ok(removed)
    }

    async fn drain(&self, table: &str) -> Result<Vec<Row>, StorageError> {
        Ok(std::mem::take(table_mut(&mut self.tables.lock(), table)?))
    }

    async fn count(&self, table: &str) -> Result<u64, StorageError> {
        let guard = self.tables.lock();
        let rows = guard.get(table).ok_or_else(|| not_ready(table))?;
        Ok(rows.len() as u64)
    }
}
