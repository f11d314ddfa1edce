//! # Batch sinks.
//!
//! A [`BatchSink`] receives every flushed batch of a
//! [`BatchingIngestQueue`](crate::BatchingIngestQueue). The queue keeps
//! ownership of the items for the duration of the call and drops them
//! afterwards, whatever the outcome.
//!
//! [`SinkFn`] wraps a closure `F: Fn(Vec<T>) -> Fut`, producing a fresh future
//! per flush.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use flowtrail::{BatchSink, SinkError, SinkFn};
//!
//! let sink: Arc<dyn BatchSink<u32>> = SinkFn::arc("printer", |batch: Vec<u32>| async move {
//!     println!("flushing {} items", batch.len());
//!     Ok::<_, SinkError>(())
//! });
//! assert_eq!(sink.name(), "printer");
//! ```

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SinkError;

/// Destination of flushed batches.
///
/// Called from the queue's single consumer task only; no two calls of one
/// queue overlap.
#[async_trait]
pub trait BatchSink<T: Send + Sync + 'static>: Send + Sync + 'static {
    /// Writes one batch. An error discards the batch (no retry).
    async fn write_batch(&self, batch: &[T]) -> Result<(), SinkError>;

    /// Returns the sink name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Function-backed sink implementation.
pub struct SinkFn<F> {
    name: &'static str,
    f: F,
}

impl<F> SinkFn<F> {
    /// Creates a new function-backed sink.
    pub fn new(name: &'static str, f: F) -> Self {
        Self { name, f }
    }

    /// Creates the sink and returns it as a shared handle.
    pub fn arc(name: &'static str, f: F) -> Arc<Self> {
        Arc::new(Self::new(name, f))
    }
}

#[async_trait]
impl<T, F, Fut> BatchSink<T> for SinkFn<F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(Vec<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), SinkError>> + Send + 'static,
{
    async fn write_batch(&self, batch: &[T]) -> Result<(), SinkError> {
        (self.f)(batch.to_vec()).await
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
