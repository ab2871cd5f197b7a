//! The `Sink` trait — bulk consumer of batches.

use async_trait::async_trait;
use std::sync::{Arc, Mutex, PoisonError};
use tokio_util::sync::CancellationToken;

use crate::error::SinkError;
use crate::record::{Batch, Record};

/// Commits an ordered batch of records as a unit.
///
/// # Contract
/// - An empty batch must be accepted without error.
/// - The call is atomic from the caller's point of view: partial commits are
///   reported as a failure of the whole batch.
/// - The batch is only borrowed for the duration of the call.
///
/// The trait is object-safe and can be stored as `Arc<dyn Sink>`.
#[async_trait]
pub trait Sink: Send + Sync {
    async fn commit(&self, batch: &[Record], cancel: &CancellationToken) -> Result<(), SinkError>;
}

#[async_trait]
impl<K: Sink + ?Sized> Sink for Arc<K> {
    async fn commit(&self, batch: &[Record], cancel: &CancellationToken) -> Result<(), SinkError> {
        (**self).commit(batch, cancel).await
    }
}

#[async_trait]
impl<K: Sink + ?Sized> Sink for Box<K> {
    async fn commit(&self, batch: &[Record], cancel: &CancellationToken) -> Result<(), SinkError> {
        (**self).commit(batch, cancel).await
    }
}

/// In-memory sink.
///
/// Keeps every committed batch in RAM. Useful for tests and dry runs.
#[derive(Default)]
pub struct MemorySink {
    batches: Mutex<Vec<Batch>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All committed batches, in commit order.
    pub fn batches(&self) -> Vec<Batch> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `commit` calls seen so far.
    pub fn commit_count(&self) -> usize {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Total number of records across all batches.
    pub fn record_count(&self) -> usize {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(Vec::len)
            .sum()
    }
}

#[async_trait]
impl Sink for MemorySink {
    async fn commit(&self, batch: &[Record], _cancel: &CancellationToken) -> Result<(), SinkError> {
        self.batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(batch.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_sink_keeps_batches_in_order() {
        let sink = Arc::new(MemorySink::new());
        let cancel = CancellationToken::new();

        sink.commit(&[Record::from("1"), Record::from("2")], &cancel)
            .await
            .unwrap();
        sink.commit(&[], &cancel).await.unwrap();

        assert_eq!(sink.commit_count(), 2);
        assert_eq!(sink.record_count(), 2);
        assert_eq!(sink.batches()[0], vec![Record::from("1"), Record::from("2")]);
        assert!(sink.batches()[1].is_empty());
    }
}
