//! The `Source` trait — pull-based producer of records.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::SourceError;
use crate::record::Record;

/// Produces one record per call.
///
/// Returns `Ok(None)` exactly once at end-of-stream; behaviour of further
/// calls is unspecified. Any `Err` is treated as fatal by the processor.
///
/// The cancellation token is passed through so that a source with slow,
/// interruptible reads can race them against shutdown. The processor itself
/// only checks for cancellation between reads.
#[async_trait]
pub trait Source: Send {
    async fn read(&mut self, cancel: &CancellationToken) -> Result<Option<Record>, SourceError>;
}

#[async_trait]
impl<S: Source + ?Sized> Source for Box<S> {
    async fn read(&mut self, cancel: &CancellationToken) -> Result<Option<Record>, SourceError> {
        (**self).read(cancel).await
    }
}

/// Source backed by any iterator of records. Ends when the iterator does.
pub struct IterSource<I> {
    records: I,
}

impl<I> IterSource<I>
where
    I: Iterator<Item = Record> + Send,
{
    pub fn new(records: impl IntoIterator<IntoIter = I>) -> Self {
        Self {
            records: records.into_iter(),
        }
    }
}

#[async_trait]
impl<I> Source for IterSource<I>
where
    I: Iterator<Item = Record> + Send,
{
    async fn read(&mut self, _cancel: &CancellationToken) -> Result<Option<Record>, SourceError> {
        Ok(self.records.next())
    }
}
