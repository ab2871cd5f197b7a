//! The batch processor — pulls records from a source and flushes them to a
//! sink in bounded batches.
//!
//! # Loop
//! Each iteration:
//! 1. If cancellation was requested, flush whatever is buffered (the salvage
//!    flush, possibly empty) and stop.
//! 2. If the buffer is full, flush it and start a new one.
//! 3. Read one record: append it, or on end-of-stream flush the final batch
//!    and stop, or on a read error stop without flushing.
//!
//! Cancellation is only sampled between steps; a read that is already in
//! flight runs to completion.
//!
//! A flush that fails with [`SinkError::Cancelled`] delivered nothing, so it
//! counts as observing cancellation: the same buffer goes out as the salvage
//! flush. The salvage flush runs under a fresh token so the cancellation that
//! triggered it cannot abort it.

use std::num::NonZeroUsize;

use tokio_util::sync::CancellationToken;

use crate::error::{FlushKind, PipelineError, SinkError};
use crate::record::{Batch, Record};
use crate::sink::Sink;
use crate::source::Source;

/// How a run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The source reached end-of-stream and the final batch was committed.
    Completed,
    /// Cancellation was observed and the salvage flush was committed.
    Cancelled,
}

impl std::fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Counters reported at the end of a successful run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// Committed batches, including the final or salvage batch.
    pub batches: u64,
    /// Records read from the source.
    pub records: u64,
    pub outcome: RunOutcome,
}

/// Drives records from a [`Source`] into a [`Sink`] in batches.
pub struct BatchProcessor<S, K> {
    batch_size: NonZeroUsize,
    source: S,
    sink: K,
    batches: u64,
    records: u64,
}

impl<S: Source, K: Sink> BatchProcessor<S, K> {
    pub fn new(batch_size: NonZeroUsize, source: S, sink: K) -> Self {
        Self {
            batch_size,
            source,
            sink,
            batches: 0,
            records: 0,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size.get()
    }

    /// Run until the source is exhausted or `cancel` fires.
    ///
    /// Read and flush failures are fatal and returned as [`PipelineError`];
    /// records buffered at that point are not delivered.
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<RunSummary, PipelineError> {
        let size = self.batch_size.get();
        let mut buffer: Batch = Vec::with_capacity(size);

        loop {
            if cancel.is_cancelled() {
                return self.salvage(buffer).await;
            }

            if buffer.len() >= size {
                match self.commit(&buffer, FlushKind::Full, cancel).await {
                    Ok(()) => buffer = Vec::with_capacity(size),
                    Err(SinkError::Cancelled) => return self.salvage(buffer).await,
                    Err(e) => return Err(self.flush_error(FlushKind::Full, buffer.len(), e)),
                }
            }

            match self.source.read(cancel).await {
                Ok(Some(record)) => {
                    self.records += 1;
                    buffer.push(record);
                }
                Ok(None) => {
                    tracing::info!(records = buffer.len(), "source exhausted, flushing final batch");
                    match self.commit(&buffer, FlushKind::Final, cancel).await {
                        Ok(()) => {}
                        Err(SinkError::Cancelled) => return self.salvage(buffer).await,
                        Err(e) => return Err(self.flush_error(FlushKind::Final, buffer.len(), e)),
                    }
                    tracing::info!(
                        batches = self.batches,
                        records = self.records,
                        "run complete"
                    );
                    return Ok(self.summary(RunOutcome::Completed));
                }
                Err(source) => {
                    return Err(PipelineError::Read {
                        batch: self.batches + 1,
                        offset: self.records,
                        source,
                    });
                }
            }
        }
    }

    async fn salvage(&mut self, buffer: Batch) -> Result<RunSummary, PipelineError> {
        tracing::info!(
            records = buffer.len(),
            "cancellation requested, flushing in-progress batch"
        );

        let detached = CancellationToken::new();
        if let Err(e) = self.commit(&buffer, FlushKind::Cancelled, &detached).await {
            return Err(self.flush_error(FlushKind::Cancelled, buffer.len(), e));
        }

        tracing::info!(
            batches = self.batches,
            records = self.records,
            "run cancelled"
        );
        Ok(self.summary(RunOutcome::Cancelled))
    }

    async fn commit(
        &mut self,
        batch: &[Record],
        kind: FlushKind,
        cancel: &CancellationToken,
    ) -> Result<(), SinkError> {
        let number = self.batches + 1;
        tracing::info!(batch = number, records = batch.len(), %kind, "flushing batch");

        self.sink.commit(batch, cancel).await?;
        self.batches = number;
        Ok(())
    }

    fn flush_error(&self, kind: FlushKind, records: usize, source: SinkError) -> PipelineError {
        PipelineError::Flush {
            kind,
            batch: self.batches + 1,
            records,
            source,
        }
    }

    fn summary(&self, outcome: RunOutcome) -> RunSummary {
        RunSummary {
            batches: self.batches,
            records: self.records,
            outcome,
        }
    }
}
