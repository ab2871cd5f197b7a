//! Error types for the batch pipeline.

use thiserror::Error;

/// Errors a [`Source`](crate::source::Source) can return.
///
/// End-of-stream is not an error: sources signal it with `Ok(None)`.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Underlying reader failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The input has no header row.
    #[error("missing header row")]
    MissingHeaders,

    /// A record could not be parsed.
    #[error("malformed record at line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    #[error("{0}")]
    Other(String),
}

/// Errors a [`Sink`](crate::sink::Sink) can return.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Transport failure (connection refused, timeout, TLS, ...).
    #[error("HTTP error: {0}")]
    Http(String),

    /// The destination rejected the whole request.
    #[error("request rejected with status {status}: {body}")]
    Rejected { status: u16, body: String },

    /// The destination accepted the request but refused some documents.
    #[error("{failed} of {total} documents were rejected: {reason}")]
    PartialFailure {
        failed: usize,
        total: usize,
        reason: String,
    },

    /// The batch is larger than the rate limiter's burst and can never be admitted.
    #[error("batch of {requested} records exceeds rate limiter burst of {burst}")]
    ExceedsBurst { requested: usize, burst: usize },

    /// Delivery was cancelled before anything was committed.
    #[error("delivery cancelled before commit")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl SinkError {
    /// Returns `true` if the batch was not delivered because of cancellation.
    ///
    /// Nothing reached the destination, so the batch can be flushed again.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Why a batch was flushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushKind {
    /// The buffer reached the configured batch size.
    Full,
    /// The source reached end-of-stream.
    Final,
    /// Cancellation was observed; this is the salvage flush.
    Cancelled,
}

impl std::fmt::Display for FlushKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Final => write!(f, "final"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Fatal pipeline errors. Every variant ends the run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The source failed while filling batch `batch`; buffered records are dropped.
    #[error("failed to read record {offset} (batch {batch}): {source}")]
    Read {
        batch: u64,
        offset: u64,
        #[source]
        source: SourceError,
    },

    /// The sink (or the rate limiter in front of it) failed to commit a batch.
    #[error("failed to flush {kind} batch {batch} ({records} records): {source}")]
    Flush {
        kind: FlushKind,
        batch: u64,
        records: usize,
        #[source]
        source: SinkError,
    },
}

impl PipelineError {
    /// Short name of the stage that failed, for log fields.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Read { .. } => "read",
            Self::Flush { .. } => "flush",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_error_names_kind_and_batch() {
        let err = PipelineError::Flush {
            kind: FlushKind::Final,
            batch: 3,
            records: 7,
            source: SinkError::Rejected {
                status: 400,
                body: "bad".into(),
            },
        };
        assert_eq!(err.stage(), "flush");
        assert_eq!(
            err.to_string(),
            "failed to flush final batch 3 (7 records): request rejected with status 400: bad"
        );
    }

    #[test]
    fn only_cancelled_is_cancelled() {
        assert!(SinkError::Cancelled.is_cancelled());
        assert!(!SinkError::Http("reset".into()).is_cancelled());
    }
}
