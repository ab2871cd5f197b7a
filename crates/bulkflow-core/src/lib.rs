//! bulkflow-core — batch accumulation engine and delivery throttling.
//!
//! # Overview
//!
//! ```text
//! Source ──read──▶ BatchProcessor ──commit──▶ RateLimitedSink ──▶ Sink
//! ```
//!
//! - [`Source`] / [`Sink`] — async traits for record producers and bulk consumers
//! - [`BatchProcessor`] — the single control loop: accumulate, flush on full /
//!   end-of-stream / cancellation
//! - [`policy`] module — token bucket rate limiter as a sink decorator
//! - [`PipelineConfig`] / [`PipelineBuilder`] — validated construction
//! - [`IterSource`] / [`MemorySink`] — in-memory endpoints for tests and dry runs

pub mod builder;
pub mod config;
pub mod error;
pub mod policy;
pub mod processor;
pub mod record;
pub mod sink;
pub mod source;

pub use builder::PipelineBuilder;
pub use config::PipelineConfig;
pub use error::{FlushKind, PipelineError, SinkError, SourceError};
pub use policy::{RateLimit, RateLimitedSink, TokenBucket};
pub use processor::{BatchProcessor, RunOutcome, RunSummary};
pub use record::{Batch, Record};
pub use sink::{MemorySink, Sink};
pub use source::{IterSource, Source};

pub use tokio_util::sync::CancellationToken;
