//! Fluent builder for pipelines.
//!
//! # Example
//!
//! ```rust,no_run
//! use bulkflow_core::{IterSource, MemorySink, PipelineBuilder, RateLimit, Record};
//!
//! let processor = PipelineBuilder::new()
//!     .batch_size(500)
//!     .rate_limit(RateLimit::PerSecond(1_000.0))
//!     .build(IterSource::new(vec![Record::from("{}")]), MemorySink::new())
//!     .expect("valid pipeline");
//! ```

use std::num::NonZeroUsize;

use crate::config::PipelineConfig;
use crate::error::PipelineError;
use crate::policy::{RateLimit, RateLimitedSink};
use crate::processor::BatchProcessor;
use crate::sink::Sink;
use crate::source::Source;

/// Fluent builder for [`PipelineConfig`] and the processor it describes.
#[derive(Debug, Clone, Default)]
pub struct PipelineBuilder {
    config: PipelineConfig,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing configuration.
    pub fn from_config(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Set the number of records per delivery.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.config.batch_size = size;
        self
    }

    /// Set the maximum sustained throughput.
    pub fn rate_limit(mut self, limit: RateLimit) -> Self {
        self.config.rate_limit = limit;
        self
    }

    /// Set the token bucket capacity (defaults to the batch size).
    pub fn burst(mut self, burst: usize) -> Self {
        self.config.burst = Some(burst);
        self
    }

    /// Build the `PipelineConfig` without validating it.
    pub fn build_config(self) -> PipelineConfig {
        self.config
    }

    /// Validate the configuration and wire `source` → limiter → `sink`.
    pub fn build<S: Source, K: Sink>(
        self,
        source: S,
        sink: K,
    ) -> Result<BatchProcessor<S, RateLimitedSink<K>>, PipelineError> {
        self.config.validate()?;
        let batch_size = NonZeroUsize::new(self.config.batch_size)
            .ok_or_else(|| PipelineError::Config("batch size must be at least 1".into()))?;

        tracing::debug!(
            batch_size = batch_size.get(),
            rate = %self.config.rate_limit,
            burst = self.config.effective_burst(),
            "building pipeline"
        );

        let limited = RateLimitedSink::new(
            self.config.rate_limit,
            self.config.effective_burst(),
            sink,
        );
        Ok(BatchProcessor::new(batch_size, source, limited))
    }
}
