//! Pipeline configuration.

use serde::{Deserialize, Serialize};

use crate::error::PipelineError;
use crate::policy::{RateLimit, MAX_WAIT};

/// Configuration for a single pipeline run. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Records per delivery.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Maximum sustained throughput.
    #[serde(default)]
    pub rate_limit: RateLimit,
    /// Token bucket capacity in records. `None` = same as `batch_size`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub burst: Option<usize>,
}

fn default_batch_size() -> usize {
    100
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            rate_limit: RateLimit::Unbounded,
            burst: None,
        }
    }
}

impl PipelineConfig {
    /// The burst actually used by the rate limiter.
    pub fn effective_burst(&self) -> usize {
        self.burst.unwrap_or(self.batch_size)
    }

    /// Reject configurations that could never make progress.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.batch_size == 0 {
            return Err(PipelineError::Config("batch size must be at least 1".into()));
        }

        if let RateLimit::PerSecond(rate) = self.rate_limit {
            if !(rate.is_finite() && rate > 0.0) {
                return Err(PipelineError::Config(format!(
                    "rate limit must be a positive number of records per second, got {rate}"
                )));
            }
            let burst = self.effective_burst();
            if burst < self.batch_size {
                return Err(PipelineError::Config(format!(
                    "burst ({burst}) must be at least the batch size ({}), \
                     otherwise a full batch can never be admitted",
                    self.batch_size
                )));
            }
            let refill = self.batch_size as f64 / rate;
            if refill > MAX_WAIT.as_secs_f64() {
                return Err(PipelineError::Config(format!(
                    "rate limit of {rate} records/s is too low: refilling one batch of {} \
                     would take {refill:.0}s, more than {}s",
                    self.batch_size,
                    MAX_WAIT.as_secs()
                )));
            }
        }

        Ok(())
    }
}
