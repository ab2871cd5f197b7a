//! Delivery policies — sink decorators applied between the processor and the
//! destination.
//!
//! ```text
//! BatchProcessor → [RateLimitedSink] → Sink
//! ```

pub mod rate_limiter;

pub use rate_limiter::{RateLimit, RateLimitedSink, RateLimiterConfig, TokenBucket, MAX_WAIT};
