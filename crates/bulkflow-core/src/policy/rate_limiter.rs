//! Token bucket rate limiter.
//!
//! Models a token bucket: tokens accrue at `refill_rate` tokens/second up to
//! `capacity`, and the bucket starts full. Admitting a batch of N records
//! consumes N tokens. [`RateLimitedSink`] waits for the tokens before handing
//! the batch to the wrapped sink.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::error::SinkError;
use crate::record::Record;
use crate::sink::Sink;

/// Longest single wait the bucket will ever ask for.
pub const MAX_WAIT: Duration = Duration::from_secs(24 * 60 * 60);

/// Maximum sustained throughput, in records per second.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RateLimit {
    /// No throttling.
    #[default]
    Unbounded,
    /// At most this many records per second.
    PerSecond(f64),
}

impl RateLimit {
    /// Interpret a user-supplied rate where anything `<= 0` means unbounded.
    pub fn from_records_per_sec(rate: f64) -> Self {
        if rate > 0.0 {
            Self::PerSecond(rate)
        } else {
            Self::Unbounded
        }
    }
}

impl std::fmt::Display for RateLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unbounded => write!(f, "unbounded"),
            Self::PerSecond(r) => write!(f, "{r} records/s"),
        }
    }
}

/// Token bucket configuration.
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum tokens in the bucket (the burst).
    pub capacity: f64,
    /// Token refill rate (tokens per second).
    pub refill_rate: f64,
}

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Thread-safe token bucket.
///
/// Time is read from [`tokio::time::Instant`], so a paused Tokio clock drives
/// the refill in tests.
pub struct TokenBucket {
    config: RateLimiterConfig,
    state: Mutex<BucketState>,
}

impl TokenBucket {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            state: Mutex::new(BucketState {
                tokens: config.capacity,
                last_refill: Instant::now(),
            }),
            config,
        }
    }

    /// Try to acquire `cost` tokens without waiting.
    pub fn try_acquire(&self, cost: f64) -> bool {
        self.reserve(cost).is_none()
    }

    /// Estimated wait before `cost` tokens are available.
    pub fn wait_time(&self, cost: f64) -> Duration {
        let mut state = self.lock();
        self.refill(&mut state);
        self.deficit_wait(state.tokens, cost)
    }

    /// Currently available tokens.
    pub fn available(&self) -> f64 {
        let mut state = self.lock();
        self.refill(&mut state);
        state.tokens
    }

    /// Wait until `cost` tokens are available and consume them.
    ///
    /// Returns immediately when the tokens are already there, even if `cancel`
    /// has fired. While waiting, cancellation aborts with
    /// [`SinkError::Cancelled`] and no tokens are consumed.
    pub async fn acquire(&self, cost: usize, cancel: &CancellationToken) -> Result<(), SinkError> {
        if cost as f64 > self.config.capacity {
            return Err(SinkError::ExceedsBurst {
                requested: cost,
                burst: self.config.capacity as usize,
            });
        }

        while let Some(wait) = self.reserve(cost as f64) {
            tracing::debug!(wait_ms = wait.as_millis() as u64, cost, "rate limited, waiting for tokens");
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(SinkError::Cancelled),
                _ = tokio::time::sleep(wait) => {}
            }
        }
        Ok(())
    }

    /// Consume `cost` tokens if available, otherwise return how long to wait.
    fn reserve(&self, cost: f64) -> Option<Duration> {
        let mut state = self.lock();
        self.refill(&mut state);

        if state.tokens >= cost {
            state.tokens -= cost;
            None
        } else {
            Some(self.deficit_wait(state.tokens, cost))
        }
    }

    fn deficit_wait(&self, tokens: f64, cost: f64) -> Duration {
        let deficit = cost - tokens;
        if deficit <= 0.0 {
            return Duration::ZERO;
        }
        // A zero, negative or vanishing refill rate yields an unrepresentable
        // wait; cap it. The 1ms floor avoids spinning on rounding.
        Duration::try_from_secs_f64(deficit / self.config.refill_rate)
            .unwrap_or(MAX_WAIT)
            .clamp(Duration::from_millis(1), MAX_WAIT)
    }

    fn refill(&self, state: &mut BucketState) {
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        let new_tokens = elapsed * self.config.refill_rate;
        // Also false for NaN: a broken rate never mints tokens.
        if new_tokens > 0.0 {
            state.tokens = (state.tokens + new_tokens).min(self.config.capacity);
        }
        state.last_refill = now;
    }

    fn lock(&self) -> MutexGuard<'_, BucketState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Sink decorator that throttles delivery to a maximum record rate.
pub struct RateLimitedSink<K> {
    bucket: Option<TokenBucket>,
    inner: K,
}

impl<K: Sink> RateLimitedSink<K> {
    /// Wrap `inner`. `burst` is the bucket capacity in records.
    ///
    /// A rate that is not a positive finite number disables throttling, the
    /// same way a non-positive `--rate` does.
    pub fn new(limit: RateLimit, burst: usize, inner: K) -> Self {
        let bucket = match limit {
            RateLimit::Unbounded => None,
            RateLimit::PerSecond(rate) if rate.is_finite() && rate > 0.0 => {
                Some(TokenBucket::new(RateLimiterConfig {
                    capacity: burst as f64,
                    refill_rate: rate,
                }))
            }
            RateLimit::PerSecond(rate) => {
                tracing::warn!(rate, "invalid rate limit, delivery is unthrottled");
                None
            }
        };
        Self { bucket, inner }
    }
}

#[async_trait]
impl<K: Sink> Sink for RateLimitedSink<K> {
    async fn commit(&self, batch: &[Record], cancel: &CancellationToken) -> Result<(), SinkError> {
        if let Some(bucket) = &self.bucket {
            bucket.acquire(batch.len(), cancel).await?;
        }
        self.inner.commit(batch, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::MemorySink;
    use std::sync::Arc;

    fn records(n: usize) -> Vec<Record> {
        (0..n).map(|i| Record::new(i.to_string())).collect()
    }

    #[test]
    fn acquire_within_capacity() {
        let bucket = TokenBucket::new(RateLimiterConfig {
            capacity: 10.0,
            refill_rate: 1.0,
        });
        for _ in 0..10 {
            assert!(bucket.try_acquire(1.0), "should succeed within capacity");
        }
    }

    #[test]
    fn reject_when_empty() {
        let bucket = TokenBucket::new(RateLimiterConfig {
            capacity: 3.0,
            refill_rate: 0.0001,
        });
        assert!(bucket.try_acquire(3.0));
        assert!(!bucket.try_acquire(1.0), "should be rate limited");
    }

    #[tokio::test(start_paused = true)]
    async fn wait_time_when_empty() {
        let bucket = TokenBucket::new(RateLimiterConfig {
            capacity: 1.0,
            refill_rate: 10.0,
        });
        bucket.try_acquire(1.0);
        let wait = bucket.wait_time(1.0);
        assert_eq!(wait.as_millis(), 100, "unexpected wait time: {wait:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn refills_over_time() {
        let bucket = TokenBucket::new(RateLimiterConfig {
            capacity: 4.0,
            refill_rate: 2.0,
        });
        assert!(bucket.try_acquire(4.0));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!((bucket.available() - 2.0).abs() < 1e-9);
        tokio::time::advance(Duration::from_secs(10)).await;
        assert!((bucket.available() - 4.0).abs() < 1e-9, "capped at capacity");
    }

    #[tokio::test(start_paused = true)]
    async fn second_batch_waits_for_refill() {
        let sink = Arc::new(MemorySink::new());
        let limited = RateLimitedSink::new(RateLimit::PerSecond(2.0), 2, Arc::clone(&sink));
        let cancel = CancellationToken::new();

        let start = Instant::now();
        limited.commit(&records(2), &cancel).await.unwrap();
        let first = start.elapsed();
        limited.commit(&records(2), &cancel).await.unwrap();
        let second = start.elapsed();

        assert!(first < Duration::from_millis(10), "first batch uses the initial burst");
        assert!(
            second - first >= Duration::from_millis(990),
            "second batch should wait ~1s, waited {:?}",
            second - first
        );
        assert_eq!(sink.commit_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unbounded_never_waits() {
        let sink = Arc::new(MemorySink::new());
        let limited = RateLimitedSink::new(RateLimit::Unbounded, 1, Arc::clone(&sink));
        let cancel = CancellationToken::new();

        let start = Instant::now();
        for _ in 0..50 {
            limited.commit(&records(100), &cancel).await.unwrap();
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(sink.record_count(), 5_000);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_batch_never_waits() {
        let sink = Arc::new(MemorySink::new());
        let limited = RateLimitedSink::new(RateLimit::PerSecond(1.0), 1, Arc::clone(&sink));
        let cancel = CancellationToken::new();

        limited.commit(&records(1), &cancel).await.unwrap();
        let start = Instant::now();
        limited.commit(&[], &cancel).await.unwrap();
        assert_eq!(start.elapsed(), Duration::ZERO);
        assert_eq!(sink.commit_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_wait_skips_inner_sink() {
        let sink = Arc::new(MemorySink::new());
        let limited = RateLimitedSink::new(RateLimit::PerSecond(1.0), 5, Arc::clone(&sink));
        let cancel = CancellationToken::new();

        limited.commit(&records(5), &cancel).await.unwrap();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            trigger.cancel();
        });

        let err = limited.commit(&records(5), &cancel).await.unwrap_err();
        assert!(err.is_cancelled(), "got {err:?}");
        assert_eq!(sink.commit_count(), 1, "inner sink must not see the cancelled batch");
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_token_with_tokens_available_proceeds() {
        let sink = Arc::new(MemorySink::new());
        let limited = RateLimitedSink::new(RateLimit::PerSecond(1.0), 5, Arc::clone(&sink));
        let cancel = CancellationToken::new();
        cancel.cancel();

        limited.commit(&records(5), &cancel).await.unwrap();
        assert_eq!(sink.commit_count(), 1);
    }

    #[tokio::test]
    async fn batch_larger_than_burst_is_rejected() {
        let sink = Arc::new(MemorySink::new());
        let limited = RateLimitedSink::new(RateLimit::PerSecond(100.0), 3, Arc::clone(&sink));
        let cancel = CancellationToken::new();

        let err = limited.commit(&records(4), &cancel).await.unwrap_err();
        assert!(
            matches!(err, SinkError::ExceedsBurst { requested: 4, burst: 3 }),
            "got {err:?}"
        );
        assert_eq!(sink.commit_count(), 0);
    }

    #[test]
    fn vanishing_refill_rate_caps_the_wait() {
        for refill_rate in [1e-20, 0.0, -1.0, f64::NAN] {
            let bucket = TokenBucket::new(RateLimiterConfig {
                capacity: 2.0,
                refill_rate,
            });
            assert!(bucket.try_acquire(2.0));
            assert_eq!(bucket.wait_time(2.0), MAX_WAIT, "refill_rate {refill_rate}");
            assert!(!bucket.try_acquire(1.0));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_rate_disables_throttling() {
        for rate in [0.0, -3.0, f64::NAN, f64::INFINITY] {
            let sink = Arc::new(MemorySink::new());
            let limited = RateLimitedSink::new(RateLimit::PerSecond(rate), 2, Arc::clone(&sink));
            let cancel = CancellationToken::new();

            let start = Instant::now();
            limited.commit(&records(2), &cancel).await.unwrap();
            limited.commit(&records(2), &cancel).await.unwrap();

            assert_eq!(start.elapsed(), Duration::ZERO, "rate {rate}");
            assert_eq!(sink.commit_count(), 2);
        }
    }

    #[test]
    fn non_positive_rate_means_unbounded() {
        assert_eq!(RateLimit::from_records_per_sec(-1.0), RateLimit::Unbounded);
        assert_eq!(RateLimit::from_records_per_sec(0.0), RateLimit::Unbounded);
        assert_eq!(RateLimit::from_records_per_sec(5.0), RateLimit::PerSecond(5.0));
    }
}
