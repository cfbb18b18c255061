//! Token bucket throttling.
//!
//! The bucket holds up to `rate + burst` tokens and refills at `rate` tokens
//! per second. Each attempt takes one token. Refill and take happen in one
//! atomic store evaluation.
//!
//! Only rates of at least one request per second can be expressed; use a
//! fixed window for anything slower.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::throttling::context::ThrottleContext;
use crate::throttling::error::{ThrottleError, ThrottleResult};
use crate::throttling::headers::RateLimitHeaders;
use crate::throttling::kind::ThrottleKind;
use crate::throttling::store::{refill, BucketKeys, BucketSpec};
use crate::throttling::throttler::{RateLimit, Throttler};

pub const DEFAULT_RATE: u64 = 10;
pub const DEFAULT_BURST: u64 = 5;

const UNKNOWN: u64 = u64::MAX;

pub struct TokenBucketThrottler {
    context: ThrottleContext,
    kind: ThrottleKind,
    spec: BucketSpec,
    remaining: AtomicU64,
}

impl TokenBucketThrottler {
    /// `rate` is tokens per second; `burst` is added on top for the capacity.
    pub fn new(context: ThrottleContext, kind: ThrottleKind, rate: u64, burst: u64) -> Self {
        Self {
            context,
            kind,
            spec: BucketSpec {
                rate,
                capacity: rate + burst,
            },
            remaining: AtomicU64::new(UNKNOWN),
        }
    }

    pub fn with_defaults(context: ThrottleContext, kind: ThrottleKind) -> Self {
        Self::new(context, kind, DEFAULT_RATE, DEFAULT_BURST)
    }

    /// Resolve `limit` to a per-second rate.
    pub fn from_limit(context: ThrottleContext, kind: ThrottleKind, limit: RateLimit) -> ThrottleResult<Self> {
        let rate_per_second = if limit.period_secs == 0 {
            0
        } else {
            limit.rate / limit.period_secs
        };

        if rate_per_second < 1 {
            return Err(ThrottleError::UnsupportedRate {
                throttle_type: kind,
                rate: limit.rate,
                period_secs: limit.period_secs,
            });
        }

        Ok(Self::new(context, kind, rate_per_second, limit.burst))
    }

    pub fn capacity(&self) -> u64 {
        self.spec.capacity
    }
}

#[async_trait]
impl Throttler for TokenBucketThrottler {
    fn throttle_type(&self) -> ThrottleKind {
        self.kind
    }

    fn context(&self) -> &ThrottleContext {
        &self.context
    }

    fn max_attempts(&self) -> u64 {
        self.spec.rate
    }

    fn decay_seconds(&self) -> u64 {
        self.spec.ttl()
    }

    /// Takes a token when one is available.
    async fn is_at_limit(&self, key: &str) -> ThrottleResult<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }

        let outcome = self
            .context
            .store
            .take_token(&BucketKeys::for_key(key), self.spec, self.now())
            .await?;
        self.remaining.store(outcome.remaining, Ordering::SeqCst);

        Ok(!outcome.allowed)
    }

    /// Tokens left after the last take; before any, what the store holds now.
    async fn attempts_left(&self, key: &str) -> ThrottleResult<u64> {
        let remaining = self.remaining.load(Ordering::SeqCst);
        if remaining != UNKNOWN {
            return Ok(remaining);
        }

        Ok(match self.context.store.peek_bucket(&BucketKeys::for_key(key)).await? {
            Some(state) => refill(state.tokens, state.last_refreshed, self.spec, self.now()),
            None => self.spec.capacity,
        })
    }

    /// Take a token regardless of the outcome; returns tokens in use.
    async fn increment(&self, key: &str) -> ThrottleResult<u64> {
        let outcome = self
            .context
            .store
            .take_token(&BucketKeys::for_key(key), self.spec, self.now())
            .await?;
        self.remaining.store(outcome.remaining, Ordering::SeqCst);
        Ok(self.spec.capacity.saturating_sub(outcome.remaining))
    }

    async fn assert_throttle(&self, key: &str) -> ThrottleResult<RateLimitHeaders> {
        if self.is_at_limit(key).await? {
            tracing::debug!(throttle_type = %self.kind, key, "Token bucket empty");
            return Err(self.too_many_requests(self.attempts_left(key).await?));
        }

        Ok(self.headers(self.spec.rate, self.attempts_left(key).await?, None))
    }
}
