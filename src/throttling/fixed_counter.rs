//! Fixed counter throttling by an arbitrary string (IP, token, ...).
//!
//! One counter per key, alive for `decay` seconds from its first hit. This is
//! not aligned to wall-clock windows.

use async_trait::async_trait;

use crate::throttling::context::ThrottleContext;
use crate::throttling::error::ThrottleResult;
use crate::throttling::headers::RateLimitHeaders;
use crate::throttling::kind::ThrottleKind;
use crate::throttling::throttler::{RateLimit, Throttler};

pub const DEFAULT_MAX_ATTEMPTS: u64 = 3;
pub const DEFAULT_DECAY_SECONDS: u64 = 60;

pub struct FixedCounterThrottler {
    context: ThrottleContext,
    kind: ThrottleKind,
    max_attempts: u64,
    decay_seconds: u64,
}

impl FixedCounterThrottler {
    pub fn new(context: ThrottleContext, kind: ThrottleKind) -> Self {
        Self {
            context,
            kind,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            decay_seconds: DEFAULT_DECAY_SECONDS,
        }
    }

    pub fn with_limit(mut self, limit: RateLimit) -> Self {
        self.max_attempts = limit.rate + limit.burst;
        self.decay_seconds = limit.period_secs;
        self
    }
}

#[async_trait]
impl Throttler for FixedCounterThrottler {
    fn throttle_type(&self) -> ThrottleKind {
        self.kind
    }

    fn context(&self) -> &ThrottleContext {
        &self.context
    }

    fn max_attempts(&self) -> u64 {
        self.max_attempts
    }

    fn decay_seconds(&self) -> u64 {
        self.decay_seconds
    }

    /// Read-only: checking never consumes an attempt.
    async fn is_at_limit(&self, key: &str) -> ThrottleResult<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }
        Ok(self.attempts_left(key).await? == 0)
    }

    async fn attempts_left(&self, key: &str) -> ThrottleResult<u64> {
        let count = self.context.store.counter(key).await?;
        Ok(self.max_attempts.saturating_sub(count))
    }

    async fn increment(&self, key: &str) -> ThrottleResult<u64> {
        self.context.store.increment(key, self.decay_seconds).await
    }

    async fn assert_throttle(&self, key: &str) -> ThrottleResult<RateLimitHeaders> {
        if !self.is_enabled() {
            return Ok(self.headers(self.max_attempts, self.max_attempts, None));
        }

        let hit = self
            .context
            .store
            .hit(key, self.max_attempts, self.decay_seconds)
            .await?;

        if !hit.allowed {
            tracing::debug!(throttle_type = %self.kind, key, "Throttle limit reached");
            return Err(self.too_many_requests(0));
        }

        Ok(self.headers(self.max_attempts, self.max_attempts.saturating_sub(hit.count), None))
    }
}
