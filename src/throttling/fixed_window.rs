//! Fixed window throttling.
//!
//! "3 attempts per 60 seconds": the window opens on the first attempt and
//! closes `decay` seconds later. A caller can spend a full window at its end
//! and another at the start of the next, so use this where a per-second rate
//! does not fit, e.g. login attempts per username.
//!
//! Checking the limit also counts the attempt, in one atomic store operation.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::throttling::context::ThrottleContext;
use crate::throttling::error::ThrottleResult;
use crate::throttling::headers::RateLimitHeaders;
use crate::throttling::kind::ThrottleKind;
use crate::throttling::throttler::{RateLimit, Throttler};

const UNKNOWN: u64 = u64::MAX;

pub struct FixedWindowThrottler {
    context: ThrottleContext,
    kind: ThrottleKind,
    max_attempts: u64,
    decay_seconds: u64,
    // Remaining attempts seen by the last check.
    attempts_left: AtomicU64,
}

impl FixedWindowThrottler {
    pub fn new(context: ThrottleContext, kind: ThrottleKind, limit: RateLimit) -> Self {
        Self {
            context,
            kind,
            max_attempts: limit.rate + limit.burst,
            decay_seconds: limit.period_secs,
            attempts_left: AtomicU64::new(UNKNOWN),
        }
    }
}

#[async_trait]
impl Throttler for FixedWindowThrottler {
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

    /// Counts the attempt unless the window is already full.
    async fn is_at_limit(&self, key: &str) -> ThrottleResult<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }

        let hit = self
            .context
            .store
            .hit(key, self.max_attempts, self.decay_seconds)
            .await?;
        self.attempts_left
            .store(self.max_attempts.saturating_sub(hit.count), Ordering::SeqCst);

        Ok(!hit.allowed)
    }

    async fn attempts_left(&self, key: &str) -> ThrottleResult<u64> {
        let cached = self.attempts_left.load(Ordering::SeqCst);
        if cached != UNKNOWN {
            return Ok(cached);
        }

        let count = self.context.store.counter(key).await?;
        Ok(self.max_attempts.saturating_sub(count))
    }

    async fn increment(&self, key: &str) -> ThrottleResult<u64> {
        let count = self.context.store.increment(key, self.decay_seconds).await?;
        self.attempts_left
            .store(self.max_attempts.saturating_sub(count), Ordering::SeqCst);
        Ok(count)
    }

    async fn assert_throttle(&self, key: &str) -> ThrottleResult<RateLimitHeaders> {
        if self.is_at_limit(key).await? {
            tracing::debug!(throttle_type = %self.kind, key, "Throttle window full");
            return Err(self.too_many_requests(self.attempts_left(key).await?));
        }

        let remaining = self.attempts_left(key).await?;
        Ok(self.headers(self.max_attempts, remaining, None))
    }
}
