//! The contract shared by every throttling algorithm.

use async_trait::async_trait;

use crate::throttling::context::ThrottleContext;
use crate::throttling::error::{ThrottleError, ThrottleResult};
use crate::throttling::headers::RateLimitHeaders;
use crate::throttling::key::throttle_key;
use crate::throttling::kind::ThrottleKind;

/// "`rate` requests per `period_secs`, plus `burst` extra."
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub rate: u64,
    pub period_secs: u64,
    pub burst: u64,
}

impl RateLimit {
    pub fn new(rate: u64, period_secs: u64) -> Self {
        Self {
            rate,
            period_secs,
            burst: 0,
        }
    }

    pub fn with_burst(mut self, burst: u64) -> Self {
        self.burst = burst;
        self
    }
}

/// One throttler, configured with its limit.
///
/// `key` arguments are cache keys from [`Throttler::cache_key`].
#[async_trait]
pub trait Throttler: Send + Sync {
    fn throttle_type(&self) -> ThrottleKind;

    fn context(&self) -> &ThrottleContext;

    fn max_attempts(&self) -> u64;

    fn decay_seconds(&self) -> u64;

    fn is_enabled(&self) -> bool {
        self.context().enabled
    }

    fn now(&self) -> u64 {
        self.context().clock.now()
    }

    fn cache_key(&self, parts: &[&str]) -> String {
        throttle_key(&self.context().key_prefix, self.throttle_type().as_str(), parts)
    }

    fn headers(&self, max_attempts: u64, remaining: u64, retry_after: Option<u64>) -> RateLimitHeaders {
        RateLimitHeaders::new(max_attempts, remaining, retry_after, self.now())
    }

    async fn is_at_limit(&self, key: &str) -> ThrottleResult<bool>;

    async fn attempts_left(&self, key: &str) -> ThrottleResult<u64>;

    async fn increment(&self, key: &str) -> ThrottleResult<u64>;

    /// Decide for `key`: success headers, or `TooManyRequests`.
    async fn assert_throttle(&self, key: &str) -> ThrottleResult<RateLimitHeaders>;

    /// The denial for this throttler, carrying `Retry-After`.
    fn too_many_requests(&self, remaining: u64) -> ThrottleError {
        ThrottleError::TooManyRequests {
            throttle_type: self.throttle_type(),
            headers: self.headers(self.max_attempts(), remaining, Some(self.decay_seconds())),
        }
    }
}
