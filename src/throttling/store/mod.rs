//! Throttle state storage.
//!
//! Every mutating primitive is a single atomic operation on the store, so a
//! decision never needs a read and a write in separate round trips.

pub mod memory;
#[cfg(feature = "redis")]
pub mod redis;

use async_trait::async_trait;

use crate::throttling::error::ThrottleResult;

pub use memory::MemoryThrottleStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisThrottleStore;

/// Result of a check-and-increment on a window counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowHit {
    pub allowed: bool,
    /// Counter value after the hit (unchanged when denied).
    pub count: u64,
}

/// The two keys holding one token bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketKeys {
    pub tokens: String,
    pub timestamp: String,
}

impl BucketKeys {
    pub fn for_key(key: &str) -> Self {
        Self {
            tokens: format!("{key}.tokens"),
            timestamp: format!("{key}.timestamp"),
        }
    }
}

/// Refill rate (tokens per second) and capacity of a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSpec {
    pub rate: u64,
    pub capacity: u64,
}

impl BucketSpec {
    /// Twice the time an empty bucket takes to fill, in whole seconds.
    pub fn ttl(&self) -> u64 {
        (self.capacity * 2) / self.rate.max(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketState {
    pub tokens: u64,
    pub last_refreshed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketOutcome {
    pub allowed: bool,
    pub remaining: u64,
}

/// Take one token from a bucket last seen in `previous`.
///
/// A bucket that does not exist yet starts full.
pub fn evaluate_bucket(previous: Option<BucketState>, spec: BucketSpec, now: u64) -> (BucketOutcome, BucketState) {
    let (last_tokens, last_refreshed) = previous
        .map(|state| (state.tokens, state.last_refreshed))
        .unwrap_or((spec.capacity, 0));

    let filled = refill(last_tokens, last_refreshed, spec, now);
    let allowed = filled >= 1;
    let remaining = if allowed { filled - 1 } else { filled };

    (
        BucketOutcome { allowed, remaining },
        BucketState {
            tokens: remaining,
            last_refreshed: now,
        },
    )
}

/// Tokens a bucket would hold at `now`, without taking any.
pub fn refill(tokens: u64, last_refreshed: u64, spec: BucketSpec, now: u64) -> u64 {
    let delta = now.saturating_sub(last_refreshed);
    spec.capacity
        .min(tokens.saturating_add(delta.saturating_mul(spec.rate)))
}

#[async_trait]
pub trait ThrottleStore: Send + Sync {
    /// Current counter value; 0 when absent or expired.
    async fn counter(&self, key: &str) -> ThrottleResult<u64>;

    /// Increment a counter, starting its TTL when it is created.
    async fn increment(&self, key: &str, ttl_secs: u64) -> ThrottleResult<u64>;

    /// Increment a counter only while it is below `max`.
    async fn hit(&self, key: &str, max: u64, ttl_secs: u64) -> ThrottleResult<WindowHit>;

    /// Refill a bucket up to `now` and take one token if there is one.
    async fn take_token(&self, keys: &BucketKeys, spec: BucketSpec, now: u64) -> ThrottleResult<BucketOutcome>;

    /// Stored bucket state, if any.
    async fn peek_bucket(&self, keys: &BucketKeys) -> ThrottleResult<Option<BucketState>>;
}
