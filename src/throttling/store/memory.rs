//! In-process throttle store.
//!
//! Each key is one `DashMap` entry and every primitive runs under that entry's
//! lock, which makes it atomic with respect to other callers of this process.
//! Expired entries read as absent; `purge_expired` reclaims them.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::throttling::clock::{Clock, SystemClock};
use crate::throttling::error::ThrottleResult;
use crate::throttling::store::{
    evaluate_bucket, BucketKeys, BucketOutcome, BucketSpec, BucketState, ThrottleStore, WindowHit,
};

#[derive(Debug, Clone, Copy)]
struct Expiring<T> {
    value: T,
    expires_at: u64,
}

impl<T: Copy> Expiring<T> {
    fn live(&self, now: u64) -> Option<T> {
        (self.expires_at > now).then_some(self.value)
    }
}

#[derive(Debug)]
pub struct MemoryThrottleStore {
    counters: DashMap<String, Expiring<u64>>,
    // Keyed by the bucket's tokens key; both halves live in one entry.
    buckets: DashMap<String, Expiring<BucketState>>,
    clock: Arc<dyn Clock>,
}

impl MemoryThrottleStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            counters: DashMap::new(),
            buckets: DashMap::new(),
            clock,
        }
    }

    /// Drop expired entries. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.len();
        self.counters.retain(|_, entry| entry.expires_at > now);
        self.buckets.retain(|_, entry| entry.expires_at > now);
        before.saturating_sub(self.len())
    }

    pub fn len(&self) -> usize {
        self.counters.len() + self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryThrottleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ThrottleStore for MemoryThrottleStore {
    async fn counter(&self, key: &str) -> ThrottleResult<u64> {
        let now = self.clock.now();
        Ok(self
            .counters
            .get(key)
            .and_then(|entry| entry.live(now))
            .unwrap_or(0))
    }

    async fn increment(&self, key: &str, ttl_secs: u64) -> ThrottleResult<u64> {
        let now = self.clock.now();
        let mut entry = self.counters.entry(key.to_string()).or_insert(Expiring {
            value: 0,
            expires_at: 0,
        });

        match entry.live(now) {
            Some(count) => entry.value = count + 1,
            None => {
                *entry = Expiring {
                    value: 1,
                    expires_at: now + ttl_secs,
                }
            }
        }

        Ok(entry.value)
    }

    async fn hit(&self, key: &str, max: u64, ttl_secs: u64) -> ThrottleResult<WindowHit> {
        let now = self.clock.now();
        let mut entry = self.counters.entry(key.to_string()).or_insert(Expiring {
            value: 0,
            expires_at: 0,
        });

        let count = entry.live(now).unwrap_or(0);
        if count >= max {
            return Ok(WindowHit { allowed: false, count });
        }

        if count == 0 {
            *entry = Expiring {
                value: 1,
                expires_at: now + ttl_secs,
            };
        } else {
            entry.value = count + 1;
        }

        Ok(WindowHit {
            allowed: true,
            count: entry.value,
        })
    }

    async fn take_token(&self, keys: &BucketKeys, spec: BucketSpec, now: u64) -> ThrottleResult<BucketOutcome> {
        let mut entry = self.buckets.entry(keys.tokens.clone()).or_insert(Expiring {
            value: BucketState {
                tokens: 0,
                last_refreshed: 0,
            },
            expires_at: 0,
        });

        let (outcome, state) = evaluate_bucket(entry.live(now), spec, now);
        *entry = Expiring {
            value: state,
            expires_at: now + spec.ttl(),
        };

        Ok(outcome)
    }

    async fn peek_bucket(&self, keys: &BucketKeys) -> ThrottleResult<Option<BucketState>> {
        let now = self.clock.now();
        Ok(self.buckets.get(&keys.tokens).and_then(|entry| entry.live(now)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::throttling::clock::ManualClock;

    fn store() -> (Arc<ManualClock>, MemoryThrottleStore) {
        let clock = Arc::new(ManualClock::new(1_000));
        let store = MemoryThrottleStore::with_clock(clock.clone());
        (clock, store)
    }

    #[tokio::test]
    async fn test_increment_starts_ttl_on_first_hit() {
        let (clock, store) = store();

        assert_eq!(store.counter("k").await.unwrap(), 0);
        assert_eq!(store.increment("k", 60).await.unwrap(), 1);
        clock.advance(30);
        assert_eq!(store.increment("k", 60).await.unwrap(), 2);

        // The window started at the first hit, not the second.
        clock.advance(30);
        assert_eq!(store.counter("k").await.unwrap(), 0);
        assert_eq!(store.increment("k", 60).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_hit_stops_at_max() {
        let (_clock, store) = store();

        for expected in 1..=3 {
            let hit = store.hit("k", 3, 60).await.unwrap();
            assert_eq!(hit, WindowHit { allowed: true, count: expected });
        }
        assert_eq!(
            store.hit("k", 3, 60).await.unwrap(),
            WindowHit { allowed: false, count: 3 }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_hits_never_exceed_max() {
        let (_clock, store) = store();
        let store = Arc::new(store);

        let handles: Vec<_> = (0..50)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.hit("shared", 10, 60).await.unwrap().allowed })
            })
            .collect();

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }
        assert_eq!(allowed, 10);
    }

    #[tokio::test]
    async fn test_bucket_expires_after_ttl() {
        let (clock, store) = store();
        let keys = BucketKeys::for_key("b");
        let spec = BucketSpec { rate: 3, capacity: 6 };

        store.take_token(&keys, spec, clock.now()).await.unwrap();
        assert!(store.peek_bucket(&keys).await.unwrap().is_some());

        clock.advance(spec.ttl());
        assert!(store.peek_bucket(&keys).await.unwrap().is_none());
        assert_eq!(store.purge_expired(), 1);
        assert!(store.is_empty());
    }
}
