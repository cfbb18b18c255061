//! Builds the throttler for a named kind and runs decisions through it.

use crate::observability::metrics;
use crate::throttling::context::ThrottleContext;
use crate::throttling::error::{ThrottleError, ThrottleResult};
use crate::throttling::fixed_counter::FixedCounterThrottler;
use crate::throttling::fixed_window::FixedWindowThrottler;
use crate::throttling::headers::RateLimitHeaders;
use crate::throttling::kind::{Algorithm, ThrottleKind};
use crate::throttling::throttler::{RateLimit, Throttler};
use crate::throttling::token_bucket::TokenBucketThrottler;

/// Created once at startup and shared by everything that throttles.
#[derive(Clone, Default)]
pub struct ThrottleRegistry {
    context: ThrottleContext,
}

impl ThrottleRegistry {
    pub fn new(context: ThrottleContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &ThrottleContext {
        &self.context
    }

    /// A throttler of `kind`'s algorithm, configured with `limit`.
    pub fn throttler(&self, kind: ThrottleKind, limit: RateLimit) -> ThrottleResult<Box<dyn Throttler>> {
        let context = self.context.clone();
        Ok(match kind.algorithm() {
            Algorithm::FixedCounter => Box::new(FixedCounterThrottler::new(context, kind).with_limit(limit)),
            Algorithm::FixedWindow => Box::new(FixedWindowThrottler::new(context, kind, limit)),
            Algorithm::TokenBucket => Box::new(TokenBucketThrottler::from_limit(context, kind, limit)?),
        })
    }

    /// Throttle `subject` (an IP, a token, a username, ...) under `kind`.
    pub async fn assert_throttle(
        &self,
        kind: ThrottleKind,
        subject: &str,
        limit: RateLimit,
    ) -> ThrottleResult<RateLimitHeaders> {
        let throttler = self.throttler(kind, limit)?;
        let key = throttler.cache_key(&[subject]);
        let result = throttler.assert_throttle(&key).await;

        let decision = match &result {
            Ok(_) => "allowed",
            Err(ThrottleError::TooManyRequests { .. }) => "denied",
            Err(_) => "error",
        };
        metrics::record_throttle_decision(kind.as_str(), decision);

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::throttling::clock::ManualClock;
    use std::sync::Arc;

    fn registry() -> ThrottleRegistry {
        ThrottleRegistry::new(ThrottleContext::in_memory(Arc::new(ManualClock::new(1_000))))
    }

    #[tokio::test]
    async fn test_dispatches_by_algorithm() {
        let registry = registry();
        let limit = RateLimit::new(60, 60);

        let ip = registry.throttler(ThrottleKind::Ip, limit).unwrap();
        assert_eq!(ip.max_attempts(), 60);
        assert_eq!(ip.decay_seconds(), 60);

        let bucket = registry.throttler(ThrottleKind::AccessTokenRate, limit).unwrap();
        assert_eq!(bucket.max_attempts(), 1);
        assert_eq!(bucket.decay_seconds(), 2);

        assert!(registry
            .throttler(ThrottleKind::AccessTokenRate, RateLimit::new(1, 60))
            .is_err());
    }

    #[tokio::test]
    async fn test_subjects_are_isolated() {
        let registry = registry();
        let limit = RateLimit::new(1, 60);

        assert!(registry.assert_throttle(ThrottleKind::Ip, "10.0.0.1", limit).await.is_ok());
        assert!(registry.assert_throttle(ThrottleKind::Ip, "10.0.0.2", limit).await.is_ok());
        assert!(registry.assert_throttle(ThrottleKind::Ip, "10.0.0.1", limit).await.is_err());
        // Same subject, different kind.
        assert!(registry.assert_throttle(ThrottleKind::Token, "10.0.0.1", limit).await.is_ok());
    }
}
