//! Rate-limit response headers.

use axum::http::{header, HeaderMap, HeaderName, HeaderValue};

pub const X_RATELIMIT_LIMIT: &str = "X-RateLimit-Limit";
pub const X_RATELIMIT_REMAINING: &str = "X-RateLimit-Remaining";
pub const RETRY_AFTER: &str = "Retry-After";
pub const X_RATELIMIT_RESET: &str = "X-RateLimit-Reset";

/// Header values for one throttle decision.
///
/// `retry_after` and `reset` are only present on a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitHeaders {
    pub limit: u64,
    pub remaining: u64,
    pub retry_after: Option<u64>,
    pub reset: Option<u64>,
}

impl RateLimitHeaders {
    /// `reset` is derived as `now + retry_after`, in epoch seconds.
    pub fn new(limit: u64, remaining: u64, retry_after: Option<u64>, now: u64) -> Self {
        Self {
            limit,
            remaining,
            retry_after,
            reset: retry_after.map(|secs| now + secs),
        }
    }

    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            (X_RATELIMIT_LIMIT, self.limit.to_string()),
            (X_RATELIMIT_REMAINING, self.remaining.to_string()),
        ];
        if let Some(retry_after) = self.retry_after {
            pairs.push((RETRY_AFTER, retry_after.to_string()));
        }
        if let Some(reset) = self.reset {
            pairs.push((X_RATELIMIT_RESET, reset.to_string()));
        }
        pairs
    }

    pub fn apply(&self, headers: &mut HeaderMap) {
        headers.insert(HeaderName::from_static("x-ratelimit-limit"), HeaderValue::from(self.limit));
        headers.insert(HeaderName::from_static("x-ratelimit-remaining"), HeaderValue::from(self.remaining));
        if let Some(retry_after) = self.retry_after {
            headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }
        if let Some(reset) = self.reset {
            headers.insert(HeaderName::from_static("x-ratelimit-reset"), HeaderValue::from(reset));
        }
    }
}
