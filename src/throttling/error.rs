//! Throttling errors.

use thiserror::Error;

use crate::throttling::headers::RateLimitHeaders;
use crate::throttling::kind::ThrottleKind;

pub type ThrottleResult<T> = Result<T, ThrottleError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThrottleError {
    /// The caller is over the limit. Recoverable after `Retry-After`.
    #[error("Too Many Requests.")]
    TooManyRequests {
        throttle_type: ThrottleKind,
        headers: RateLimitHeaders,
    },

    /// A token bucket was asked to enforce less than one request per second.
    #[error("unsupported rate {rate} per {period_secs}s for {throttle_type}: token buckets need at least 1 request per second")]
    UnsupportedRate {
        throttle_type: ThrottleKind,
        rate: u64,
        period_secs: u64,
    },

    /// The request carries nothing to throttle on.
    #[error("missing {0}")]
    MissingKey(String),

    /// The counter store could not be reached or answered nonsense.
    #[error("throttle store unavailable: {0}")]
    Store(String),
}

impl ThrottleError {
    pub fn retry_after(&self) -> Option<u64> {
        match self {
            ThrottleError::TooManyRequests { headers, .. } => headers.retry_after,
            _ => None,
        }
    }

    /// Programming errors, as opposed to caller or infrastructure problems.
    pub fn is_logic_error(&self) -> bool {
        matches!(self, ThrottleError::UnsupportedRate { .. })
    }
}
