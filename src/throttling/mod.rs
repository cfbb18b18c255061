//! Rate-limiting subsystem.
//!
//! # Data Flow
//! ```text
//! Request through a throttle rule (http::middleware::throttle):
//!     → registry.rs (kind → algorithm, limit → throttler)
//!     → key.rs (prefix:sha256(type, subject))
//!     → fixed_counter.rs | fixed_window.rs | token_bucket.rs
//!         → store/ (one atomic primitive per decision: memory or redis)
//!     → headers.rs (X-RateLimit-* on allow, plus Retry-After on deny)
//! ```
//!
//! # Design Decisions
//! - State lives in a store, never in the throttler, so instances can share it
//! - Check and consume are one store operation; no read-then-write races
//! - Time comes from an injected clock

pub mod clock;
pub mod context;
pub mod error;
pub mod fixed_counter;
pub mod fixed_window;
pub mod headers;
pub mod key;
pub mod kind;
pub mod registry;
pub mod store;
pub mod throttler;
pub mod token_bucket;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::ThrottleContext;
pub use error::{ThrottleError, ThrottleResult};
pub use fixed_counter::FixedCounterThrottler;
pub use fixed_window::FixedWindowThrottler;
pub use headers::RateLimitHeaders;
pub use key::throttle_key;
pub use kind::{Algorithm, ThrottleKind};
pub use registry::ThrottleRegistry;
pub use store::{MemoryThrottleStore, ThrottleStore};
pub use throttler::{RateLimit, Throttler};
pub use token_bucket::TokenBucketThrottler;
