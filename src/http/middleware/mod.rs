//! Request middleware.
//!
//! # Design Decisions
//! - Plain `axum::middleware::from_fn_with_state` functions, one per concern
//! - Middleware answers with [`ApiError`](crate::http::error::ApiError) so
//!   every rejection has the same envelope as handler errors

pub mod throttle;

pub use throttle::{throttle_middleware, KeySource, ThrottleRule};
