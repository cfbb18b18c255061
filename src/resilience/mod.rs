//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Sub-request from a composite executor:
//!     → timeouts.rs (enforce per-request deadline)
//!     → On expiry: TransportError::Timeout → FailedResponse in the slot
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every upstream call has a deadline
//! - Composite sub-requests are never retried (they may not be idempotent)

pub mod timeouts;
