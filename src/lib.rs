//! Composite API server library.
//!
//! Runs many API calls as one: a batch of independent sub-requests, or a
//! chain where each call can use data returned by the ones before it. The
//! composite routes are guarded by configurable throttling rules.

pub mod composite;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod throttling;

pub use config::schema::ServerConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
