//! Timeout enforcement.
//!
//! # Responsibilities
//! - Wrap every sub-request with a wall-clock deadline
//! - Turn an expired deadline into a transport failure
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Timeout errors are distinct from other transport errors
//! - An expired request is abandoned, not cancelled upstream

use std::time::Duration;

use tokio::time::timeout;

use crate::composite::request::SubRequest;
use crate::composite::response::SubResponse;
use crate::composite::transport::{Transport, TransportError};

/// Default per sub-request deadline.
pub const DEFAULT_SUBREQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Send `request` through `transport`, giving up after `limit`.
pub async fn send_with_timeout(
    transport: &dyn Transport,
    request: &SubRequest,
    limit: Duration,
) -> Result<SubResponse, TransportError> {
    match timeout(limit, transport.send(request)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout {
            uri: request.uri().to_string(),
            secs: limit.as_secs(),
        }),
    }
}
