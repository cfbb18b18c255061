//! Composite API execution subsystem.
//!
//! # Data Flow
//! ```text
//! POST /composite/parallel | /composite/chain
//!     → input.rs (validate URI → {method, body?, ref?} map)
//!     → request.rs (SubRequest / ChainedSubRequest)
//!     → batch.rs (fan out, one task per request, await all)
//!       or chain.rs (one link at a time)
//!           → tokens.rs (resolve %{ref.path} from earlier responses)
//!     → transport.rs (send via pooled client, with deadline)
//!     → response.rs (SubResponse or FailedResponse per slot)
//!     → JSON map of key → {status, uri, headers, body}
//! ```
//!
//! # Design Decisions
//! - A transport failure fills its slot with a 503 sentinel, never aborts a batch
//! - A chain stops at the first unresolved token; sent requests stay sent
//! - Executors own their state; nothing is shared between composite calls

pub mod batch;
pub mod chain;
pub mod error;
pub mod input;
pub mod request;
pub mod response;
pub mod tokens;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use batch::BatchExecutor;
pub use chain::ChainExecutor;
pub use error::CompositeError;
pub use input::{forwardable_headers, parse_entries, CompositeEntry, CompositeMode};
pub use request::{ChainedSubRequest, HeaderBag, LinkState, Method, SubRequest};
pub use response::{CompositeResponse, FailedResponse, ResponseEntry, SubResponse};
pub use tokens::{ReferenceData, TokenError, TokenPolicy, TokenSubstituter};
pub use transport::{HttpTransport, Transport, TransportError};
