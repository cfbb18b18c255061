//! Composite execution errors.

use thiserror::Error;

/// Errors raised while building or running a composite request.
///
/// Transport failures are not in here: they never abort a composite run and
/// end up as a [`FailedResponse`](crate::composite::FailedResponse) instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompositeError {
    /// A chain link reached the executor without a reference id.
    #[error("no reference id was set for the chained request to '{uri}'")]
    MissingReferenceId { uri: String },

    /// A placeholder pointed at data no earlier link produced.
    #[error("unresolved token '{path}' in chained request '{reference_id}'")]
    UnresolvedToken { reference_id: String, path: String },

    /// The decoded body of a non-JSON response was requested.
    #[error("response from '{uri}' is not JSON")]
    NotJson { uri: String },

    /// The response claims to be JSON but does not parse.
    #[error("response from '{uri}' has an invalid JSON body: {reason}")]
    InvalidJson { uri: String, reason: String },
}

impl CompositeError {
    /// Programming errors, as opposed to problems with the caller's input or
    /// the upstream's output.
    pub fn is_logic_error(&self) -> bool {
        matches!(self, CompositeError::MissingReferenceId { .. })
    }
}
