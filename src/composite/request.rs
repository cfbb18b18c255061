//! Outbound sub-request model.
//!
//! A [`SubRequest`] is one call a composite request fans out to. A
//! [`ChainedSubRequest`] is a link of a chain: the same request plus the
//! reference id later links use to address its response.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::composite::error::CompositeError;

/// Header name → values, as captured from or sent to an upstream.
pub type HeaderBag = BTreeMap<String, Vec<String>>;

/// HTTP methods a composite entry may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    #[default]
    Get,
    Put,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub const ALL: [Method; 5] = [Method::Get, Method::Put, Method::Post, Method::Patch, Method::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unsupported method '{0}'")]
pub struct UnknownMethod(pub String);

impl FromStr for Method {
    type Err = UnknownMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownMethod(s.to_string()))
    }
}

impl From<Method> for axum::http::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => axum::http::Method::GET,
            Method::Put => axum::http::Method::PUT,
            Method::Post => axum::http::Method::POST,
            Method::Patch => axum::http::Method::PATCH,
            Method::Delete => axum::http::Method::DELETE,
        }
    }
}

/// One outbound call of a composite request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubRequest {
    uri: String,
    method: Method,
    headers: HeaderBag,
    body: Option<String>,
}

impl SubRequest {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }

    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    pub fn with_headers(mut self, headers: HeaderBag) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn set_uri(&mut self, uri: impl Into<String>) {
        self.uri = uri.into();
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn headers(&self) -> &HeaderBag {
        &self.headers
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = Some(body.into());
    }

    /// True when a body was set, even an empty one.
    pub fn has_content(&self) -> bool {
        self.body.is_some()
    }
}

/// Progress of a chain link through the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    #[default]
    Pending,
    Substituted,
    Sent,
    Resolved,
}

/// A link of a request chain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainedSubRequest {
    request: SubRequest,
    reference_id: Option<String>,
    state: LinkState,
}

impl ChainedSubRequest {
    pub fn new(request: SubRequest) -> Self {
        Self {
            request,
            ..Default::default()
        }
    }

    pub fn with_reference_id(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    /// The label later links use to address this link's response.
    ///
    /// A link without one cannot be executed; running a chain containing it
    /// is a programming error.
    pub fn reference_id(&self) -> Result<&str, CompositeError> {
        self.reference_id
            .as_deref()
            .ok_or_else(|| CompositeError::MissingReferenceId {
                uri: self.request.uri.clone(),
            })
    }

    pub fn request(&self) -> &SubRequest {
        &self.request
    }

    pub fn request_mut(&mut self) -> &mut SubRequest {
        &mut self.request
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub(crate) fn advance(&mut self, state: LinkState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_get() {
        let request = SubRequest::new("/users");
        assert_eq!(request.method(), Method::Get);
        assert!(!request.has_content());
    }

    #[test]
    fn test_empty_body_counts_as_content() {
        let request = SubRequest::new("/users").with_body("");
        assert!(request.has_content());
        assert_eq!(request.body(), Some(""));
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("patch".parse::<Method>().unwrap(), Method::Patch);
        assert_eq!("DELETE".parse::<Method>().unwrap(), Method::Delete);
        assert_eq!(
            "head".parse::<Method>().unwrap_err(),
            UnknownMethod("head".to_string())
        );
        assert_eq!(axum::http::Method::from(Method::Put), axum::http::Method::PUT);
    }

    #[test]
    fn test_reference_id_required() {
        let link = ChainedSubRequest::new(SubRequest::new("/posts/1"));
        let err = link.reference_id().unwrap_err();
        assert!(matches!(err, CompositeError::MissingReferenceId { ref uri } if uri == "/posts/1"));

        let link = link.with_reference_id("post");
        assert_eq!(link.reference_id().unwrap(), "post");
        assert_eq!(link.state(), LinkState::Pending);
    }
}
