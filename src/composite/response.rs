//! Captured sub-responses.
//!
//! [`CompositeResponse`] is either a [`SubResponse`] read off the wire or a
//! [`FailedResponse`] synthesized when the call never completed. A failed
//! response is a terminal sentinel: it has a fixed status, no headers and an
//! error envelope body, and offers no way to change any of them.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::composite::error::CompositeError;
use crate::composite::request::HeaderBag;

/// Content type a response must carry for its body to be decoded.
pub const JSON_CONTENT_TYPE: &str = "application/json";

static NO_HEADERS: HeaderBag = HeaderBag::new();

/// A response captured from an upstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubResponse {
    status_code: u16,
    headers: HeaderBag,
    body: String,
    source_uri: String,
}

impl SubResponse {
    pub fn new(status_code: u16) -> Self {
        Self {
            status_code,
            headers: HeaderBag::new(),
            body: String::new(),
            source_uri: String::new(),
        }
    }

    pub fn with_headers(mut self, headers: HeaderBag) -> Self {
        self.headers = headers;
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_source_uri(mut self, uri: impl Into<String>) -> Self {
        self.source_uri = uri.into();
        self
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn set_status_code(&mut self, status_code: u16) {
        self.status_code = status_code;
    }

    pub fn headers(&self) -> &HeaderBag {
        &self.headers
    }

    pub fn set_headers(&mut self, headers: HeaderBag) {
        self.headers = headers;
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
    }

    pub fn source_uri(&self) -> &str {
        &self.source_uri
    }

    /// True when the `Content-Type` header is exactly `application/json`.
    pub fn is_json(&self) -> bool {
        self.headers
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case("content-type"))
            .is_some_and(|(_, values)| values.len() == 1 && values[0] == JSON_CONTENT_TYPE)
    }

    /// The decoded JSON body. Only JSON responses have one.
    pub fn serialized_body(&self) -> Result<Value, CompositeError> {
        if !self.is_json() {
            return Err(CompositeError::NotJson {
                uri: self.source_uri.clone(),
            });
        }

        serde_json::from_str(&self.body).map_err(|e| CompositeError::InvalidJson {
            uri: self.source_uri.clone(),
            reason: e.to_string(),
        })
    }
}

/// Stand-in for a sub-request that could not complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedResponse {
    reason: String,
    source_uri: String,
}

impl FailedResponse {
    pub const STATUS_CODE: u16 = 503;
    pub const ERROR_KEY: &'static str = "service_unavailable";

    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            source_uri: String::new(),
        }
    }

    pub fn with_source_uri(mut self, uri: impl Into<String>) -> Self {
        self.source_uri = uri.into();
        self
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn source_uri(&self) -> &str {
        &self.source_uri
    }

    pub fn error_envelope(&self) -> Value {
        json!({
            "error": Self::ERROR_KEY,
            "error_message": self.reason,
        })
    }
}

/// Serialized form of one composite slot: `{status, uri, headers, body}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEntry {
    pub status: u16,
    pub uri: String,
    pub headers: HeaderBag,
    pub body: Value,
}

/// Outcome of one sub-request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompositeResponse {
    Received(SubResponse),
    Failed(FailedResponse),
}

impl CompositeResponse {
    pub fn status_code(&self) -> u16 {
        match self {
            CompositeResponse::Received(r) => r.status_code(),
            CompositeResponse::Failed(_) => FailedResponse::STATUS_CODE,
        }
    }

    pub fn headers(&self) -> &HeaderBag {
        match self {
            CompositeResponse::Received(r) => r.headers(),
            CompositeResponse::Failed(_) => &NO_HEADERS,
        }
    }

    pub fn body(&self) -> Cow<'_, str> {
        match self {
            CompositeResponse::Received(r) => Cow::Borrowed(r.body()),
            CompositeResponse::Failed(f) => Cow::Owned(f.error_envelope().to_string()),
        }
    }

    pub fn source_uri(&self) -> &str {
        match self {
            CompositeResponse::Received(r) => r.source_uri(),
            CompositeResponse::Failed(f) => f.source_uri(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, CompositeResponse::Failed(_))
    }

    pub fn serialized_body(&self) -> Result<Value, CompositeError> {
        match self {
            CompositeResponse::Received(r) => r.serialized_body(),
            CompositeResponse::Failed(f) => Ok(f.error_envelope()),
        }
    }

    /// The body as chain reference data: any body that parses as JSON,
    /// whatever its `Content-Type` says.
    pub fn reference_value(&self) -> Result<Value, CompositeError> {
        match self {
            CompositeResponse::Received(r) => serde_json::from_str(r.body()).map_err(|e| CompositeError::InvalidJson {
                uri: r.source_uri().to_string(),
                reason: e.to_string(),
            }),
            CompositeResponse::Failed(f) => Ok(f.error_envelope()),
        }
    }

    /// Serialize for the caller. Non-JSON bodies are passed through as text.
    pub fn to_entry(&self) -> ResponseEntry {
        let body = match self {
            CompositeResponse::Received(r) => r
                .serialized_body()
                .unwrap_or_else(|_| Value::String(r.body().to_string())),
            CompositeResponse::Failed(f) => f.error_envelope(),
        };

        ResponseEntry {
            status: self.status_code(),
            uri: self.source_uri().to_string(),
            headers: self.headers().clone(),
            body,
        }
    }
}

impl From<SubResponse> for CompositeResponse {
    fn from(response: SubResponse) -> Self {
        CompositeResponse::Received(response)
    }
}

impl From<FailedResponse> for CompositeResponse {
    fn from(response: FailedResponse) -> Self {
        CompositeResponse::Failed(response)
    }
}
