//! Composite request bodies.
//!
//! Both endpoints take a JSON object mapping a URI to `{method, body?, ref?}`.
//! The whole object is validated before anything is sent, and every problem
//! found is reported, not just the first.

use axum::http::{header, HeaderMap};
use serde_json::Value;

use crate::composite::request::{ChainedSubRequest, HeaderBag, Method, SubRequest};
use crate::composite::transport::header_bag;

/// How a composite request is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeMode {
    Parallel,
    Chain,
}

impl CompositeMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositeMode::Parallel => "parallel",
            CompositeMode::Chain => "chain",
        }
    }
}

/// One validated entry of a composite request body.
#[derive(Debug, Clone, PartialEq)]
pub struct CompositeEntry {
    pub uri: String,
    pub method: Method,
    pub body: Option<Value>,
    pub reference: Option<String>,
}

impl CompositeEntry {
    pub fn to_sub_request(&self, headers: &HeaderBag) -> SubRequest {
        let mut request = SubRequest::new(self.uri.clone())
            .with_method(self.method)
            .with_headers(headers.clone());
        if let Some(body) = &self.body {
            request.set_body(body.to_string());
        }
        request
    }

    pub fn to_chained(&self, headers: &HeaderBag) -> ChainedSubRequest {
        let link = ChainedSubRequest::new(self.to_sub_request(headers));
        match &self.reference {
            Some(reference) => link.with_reference_id(reference.clone()),
            None => link,
        }
    }
}

/// Validate a composite request body.
///
/// Sub-request URIs are paths under the base URL, never another origin.
fn is_relative_path(uri: &str) -> bool {
    uri.starts_with('/') && !uri.starts_with("//") && !uri.starts_with("/\\")
}

/// Chain entries additionally need a `ref` that no other entry uses.
pub fn parse_entries(
    input: &Value,
    mode: CompositeMode,
    max_requests: usize,
) -> Result<Vec<CompositeEntry>, Vec<String>> {
    let Some(object) = input.as_object() else {
        return Err(vec![
            "request body must be a JSON object mapping URIs to requests".to_string(),
        ]);
    };

    let mut errors = Vec::new();

    if object.is_empty() {
        errors.push("at least one request is required".to_string());
    }
    if object.len() > max_requests {
        errors.push(format!(
            "at most {} requests are allowed, got {}",
            max_requests,
            object.len()
        ));
    }

    let mut entries: Vec<CompositeEntry> = Vec::with_capacity(object.len());

    for (uri, entry) in object {
        if !is_relative_path(uri) {
            errors.push(format!("{uri}: URI must be a path starting with a single '/'"));
        }

        let Some(fields) = entry.as_object() else {
            errors.push(format!("{uri}: entry must be an object"));
            continue;
        };

        let method = match fields.get("method") {
            None | Some(Value::Null) => {
                errors.push(format!("{uri}: method is required"));
                None
            }
            Some(Value::String(name)) => match name.parse::<Method>() {
                Ok(method) => Some(method),
                Err(e) => {
                    errors.push(format!("{uri}: {e}"));
                    None
                }
            },
            Some(_) => {
                errors.push(format!("{uri}: method must be a string"));
                None
            }
        };

        let body = match fields.get("body") {
            None | Some(Value::Null) => None,
            Some(body @ Value::Object(_)) => Some(body.clone()),
            Some(_) => {
                errors.push(format!("{uri}: body must be an object"));
                None
            }
        };

        let reference = match (mode, fields.get("ref")) {
            (CompositeMode::Parallel, _) => None,
            (CompositeMode::Chain, Some(Value::String(reference))) if !reference.is_empty() => {
                if let Some(other) = entries
                    .iter()
                    .find(|e| e.reference.as_deref() == Some(reference.as_str()))
                {
                    errors.push(format!(
                        "{uri}: ref '{reference}' is already used by '{}'",
                        other.uri
                    ));
                }
                Some(reference.clone())
            }
            (CompositeMode::Chain, _) => {
                errors.push(format!("{uri}: ref is required"));
                None
            }
        };

        if let Some(method) = method {
            entries.push(CompositeEntry {
                uri: uri.clone(),
                method,
                body,
                reference,
            });
        }
    }

    if errors.is_empty() {
        Ok(entries)
    } else {
        Err(errors)
    }
}

/// Inbound headers to pass on to every sub-request.
///
/// Framing headers describe the inbound body, not the sub-request bodies, and
/// `Host` names this server rather than the upstream.
pub fn forwardable_headers(headers: &HeaderMap) -> HeaderBag {
    let mut bag = header_bag(headers);
    for name in [header::CONTENT_LENGTH, header::TRANSFER_ENCODING, header::HOST] {
        bag.remove(name.as_str());
    }
    bag
}
