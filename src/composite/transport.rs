//! Sub-request transport.
//!
//! # Responsibilities
//! - Resolve a sub-request URI against the configured base URL
//! - Send it upstream and capture status, headers and body
//! - Report failures as [`TransportError`] without panicking
//!
//! # Design Decisions
//! - Executors only see the [`Transport`] trait, so tests can script upstreams
//! - Deadlines are applied by the executors, not here

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderValue, Request, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use thiserror::Error;
use url::Url;

use crate::composite::request::{HeaderBag, SubRequest};
use crate::composite::response::{SubResponse, JSON_CONTENT_TYPE};

/// Largest upstream body the transport will buffer.
pub const MAX_RESPONSE_BYTES: usize = 8 * 1024 * 1024;

/// Why a sub-request did not produce a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("invalid request URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("invalid request to '{uri}': {reason}")]
    InvalidRequest { uri: String, reason: String },

    #[error("request to '{uri}' failed: {reason}")]
    Connect { uri: String, reason: String },

    #[error("request to '{uri}' timed out after {secs} seconds")]
    Timeout { uri: String, secs: u64 },

    #[error("failed to read response from '{uri}': {reason}")]
    Body { uri: String, reason: String },
}

/// Something that can carry a sub-request to an upstream.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &SubRequest) -> Result<SubResponse, TransportError>;
}

/// Transport over a pooled hyper client, rooted at a base URL.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client<HttpConnector, Body>,
    base_url: Url,
}

impl HttpTransport {
    pub fn new(base_url: Url) -> Self {
        let client = Client::builder(TokioExecutor::new()).build(HttpConnector::new());

        Self { client, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn resolve(&self, uri: &str) -> Result<Uri, TransportError> {
        let invalid = |reason: String| TransportError::InvalidUri {
            uri: uri.to_string(),
            reason,
        };

        let url = self.base_url.join(uri).map_err(|e| invalid(e.to_string()))?;
        if url.origin() != self.base_url.origin() {
            return Err(invalid(format!("leaves the base URL {}", self.base_url)));
        }
        url.as_str().parse::<Uri>().map_err(|e| invalid(e.to_string()))
    }

    fn build_request(&self, request: &SubRequest) -> Result<Request<Body>, TransportError> {
        let uri = self.resolve(request.uri())?;

        let mut builder = Request::builder()
            .method(axum::http::Method::from(request.method()))
            .uri(uri);

        for (name, values) in request.headers() {
            for value in values {
                builder = builder.header(name.as_str(), value.as_str());
            }
        }

        let body = match request.body() {
            Some(body) => {
                let has_content_type = request
                    .headers()
                    .keys()
                    .any(|name| name.eq_ignore_ascii_case(header::CONTENT_TYPE.as_str()));
                if !has_content_type {
                    builder = builder.header(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
                }
                Body::from(body.to_string())
            }
            None => Body::empty(),
        };

        builder.body(body).map_err(|e| TransportError::InvalidRequest {
            uri: request.uri().to_string(),
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: &SubRequest) -> Result<SubResponse, TransportError> {
        let outbound = self.build_request(request)?;
        let uri = request.uri().to_string();

        tracing::debug!(method = %request.method(), uri = %uri, "Sending sub-request");

        let response = self
            .client
            .request(outbound)
            .await
            .map_err(|e| TransportError::Connect {
                uri: uri.clone(),
                reason: e.to_string(),
            })?;

        let (parts, body) = response.into_parts();
        let bytes = axum::body::to_bytes(Body::new(body), MAX_RESPONSE_BYTES)
            .await
            .map_err(|e| TransportError::Body {
                uri: uri.clone(),
                reason: e.to_string(),
            })?;

        Ok(SubResponse::new(parts.status.as_u16())
            .with_headers(header_bag(&parts.headers))
            .with_body(String::from_utf8_lossy(&bytes).into_owned())
            .with_source_uri(uri))
    }
}

/// Group a header map by name. Values that are not valid text are dropped.
pub fn header_bag(headers: &HeaderMap) -> HeaderBag {
    let mut bag = HeaderBag::new();
    for (name, value) in headers {
        if let Ok(value) = value.to_str() {
            bag.entry(name.as_str().to_string())
                .or_default()
                .push(value.to_string());
        }
    }
    bag
}
