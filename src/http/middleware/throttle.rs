//! Throttling middleware.
//!
//! One instance per configured rule. The rule picks the subject (client IP or
//! a header value), runs it through the registry and either lets the request
//! through with `X-RateLimit-*` headers attached or answers 429.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{header, HeaderName, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::config::ThrottleRuleConfig;
use crate::http::error::ApiError;
use crate::throttling::{RateLimit, ThrottleError, ThrottleKind, ThrottleRegistry};

/// Where a rule finds the value it throttles on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySource {
    ClientIp,
    Header(HeaderName),
}

impl KeySource {
    /// Token kinds key on the bearer credential, everything else on the peer.
    pub fn default_for(kind: ThrottleKind) -> Self {
        match kind {
            ThrottleKind::Token | ThrottleKind::AccessTokenRate => KeySource::Header(header::AUTHORIZATION),
            _ => KeySource::ClientIp,
        }
    }
}

#[derive(Clone)]
pub struct ThrottleRule {
    registry: Arc<ThrottleRegistry>,
    kind: ThrottleKind,
    limit: RateLimit,
    key_source: KeySource,
}

impl ThrottleRule {
    pub fn new(registry: Arc<ThrottleRegistry>, kind: ThrottleKind, limit: RateLimit) -> Self {
        Self {
            registry,
            kind,
            limit,
            key_source: KeySource::default_for(kind),
        }
    }

    pub fn with_key_source(mut self, key_source: KeySource) -> Self {
        self.key_source = key_source;
        self
    }

    pub fn from_config(
        registry: Arc<ThrottleRegistry>,
        config: &ThrottleRuleConfig,
    ) -> Result<Self, header::InvalidHeaderName> {
        let limit = RateLimit::new(config.rate, config.period_secs).with_burst(config.burst);
        let rule = Self::new(registry, config.kind, limit);

        Ok(match &config.key_header {
            Some(name) => rule.with_key_source(KeySource::Header(HeaderName::from_bytes(name.as_bytes())?)),
            None => rule,
        })
    }

    pub fn kind(&self) -> ThrottleKind {
        self.kind
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    pub fn key_source(&self) -> &KeySource {
        &self.key_source
    }

    fn subject(&self, request: &Request<Body>) -> Result<String, ThrottleError> {
        match &self.key_source {
            KeySource::ClientIp => Ok(request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
                .unwrap_or_else(|| "unknown".to_string())),
            KeySource::Header(name) => request
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
                .ok_or_else(|| ThrottleError::MissingKey(format!("{} header", name))),
        }
    }
}

pub async fn throttle_middleware(
    State(rule): State<ThrottleRule>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let subject = match rule.subject(&request) {
        Ok(subject) => subject,
        Err(e) => return ApiError::from(e).into_response(),
    };

    match rule.registry.assert_throttle(rule.kind, &subject, rule.limit).await {
        Ok(headers) => {
            let mut response = next.run(request).await;
            headers.apply(response.headers_mut());
            response
        }
        Err(e) => {
            if matches!(e, ThrottleError::TooManyRequests { .. }) {
                tracing::info!(throttle_type = %rule.kind, path = %request.uri().path(), "Request throttled");
            }
            ApiError::from(e).into_response()
        }
    }
}
