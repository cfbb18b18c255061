//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, rates > 0)
//! - Check that addresses and the composite base URL parse
//! - Check throttle rules are expressible by their algorithm
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::{ServerConfig, StoreBackend};
use crate::throttling::Algorithm;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration, collecting every error.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::new("listener.request_timeout_secs", "must be greater than 0"));
    }

    match url::Url::parse(&config.composite.base_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "composite.base_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(
            "composite.base_url",
            format!("'{}' is not a URL: {}", config.composite.base_url, e),
        )),
    }
    if config.composite.timeout_secs == 0 {
        errors.push(ValidationError::new("composite.timeout_secs", "must be greater than 0"));
    }
    if config.composite.max_requests == 0 {
        errors.push(ValidationError::new("composite.max_requests", "must be greater than 0"));
    }

    if config.throttling.store == StoreBackend::Redis && config.throttling.redis_url.is_none() {
        errors.push(ValidationError::new("throttling.redis_url", "required when store = \"redis\""));
    }

    for (i, rule) in config.throttling.rules.iter().enumerate() {
        let field = |name: &str| format!("throttling.rules[{}].{}", i, name);

        if rule.rate == 0 {
            errors.push(ValidationError::new(field("rate"), "must be greater than 0"));
        }
        if rule.period_secs == 0 {
            errors.push(ValidationError::new(field("period_secs"), "must be greater than 0"));
        } else if rule.kind.algorithm() == Algorithm::TokenBucket && rule.rate / rule.period_secs == 0 {
            errors.push(ValidationError::new(
                field("rate"),
                format!(
                    "{} uses a token bucket and needs at least 1 request per second ({} per {}s given)",
                    rule.kind, rule.rate, rule.period_secs
                ),
            ));
        }
        if let Some(header) = &rule.key_header {
            if axum::http::HeaderName::from_bytes(header.as_bytes()).is_err() {
                errors.push(ValidationError::new(
                    field("key_header"),
                    format!("'{}' is not a header name", header),
                ));
            }
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::ThrottleRuleConfig;
    use crate::throttling::ThrottleKind;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = ServerConfig::default();
        config.composite.base_url = "ftp://files".into();
        config.composite.timeout_secs = 0;
        config.throttling.store = StoreBackend::Redis;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["composite.base_url", "composite.timeout_secs", "throttling.redis_url"]
        );
    }

    #[test]
    fn test_token_bucket_rule_needs_per_second_rate() {
        let mut config = ServerConfig::default();
        config.throttling.rules.push(ThrottleRuleConfig {
            kind: ThrottleKind::AccessTokenRate,
            rate: 30,
            period_secs: 60,
            burst: 0,
            key_header: None,
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "throttling.rules[0].rate");

        // The same rate is fine for a fixed window.
        config.throttling.rules[0].kind = ThrottleKind::Username;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_rejects_bad_key_header() {
        let mut config = ServerConfig::default();
        config.throttling.rules.push(ThrottleRuleConfig {
            kind: ThrottleKind::Username,
            rate: 5,
            period_secs: 60,
            burst: 0,
            key_header: Some("x user".into()),
        });

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "throttling.rules[0].key_header");
    }
}
