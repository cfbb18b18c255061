//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::composite::TokenPolicy;
use crate::throttling::ThrottleKind;

/// Root configuration for the composite API server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, inbound limits).
    pub listener: ListenerConfig,

    /// Composite batch/chain execution settings.
    pub composite: CompositeConfig,

    /// Rate limiting configuration.
    pub throttling: ThrottlingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum inbound body size in bytes.
    pub max_body_size: usize,

    /// Total time allowed for one inbound request, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_body_size: 2 * 1024 * 1024, // 2MB
            request_timeout_secs: 30,
        }
    }
}

/// Composite execution configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CompositeConfig {
    /// Base URL every sub-request URI is resolved against.
    pub base_url: String,

    /// Per sub-request timeout in seconds.
    pub timeout_secs: u64,

    /// What the chain executor does with a placeholder whose path is absent.
    pub token_policy: TokenPolicy,

    /// Replacement text used when `token_policy` is lenient.
    pub missing_token_value: String,

    /// Maximum number of entries accepted in one composite call.
    pub max_requests: usize,
}

impl Default for CompositeConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080".to_string(),
            timeout_secs: 10,
            token_policy: TokenPolicy::Strict,
            missing_token_value: String::new(),
            max_requests: 50,
        }
    }
}

/// Backing store for throttle counters and buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Process-local store; only correct for a single instance.
    #[default]
    Memory,
    /// Shared Redis store (requires the `redis` feature).
    Redis,
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ThrottlingConfig {
    /// Master switch. When false every throttler allows everything.
    pub enabled: bool,

    /// Where throttle state lives.
    pub store: StoreBackend,

    /// Redis connection URL, required when `store = "redis"`.
    pub redis_url: Option<String>,

    /// Prefix prepended to every hashed throttle key.
    pub key_prefix: String,

    /// Throttling rules applied to the composite routes, outermost first.
    pub rules: Vec<ThrottleRuleConfig>,
}

impl Default for ThrottlingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            store: StoreBackend::Memory,
            redis_url: None,
            key_prefix: "throttle".to_string(),
            rules: Vec::new(),
        }
    }
}

/// One throttling rule, e.g. "60 requests per 60 seconds per IP".
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ThrottleRuleConfig {
    /// Named throttler; also selects the algorithm.
    pub kind: ThrottleKind,

    /// Requests allowed per period.
    pub rate: u64,

    /// Period length in seconds.
    pub period_secs: u64,

    /// Extra requests allowed on top of `rate`.
    #[serde(default)]
    pub burst: u64,

    /// Header carrying the caller key for kinds that are not IP based.
    #[serde(default)]
    pub key_header: Option<String>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log line format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.composite.timeout_secs, 10);
        assert_eq!(config.composite.token_policy, TokenPolicy::Strict);
        assert!(config.throttling.enabled);
        assert_eq!(config.throttling.store, StoreBackend::Memory);
        assert_eq!(config.throttling.key_prefix, "throttle");
    }

    #[test]
    fn test_minimal_toml() {
        let raw = r#"
            [composite]
            base_url = "http://api.internal:9000"

            [[throttling.rules]]
            kind = "ip"
            rate = 60
            period_secs = 60
        "#;
        let config: ServerConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.composite.base_url, "http://api.internal:9000");
        assert_eq!(config.composite.timeout_secs, 10);
        assert_eq!(config.throttling.rules.len(), 1);
        assert_eq!(config.throttling.rules[0].kind, ThrottleKind::Ip);
        assert_eq!(config.throttling.rules[0].burst, 0);
        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
    }
}
