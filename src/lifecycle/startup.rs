//! Startup orchestration.
//!
//! # Responsibilities
//! - Validate configuration
//! - Build the sub-request transport and the throttle store
//! - Turn throttling rules into middleware
//! - Hand back a server ready to be bound to a listener
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::sync::Arc;

use axum::http::header::InvalidHeaderName;
use thiserror::Error;
use url::Url;

use crate::composite::{HttpTransport, Transport};
use crate::config::{validate_config, ConfigError, ServerConfig, StoreBackend, ThrottlingConfig};
use crate::http::{HttpServer, ThrottleRule};
use crate::throttling::{
    MemoryThrottleStore, SystemClock, ThrottleContext, ThrottleError, ThrottleKind, ThrottleRegistry,
    ThrottleStore,
};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("invalid composite.base_url: {0}")]
    BaseUrl(#[from] url::ParseError),

    #[error("invalid key_header for the {kind} throttling rule: {source}")]
    KeyHeader {
        kind: ThrottleKind,
        #[source]
        source: InvalidHeaderName,
    },

    #[error("throttling.redis_url is required when store = \"redis\"")]
    MissingRedisUrl,

    #[error("throttling.store = \"redis\" needs a build with the `redis` feature")]
    RedisUnavailable,

    #[error("throttle store unavailable: {0}")]
    Store(#[from] ThrottleError),
}

/// Build the server described by `config`.
pub async fn build_server(config: ServerConfig) -> Result<HttpServer, StartupError> {
    validate_config(&config).map_err(ConfigError::Validation)?;

    let base_url = Url::parse(&config.composite.base_url)?;
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(base_url));

    let (store, janitor) = build_store(&config.throttling).await?;
    let context = ThrottleContext::new(store, Arc::new(SystemClock))
        .with_enabled(config.throttling.enabled)
        .with_key_prefix(config.throttling.key_prefix.clone());
    let registry = Arc::new(ThrottleRegistry::new(context));

    let rules = config
        .throttling
        .rules
        .iter()
        .map(|rule| {
            ThrottleRule::from_config(registry.clone(), rule).map_err(|source| StartupError::KeyHeader {
                kind: rule.kind,
                source,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    for rule in &rules {
        tracing::info!(
            throttle_type = %rule.kind(),
            rate = rule.limit().rate,
            period_secs = rule.limit().period_secs,
            burst = rule.limit().burst,
            key_source = ?rule.key_source(),
            "Throttling rule installed"
        );
    }
    if !config.throttling.enabled {
        tracing::warn!("Throttling is disabled; every request will be allowed");
    }

    let server = HttpServer::new(config, transport, rules);
    Ok(match janitor {
        Some(store) => server.with_janitor(store),
        None => server,
    })
}

/// The shared store, plus the in-memory store again when it needs sweeping.
async fn build_store(
    config: &ThrottlingConfig,
) -> Result<(Arc<dyn ThrottleStore>, Option<Arc<MemoryThrottleStore>>), StartupError> {
    match config.store {
        StoreBackend::Memory => {
            let memory = Arc::new(MemoryThrottleStore::new());
            let store: Arc<dyn ThrottleStore> = memory.clone();
            tracing::info!("Using in-memory throttle store");
            Ok((store, Some(memory)))
        }
        StoreBackend::Redis => Ok((connect_redis(config).await?, None)),
    }
}

#[cfg(feature = "redis")]
async fn connect_redis(config: &ThrottlingConfig) -> Result<Arc<dyn ThrottleStore>, StartupError> {
    let url = config.redis_url.as_deref().ok_or(StartupError::MissingRedisUrl)?;
    let store = crate::throttling::store::RedisThrottleStore::connect(url).await?;
    tracing::info!("Using Redis throttle store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis"))]
async fn connect_redis(config: &ThrottlingConfig) -> Result<Arc<dyn ThrottleStore>, StartupError> {
    if config.redis_url.is_none() {
        return Err(StartupError::MissingRedisUrl);
    }
    Err(StartupError::RedisUnavailable)
}
