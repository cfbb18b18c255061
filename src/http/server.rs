//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with the composite and health handlers
//! - Wire up middleware (request ID, tracing, limits, metrics, throttling)
//! - Bind the router to a listener and serve until shutdown
//! - Keep the in-memory throttle store from growing without bound

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    http::Request,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer};

use crate::composite::{TokenSubstituter, Transport};
use crate::config::{CompositeConfig, ServerConfig};
use crate::http::handlers::{chain_handler, health, parallel_handler};
use crate::http::middleware::{throttle_middleware, ThrottleRule};
use crate::http::request::RequestIdLayer;
use crate::observability::metrics;
use crate::throttling::MemoryThrottleStore;

/// How often expired entries are swept from the in-memory throttle store.
pub const JANITOR_INTERVAL: Duration = Duration::from_secs(60);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub transport: Arc<dyn Transport>,
    pub composite: CompositeConfig,
}

impl AppState {
    pub fn subrequest_timeout(&self) -> Duration {
        Duration::from_secs(self.composite.timeout_secs)
    }

    pub fn substituter(&self) -> TokenSubstituter {
        TokenSubstituter::new(self.composite.token_policy, self.composite.missing_token_value.clone())
    }
}

/// HTTP server for the composite API.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    janitor: Option<Arc<MemoryThrottleStore>>,
}

impl HttpServer {
    /// `rules` are applied in order, the first one outermost.
    pub fn new(config: ServerConfig, transport: Arc<dyn Transport>, rules: Vec<ThrottleRule>) -> Self {
        let state = AppState {
            transport,
            composite: config.composite.clone(),
        };

        let router = Self::build_router(&config, state, rules);
        Self {
            router,
            config,
            janitor: None,
        }
    }

    /// Periodically purge expired entries from `store` while running.
    pub fn with_janitor(mut self, store: Arc<MemoryThrottleStore>) -> Self {
        self.janitor = Some(store);
        self
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: AppState, rules: Vec<ThrottleRule>) -> Router {
        let mut composite = Router::new()
            .route("/composite/parallel", post(parallel_handler))
            .route("/composite/chain", post(chain_handler));
        for rule in rules.into_iter().rev() {
            composite = composite.route_layer(middleware::from_fn_with_state(rule, throttle_middleware));
        }

        Router::new()
            .route("/health", get(health))
            .merge(composite)
            .with_state(state)
            .layer(middleware::from_fn(track_metrics))
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_size))
            .layer(TimeoutLayer::new(Duration::from_secs(config.listener.request_timeout_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(RequestIdLayer)
    }

    /// The fully layered router, for driving the server without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            base_url = %self.config.composite.base_url,
            "HTTP server starting"
        );

        if let Some(store) = self.janitor.clone() {
            spawn_janitor(store, shutdown.resubscribe());
        }

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

async fn track_metrics(request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();

    let response = next.run(request).await;
    metrics::record_request(method.as_str(), response.status().as_u16(), start);
    response
}

fn spawn_janitor(store: Arc<MemoryThrottleStore>, mut shutdown: broadcast::Receiver<()>) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(JANITOR_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let purged = store.purge_expired();
                    if purged > 0 {
                        tracing::debug!(purged, remaining = store.len(), "Purged expired throttle entries");
                    }
                }
                _ = shutdown.recv() => break,
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::testing::ScriptedTransport;
    use crate::http::request::X_REQUEST_ID;
    use axum::http::StatusCode;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn server(transport: ScriptedTransport) -> HttpServer {
        HttpServer::new(ServerConfig::default(), Arc::new(transport), Vec::new())
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let response = server(ScriptedTransport::new())
            .router()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_REQUEST_ID));
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_parallel_round_trip() {
        let transport = ScriptedTransport::new().json("/api/widgets", 200, r#"{"count": 3}"#);
        let response = server(transport)
            .router()
            .oneshot(post_json("/composite/parallel", json!({"/api/widgets": {"method": "GET"}})))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["/api/widgets"]["status"], 200);
        assert_eq!(body["/api/widgets"]["body"], json!({"count": 3}));
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let request = Request::builder()
            .method("POST")
            .uri("/composite/chain")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = server(ScriptedTransport::new()).router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "bad_request");
    }
}
