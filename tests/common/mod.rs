//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    extract::Path,
    http::{HeaderMap, StatusCode},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use composite_api_server::config::ServerConfig;
use composite_api_server::lifecycle::{build_server, Shutdown};

/// Start a mock upstream API on an ephemeral port.
///
/// - `GET /api/widgets`, `GET /api/gadgets`: fixed JSON lists
/// - `GET /api/search`: `{"data": [{"id": 42}]}`
/// - `GET /api/items/{id}`: the item, or 404 for id 0
/// - `POST /api/items`: echoes the body with 201
/// - `GET /api/headers`: echoes `authorization` and `x-request-id`
/// - `GET /api/text`: a plain text body
/// - `GET /api/slow`: answers after five seconds
pub async fn start_upstream() -> SocketAddr {
    let app = Router::new()
        .route("/api/widgets", get(|| async { Json(json!({"widgets": [{"id": 1}, {"id": 2}]})) }))
        .route("/api/gadgets", get(|| async { Json(json!({"gadgets": []})) }))
        .route("/api/search", get(|| async { Json(json!({"data": [{"id": 42}]})) }))
        .route("/api/items/{id}", get(item))
        .route(
            "/api/items",
            axum::routing::post(|Json(body): Json<Value>| async move { (StatusCode::CREATED, Json(body)) }),
        )
        .route("/api/headers", get(echo_headers))
        .route("/api/text", get(|| async { "plain text" }))
        .route(
            "/api/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({"slow": true}))
            }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

async fn item(Path(id): Path<u64>) -> (StatusCode, Json<Value>) {
    if id == 0 {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "not_found"})));
    }
    (StatusCode::OK, Json(json!({"id": id, "name": format!("item-{}", id)})))
}

async fn echo_headers(headers: HeaderMap) -> Json<Value> {
    let get = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string);
    Json(json!({
        "authorization": get("authorization"),
        "x_request_id": get("x-request-id"),
    }))
}

/// A config pointing the composite executor at `upstream`.
pub fn config_for(upstream: SocketAddr) -> ServerConfig {
    let mut config = ServerConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.composite.base_url = format!("http://{}", upstream);
    config.composite.timeout_secs = 1;
    config
}

/// A running server and the handle that stops it.
pub struct TestServer {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Build and start a server for `config` on an ephemeral port.
pub async fn start_server(config: ServerConfig) -> TestServer {
    let server = build_server(config).await.unwrap();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let receiver = shutdown.subscribe();
    tokio::spawn(async move {
        server.run(listener, receiver).await.unwrap();
    });

    TestServer { addr, shutdown }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .unwrap()
}
