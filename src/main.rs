//! Composite API server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ─────────────────▶ http server ─▶ request id ─▶ throttling rules ─▶ handler
//!                                                          │                  │
//!                                                          ▼                  ▼
//!                                                   throttle store     composite executor
//!                                                  (memory / redis)   (parallel or chain)
//!                                                                             │
//!                                                                             ▼
//!     Client Response                                                   upstream API
//!     ◀──────────────── one JSON object keyed by sub-request URI ◀───────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use composite_api_server::config::{load_config, ServerConfig};
use composite_api_server::lifecycle::{build_server, wait_for_signal, Shutdown};
use composite_api_server::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "composite-api-server", version, about = "Composite API server")]
struct Args {
    /// Path to the TOML configuration file. Defaults are used when omitted.
    #[arg(short, long, env = "COMPOSITE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };

    logging::init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "composite-api-server starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        base_url = %config.composite.base_url,
        timeout_secs = config.composite.timeout_secs,
        rules = config.throttling.rules.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let server = build_server(config).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
