//! Metrics collection and exposition.
//!
//! # Metrics
//! - `http_requests_total` (counter): inbound requests by method, status
//! - `http_request_duration_seconds` (histogram): inbound latency
//! - `composite_requests_total` (counter): composite calls by mode
//! - `composite_subrequests_total` (counter): sub-requests by mode, outcome
//! - `composite_subrequest_duration_seconds` (histogram): sub-request latency
//! - `throttle_decisions_total` (counter): decisions by throttle type, decision
//!
//! # Design Decisions
//! - Recording is a no-op until a recorder is installed
//! - Prometheus exporter on its own listener

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

/// Install the Prometheus recorder and its scrape endpoint.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("http_request_duration_seconds", "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_composite_request(mode: &'static str) {
    counter!("composite_requests_total", "mode" => mode).increment(1);
}

pub fn record_subrequest(mode: &'static str, outcome: &'static str, elapsed: Duration) {
    counter!("composite_subrequests_total", "mode" => mode, "outcome" => outcome).increment(1);
    histogram!("composite_subrequest_duration_seconds", "mode" => mode).record(elapsed.as_secs_f64());
}

pub fn record_throttle_decision(throttle_type: &'static str, decision: &'static str) {
    counter!("throttle_decisions_total", "throttle_type" => throttle_type, "decision" => decision).increment(1);
}
