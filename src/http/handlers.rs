//! Endpoint handlers.
//!
//! `POST /composite/parallel` and `POST /composite/chain` accept the same body
//! shape and answer with a JSON object keyed by request URI, in input order.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::HeaderMap,
    Json,
};
use indexmap::IndexMap;
use serde_json::{json, Value};

use crate::composite::{
    forwardable_headers, parse_entries, BatchExecutor, ChainExecutor, CompositeEntry, CompositeMode,
    ResponseEntry,
};
use crate::http::error::ApiError;
use crate::http::server::AppState;

type CompositeReply = Result<Json<IndexMap<String, ResponseEntry>>, ApiError>;

fn entries(
    payload: Result<Json<Value>, JsonRejection>,
    mode: CompositeMode,
    max_requests: usize,
) -> Result<Vec<CompositeEntry>, ApiError> {
    let Json(input) = payload.map_err(|rejection| ApiError::Validation(vec![rejection.body_text()]))?;
    parse_entries(&input, mode, max_requests).map_err(ApiError::Validation)
}

pub async fn parallel_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> CompositeReply {
    let entries = entries(payload, CompositeMode::Parallel, state.composite.max_requests)?;
    let forwarded = forwardable_headers(&headers);

    let mut batch = BatchExecutor::new(state.transport.clone()).with_timeout(state.subrequest_timeout());
    for entry in &entries {
        batch.add_request(entry.to_sub_request(&forwarded));
    }

    tracing::debug!(requests = entries.len(), "Running parallel composite request");
    Ok(Json(batch.run().await.read_responses()))
}

pub async fn chain_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<Value>, JsonRejection>,
) -> CompositeReply {
    let entries = entries(payload, CompositeMode::Chain, state.composite.max_requests)?;
    let forwarded = forwardable_headers(&headers);

    let mut chain = ChainExecutor::new(state.transport.clone())
        .with_timeout(state.subrequest_timeout())
        .with_substituter(state.substituter());
    for entry in &entries {
        chain.add_request(entry.to_chained(&forwarded));
    }

    tracing::debug!(requests = entries.len(), "Running chained composite request");
    Ok(Json(chain.run().await?.read_responses()))
}

pub async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
