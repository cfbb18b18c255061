//! Concurrent composite execution.
//!
//! Every queued request is dispatched on its own Tokio task; `run` then waits
//! for all of them. A request that fails or times out never affects its
//! siblings: its slot holds a [`FailedResponse`] instead.

use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;

use crate::composite::input::CompositeMode;
use crate::composite::request::SubRequest;
use crate::composite::response::{CompositeResponse, FailedResponse, ResponseEntry};
use crate::composite::transport::{Transport, TransportError};
use crate::observability::metrics;
use crate::resilience::timeouts::{send_with_timeout, DEFAULT_SUBREQUEST_TIMEOUT};

const MODE: CompositeMode = CompositeMode::Parallel;

/// Runs independent sub-requests concurrently, keyed by URI.
pub struct BatchExecutor {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    requests: Vec<SubRequest>,
    responses: IndexMap<String, CompositeResponse>,
}

impl BatchExecutor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            timeout: DEFAULT_SUBREQUEST_TIMEOUT,
            requests: Vec::new(),
            responses: IndexMap::new(),
        }
    }

    /// Deadline applied to each sub-request individually.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Queue a request. Nothing is validated until it is sent.
    pub fn add_request(&mut self, request: SubRequest) -> &mut Self {
        self.requests.push(request);
        self
    }

    pub fn requests(&self) -> &[SubRequest] {
        &self.requests
    }

    /// Send every queued request and wait until all of them have resolved.
    pub async fn run(&mut self) -> &mut Self {
        metrics::record_composite_request(MODE.as_str());

        let handles: Vec<_> = self
            .requests
            .iter()
            .cloned()
            .map(|request| {
                let transport = Arc::clone(&self.transport);
                let limit = self.timeout;
                tokio::spawn(async move {
                    let started = Instant::now();
                    let result = send_with_timeout(transport.as_ref(), &request, limit).await;
                    (result, started.elapsed())
                })
            })
            .collect();

        for (request, handle) in self.requests.iter().zip(handles) {
            let uri = request.uri().to_string();

            let response = match handle.await {
                Ok((Ok(response), elapsed)) => {
                    metrics::record_subrequest(MODE.as_str(), "success", elapsed);
                    CompositeResponse::Received(response.with_source_uri(uri.clone()))
                }
                Ok((Err(e), elapsed)) => {
                    tracing::warn!(uri = %uri, error = %e, "Sub-request failed");
                    metrics::record_subrequest(MODE.as_str(), failure_outcome(&e), elapsed);
                    FailedResponse::new(e.to_string()).with_source_uri(uri.clone()).into()
                }
                Err(e) => {
                    tracing::error!(uri = %uri, error = %e, "Sub-request task did not complete");
                    metrics::record_subrequest(MODE.as_str(), "aborted", Duration::ZERO);
                    FailedResponse::new("sub-request task did not complete")
                        .with_source_uri(uri.clone())
                        .into()
                }
            };

            self.responses.insert(uri, response);
        }

        self
    }

    /// Responses keyed by request URI, in the order requests were queued.
    pub fn responses(&self) -> &IndexMap<String, CompositeResponse> {
        &self.responses
    }

    /// Responses in their serialized `{status, uri, headers, body}` form.
    pub fn read_responses(&self) -> IndexMap<String, ResponseEntry> {
        self.responses
            .iter()
            .map(|(uri, response)| (uri.clone(), response.to_entry()))
            .collect()
    }
}

pub(crate) fn failure_outcome(error: &TransportError) -> &'static str {
    match error {
        TransportError::Timeout { .. } => "timeout",
        _ => "error",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::testing::ScriptedTransport;
    use serde_json::json;

    #[tokio::test]
    async fn test_one_entry_per_uri() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .json("/api/widgets", 200, r#"{"widgets": []}"#)
                .json("/api/gadgets", 200, r#"{"gadgets": [1]}"#)
                .text("/api/status", 204, "")
                // Finishes last but keeps its queue position.
                .delay("/api/widgets", Duration::from_millis(50)),
        );

        let mut batch = BatchExecutor::new(transport.clone());
        batch
            .add_request(SubRequest::new("/api/widgets"))
            .add_request(SubRequest::new("/api/gadgets"))
            .add_request(SubRequest::new("/api/status"));
        batch.run().await;

        let keys: Vec<_> = batch.responses().keys().cloned().collect();
        assert_eq!(keys, vec!["/api/widgets", "/api/gadgets", "/api/status"]);
        assert_eq!(transport.sent_uris().len(), 3);

        let entries = batch.read_responses();
        assert_eq!(entries["/api/gadgets"].status, 200);
        assert_eq!(entries["/api/gadgets"].uri, "/api/gadgets");
        assert_eq!(entries["/api/gadgets"].body, json!({"gadgets": [1]}));
        assert_eq!(entries["/api/status"].status, 204);
    }

    #[tokio::test]
    async fn test_failure_does_not_affect_siblings() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .json("/a", 200, r#"{"ok": true}"#)
                .fail("/b")
                .json("/c", 201, r#"{"ok": true}"#),
        );

        let mut batch = BatchExecutor::new(transport);
        for uri in ["/a", "/b", "/c"] {
            batch.add_request(SubRequest::new(uri));
        }
        batch.run().await;

        let responses = batch.responses();
        assert_eq!(responses.len(), 3);
        assert!(!responses["/a"].is_failure());
        assert_eq!(responses["/c"].status_code(), 201);

        let failed = &responses["/b"];
        assert!(failed.is_failure());
        assert_eq!(failed.status_code(), 503);
        assert_eq!(failed.source_uri(), "/b");
        assert_eq!(
            failed.serialized_body().unwrap()["error"],
            json!("service_unavailable")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_request_times_out() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .stall("/slow")
                .json("/fast", 200, "{}"),
        );

        let mut batch = BatchExecutor::new(transport).with_timeout(Duration::from_secs(2));
        batch
            .add_request(SubRequest::new("/slow"))
            .add_request(SubRequest::new("/fast"));
        batch.run().await;

        let slow = &batch.responses()["/slow"];
        assert!(slow.is_failure());
        let message = slow.serialized_body().unwrap()["error_message"].clone();
        assert!(message.as_str().unwrap().contains("timed out"));
        assert!(!batch.responses()["/fast"].is_failure());
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let mut batch = BatchExecutor::new(Arc::new(ScriptedTransport::new()));
        batch.run().await;
        assert!(batch.responses().is_empty());
    }
}
