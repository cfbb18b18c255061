//! Sequential composite execution.
//!
//! Links run strictly in the order they were added. Before a link is sent,
//! placeholders in its URI and body are resolved against the decoded bodies
//! of the links before it; after it resolves, its own body joins that data.
//!
//! A placeholder that cannot be resolved stops the chain. Requests already
//! sent stay sent.

use std::sync::Arc;
use std::time::{Duration, Instant};

use indexmap::IndexMap;

use crate::composite::batch::failure_outcome;
use crate::composite::error::CompositeError;
use crate::composite::input::CompositeMode;
use crate::composite::request::{ChainedSubRequest, LinkState};
use crate::composite::response::{CompositeResponse, FailedResponse, ResponseEntry};
use crate::composite::tokens::{ReferenceData, TokenError, TokenSubstituter};
use crate::composite::transport::Transport;
use crate::observability::metrics;
use crate::resilience::timeouts::{send_with_timeout, DEFAULT_SUBREQUEST_TIMEOUT};

const MODE: CompositeMode = CompositeMode::Chain;

/// Runs dependent sub-requests one after another, keyed by reference id.
pub struct ChainExecutor {
    transport: Arc<dyn Transport>,
    timeout: Duration,
    substituter: TokenSubstituter,
    links: Vec<ChainedSubRequest>,
    responses: IndexMap<String, CompositeResponse>,
    reference_data: ReferenceData,
}

impl ChainExecutor {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            timeout: DEFAULT_SUBREQUEST_TIMEOUT,
            substituter: TokenSubstituter::strict(),
            links: Vec::new(),
            responses: IndexMap::new(),
            reference_data: ReferenceData::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_substituter(mut self, substituter: TokenSubstituter) -> Self {
        self.substituter = substituter;
        self
    }

    /// Append a link to the end of the chain.
    pub fn add_request(&mut self, link: ChainedSubRequest) -> &mut Self {
        self.links.push(link);
        self
    }

    pub fn links(&self) -> &[ChainedSubRequest] {
        &self.links
    }

    /// Walk the chain from the first link to the last.
    ///
    /// Every link must carry a reference id; this is checked before anything
    /// is sent.
    pub async fn run(&mut self) -> Result<&mut Self, CompositeError> {
        metrics::record_composite_request(MODE.as_str());

        for link in &self.links {
            if let Err(e) = link.reference_id() {
                tracing::error!(error = %e, "Chain contains a link without a reference id");
                return Err(e);
            }
        }

        for index in 0..self.links.len() {
            self.step(index).await?;
        }

        Ok(self)
    }

    async fn step(&mut self, index: usize) -> Result<(), CompositeError> {
        let link = &mut self.links[index];
        let reference_id = link.reference_id()?.to_string();

        // pending -> substituted
        let uri = resolve(&self.substituter, &self.reference_data, &reference_id, link.request().uri())?;
        let body = match link.request().body() {
            Some(body) => Some(resolve(&self.substituter, &self.reference_data, &reference_id, body)?),
            None => None,
        };
        link.request_mut().set_uri(uri.clone());
        if let Some(body) = body {
            link.request_mut().set_body(body);
        }
        link.advance(LinkState::Substituted);

        // substituted -> sent
        tracing::debug!(reference_id = %reference_id, uri = %uri, "Sending chained request");
        let started = Instant::now();
        let result = send_with_timeout(self.transport.as_ref(), link.request(), self.timeout).await;
        let elapsed = started.elapsed();
        link.advance(LinkState::Sent);

        let response: CompositeResponse = match result {
            Ok(response) => {
                metrics::record_subrequest(MODE.as_str(), "success", elapsed);
                response.with_source_uri(uri).into()
            }
            Err(e) => {
                tracing::warn!(reference_id = %reference_id, uri = %uri, error = %e, "Chained request failed");
                metrics::record_subrequest(MODE.as_str(), failure_outcome(&e), elapsed);
                FailedResponse::new(e.to_string()).with_source_uri(uri).into()
            }
        };

        // sent -> resolved
        match response.reference_value() {
            Ok(data) => self.reference_data.insert(reference_id.clone(), data),
            Err(e) => tracing::debug!(
                reference_id = %reference_id,
                reason = %e,
                "Response is not usable as reference data"
            ),
        }
        self.responses.insert(reference_id, response);
        link.advance(LinkState::Resolved);

        Ok(())
    }

    /// Responses keyed by reference id, in chain order.
    pub fn responses(&self) -> &IndexMap<String, CompositeResponse> {
        &self.responses
    }

    pub fn read_responses(&self) -> IndexMap<String, ResponseEntry> {
        self.responses
            .iter()
            .map(|(reference_id, response)| (reference_id.clone(), response.to_entry()))
            .collect()
    }

    pub fn reference_data(&self) -> &ReferenceData {
        &self.reference_data
    }
}

fn resolve(
    substituter: &TokenSubstituter,
    data: &ReferenceData,
    reference_id: &str,
    subject: &str,
) -> Result<String, CompositeError> {
    substituter.substitute(subject, data).map_err(|e| match e {
        TokenError::Unresolved { path } => {
            tracing::warn!(reference_id, path = %path, "Unresolved token, aborting chain");
            CompositeError::UnresolvedToken {
                reference_id: reference_id.to_string(),
                path,
            }
        }
    })
}
