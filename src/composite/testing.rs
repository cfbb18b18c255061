//! Scripted transport for executor tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::composite::request::{HeaderBag, SubRequest};
use crate::composite::response::{SubResponse, JSON_CONTENT_TYPE};
use crate::composite::transport::{Transport, TransportError};

enum Reply {
    Respond(SubResponse),
    Fail(TransportError),
    Stall,
}

/// Answers by URI and records every request it is handed.
#[derive(Default)]
pub struct ScriptedTransport {
    replies: HashMap<String, Reply>,
    delays: HashMap<String, Duration>,
    sent: Mutex<Vec<SubRequest>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn json(mut self, uri: &str, status: u16, body: &str) -> Self {
        let headers = HeaderBag::from([("content-type".to_string(), vec![JSON_CONTENT_TYPE.to_string()])]);
        let response = SubResponse::new(status).with_headers(headers).with_body(body);
        self.replies.insert(uri.to_string(), Reply::Respond(response));
        self
    }

    pub fn text(mut self, uri: &str, status: u16, body: &str) -> Self {
        let response = SubResponse::new(status).with_body(body);
        self.replies.insert(uri.to_string(), Reply::Respond(response));
        self
    }

    pub fn respond(mut self, uri: &str, response: SubResponse) -> Self {
        self.replies.insert(uri.to_string(), Reply::Respond(response));
        self
    }

    pub fn fail(mut self, uri: &str) -> Self {
        let error = TransportError::Connect {
            uri: uri.to_string(),
            reason: "connection refused".to_string(),
        };
        self.replies.insert(uri.to_string(), Reply::Fail(error));
        self
    }

    pub fn stall(mut self, uri: &str) -> Self {
        self.replies.insert(uri.to_string(), Reply::Stall);
        self
    }

    pub fn delay(mut self, uri: &str, delay: Duration) -> Self {
        self.delays.insert(uri.to_string(), delay);
        self
    }

    /// URIs in the order they were handed to the transport.
    pub fn sent_uris(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.uri().to_string())
            .collect()
    }

    pub fn sent(&self) -> Vec<SubRequest> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &SubRequest) -> Result<SubResponse, TransportError> {
        self.sent.lock().unwrap().push(request.clone());

        if let Some(delay) = self.delays.get(request.uri()) {
            tokio::time::sleep(*delay).await;
        }

        match self.replies.get(request.uri()) {
            Some(Reply::Respond(response)) => Ok(response.clone()),
            Some(Reply::Fail(error)) => Err(error.clone()),
            Some(Reply::Stall) => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(SubResponse::new(200))
            }
            None => Ok(SubResponse::new(404).with_body("not found")),
        }
    }
}
