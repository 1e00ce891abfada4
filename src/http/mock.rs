use super::{HttpClient, HttpResponse};
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// One request observed by [`MockHttpClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

enum Canned {
    Response(HttpResponse),
    TransportFailure(String),
}

/// In-memory [`HttpClient`] that replays queued responses and records every
/// request it receives.
///
/// When the queue is empty it answers `200 {}`.
#[derive(Clone, Default)]
pub struct MockHttpClient {
    responses: Arc<Mutex<VecDeque<Canned>>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json_response(self, status: u16, body: Value) -> Self {
        self.with_response(HttpResponse::from_json(status, body))
    }

    pub fn with_response(self, response: HttpResponse) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Canned::Response(response));
        self
    }

    pub fn with_transport_failure(self, message: &str) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Canned::TransportFailure(message.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn get_call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl HttpClient for MockHttpClient {
    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
    ) -> Result<HttpResponse> {
        self.requests.lock().unwrap().push(RecordedRequest {
            url: url.to_string(),
            headers: headers.to_vec(),
            body: body.clone(),
        });

        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Canned::Response(response)) => Ok(response),
            Some(Canned::TransportFailure(message)) => Err(Error::Transport(message)),
            None => Ok(HttpResponse::from_json(200, serde_json::json!({}))),
        }
    }
}
