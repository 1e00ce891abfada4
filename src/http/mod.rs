//! Outbound HTTP capability
//!
//! The translation core never talks to the network directly; it goes through
//! [`HttpClient`], which the caller injects. [`ReqwestHttpClient`] is the
//! production implementation and [`MockHttpClient`] backs the tests.

pub mod client;
pub mod mock;

pub use client::ReqwestHttpClient;
pub use mock::{MockHttpClient, RecordedRequest};

use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;

/// Raw exchange result handed back by an [`HttpClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, Vec<String>>,
    /// Parsed body, `None` when the body was empty or not JSON.
    pub json: Option<Value>,
    pub raw_body: String,
}

impl HttpResponse {
    /// Build a response from a JSON body, as a server would have sent it.
    pub fn from_json(status: u16, body: Value) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            raw_body: body.to_string(),
            json: Some(body),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// POST capability consumed by the endpoint invokers.
///
/// Implementations must report connection failures and timeouts as
/// [`crate::Error::Transport`] and return non-2xx statuses as ordinary
/// responses.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
    ) -> Result<HttpResponse>;
}
