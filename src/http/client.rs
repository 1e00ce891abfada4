use super::{HttpClient, HttpResponse};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// [`HttpClient`] backed by a shared `reqwest` connection pool.
#[derive(Clone)]
pub struct ReqwestHttpClient {
    client: Client,
    timeout: Duration,
}

impl ReqwestHttpClient {
    pub fn new() -> Self {
        Self::new_with_client(Client::new(), DEFAULT_TIMEOUT)
    }

    pub fn new_with_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
    ) -> Result<HttpResponse> {
        // Headers go first so `.json()` keeps a caller-supplied Content-Type.
        let mut request = self.client.post(url).timeout(self.timeout);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let request = request.json(body);

        let response = request.send().await.map_err(|e| {
            tracing::error!("Failed to send request to Gemini: {}", e);
            Error::Transport(e.to_string())
        })?;

        let status = response.status().as_u16();
        let mut response_headers: HashMap<String, Vec<String>> = HashMap::new();
        for (name, value) in response.headers() {
            if let Ok(value) = value.to_str() {
                response_headers
                    .entry(name.as_str().to_string())
                    .or_default()
                    .push(value.to_string());
            }
        }

        let raw_body = response.text().await.map_err(|e| {
            tracing::error!("Failed to read Gemini response body: {}", e);
            Error::Transport(e.to_string())
        })?;
        let json = serde_json::from_str(&raw_body).ok();

        Ok(HttpResponse {
            status,
            headers: response_headers,
            json,
            raw_body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn headers() -> Vec<(String, String)> {
        vec![
            ("x-goog-api-key".to_string(), "test-key".to_string()),
            ("Content-Type".to_string(), "application/json".to_string()),
        ]
    }

    #[tokio::test]
    async fn test_post_sends_headers_and_body() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/models/gemini-2.5-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .and(body_json(serde_json::json!({"contents": []})))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("x-request-id", "abc")
                    .set_body_json(serde_json::json!({"candidates": []})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = ReqwestHttpClient::new();
        let url = format!("{}/models/gemini-2.5-flash:generateContent", server.uri());
        let response = client
            .post(&url, &headers(), &serde_json::json!({"contents": []}))
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.json, Some(serde_json::json!({"candidates": []})));
        assert_eq!(
            response.headers.get("x-request-id"),
            Some(&vec!["abc".to_string()])
        );
    }

    #[tokio::test]
    async fn test_non_success_status_is_not_a_transport_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let client = ReqwestHttpClient::new();
        let response = client
            .post(&server.uri(), &headers(), &serde_json::json!({}))
            .await
            .unwrap();

        assert_eq!(response.status, 403);
        assert_eq!(response.json, None);
        assert_eq!(response.raw_body, "forbidden");
    }

    #[tokio::test]
    async fn test_content_type_is_sent_once() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
            .mount(&server)
            .await;

        let client = ReqwestHttpClient::new();
        client
            .post(&server.uri(), &headers(), &serde_json::json!({}))
            .await
            .unwrap();

        let received = server.received_requests().await.unwrap();
        let content_types: Vec<_> = received[0].headers.get_all("content-type").iter().collect();
        assert_eq!(content_types.len(), 1);
        assert_eq!(content_types[0], "application/json");
    }

    #[tokio::test]
    async fn test_timeout_maps_to_transport_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
            .mount(&server)
            .await;

        let client = ReqwestHttpClient::new().with_timeout(Duration::from_millis(50));
        let err = client
            .post(&server.uri(), &headers(), &serde_json::json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_maps_to_transport_error() {
        let client = ReqwestHttpClient::new().with_timeout(Duration::from_secs(2));
        let err = client
            .post("http://127.0.0.1:1/unreachable", &headers(), &serde_json::json!({}))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
    }
}
