//! `embedContent` as a three-step flow, mirroring the chat flow.

use super::embeddings_response::GeminiEmbeddingsResponse;
use super::endpoint::{self, EMBED_CONTENT};
use super::types::{Content, EmbedContentBody, Part, TaskType};
use crate::config::{model_url, redact, GeminiConfig};
use crate::flow::{Flow, Node, FINISHED};
use crate::http::{HttpClient, HttpResponse};
use crate::{Error, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Result of an embed flow run. Carries the vector math of
/// [`GeminiEmbeddingsResponse`].
pub type GeminiEmbeddingResult = GeminiEmbeddingsResponse;

#[derive(Clone, PartialEq)]
pub struct EmbedEndpoint {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    /// One text part per entry.
    pub content: Vec<String>,
    pub task_type: TaskType,
}

#[derive(Clone, PartialEq)]
pub struct PreparedEmbeddingsRequest {
    pub url: String,
    pub api_key: String,
    pub body: EmbedContentBody,
}

impl fmt::Debug for EmbedEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbedEndpoint")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("content", &self.content)
            .field("task_type", &self.task_type)
            .finish()
    }
}

impl fmt::Debug for PreparedEmbeddingsRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedEmbeddingsRequest")
            .field("url", &self.url)
            .field("api_key", &redact(&self.api_key))
            .field("body", &self.body)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct EmbedFlowContext {
    pub available_parameters: Option<EmbedEndpoint>,
    pub prepared_request: Option<PreparedEmbeddingsRequest>,
    pub model_response: Option<HttpResponse>,
    pub result: Option<GeminiEmbeddingResult>,
}

fn missing(slot: &str) -> Error {
    Error::Invariant(format!("embed flow context has no {}", slot))
}

pub struct PrepareEmbeddingsRequest;

#[async_trait]
impl Node<EmbedFlowContext> for PrepareEmbeddingsRequest {
    type Prep = EmbedEndpoint;
    type Exec = PreparedEmbeddingsRequest;

    fn prep(&self, shared: &mut EmbedFlowContext) -> Result<EmbedEndpoint> {
        shared
            .available_parameters
            .clone()
            .ok_or_else(|| missing("available_parameters"))
    }

    async fn exec(&self, params: &EmbedEndpoint) -> Result<PreparedEmbeddingsRequest> {
        if params.api_key.trim().is_empty() {
            return Err(Error::Configuration(
                "API key is required for the request".to_string(),
            ));
        }
        if params.content.is_empty() {
            return Err(Error::Configuration(
                "content is required for the request".to_string(),
            ));
        }

        let body = EmbedContentBody {
            model: format!(
                "models/{}",
                params.model.strip_prefix("models/").unwrap_or(&params.model)
            ),
            content: Content {
                role: None,
                parts: params.content.iter().map(Part::text).collect(),
            },
            task_type: Some(params.task_type.as_str().to_string()),
            title: None,
            output_dimensionality: None,
        };

        Ok(PreparedEmbeddingsRequest {
            url: model_url(&params.base_url, &params.model, EMBED_CONTENT),
            api_key: params.api_key.clone(),
            body,
        })
    }

    fn post(
        &self,
        shared: &mut EmbedFlowContext,
        _params: EmbedEndpoint,
        prepared: PreparedEmbeddingsRequest,
    ) -> Result<String> {
        shared.prepared_request = Some(prepared);
        Ok("call".to_string())
    }
}

pub struct EmbedEndpointCall {
    client: Arc<dyn HttpClient>,
}

impl EmbedEndpointCall {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Node<EmbedFlowContext> for EmbedEndpointCall {
    type Prep = PreparedEmbeddingsRequest;
    type Exec = HttpResponse;

    fn prep(&self, shared: &mut EmbedFlowContext) -> Result<PreparedEmbeddingsRequest> {
        shared
            .prepared_request
            .clone()
            .ok_or_else(|| missing("prepared_request"))
    }

    async fn exec(&self, prepared: &PreparedEmbeddingsRequest) -> Result<HttpResponse> {
        endpoint::embed_content(
            self.client.as_ref(),
            &prepared.url,
            &prepared.api_key,
            &prepared.body,
        )
        .await
    }

    fn post(
        &self,
        shared: &mut EmbedFlowContext,
        _prepared: PreparedEmbeddingsRequest,
        response: HttpResponse,
    ) -> Result<String> {
        shared.model_response = Some(response);
        Ok("wrap-up".to_string())
    }
}

pub struct PrepareEmbeddingsResult;

#[async_trait]
impl Node<EmbedFlowContext> for PrepareEmbeddingsResult {
    type Prep = HttpResponse;
    type Exec = GeminiEmbeddingResult;

    fn prep(&self, shared: &mut EmbedFlowContext) -> Result<HttpResponse> {
        shared
            .model_response
            .clone()
            .ok_or_else(|| missing("model_response"))
    }

    async fn exec(&self, response: &HttpResponse) -> Result<GeminiEmbeddingResult> {
        GeminiEmbeddingsResponse::from_http(response.clone())
    }

    fn post(
        &self,
        shared: &mut EmbedFlowContext,
        _response: HttpResponse,
        result: GeminiEmbeddingResult,
    ) -> Result<String> {
        shared.result = Some(result);
        Ok(FINISHED.to_string())
    }
}

impl EmbedEndpoint {
    pub fn new(
        config: &GeminiConfig,
        model: impl Into<String>,
        content: Vec<String>,
        task_type: TaskType,
    ) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key().unwrap_or_default().to_string(),
            model: model.into(),
            content,
            task_type,
        }
    }

    pub fn flow(client: Arc<dyn HttpClient>) -> Flow<EmbedFlowContext> {
        Flow::start("prepare", PrepareEmbeddingsRequest)
            .then("call", "call", EmbedEndpointCall::new(client))
            .then("wrap-up", "wrap-up", PrepareEmbeddingsResult)
    }

    pub async fn handle(&self, client: Arc<dyn HttpClient>) -> Result<GeminiEmbeddingResult> {
        let mut context = EmbedFlowContext {
            available_parameters: Some(self.clone()),
            ..Default::default()
        };

        tracing::debug!(
            "Running embed flow for model {} ({} texts)",
            self.model,
            self.content.len()
        );
        Self::flow(client).run(&mut context).await?;

        context.result.ok_or_else(|| missing("result"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::MockHttpClient;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn endpoint() -> EmbedEndpoint {
        EmbedEndpoint::new(
            &GeminiConfig::new("key").with_base_url("https://example.test/v1beta"),
            "text-embedding-004",
            vec!["What is the meaning of life?".to_string()],
            TaskType::RetrievalQuery,
        )
    }

    #[tokio::test]
    async fn test_embed_flow_body_and_result() {
        let client = Arc::new(MockHttpClient::new().with_json_response(
            200,
            json!({"embedding": {"values": [0.6, 0.8]}}),
        ));

        let result = endpoint().handle(client.clone()).await.unwrap();

        assert_eq!(result.values(), Some(&[0.6, 0.8][..]));
        assert_eq!(result.status_code, 200);
        assert!((result.magnitude().unwrap() - 1.0).abs() < 1e-9);

        let request = &client.requests()[0];
        assert_eq!(
            request.url,
            "https://example.test/v1beta/models/text-embedding-004:embedContent"
        );
        assert_eq!(request.header("x-goog-api-key"), Some("key"));
        assert_eq!(
            request.body,
            json!({
                "model": "models/text-embedding-004",
                "content": {"parts": [{"text": "What is the meaning of life?"}]},
                "taskType": "RETRIEVAL_QUERY"
            })
        );
    }

    #[tokio::test]
    async fn test_several_texts_become_parts() {
        let client = Arc::new(MockHttpClient::new());
        let mut endpoint = endpoint();
        endpoint.content = vec!["a".to_string(), "b".to_string()];

        endpoint.handle(client.clone()).await.unwrap();

        assert_eq!(
            client.requests()[0].body["content"],
            json!({"parts": [{"text": "a"}, {"text": "b"}]})
        );
    }

    #[tokio::test]
    async fn test_empty_response_has_no_embedding() {
        let client = Arc::new(MockHttpClient::new().with_json_response(200, json!({})));

        let result = endpoint().handle(client).await.unwrap();

        assert!(!result.has_embedding());
        assert_eq!(result.dimensions(), None);
    }

    #[tokio::test]
    async fn test_prefixed_model_is_not_doubled() {
        let client = Arc::new(MockHttpClient::new());
        let mut endpoint = endpoint();
        endpoint.model = "models/text-embedding-004".to_string();

        endpoint.handle(client.clone()).await.unwrap();

        let request = &client.requests()[0];
        assert_eq!(request.body["model"], json!("models/text-embedding-004"));
        assert_eq!(
            request.url,
            "https://example.test/v1beta/models/text-embedding-004:embedContent"
        );
    }

    #[test]
    fn test_debug_hides_api_key() {
        let mut endpoint = endpoint();
        endpoint.api_key = "secret-key-123".to_string();

        let shown = format!("{:?}", endpoint);
        assert!(!shown.contains("secret-key-123"));
        assert!(shown.contains("<redacted>"));
    }

    #[tokio::test]
    async fn test_missing_content_fails_before_call() {
        let client = Arc::new(MockHttpClient::new());
        let mut endpoint = endpoint();
        endpoint.content.clear();

        let err = endpoint.handle(client.clone()).await.unwrap_err();

        assert!(matches!(err, Error::Configuration(_)));
        assert_eq!(client.get_call_count(), 0);
    }

    #[tokio::test]
    async fn test_transport_failure_propagates() {
        let client = Arc::new(MockHttpClient::new().with_transport_failure("connection reset"));

        let err = endpoint().handle(client).await.unwrap_err();

        assert!(matches!(err, Error::Transport(_)));
    }
}
