//! `generateContent` as a three-step flow:
//! prepare request, call endpoint, prepare result.

use super::endpoint::{self, GENERATE_CONTENT};
use super::types::{Content, GeminiCallResult, GenerateContentBody, GenerationConfig};
use crate::config::{model_url, redact, GeminiConfig};
use crate::flow::{Flow, Node, FINISHED};
use crate::http::{HttpClient, HttpResponse};
use crate::universal::chat::{entry_to_content, tools_to_wire};
use crate::universal::types::{ConversationEntry, ToolDefinition};
use crate::{Error, Result};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Everything one chat call needs, supplied up front.
#[derive(Clone, PartialEq)]
pub struct ChatEndpoint {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub contents: Vec<ConversationEntry>,
    pub system_prompt: Option<Content>,
    pub max_tokens: Option<i32>,
    pub tools: Vec<ToolDefinition>,
    pub temperature: Option<f64>,
}

/// Output of the prepare step. Entries are still universal; the call step
/// converts them.
#[derive(Clone, PartialEq)]
pub struct PreparedChatRequest {
    pub url: String,
    pub api_key: String,
    pub contents: Vec<ConversationEntry>,
    pub system_instruction: Option<Content>,
    pub tools: Vec<ToolDefinition>,
    pub generation_config: Option<GenerationConfig>,
}

impl fmt::Debug for ChatEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatEndpoint")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("contents", &self.contents)
            .field("system_prompt", &self.system_prompt)
            .field("max_tokens", &self.max_tokens)
            .field("tools", &self.tools)
            .field("temperature", &self.temperature)
            .finish()
    }
}

impl fmt::Debug for PreparedChatRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparedChatRequest")
            .field("url", &self.url)
            .field("api_key", &redact(&self.api_key))
            .field("contents", &self.contents)
            .field("system_instruction", &self.system_instruction)
            .field("tools", &self.tools)
            .field("generation_config", &self.generation_config)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct ChatFlowContext {
    pub available_parameters: Option<ChatEndpoint>,
    pub prepared_request: Option<PreparedChatRequest>,
    pub model_response: Option<HttpResponse>,
    pub result: Option<GeminiCallResult>,
}

fn missing(slot: &str) -> Error {
    Error::Invariant(format!("chat flow context has no {}", slot))
}

pub struct PrepareChatRequest;

#[async_trait]
impl Node<ChatFlowContext> for PrepareChatRequest {
    type Prep = ChatEndpoint;
    type Exec = PreparedChatRequest;

    fn prep(&self, shared: &mut ChatFlowContext) -> Result<ChatEndpoint> {
        shared
            .available_parameters
            .clone()
            .ok_or_else(|| missing("available_parameters"))
    }

    async fn exec(&self, params: &ChatEndpoint) -> Result<PreparedChatRequest> {
        if params.api_key.trim().is_empty() {
            return Err(Error::Configuration(
                "API key is required for the request".to_string(),
            ));
        }
        if params.contents.is_empty() {
            return Err(Error::Configuration(
                "contents are required for the request".to_string(),
            ));
        }

        let generation_config = (params.temperature.is_some() || params.max_tokens.is_some())
            .then(|| GenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_tokens,
                ..Default::default()
            });

        Ok(PreparedChatRequest {
            url: model_url(&params.base_url, &params.model, GENERATE_CONTENT),
            api_key: params.api_key.clone(),
            contents: params.contents.clone(),
            system_instruction: params.system_prompt.clone(),
            tools: params.tools.clone(),
            generation_config,
        })
    }

    fn post(
        &self,
        shared: &mut ChatFlowContext,
        _params: ChatEndpoint,
        prepared: PreparedChatRequest,
    ) -> Result<String> {
        shared.prepared_request = Some(prepared);
        Ok("call".to_string())
    }
}

pub struct ChatEndpointCall {
    client: Arc<dyn HttpClient>,
}

impl ChatEndpointCall {
    pub fn new(client: Arc<dyn HttpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Node<ChatFlowContext> for ChatEndpointCall {
    type Prep = PreparedChatRequest;
    type Exec = HttpResponse;

    fn prep(&self, shared: &mut ChatFlowContext) -> Result<PreparedChatRequest> {
        shared
            .prepared_request
            .clone()
            .ok_or_else(|| missing("prepared_request"))
    }

    async fn exec(&self, prepared: &PreparedChatRequest) -> Result<HttpResponse> {
        let body = GenerateContentBody {
            contents: prepared.contents.iter().map(entry_to_content).collect(),
            generation_config: prepared.generation_config.clone(),
            tools: tools_to_wire(&prepared.tools),
            system_instruction: prepared.system_instruction.clone(),
            ..Default::default()
        };

        endpoint::generate_content(self.client.as_ref(), &prepared.url, &prepared.api_key, &body)
            .await
    }

    fn post(
        &self,
        shared: &mut ChatFlowContext,
        _prepared: PreparedChatRequest,
        response: HttpResponse,
    ) -> Result<String> {
        shared.model_response = Some(response);
        Ok("wrap-up".to_string())
    }
}

pub struct PrepareChatResult;

#[async_trait]
impl Node<ChatFlowContext> for PrepareChatResult {
    type Prep = HttpResponse;
    type Exec = GeminiCallResult;

    fn prep(&self, shared: &mut ChatFlowContext) -> Result<HttpResponse> {
        shared
            .model_response
            .clone()
            .ok_or_else(|| missing("model_response"))
    }

    async fn exec(&self, response: &HttpResponse) -> Result<GeminiCallResult> {
        let body = response.json.clone().ok_or_else(|| {
            Error::api(response.status, "generateContent response had no JSON body")
        })?;
        Ok(serde_json::from_value(body)?)
    }

    fn post(
        &self,
        shared: &mut ChatFlowContext,
        _response: HttpResponse,
        result: GeminiCallResult,
    ) -> Result<String> {
        shared.result = Some(result);
        Ok(FINISHED.to_string())
    }
}

impl ChatEndpoint {
    pub fn new(
        config: &GeminiConfig,
        model: impl Into<String>,
        contents: Vec<ConversationEntry>,
    ) -> Self {
        Self {
            base_url: config.base_url.clone(),
            api_key: config.api_key().unwrap_or_default().to_string(),
            model: model.into(),
            contents,
            system_prompt: None,
            max_tokens: None,
            tools: Vec::new(),
            temperature: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: Content) -> Self {
        self.system_prompt = Some(system_prompt);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: i32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn flow(client: Arc<dyn HttpClient>) -> Flow<ChatFlowContext> {
        Flow::start("prepare", PrepareChatRequest)
            .then("call", "call", ChatEndpointCall::new(client))
            .then("wrap-up", "wrap-up", PrepareChatResult)
    }

    /// Run the flow with a fresh context and return the parsed result.
    pub async fn handle(&self, client: Arc<dyn HttpClient>) -> Result<GeminiCallResult> {
        let mut context = ChatFlowContext {
            available_parameters: Some(self.clone()),
            ..Default::default()
        };

        tracing::debug!("Running chat flow for model {}", self.model);
        Self::flow(client).run(&mut context).await?;

        context.result.ok_or_else(|| missing("result"))
    }
}
