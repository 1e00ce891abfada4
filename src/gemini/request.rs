use super::endpoint::{self, GENERATE_CONTENT};
use super::response::GeminiGenerateResponse;
use super::types::{
    Content, FunctionCallingConfig, FunctionDeclaration, GenerateContentBody, GenerationConfig,
    SafetySetting, ThinkingConfig, Tool, ToolConfig, HARM_CATEGORIES,
};
use crate::config::{model_url, GeminiConfig};
use crate::http::HttpClient;
use crate::{Error, Result, ValidationError};
use serde::Serialize;
use serde_json::Value;

pub const DEFAULT_SAFETY_THRESHOLD: &str = "BLOCK_MEDIUM_AND_ABOVE";

/// A `generateContent` request.
///
/// Generation knobs are kept flat and folded into `generationConfig` when the
/// body is built, unless an explicit [`GenerationConfig`] was supplied with
/// [`Self::with_generation_config`]. Every `with_*` consumes the request and
/// returns the updated one; clone first to branch.
#[derive(Debug, Clone, PartialEq)]
pub struct GeminiGenerateRequest {
    config: GeminiConfig,
    model: String,
    contents: Vec<Content>,
    temperature: Option<f64>,
    top_p: Option<f64>,
    top_k: Option<i32>,
    stop_sequences: Option<Vec<String>>,
    max_output_tokens: Option<i32>,
    candidate_count: Option<i32>,
    response_mime_type: Option<String>,
    response_schema: Option<Value>,
    thinking_budget: Option<i32>,
    include_thoughts: Option<bool>,
    generation_config: Option<GenerationConfig>,
    tools: Option<Vec<Tool>>,
    tool_config: Option<ToolConfig>,
    system_instruction: Option<Content>,
    safety_settings: Option<Vec<SafetySetting>>,
    cached_content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestDebugSummary {
    pub model: String,
    pub url: String,
    pub contents_count: usize,
    pub temperature: Option<f64>,
    pub max_output_tokens: Option<i32>,
    pub top_p: Option<f64>,
    pub top_k: Option<i32>,
    pub candidate_count: Option<i32>,
    pub response_mime_type: Option<String>,
    pub thinking_budget: Option<i32>,
    pub include_thoughts: Option<bool>,
    pub has_tools: bool,
    pub has_system_instruction: bool,
    pub has_safety_settings: bool,
    pub has_cached_content: bool,
    pub tool_count: usize,
}

impl GeminiGenerateRequest {
    pub fn new(config: &GeminiConfig, model: impl Into<String>, contents: Vec<Content>) -> Self {
        Self {
            config: config.clone(),
            model: model.into(),
            contents,
            temperature: None,
            top_p: None,
            top_k: None,
            stop_sequences: None,
            max_output_tokens: None,
            candidate_count: None,
            response_mime_type: None,
            response_schema: None,
            thinking_budget: None,
            include_thoughts: None,
            generation_config: None,
            tools: None,
            tool_config: None,
            system_instruction: None,
            safety_settings: None,
            cached_content: None,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn contents(&self) -> &[Content] {
        &self.contents
    }

    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    pub fn system_instruction(&self) -> Option<&Content> {
        self.system_instruction.as_ref()
    }

    pub fn tools(&self) -> Option<&[Tool]> {
        self.tools.as_deref()
    }

    pub fn tool_config(&self) -> Option<&ToolConfig> {
        self.tool_config.as_ref()
    }

    pub fn safety_settings(&self) -> Option<&[SafetySetting]> {
        self.safety_settings.as_deref()
    }

    pub fn cached_content(&self) -> Option<&str> {
        self.cached_content.as_deref()
    }

    pub fn with_config(mut self, config: &GeminiConfig) -> Self {
        self.config = config.clone();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_contents(mut self, contents: Vec<Content>) -> Self {
        self.contents = contents;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f64) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn with_top_k(mut self, top_k: i32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    pub fn with_stop_sequences(mut self, stop_sequences: Vec<String>) -> Self {
        self.stop_sequences = Some(stop_sequences);
        self
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: i32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }

    pub fn with_candidate_count(mut self, candidate_count: i32) -> Self {
        self.candidate_count = Some(candidate_count);
        self
    }

    pub fn with_response_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.response_mime_type = Some(mime_type.into());
        self
    }

    pub fn with_response_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_thinking_budget(mut self, budget: i32) -> Self {
        self.thinking_budget = Some(budget);
        self
    }

    pub fn with_include_thoughts(mut self, include_thoughts: bool) -> Self {
        self.include_thoughts = Some(include_thoughts);
        self
    }

    /// Use `generation_config` verbatim; the flat knobs are then ignored.
    pub fn with_generation_config(mut self, generation_config: GenerationConfig) -> Self {
        self.generation_config = Some(generation_config);
        self
    }

    pub fn with_tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_tool_config(mut self, tool_config: ToolConfig) -> Self {
        self.tool_config = Some(tool_config);
        self
    }

    pub fn with_system_instruction(mut self, system_instruction: Content) -> Self {
        self.system_instruction = Some(system_instruction);
        self
    }

    pub fn with_safety_settings(mut self, safety_settings: Vec<SafetySetting>) -> Self {
        self.safety_settings = Some(safety_settings);
        self
    }

    pub fn with_cached_content(mut self, cached_content: impl Into<String>) -> Self {
        self.cached_content = Some(cached_content.into());
        self
    }

    pub fn with_system_prompt(self, text: impl Into<String>) -> Self {
        self.with_system_instruction(Content::text(None, text))
    }

    /// `mode` is `AUTO`, `ANY` or `NONE`.
    pub fn with_function_calling_mode(self, mode: impl Into<String>) -> Self {
        self.with_tool_config(ToolConfig {
            function_calling_config: FunctionCallingConfig { mode: mode.into() },
        })
    }

    pub fn with_thinking_config(self, budget: i32, include_thoughts: bool) -> Self {
        self.with_thinking_budget(budget)
            .with_include_thoughts(include_thoughts)
    }

    pub fn with_json_response(self, schema: Option<Value>) -> Self {
        let request = self.with_response_mime_type("application/json");
        match schema {
            Some(schema) => request.with_response_schema(schema),
            None => request,
        }
    }

    /// Append a declaration to the first tool entry, creating it if needed.
    pub fn add_tool(mut self, declaration: FunctionDeclaration) -> Self {
        let tools = self.tools.get_or_insert_with(Vec::new);
        match tools.first_mut() {
            Some(tool) => tool.function_declarations.push(declaration),
            None => tools.push(Tool {
                function_declarations: vec![declaration],
            }),
        }
        self
    }

    /// Apply one threshold to every harm category.
    pub fn with_safety_level(self, threshold: impl Into<String>) -> Self {
        let threshold = threshold.into();
        self.with_safety_settings(
            HARM_CATEGORIES
                .iter()
                .map(|category| SafetySetting {
                    category: category.to_string(),
                    threshold: threshold.clone(),
                })
                .collect(),
        )
    }

    fn has_generation_params(&self) -> bool {
        self.temperature.is_some()
            || self.top_p.is_some()
            || self.top_k.is_some()
            || self.stop_sequences.is_some()
            || self.max_output_tokens.is_some()
            || self.candidate_count.is_some()
            || self.response_mime_type.is_some()
            || self.response_schema.is_some()
            || self.thinking_budget.is_some()
            || self.include_thoughts.is_some()
    }

    /// Effective `generationConfig`: the explicit one if set, otherwise one
    /// assembled from the flat knobs, otherwise `None`.
    pub fn generation_config(&self) -> Option<GenerationConfig> {
        if let Some(explicit) = &self.generation_config {
            return Some(explicit.clone());
        }
        if !self.has_generation_params() {
            return None;
        }

        let thinking_config = (self.thinking_budget.is_some() || self.include_thoughts.is_some())
            .then(|| ThinkingConfig {
                thinking_budget: self.thinking_budget,
                include_thoughts: self.include_thoughts,
            });

        Some(GenerationConfig {
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            stop_sequences: self.stop_sequences.clone(),
            max_output_tokens: self.max_output_tokens,
            candidate_count: self.candidate_count,
            response_mime_type: self.response_mime_type.clone(),
            response_schema: self.response_schema.clone(),
            thinking_config,
        })
    }

    pub fn to_body(&self) -> GenerateContentBody {
        GenerateContentBody {
            contents: self.contents.clone(),
            generation_config: self.generation_config(),
            tools: self.tools.clone(),
            tool_config: self.tool_config.clone(),
            system_instruction: self.system_instruction.clone(),
            safety_settings: self.safety_settings.clone(),
            cached_content: self.cached_content.clone(),
        }
    }

    pub fn api_url(&self) -> String {
        model_url(&self.config.base_url, &self.model, GENERATE_CONTENT)
    }

    pub fn tool_count(&self) -> usize {
        self.tools
            .iter()
            .flatten()
            .map(|tool| tool.function_declarations.len())
            .sum()
    }

    /// Range checks on the `generationConfig` that would be sent, plus
    /// presence of model, contents and API key. An empty list means valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.model.trim().is_empty() {
            errors.push(ValidationError::MissingModel);
        }
        if self.contents.is_empty() {
            errors.push(ValidationError::MissingContents);
        }
        if self.config.api_key().is_none() {
            errors.push(ValidationError::MissingApiKey);
        }

        let Some(config) = self.generation_config() else {
            return errors;
        };
        if let Some(t) = config.temperature.filter(|t| !(0.0..=2.0).contains(t)) {
            errors.push(ValidationError::Temperature(t));
        }
        if let Some(p) = config.top_p.filter(|p| !(0.0..=1.0).contains(p)) {
            errors.push(ValidationError::TopP(p));
        }
        if let Some(k) = config.top_k.filter(|k| *k < 1) {
            errors.push(ValidationError::TopK(k));
        }
        if let Some(n) = config.max_output_tokens.filter(|n| *n < 1) {
            errors.push(ValidationError::MaxOutputTokens(n));
        }
        if let Some(n) = config.candidate_count.filter(|n| !(1..=8).contains(n)) {
            errors.push(ValidationError::CandidateCount(n));
        }

        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    pub fn debug_summary(&self) -> RequestDebugSummary {
        RequestDebugSummary {
            model: self.model.clone(),
            url: self.api_url(),
            contents_count: self.contents.len(),
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            top_p: self.top_p,
            top_k: self.top_k,
            candidate_count: self.candidate_count,
            response_mime_type: self.response_mime_type.clone(),
            thinking_budget: self.thinking_budget,
            include_thoughts: self.include_thoughts,
            has_tools: self.tool_count() > 0,
            has_system_instruction: self.system_instruction.is_some(),
            has_safety_settings: self
                .safety_settings
                .as_ref()
                .is_some_and(|settings| !settings.is_empty()),
            has_cached_content: self
                .cached_content
                .as_ref()
                .is_some_and(|cached| !cached.is_empty()),
            tool_count: self.tool_count(),
        }
    }

    /// Send the request. Missing model, contents or API key fail before any
    /// I/O; range problems are left for the API to judge.
    pub async fn post(&self, client: &dyn HttpClient) -> Result<GeminiGenerateResponse> {
        if self.model.trim().is_empty() {
            return Err(Error::Configuration("model is required".to_string()));
        }
        if self.contents.is_empty() {
            return Err(Error::Configuration("contents are required".to_string()));
        }
        let api_key = self
            .config
            .api_key()
            .ok_or_else(|| Error::Configuration("Gemini API key is not set".to_string()))?;

        let response =
            endpoint::generate_content(client, &self.api_url(), api_key, &self.to_body()).await?;
        GeminiGenerateResponse::from_http(response)
    }
}
