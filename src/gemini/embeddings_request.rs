use super::embeddings_response::GeminiEmbeddingsResponse;
use super::endpoint::{self, EMBED_CONTENT};
use super::types::{Content, EmbedContentBody, Part, TaskType};
use crate::config::{model_url, GeminiConfig};
use crate::http::HttpClient;
use crate::{Error, Result, ValidationError};

const LEGACY_MODEL: &str = "embedding-001";

/// An `embedContent` request.
///
/// `task_type` is kept as the raw wire string so unknown values can be
/// reported by [`Self::validate`] instead of being rejected up front.
#[derive(Debug, Clone, PartialEq)]
pub struct GeminiEmbeddingsRequest {
    config: GeminiConfig,
    model: String,
    content: Content,
    task_type: Option<String>,
    title: Option<String>,
    output_dimensionality: Option<i32>,
}

impl GeminiEmbeddingsRequest {
    pub fn new(config: &GeminiConfig, model: impl Into<String>, content: Content) -> Self {
        Self {
            config: config.clone(),
            model: model.into(),
            content,
            task_type: None,
            title: None,
            output_dimensionality: None,
        }
    }

    pub fn with_text(config: &GeminiConfig, model: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(config, model, Content::text(None, text))
    }

    pub fn with_parts(config: &GeminiConfig, model: impl Into<String>, parts: Vec<Part>) -> Self {
        Self::new(config, model, Content { role: None, parts })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn task_type(&self) -> Option<&str> {
        self.task_type.as_deref()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn output_dimensionality(&self) -> Option<i32> {
        self.output_dimensionality
    }

    pub fn with_config(mut self, config: &GeminiConfig) -> Self {
        self.config = config.clone();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_content(mut self, content: Content) -> Self {
        self.content = content;
        self
    }

    pub fn with_task_type(mut self, task_type: impl Into<String>) -> Self {
        self.task_type = Some(task_type.into());
        self
    }

    pub fn with_task(self, task_type: TaskType) -> Self {
        self.with_task_type(task_type.as_str())
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_output_dimensionality(mut self, dimensions: i32) -> Self {
        self.output_dimensionality = Some(dimensions);
        self
    }

    pub fn add_text_part(mut self, text: impl Into<String>) -> Self {
        self.content.parts.push(Part::text(text));
        self
    }

    /// Drop every part and keep a single text part.
    pub fn replace_text(mut self, text: impl Into<String>) -> Self {
        self.content.parts = vec![Part::text(text)];
        self
    }

    fn texts(&self) -> impl Iterator<Item = &str> {
        self.content.parts.iter().filter_map(Part::text_value)
    }

    pub fn is_valid_task_type(&self) -> bool {
        self.task_type
            .as_deref()
            .map_or(true, |task| TaskType::ALL.iter().any(|t| t.as_str() == task))
    }

    pub fn is_valid_output_dimensionality(&self) -> bool {
        self.output_dimensionality.map_or(true, |d| d > 0)
    }

    pub fn has_title(&self) -> bool {
        self.title
            .as_deref()
            .is_some_and(|title| !title.trim().is_empty())
    }

    pub fn requires_title(&self) -> bool {
        self.task_type.as_deref() == Some(TaskType::RetrievalDocument.as_str())
    }

    fn all_parts_have_text(&self) -> bool {
        !self.content.parts.is_empty()
            && self.content.parts.iter().all(|part| {
                part.text_value()
                    .is_some_and(|text| !text.trim().is_empty())
            })
    }

    pub fn is_valid_configuration(&self) -> bool {
        self.is_valid_task_type()
            && self.is_valid_output_dimensionality()
            && (!self.requires_title() || self.has_title())
            && self.all_parts_have_text()
    }

    fn is_legacy_model(&self) -> bool {
        self.model.strip_prefix("models/").unwrap_or(&self.model) == LEGACY_MODEL
    }

    pub fn supports_output_dimensionality(&self) -> bool {
        !self.is_legacy_model()
    }

    pub fn supports_task_type(&self) -> bool {
        !self.is_legacy_model()
    }

    pub fn content_text_count(&self) -> usize {
        self.texts().count()
    }

    /// Total length of all text parts in bytes.
    pub fn total_text_length(&self) -> usize {
        self.texts().map(str::len).sum()
    }

    /// Roughly four characters per token.
    pub fn estimated_token_count(&self) -> usize {
        self.total_text_length().div_ceil(4)
    }

    /// Same rules as [`Self::is_valid_configuration`], itemised, plus model
    /// and API key presence.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.model.trim().is_empty() {
            errors.push(ValidationError::MissingModel);
        }
        if self.config.api_key().is_none() {
            errors.push(ValidationError::MissingApiKey);
        }
        if !self.is_valid_task_type() {
            errors.push(ValidationError::TaskType(
                self.task_type.clone().unwrap_or_default(),
            ));
        }
        if let Some(d) = self.output_dimensionality.filter(|d| *d <= 0) {
            errors.push(ValidationError::OutputDimensionality(d));
        }
        if self.requires_title() && !self.has_title() {
            errors.push(ValidationError::MissingTitle);
        }
        if !self.all_parts_have_text() {
            errors.push(ValidationError::MissingContent);
        }

        errors
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    pub fn api_url(&self) -> String {
        model_url(&self.config.base_url, &self.model, EMBED_CONTENT)
    }

    pub fn to_body(&self) -> EmbedContentBody {
        let model = self.model.strip_prefix("models/").unwrap_or(&self.model);
        EmbedContentBody {
            model: format!("models/{}", model),
            content: self.content.clone(),
            task_type: self.task_type.clone(),
            title: self.title.clone(),
            output_dimensionality: self.output_dimensionality,
        }
    }

    pub async fn post(&self, client: &dyn HttpClient) -> Result<GeminiEmbeddingsResponse> {
        if self.model.trim().is_empty() {
            return Err(Error::Configuration("model is required".to_string()));
        }
        if self.content.parts.is_empty() {
            return Err(Error::Configuration("content is required".to_string()));
        }
        let api_key = self
            .config
            .api_key()
            .ok_or_else(|| Error::Configuration("Gemini API key is not set".to_string()))?;

        let response =
            endpoint::embed_content(client, &self.api_url(), api_key, &self.to_body()).await?;
        GeminiEmbeddingsResponse::from_http(response)
    }
}
