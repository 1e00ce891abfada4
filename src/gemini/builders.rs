//! Builders for Gemini-native `Content` values.
//!
//! These produce wire shapes directly, for use with [`GeminiGenerateRequest`]
//! and [`GeminiEmbeddingsRequest`]. The universal adapters do not go through
//! them.
//!
//! [`GeminiGenerateRequest`]: super::request::GeminiGenerateRequest
//! [`GeminiEmbeddingsRequest`]: super::embeddings_request::GeminiEmbeddingsRequest

use super::types::{Content, FunctionCall, FunctionResponse, GeminiRole, InlineData, Part};
use crate::Result;
use base64::Engine as _;
use serde_json::Value;
use std::path::Path;

/// Sniff an image MIME type from its leading bytes.
pub fn detect_image_mime(bytes: &[u8]) -> &'static str {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [0x89, 0x50, 0x4E, 0x47, ..] => "image/png",
        [0x47, 0x49, 0x46, 0x38, ..] => "image/gif",
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => "image/webp",
        _ => {
            tracing::warn!(
                "Unrecognized image format (first 4 bytes: {:02X?}), sending as image/png",
                &bytes[..bytes.len().min(4)]
            );
            "image/png"
        }
    }
}

/// Ordered multi-turn conversation in Gemini form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationBuilder {
    contents: Vec<Content>,
}

impl ConversationBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(mut self, role: GeminiRole, part: Part) -> Self {
        self.contents.push(Content {
            role: Some(role.as_str().to_string()),
            parts: vec![part],
        });
        self
    }

    pub fn add_text(self, role: GeminiRole, text: impl Into<String>) -> Self {
        self.push(role, Part::text(text))
    }

    /// A model turn asking for `name` to be called with `args`.
    pub fn add_tool_request(self, name: impl Into<String>, args: Value) -> Self {
        self.push(
            GeminiRole::Model,
            Part::FunctionCall {
                function_call: FunctionCall {
                    name: name.into(),
                    args,
                },
            },
        )
    }

    /// A function turn carrying the output of `name`.
    pub fn add_tool_result(self, name: impl Into<String>, content: Value) -> Self {
        self.push(
            GeminiRole::Function,
            Part::FunctionResponse {
                function_response: FunctionResponse::new(name, content),
            },
        )
    }

    pub fn add_image(self, role: GeminiRole, bytes: &[u8]) -> Self {
        let inline_data = InlineData {
            mime_type: detect_image_mime(bytes).to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        };
        self.push(role, Part::InlineData { inline_data })
    }

    pub fn add_image_file(self, role: GeminiRole, path: impl AsRef<Path>) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        Ok(self.add_image(role, &bytes))
    }

    pub fn len(&self) -> usize {
        self.contents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contents.is_empty()
    }

    pub fn render(&self) -> Vec<Content> {
        self.contents.clone()
    }
}

/// System instruction made of one text part per call to `add_text`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SystemPromptBuilder {
    parts: Vec<Part>,
}

impl SystemPromptBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_text(mut self, text: impl Into<String>) -> Self {
        self.parts.push(Part::text(text));
        self
    }

    pub fn render(&self) -> Content {
        Content {
            role: None,
            parts: self.parts.clone(),
        }
    }
}

/// Embedding input made of one text part per query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmbeddingQueryBuilder {
    parts: Vec<Part>,
}

impl EmbeddingQueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_query(mut self, query: impl Into<String>) -> Self {
        self.parts.push(Part::text(query));
        self
    }

    pub fn render(&self) -> Content {
        Content {
            role: None,
            parts: self.parts.clone(),
        }
    }
}
