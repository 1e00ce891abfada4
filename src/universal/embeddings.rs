use super::types::{
    EmbeddingData, EmbeddingInput, EmbeddingsMetadata, EmbeddingsUsage,
    UniversalEmbeddingsRequest, UniversalEmbeddingsResponse,
};
use super::TranslationDriver;
use crate::config::GeminiConfig;
use crate::gemini::embeddings_request::GeminiEmbeddingsRequest;
use crate::gemini::embeddings_response::GeminiEmbeddingsResponse;
use crate::gemini::types::{Content, Part};
use crate::Result;

/// Model label reported on universal responses; Gemini does not echo it.
pub const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-004";

#[derive(Debug, Clone, Default)]
pub struct GeminiEmbeddingsDriver {
    config: GeminiConfig,
}

impl GeminiEmbeddingsDriver {
    pub fn new(config: GeminiConfig) -> Self {
        Self { config }
    }
}

impl TranslationDriver for GeminiEmbeddingsDriver {
    type UniversalRequest = UniversalEmbeddingsRequest;
    type UniversalResponse = UniversalEmbeddingsResponse;
    type WireRequest = GeminiEmbeddingsRequest;
    type WireResponse = GeminiEmbeddingsResponse;

    fn to_wire(&self, request: UniversalEmbeddingsRequest) -> Result<GeminiEmbeddingsRequest> {
        let parts = request.input.texts().into_iter().map(Part::text).collect();
        let mut wire = GeminiEmbeddingsRequest::new(
            &self.config,
            request.model,
            Content { role: None, parts },
        );

        if let Some(dimensions) = request.dimensions {
            wire = wire.with_output_dimensionality(dimensions);
        }
        if let Some(task_type) = request.task_type {
            wire = wire.with_task_type(task_type);
        }

        Ok(wire)
    }

    fn from_wire(&self, response: GeminiEmbeddingsResponse) -> Result<UniversalEmbeddingsResponse> {
        let data = response
            .values()
            .map(|values| EmbeddingData {
                object: "embedding".to_string(),
                embedding: values.to_vec(),
                index: 0,
            })
            .into_iter()
            .collect();

        Ok(UniversalEmbeddingsResponse {
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
            data,
            usage: EmbeddingsUsage::default(),
            object: "list".to_string(),
            metadata: EmbeddingsMetadata {
                status_code: response.status_code,
                embedding_dimensions: response.dimensions().unwrap_or(0),
            },
        })
    }

    fn to_universal(&self, request: GeminiEmbeddingsRequest) -> Result<UniversalEmbeddingsRequest> {
        let text: Vec<&str> = request
            .content()
            .parts
            .iter()
            .filter_map(Part::text_value)
            .collect();

        Ok(UniversalEmbeddingsRequest {
            model: request.model().to_string(),
            input: EmbeddingInput::Single(text.join(" ")),
            encoding_format: None,
            dimensions: request.output_dimensionality(),
            task_type: request.task_type().map(str::to_string),
        })
    }

    fn from_universal(&self, response: UniversalEmbeddingsResponse) -> Result<GeminiEmbeddingsResponse> {
        let values = response
            .data
            .into_iter()
            .next()
            .map(|data| data.embedding)
            .unwrap_or_default();

        Ok(GeminiEmbeddingsResponse::from_values(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn driver() -> GeminiEmbeddingsDriver {
        GeminiEmbeddingsDriver::new(GeminiConfig::new("k"))
    }

    #[test]
    fn test_batch_input_keeps_order() {
        let mut request = UniversalEmbeddingsRequest::new(
            "text-embedding-004",
            EmbeddingInput::Batch(vec!["first".to_string(), "second".to_string()]),
        );
        request.dimensions = Some(128);
        request.task_type = Some("CLUSTERING".to_string());

        let body = serde_json::to_value(driver().to_wire(request).unwrap().to_body()).unwrap();

        assert_eq!(
            body,
            json!({
                "model": "models/text-embedding-004",
                "content": {"parts": [{"text": "first"}, {"text": "second"}]},
                "taskType": "CLUSTERING",
                "outputDimensionality": 128
            })
        );
    }

    #[test]
    fn test_single_input_is_one_part() {
        let request = UniversalEmbeddingsRequest::new(
            "text-embedding-004",
            EmbeddingInput::Single("hello".to_string()),
        );

        let wire = driver().to_wire(request).unwrap();
        assert_eq!(wire.content().parts, vec![Part::text("hello")]);
        assert_eq!(wire.title(), None);
    }

    #[test]
    fn test_from_wire_with_embedding() {
        let universal = driver()
            .from_wire(GeminiEmbeddingsResponse::from_values(vec![0.1, 0.2, 0.3]))
            .unwrap();

        assert_eq!(universal.model, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(universal.object, "list");
        assert_eq!(
            universal.data,
            vec![EmbeddingData {
                object: "embedding".to_string(),
                embedding: vec![0.1, 0.2, 0.3],
                index: 0,
            }]
        );
        assert_eq!(universal.usage, EmbeddingsUsage::default());
        assert_eq!(universal.metadata.embedding_dimensions, 3);
    }

    #[test]
    fn test_from_wire_without_embedding_has_no_data() {
        let universal = driver()
            .from_wire(GeminiEmbeddingsResponse::from_json(json!({})).unwrap())
            .unwrap();

        assert!(universal.data.is_empty());
        assert_eq!(universal.usage.prompt_tokens, 0);
        assert_eq!(universal.usage.total_tokens, 0);
    }

    #[test]
    fn test_to_universal_joins_parts_with_space() {
        let wire = GeminiEmbeddingsRequest::with_text(&GeminiConfig::new("k"), "text-embedding-004", "hello")
            .add_text_part("world")
            .with_output_dimensionality(64);

        let universal = driver().to_universal(wire).unwrap();

        assert_eq!(universal.input, EmbeddingInput::Single("hello world".to_string()));
        assert_eq!(universal.dimensions, Some(64));
        assert_eq!(universal.encoding_format, None);
    }

    #[test]
    fn test_from_universal_takes_first_embedding() {
        let universal = UniversalEmbeddingsResponse {
            model: "m".to_string(),
            data: vec![
                EmbeddingData {
                    object: "embedding".to_string(),
                    embedding: vec![1.0, 2.0],
                    index: 0,
                },
                EmbeddingData {
                    object: "embedding".to_string(),
                    embedding: vec![3.0],
                    index: 1,
                },
            ],
            usage: EmbeddingsUsage::default(),
            object: "list".to_string(),
            metadata: EmbeddingsMetadata::default(),
        };

        let response = driver().from_universal(universal).unwrap();

        assert_eq!(response.values(), Some(&[1.0, 2.0][..]));
        assert_eq!(response.status_code, 200);
    }
}
