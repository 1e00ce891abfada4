//! Gemini-native request builders, response wrappers and endpoints

pub mod builders;
pub mod chat_flow;
pub mod embed_flow;
pub mod embeddings_request;
pub mod embeddings_response;
pub mod endpoint;
pub mod request;
pub mod response;
pub mod types;

pub use builders::{
    detect_image_mime, ConversationBuilder, EmbeddingQueryBuilder, SystemPromptBuilder,
};
pub use chat_flow::{ChatEndpoint, ChatFlowContext};
pub use embed_flow::{EmbedEndpoint, EmbedFlowContext, GeminiEmbeddingResult};
pub use embeddings_request::GeminiEmbeddingsRequest;
pub use embeddings_response::{EmbeddingSummary, GeminiEmbeddingsResponse};
pub use request::GeminiGenerateRequest;
pub use response::{GeminiGenerateResponse, ResponseSummary};
pub use types::{Content, FinishReason, GeminiCallResult, GeminiRole, Part, TaskType};
