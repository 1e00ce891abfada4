//! Universal schema and the Gemini translation drivers
//!
//! A [`TranslationDriver`] converts in both directions between the
//! provider-neutral shapes in [`types`] and the Gemini request/response
//! values. Conversions take their input by value and return new values.

pub mod chat;
pub mod embeddings;
pub mod types;

pub use chat::{finish_reason_from_gemini, finish_reason_to_gemini, GeminiChatDriver};
pub use embeddings::{GeminiEmbeddingsDriver, DEFAULT_EMBEDDING_MODEL};
pub use types::*;

use crate::Result;

pub trait TranslationDriver {
    type UniversalRequest;
    type UniversalResponse;
    type WireRequest;
    type WireResponse;

    /// Universal request to a Gemini request.
    fn to_wire(&self, request: Self::UniversalRequest) -> Result<Self::WireRequest>;

    /// Gemini response to a universal response.
    fn from_wire(&self, response: Self::WireResponse) -> Result<Self::UniversalResponse>;

    /// Gemini request back to a universal request.
    fn to_universal(&self, request: Self::WireRequest) -> Result<Self::UniversalRequest>;

    /// Universal response back to a Gemini response.
    fn from_universal(&self, response: Self::UniversalResponse) -> Result<Self::WireResponse>;
}
