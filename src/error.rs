//! Error handling and custom error types
//!
//! Provides unified error handling across the crate using thiserror.
//! [`ValidationError`] is advisory and never returned as an `Err` on its own.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// A required field (model, contents, API key) was missing before any
    /// network call was attempted.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The HTTP client could not complete the exchange (DNS, connect, timeout).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The exchange completed but the status was non-2xx or the body was
    /// missing or malformed.
    #[error("Gemini API error (status {status}): {message}")]
    Api {
        status: u16,
        message: String,
        details: Option<serde_json::Value>,
    },

    /// A schema adapter met a shape it has no mapping for.
    #[error("Translation error: {0}")]
    Translation(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invariant violation: {0}")]
    Invariant(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvVar(#[from] dotenvy::Error),
}

impl Error {
    pub(crate) fn api(status: u16, message: impl Into<String>) -> Self {
        Error::Api {
            status,
            message: message.into(),
            details: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Advisory findings from `validate()` on the request builders.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Model is required")]
    MissingModel,

    #[error("Contents array is required")]
    MissingContents,

    #[error("Content must contain at least one non-empty text part")]
    MissingContent,

    #[error("GEMINI_API_KEY is required")]
    MissingApiKey,

    #[error("Temperature must be between 0 and 2 (got {0})")]
    Temperature(f64),

    #[error("TopP must be between 0 and 1 (got {0})")]
    TopP(f64),

    #[error("TopK must be >= 1 (got {0})")]
    TopK(i32),

    #[error("MaxOutputTokens must be >= 1 (got {0})")]
    MaxOutputTokens(i32),

    #[error("CandidateCount must be between 1 and 8 (got {0})")]
    CandidateCount(i32),

    #[error("Unknown task type: {0}")]
    TaskType(String),

    #[error("OutputDimensionality must be > 0 (got {0})")]
    OutputDimensionality(i32),

    #[error("A title is required for RETRIEVAL_DOCUMENT embeddings")]
    MissingTitle,
}
