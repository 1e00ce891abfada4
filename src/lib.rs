//! Gemini bridge - translate between a universal LLM schema and the Gemini
//! `generateContent` / `embedContent` wire formats
//!
//! The crate builds Gemini requests (directly or from universal requests),
//! posts them through an injected [`http::HttpClient`], and wraps the replies
//! with analysis helpers or converts them back to the universal shape.

pub mod config;
pub mod error;
pub mod flow;
pub mod gemini;
pub mod http;
pub mod universal;
pub mod vector;

pub use config::GeminiConfig;
pub use error::{Error, Result, ValidationError};
