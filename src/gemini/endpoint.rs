//! Thin invokers for the two Gemini REST methods.
//!
//! Each one attaches the API key header, posts the body through the injected
//! [`HttpClient`] and hands back the raw exchange. Non-2xx statuses and
//! bodies that are not JSON become [`Error::Api`].

use super::types::{EmbedContentBody, GenerateContentBody};
use crate::http::{HttpClient, HttpResponse};
use crate::{Error, Result};
use serde::Serialize;

pub const GENERATE_CONTENT: &str = "generateContent";
pub const EMBED_CONTENT: &str = "embedContent";

pub fn auth_headers(api_key: &str) -> Vec<(String, String)> {
    vec![
        ("x-goog-api-key".to_string(), api_key.to_string()),
        ("Content-Type".to_string(), "application/json".to_string()),
    ]
}

pub async fn generate_content(
    client: &dyn HttpClient,
    url: &str,
    api_key: &str,
    body: &GenerateContentBody,
) -> Result<HttpResponse> {
    invoke(client, url, api_key, body).await
}

pub async fn embed_content(
    client: &dyn HttpClient,
    url: &str,
    api_key: &str,
    body: &EmbedContentBody,
) -> Result<HttpResponse> {
    invoke(client, url, api_key, body).await
}

async fn invoke<B: Serialize>(
    client: &dyn HttpClient,
    url: &str,
    api_key: &str,
    body: &B,
) -> Result<HttpResponse> {
    let payload = serde_json::to_value(body)?;
    tracing::debug!("Sending Gemini request to {}", url);

    let response = client.post(url, &auth_headers(api_key), &payload).await?;

    if !response.is_success() {
        tracing::error!(
            "Gemini API error (status {}): {}",
            response.status,
            response.raw_body
        );
        // Gemini errors look like {"error": {"code", "message", "status"}}.
        let message = response
            .json
            .as_ref()
            .and_then(|json| json.pointer("/error/message"))
            .and_then(|message| message.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| response.raw_body.clone());
        return Err(Error::Api {
            status: response.status,
            message,
            details: response.json,
        });
    }

    if response.json.is_none() {
        tracing::error!("Failed to parse Gemini response body: {}", response.raw_body);
        return Err(Error::api(
            response.status,
            "response body was missing or not JSON",
        ));
    }

    Ok(response)
}
