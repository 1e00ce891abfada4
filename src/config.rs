//! Connection settings shared by request builders and endpoints.

use std::fmt;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// API key and base URL, passed by value into every builder.
#[derive(Clone, PartialEq)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

/// Debug stand-in for an API key.
pub(crate) fn redact(api_key: &str) -> &'static str {
    if api_key.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &redact(self.api_key.as_deref().unwrap_or_default()))
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Load `GEMINI_API_KEY` and `GEMINI_URL` (with `.env` support).
    ///
    /// A missing key is not an error here; it surfaces as a configuration
    /// error when a request is actually sent.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        Self {
            api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .filter(|key| !key.trim().is_empty()),
            base_url: std::env::var("GEMINI_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string()),
        }
    }

    /// Like [`from_env`](Self::from_env) but reads an explicit dotenv file,
    /// which must exist and parse.
    pub fn from_env_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        dotenvy::from_path(path.as_ref())?;
        Ok(Self::from_env())
    }

    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.is_empty())
    }
}

/// Join a base URL with a `models/{model}:{method}` path, tolerating a
/// trailing slash on the base and a `models/` prefix on the model.
pub fn model_url(base_url: &str, model: &str, method: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let model = model.strip_prefix("models/").unwrap_or(model);
    format!("{}/models/{}:{}", base, model, method)
}
