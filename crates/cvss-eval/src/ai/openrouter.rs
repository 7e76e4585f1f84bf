//! OpenRouter provider implementation.
//!
//! This module provides the [`OpenRouterProvider`] which implements the
//! [`LabelProvider`] trait for the OpenRouter API (<https://openrouter.ai/>).

use super::chat::{read_completion, transport_error, ChatRequest};
use super::{CompletionRequest, LabelProvider};
use crate::error::{EvalError, ProviderError, Result};
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::debug;

/// Default OpenRouter API endpoint.
const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

/// Default model used for labelling.
const DEFAULT_MODEL: &str = "openai/gpt-4o";

/// Default timeout for API requests in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for the OpenRouter provider.
#[derive(Debug, Clone)]
pub struct OpenRouterConfig {
    /// The model to use (e.g., "openai/gpt-4o").
    pub model: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// Base URL for the API (useful for proxies or custom endpoints).
    pub base_url: String,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl OpenRouterConfig {
    pub fn builder() -> OpenRouterConfigBuilder {
        OpenRouterConfigBuilder::default()
    }
}

/// Builder for [`OpenRouterConfig`].
#[derive(Default)]
pub struct OpenRouterConfigBuilder {
    model: Option<String>,
    timeout_secs: Option<u64>,
    base_url: Option<String>,
}

impl OpenRouterConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the request timeout in seconds.
    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    /// Set a custom base URL.
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn build(self) -> OpenRouterConfig {
        OpenRouterConfig {
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            timeout_secs: self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
            base_url: self.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        }
    }
}

/// OpenRouter provider for generating CVSS labels.
///
/// # Example
///
/// ```rust,ignore
/// use cvss_eval::ai::{OpenRouterConfig, OpenRouterProvider};
///
/// let config = OpenRouterConfig::builder()
///     .model("openai/gpt-4o")
///     .build();
/// let provider = OpenRouterProvider::with_config("your-api-key", config)?;
/// ```
pub struct OpenRouterProvider {
    api_key: String,
    config: OpenRouterConfig,
    client: Client,
}

impl OpenRouterProvider {
    /// Create a new OpenRouter provider with default configuration.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(api_key, OpenRouterConfig::default())
    }

    /// Create a new OpenRouter provider with custom configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn with_config(api_key: impl Into<String>, config: OpenRouterConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| EvalError::from(e).with_context("Failed to build HTTP client"))?;

        Ok(Self {
            api_key: api_key.into(),
            config,
            client,
        })
    }
}

impl LabelProvider for OpenRouterProvider {
    fn complete(&self, request: &CompletionRequest) -> std::result::Result<String, ProviderError> {
        let body = ChatRequest::from_completion(Some(self.config.model.clone()), request);
        debug!("OpenRouter request: model={}", self.config.model);

        let response = self
            .client
            .post(&self.config.base_url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .header("X-Title", "cvss-eval")
            .json(&body)
            .send()
            .map_err(|err| transport_error("OpenRouter", err))?;

        read_completion("OpenRouter", response)
    }

    fn name(&self) -> &str {
        "OpenRouter"
    }

    fn model(&self) -> Option<&str> {
        Some(&self.config.model)
    }
}
