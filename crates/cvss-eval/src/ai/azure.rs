//! Azure OpenAI provider implementation.
//!
//! Azure addresses a model through a deployment name in the URL and
//! authenticates with an `api-key` header instead of a bearer token.

use super::chat::{read_completion, transport_error, ChatRequest};
use super::{CompletionRequest, LabelProvider};
use crate::error::{EvalError, ProviderError, Result};
use reqwest::blocking::Client;
use std::time::Duration;
use tracing::debug;

/// Default API version.
const DEFAULT_API_VERSION: &str = "2024-02-01";

/// Default deployment name.
const DEFAULT_DEPLOYMENT: &str = "gpt-4o";

/// Default timeout for API requests in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Configuration for the Azure OpenAI provider.
#[derive(Debug, Clone)]
pub struct AzureConfig {
    /// Resource endpoint, e.g. `https://my-resource.openai.azure.com`.
    pub endpoint: String,
    /// Deployment name.
    pub deployment: String,
    pub api_version: String,
    pub timeout_secs: u64,
}

impl AzureConfig {
    pub fn builder(endpoint: impl Into<String>) -> AzureConfigBuilder {
        AzureConfigBuilder {
            endpoint: endpoint.into(),
            ..AzureConfigBuilder::default()
        }
    }

    /// Full chat-completions URL for the configured deployment.
    pub fn completions_url(&self) -> String {
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            self.endpoint.trim_end_matches('/'),
            self.deployment,
            self.api_version
        )
    }
}

/// Builder for [`AzureConfig`].
#[derive(Default)]
pub struct AzureConfigBuilder {
    endpoint: String,
    deployment: Option<String>,
    api_version: Option<String>,
    timeout_secs: Option<u64>,
}

impl AzureConfigBuilder {
    pub fn deployment(mut self, deployment: impl Into<String>) -> Self {
        self.deployment = Some(deployment.into());
        self
    }

    pub fn api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = Some(api_version.into());
        self
    }

    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = Some(timeout_secs);
        self
    }

    pub fn build(self) -> AzureConfig {
        AzureConfig {
            endpoint: self.endpoint,
            deployment: self
                .deployment
                .unwrap_or_else(|| DEFAULT_DEPLOYMENT.to_string()),
            api_version: self
                .api_version
                .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
            timeout_secs: self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Azure OpenAI provider for generating CVSS labels.
pub struct AzureOpenAIProvider {
    api_key: String,
    config: AzureConfig,
    client: Client,
}

impl AzureOpenAIProvider {
    /// # Errors
    ///
    /// Returns an error if the endpoint is empty or the HTTP client cannot
    /// be created.
    pub fn with_config(api_key: impl Into<String>, config: AzureConfig) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(EvalError::InvalidConfig(
                "Azure endpoint must not be empty".to_string(),
            ));
        }

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

impl LabelProvider for AzureOpenAIProvider {
    fn complete(&self, request: &CompletionRequest) -> std::result::Result<String, ProviderError> {
        let url = self.config.completions_url();
        debug!("Azure request: deployment={}", self.config.deployment);

        let response = self
            .client
            .post(&url)
            .header("api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&ChatRequest::from_completion(None, request))
            .send()
            .map_err(|err| transport_error("Azure OpenAI", err))?;

        read_completion("Azure OpenAI", response)
    }

    fn name(&self) -> &str {
        "Azure OpenAI"
    }

    fn model(&self) -> Option<&str> {
        Some(&self.config.deployment)
    }
}
