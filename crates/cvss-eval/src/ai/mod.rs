//! Chat-completion providers used by the annotator.
//!
//! # Feature Flag
//!
//! The concrete HTTP providers require the `ai` feature. The
//! [`LabelProvider`] trait and the retry policy are always available, so the
//! annotator can run against a custom or scripted provider without it.
//!
//! ```toml
//! # Enable HTTP providers (default)
//! cvss_eval = { version = "0.1", features = ["ai"] }
//!
//! # Trait only
//! cvss_eval = { version = "0.1", default-features = false }
//! ```
//!
//! # Architecture
//!
//! - [`OpenRouterProvider`] - OpenRouter API (requires `ai` feature)
//! - [`AzureOpenAIProvider`] - Azure OpenAI deployments (requires `ai` feature)
//!
//! Retries live outside the providers in [`RetryPolicy`], which only retries
//! [`ProviderError::RateLimited`](crate::error::ProviderError::RateLimited).

mod provider;
mod retry;

pub use provider::{CompletionRequest, LabelProvider};
pub use retry::{
    RecordingSleeper, RetryError, RetryPolicy, Sleeper, ThreadSleeper, DEFAULT_BACKOFF_MULTIPLIER,
    DEFAULT_BASE_DELAY_SECS, DEFAULT_MAX_ATTEMPTS, MAX_RETRY_ATTEMPTS, MAX_RETRY_DELAY,
};

#[cfg(feature = "ai")]
mod azure;
#[cfg(feature = "ai")]
mod chat;
#[cfg(feature = "ai")]
mod openrouter;

#[cfg(feature = "ai")]
pub use azure::{AzureConfig, AzureConfigBuilder, AzureOpenAIProvider};

#[cfg(feature = "ai")]
pub use openrouter::{OpenRouterConfig, OpenRouterConfigBuilder, OpenRouterProvider};
