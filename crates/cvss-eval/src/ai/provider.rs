//! Label provider trait for abstracting chat-completion services.
//!
//! The annotator builds the prompt itself; a provider only has to deliver
//! one completion for one request. This keeps the batching, parsing and
//! retry logic independent of the service behind it.
//!
//! # Implementing a New Provider
//!
//! 1. Create a new file in `src/ai/` (e.g., `ollama.rs`)
//! 2. Implement the [`LabelProvider`] trait for your provider struct
//! 3. Export the provider in `src/ai/mod.rs`
//!
//! # Example
//!
//! ```rust,ignore
//! use cvss_eval::ai::{CompletionRequest, LabelProvider, OpenRouterProvider};
//!
//! let provider = OpenRouterProvider::new("your-api-key")?;
//! let text = provider.complete(&CompletionRequest {
//!     system: "You are a cybersecurity expert.".to_string(),
//!     user: "1. A buffer overflow in ...".to_string(),
//!     max_tokens: 1000,
//!     temperature: 0.2,
//! })?;
//! ```

use crate::error::ProviderError;
use serde::{Deserialize, Serialize};

/// One chat-completion request: a system message and a user message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Trait for services that answer a labelling prompt.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so one provider can be shared
/// behind an `Arc` across jobs.
///
/// # Error Handling
///
/// Return [`ProviderError::RateLimited`] for HTTP 429 answers; only those are
/// retried. Every other error abandons the current batch.
pub trait LabelProvider: Send + Sync {
    /// Send `request` and return the text of the first choice.
    fn complete(&self, request: &CompletionRequest) -> Result<String, ProviderError>;

    /// Provider name for logging and run reports.
    fn name(&self) -> &str;

    /// Model or deployment used, if the provider exposes one.
    fn model(&self) -> Option<&str> {
        None
    }
}
