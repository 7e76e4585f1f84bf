//! Error types for the evaluation toolkit.
//!
//! Per-record and per-file problems are not errors here: they are collected
//! as [`SkipReason`](crate::reporting::SkipReason)s in the run report. The
//! types below cover what actually stops a job (file-system setup, writing
//! outputs, invalid configuration) plus the provider failures that drive the
//! retry loop.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for the toolkit.
#[derive(Error, Debug)]
pub enum EvalError {
    /// A CSV file lacks one or more columns the job needs.
    #[error("Missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An input directory or file does not exist.
    #[error("Input not found: {0}")]
    InputNotFound(String),

    /// The label provider failed in a way the caller must see.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Rendering a plot failed.
    #[error("Failed to render plot: {0}")]
    Plot(String),

    /// IO error wrapper.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Directory walking error.
    #[error("Directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// HTTP request error (only with "ai" feature).
    #[cfg(feature = "ai")]
    #[error("HTTP request error: {0}")]
    HttpRequest(#[from] reqwest::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<EvalError>,
    },
}

impl EvalError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        EvalError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with all context layers removed.
    pub fn root(&self) -> &EvalError {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Stable error code, used in the JSON run reports.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingColumns(_) => "MISSING_COLUMNS",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InputNotFound(_) => "INPUT_NOT_FOUND",
            Self::Provider(_) => "PROVIDER_ERROR",
            Self::Plot(_) => "PLOT_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::Walk(_) => "WALK_ERROR",
            #[cfg(feature = "ai")]
            Self::HttpRequest(_) => "HTTP_REQUEST_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Whether the error only concerns one input file, so the job can move on
    /// to the next file.
    pub fn is_per_file(&self) -> bool {
        match self {
            Self::MissingColumns(_) | Self::Polars(_) | Self::Json(_) => true,
            Self::WithContext { source, .. } => source.is_per_file(),
            _ => false,
        }
    }
}

impl Serialize for EvalError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("EvalError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for toolkit operations.
pub type Result<T> = std::result::Result<T, EvalError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| EvalError::Polars(e).with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| EvalError::Io(e).with_context(context))
    }
}

/// Failure of a single request to the text-generation service.
///
/// Only [`ProviderError::RateLimited`] is retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The service answered with HTTP 429 (or an error mentioning it).
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Any other request failure.
    #[error("request failed: {0}")]
    Request(String),

    /// The service answered but carried no message content.
    #[error("no response content")]
    EmptyResponse,
}

impl ProviderError {
    /// Classify a raw error message. Any text mentioning status 429 counts as
    /// a rate limit.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains("429") {
            ProviderError::RateLimited(message)
        } else {
            ProviderError::Request(message)
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code() {
        assert_eq!(
            EvalError::MissingColumns(vec!["Scope".to_string()]).error_code(),
            "MISSING_COLUMNS"
        );
        assert_eq!(
            EvalError::InvalidConfig("batch".to_string()).error_code(),
            "INVALID_CONFIG"
        );
    }

    #[test]
    fn test_missing_columns_message_lists_columns() {
        let error = EvalError::MissingColumns(vec![
            "Scope".to_string(),
            "Generated Scope".to_string(),
        ]);
        assert_eq!(
            error.to_string(),
            "Missing required columns: Scope, Generated Scope"
        );
    }

    #[test]
    fn test_is_per_file() {
        assert!(EvalError::MissingColumns(vec![]).is_per_file());
        assert!(!EvalError::InvalidConfig("x".to_string()).is_per_file());
        let wrapped = EvalError::MissingColumns(vec![]).with_context("reading a.csv");
        assert!(wrapped.is_per_file());
    }

    #[test]
    fn test_error_serialization() {
        let error = EvalError::InputNotFound("/data/cves".to_string());
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("INPUT_NOT_FOUND"));
        assert!(json.contains("/data/cves"));
    }

    #[test]
    fn test_with_context() {
        let error = EvalError::MissingColumns(vec!["Description".to_string()])
            .with_context("While annotating scored.csv");
        assert!(error.to_string().contains("While annotating"));
        assert_eq!(error.error_code(), "MISSING_COLUMNS");
    }

    #[test]
    fn test_provider_error_classification() {
        assert!(ProviderError::from_message("Error code: 429 - Too Many Requests").is_rate_limited());
        assert!(!ProviderError::from_message("Error code: 401 - Unauthorized").is_rate_limited());
        assert!(!ProviderError::EmptyResponse.is_rate_limited());
    }
}
