//! CVSS Evaluation Toolkit
//!
//! Batch tooling for measuring how well a language model infers CVSS v3.1
//! base metrics from free-text vulnerability descriptions.
//!
//! # Overview
//!
//! The toolkit runs four independent jobs over files on disk:
//!
//! - **Extractor**: flatten CVE JSON documents into one CSV per directory
//! - **Annotator**: send record descriptions to a chat-completion service in
//!   batches and add `Generated <Field>` columns to each row
//! - **Scorer**: per-field accuracy, base-score difference buckets, vector
//!   matching, confusion matrices, macro precision / recall / F1 and ROC-AUC
//! - **Analyst**: category distributions, description lengths and pairwise
//!   Cramér's V over a combined dataset
//!
//! Jobs are sequential and single-threaded. A file, record or batch that
//! cannot be processed is skipped and listed in the job's [`RunReport`]; only
//! output-directory and write failures end a run.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use cvss_eval::{Annotator, AnnotatorConfig, RecordVariant};
//! use cvss_eval::ai::OpenRouterProvider;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let provider = Arc::new(OpenRouterProvider::new(api_key)?);
//! let config = AnnotatorConfig::builder()
//!     .variant(RecordVariant::VendorProduct)
//!     .batch_size(20)
//!     .build()?;
//!
//! let report = Annotator::builder()
//!     .config(config)
//!     .provider(provider)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?
//!     .process_dir(Path::new("cve_data"), Path::new("scored"))?;
//!
//! report.print_summary();
//! ```
//!
//! # Label Providers
//!
//! The annotator talks to a model through the [`ai::LabelProvider`] trait.
//! Implemented providers (behind the `ai` feature):
//!
//! - [`ai::OpenRouterProvider`] - OpenRouter-style chat completions
//! - [`ai::AzureOpenAIProvider`] - Azure OpenAI deployments
//!
//! Rate-limited calls are retried with exponential backoff by
//! [`ai::RetryPolicy`]; every other failure abandons the batch.
//!
//! # Scoring
//!
//! ```rust,ignore
//! use cvss_eval::{Scorer, ScorerConfig};
//!
//! let scorer = Scorer::new(ScorerConfig::builder().output_dir("results").build()?);
//! let (summary, report) = scorer.accuracy(Path::new("scored"))?;
//! let (fields, _) = scorer.confusion(Path::new("runs"), &["gpt4o".into(), "gpt4".into()])?;
//! ```

pub mod ai;
pub mod analyst;
pub mod annotator;
pub mod config;
pub mod cvss;
pub mod error;
pub mod extractor;
pub mod progress;
pub mod reporting;
pub mod scorer;
pub mod types;
pub mod utils;

// Re-exports for convenient access
pub use analyst::{AnalysisSummary, Analyst, AssociationMatrix, Distribution};
pub use annotator::{Annotator, AnnotatorBuilder};
pub use config::{
    AnalystConfig, AnalystConfigBuilder, AnnotatorConfig, AnnotatorConfigBuilder,
    ConfigValidationError, ExtractorConfig, ExtractorConfigBuilder, ScorerConfig,
    ScorerConfigBuilder,
};
pub use cvss::BaseMetrics;
pub use error::{EvalError, ProviderError, Result as EvalResult, ResultExt};
pub use extractor::{CveDocument, Extractor};
pub use progress::{ClosureProgressReporter, JobStage, ProgressReporter, ProgressUpdate};
pub use reporting::{ReportGenerator, RunReport, SkipReason};
pub use scorer::{AccuracySummary, DiffCounts, FieldConfusion, Scorer};
pub use types::{
    GeneratedLabelSet, Metric, RecordVariant, ScoreBucket, VectorMatch, VulnerabilityRecord,
};
