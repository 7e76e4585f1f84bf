//! Configuration types for the four jobs.
//!
//! Each job has a config struct with `Default`, serde support, and a builder
//! whose `build()` validates the result.

use crate::ai::{RetryPolicy, MAX_RETRY_ATTEMPTS};
use crate::types::RecordVariant;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default number of records per model request.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Default response token budget.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

/// Default number of bins in the description-length histogram.
pub const DEFAULT_HISTOGRAM_BINS: usize = 50;

/// Default name of the analyst's output directory, created under the base.
pub const DEFAULT_ANALYSIS_DIR: &str = "analysis_results";

/// Default number of problem rows printed by the analyst.
pub const DEFAULT_SAMPLE_LIMIT: usize = 10;

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid batch size: {0} (must be at least 1)")]
    InvalidBatchSize(usize),

    #[error("Invalid temperature: {0} (must be between 0.0 and 2.0)")]
    InvalidTemperature(f32),

    #[error("Invalid max tokens: {0} (must be at least 1)")]
    InvalidMaxTokens(u32),

    #[error("Invalid retry attempts: {0} (must be at least 1)")]
    InvalidMaxAttempts(u32),

    #[error("Invalid backoff: base delay {base_delay_secs}s, multiplier {multiplier} (both must be non-negative, multiplier at least 1)")]
    InvalidBackoff { base_delay_secs: f64, multiplier: f64 },

    #[error("Invalid histogram bins: {0} (must be at least 1)")]
    InvalidHistogramBins(usize),

    #[error("Invalid retry attempts: {attempts} (must be at most {max})")]
    TooManyAttempts { attempts: u32, max: u32 },
}

// ============================================================================
// Extractor
// ============================================================================

/// Configuration for the extractor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Which fields are carried and required.
    /// Default: DescriptionOnly
    pub variant: RecordVariant,

    /// Walk sub-directories of the input directory.
    /// Default: true
    pub recursive: bool,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            variant: RecordVariant::default(),
            recursive: true,
        }
    }
}

impl ExtractorConfig {
    pub fn builder() -> ExtractorConfigBuilder {
        ExtractorConfigBuilder::default()
    }
}

/// Builder for [`ExtractorConfig`].
#[derive(Debug, Default)]
pub struct ExtractorConfigBuilder {
    variant: Option<RecordVariant>,
    recursive: Option<bool>,
}

impl ExtractorConfigBuilder {
    pub fn variant(mut self, variant: RecordVariant) -> Self {
        self.variant = Some(variant);
        self
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = Some(recursive);
        self
    }

    pub fn build(self) -> Result<ExtractorConfig, ConfigValidationError> {
        Ok(ExtractorConfig {
            variant: self.variant.unwrap_or_default(),
            recursive: self.recursive.unwrap_or(true),
        })
    }
}

// ============================================================================
// Annotator
// ============================================================================

/// Configuration for the annotator.
///
/// # Example
///
/// ```rust,ignore
/// use cvss_eval::config::AnnotatorConfig;
/// use cvss_eval::types::RecordVariant;
///
/// let config = AnnotatorConfig::builder()
///     .variant(RecordVariant::VendorProduct)
///     .batch_size(10)
///     .export_json_dir("scored_jsons")
///     .build()?;
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotatorConfig {
    /// Prompt variant and predicted field set.
    /// Default: DescriptionOnly
    pub variant: RecordVariant,

    /// Records per request; the final partial batch is sent too.
    /// Default: 20
    pub batch_size: usize,

    /// Response token budget.
    /// Default: 1000
    pub max_tokens: u32,

    /// Sampling temperature.
    /// Default: 0.2
    pub temperature: f32,

    /// Backoff applied to rate-limited requests.
    pub retry: RetryPolicy,

    /// Append `Generated Vector String` and `Generated Score` columns.
    /// Default: true
    pub derive_scores: bool,

    /// Write one `CVE_<id>_scored.json` per record into this directory.
    /// Default: None
    pub export_json_dir: Option<PathBuf>,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            variant: RecordVariant::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            retry: RetryPolicy::default(),
            derive_scores: true,
            export_json_dir: None,
        }
    }
}

impl AnnotatorConfig {
    pub fn builder() -> AnnotatorConfigBuilder {
        AnnotatorConfigBuilder::default()
    }

    /// Validate the configuration and return errors if invalid.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.batch_size == 0 {
            return Err(ConfigValidationError::InvalidBatchSize(self.batch_size));
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigValidationError::InvalidTemperature(self.temperature));
        }

        if self.max_tokens == 0 {
            return Err(ConfigValidationError::InvalidMaxTokens(self.max_tokens));
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigValidationError::InvalidMaxAttempts(
                self.retry.max_attempts,
            ));
        }

        if self.retry.max_attempts > MAX_RETRY_ATTEMPTS {
            return Err(ConfigValidationError::TooManyAttempts {
                attempts: self.retry.max_attempts,
                max: MAX_RETRY_ATTEMPTS,
            });
        }

        let base = self.retry.base_delay_secs;
        let multiplier = self.retry.backoff_multiplier;
        if !base.is_finite() || base < 0.0 || !multiplier.is_finite() || multiplier < 1.0 {
            return Err(ConfigValidationError::InvalidBackoff {
                base_delay_secs: base,
                multiplier,
            });
        }

        Ok(())
    }
}

/// Builder for [`AnnotatorConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct AnnotatorConfigBuilder {
    variant: Option<RecordVariant>,
    batch_size: Option<usize>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    retry: Option<RetryPolicy>,
    derive_scores: Option<bool>,
    export_json_dir: Option<PathBuf>,
}

impl AnnotatorConfigBuilder {
    pub fn variant(mut self, variant: RecordVariant) -> Self {
        self.variant = Some(variant);
        self
    }

    /// Set the number of records per request.
    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = Some(size);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Set the temperature (0.0 - 2.0).
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Enable or disable the derived vector string and score columns.
    pub fn derive_scores(mut self, derive: bool) -> Self {
        self.derive_scores = Some(derive);
        self
    }

    /// Write per-record JSON exports into `dir`.
    pub fn export_json_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.export_json_dir = Some(dir.into());
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `AnnotatorConfig` or an error if validation fails.
    pub fn build(self) -> Result<AnnotatorConfig, ConfigValidationError> {
        let config = AnnotatorConfig {
            variant: self.variant.unwrap_or_default(),
            batch_size: self.batch_size.unwrap_or(DEFAULT_BATCH_SIZE),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            retry: self.retry.unwrap_or_default(),
            derive_scores: self.derive_scores.unwrap_or(true),
            export_json_dir: self.export_json_dir,
        };

        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Scorer
// ============================================================================

/// Configuration for the scorer jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScorerConfig {
    /// Directory receiving combined CSVs, per-file outputs and plots.
    /// Default: "scoring_results"
    pub output_dir: PathBuf,

    /// Render confusion heatmaps and ROC curves.
    /// Default: true
    pub render_plots: bool,
}

impl Default for ScorerConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("scoring_results"),
            render_plots: true,
        }
    }
}

impl ScorerConfig {
    pub fn builder() -> ScorerConfigBuilder {
        ScorerConfigBuilder::default()
    }
}

/// Builder for [`ScorerConfig`].
#[derive(Debug, Default)]
pub struct ScorerConfigBuilder {
    output_dir: Option<PathBuf>,
    render_plots: Option<bool>,
}

impl ScorerConfigBuilder {
    pub fn output_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(path.into());
        self
    }

    pub fn render_plots(mut self, render: bool) -> Self {
        self.render_plots = Some(render);
        self
    }

    pub fn build(self) -> Result<ScorerConfig, ConfigValidationError> {
        Ok(ScorerConfig {
            output_dir: self
                .output_dir
                .unwrap_or_else(|| PathBuf::from("scoring_results")),
            render_plots: self.render_plots.unwrap_or(true),
        })
    }
}

// ============================================================================
// Analyst
// ============================================================================

/// Configuration for the analyst.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalystConfig {
    /// Bins of the description-length histogram.
    /// Default: 50
    pub histogram_bins: usize,

    /// Output directory name, created under the base directory.
    /// Default: "analysis_results"
    pub output_dir_name: String,

    /// Problem rows printed as a sample.
    /// Default: 10
    pub sample_limit: usize,

    /// Render bar charts, the histogram and the association heatmap.
    /// Default: true
    pub render_plots: bool,
}

impl Default for AnalystConfig {
    fn default() -> Self {
        Self {
            histogram_bins: DEFAULT_HISTOGRAM_BINS,
            output_dir_name: DEFAULT_ANALYSIS_DIR.to_string(),
            sample_limit: DEFAULT_SAMPLE_LIMIT,
            render_plots: true,
        }
    }
}

impl AnalystConfig {
    pub fn builder() -> AnalystConfigBuilder {
        AnalystConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.histogram_bins == 0 {
            return Err(ConfigValidationError::InvalidHistogramBins(
                self.histogram_bins,
            ));
        }
        Ok(())
    }
}

/// Builder for [`AnalystConfig`].
#[derive(Debug, Default)]
pub struct AnalystConfigBuilder {
    histogram_bins: Option<usize>,
    output_dir_name: Option<String>,
    sample_limit: Option<usize>,
    render_plots: Option<bool>,
}

impl AnalystConfigBuilder {
    pub fn histogram_bins(mut self, bins: usize) -> Self {
        self.histogram_bins = Some(bins);
        self
    }

    pub fn output_dir_name(mut self, name: impl Into<String>) -> Self {
        self.output_dir_name = Some(name.into());
        self
    }

    pub fn sample_limit(mut self, limit: usize) -> Self {
        self.sample_limit = Some(limit);
        self
    }

    pub fn render_plots(mut self, render: bool) -> Self {
        self.render_plots = Some(render);
        self
    }

    pub fn build(self) -> Result<AnalystConfig, ConfigValidationError> {
        let config = AnalystConfig {
            histogram_bins: self.histogram_bins.unwrap_or(DEFAULT_HISTOGRAM_BINS),
            output_dir_name: self
                .output_dir_name
                .unwrap_or_else(|| DEFAULT_ANALYSIS_DIR.to_string()),
            sample_limit: self.sample_limit.unwrap_or(DEFAULT_SAMPLE_LIMIT),
            render_plots: self.render_plots.unwrap_or(true),
        };
        config.validate()?;
        Ok(config)
    }
}
