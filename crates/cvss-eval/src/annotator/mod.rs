//! Annotator: batch descriptions through a [`LabelProvider`] and merge the
//! predicted metrics back into the CSV rows.
//!
//! Each batch is one request. Rate-limited requests are retried by the
//! configured [`RetryPolicy`](crate::ai::RetryPolicy); any other failure
//! abandons the batch. Records the model did not answer keep empty
//! `Generated <Field>` cells and are listed in the [`RunReport`].

mod export;
mod parser;
mod prompt;

pub use export::export_records;
pub use parser::{align, parse_line, parse_response};
pub use prompt::{build_user_prompt, instructions, system_message, PromptRecord};

use crate::ai::{CompletionRequest, LabelProvider, Sleeper, ThreadSleeper};
use crate::config::AnnotatorConfig;
use crate::cvss::BaseMetrics;
use crate::error::{EvalError, Result};
use crate::progress::{
    emit, ClosureProgressReporter, JobStage, ProgressReporter, ProgressUpdate,
};
use crate::reporting::{RunReport, SkipReason};
use crate::types::{
    Metric, DESCRIPTION_COLUMN, GENERATED_SCORE_COLUMN, GENERATED_VECTOR_COLUMN, PRODUCT_COLUMN,
    VENDOR_COLUMN,
};
use crate::utils::{
    file_stem, list_files, optional_string_values, read_csv_strings, require_columns,
    set_string_column, string_values, write_csv,
};
use polars::prelude::DataFrame;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Generates CVSS labels for CSV files of extracted records.
pub struct Annotator {
    config: AnnotatorConfig,
    provider: Arc<dyn LabelProvider>,
    sleeper: Arc<dyn Sleeper>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

static_assertions::assert_impl_all!(Annotator: Send, Sync);

impl Annotator {
    pub fn builder() -> AnnotatorBuilder {
        AnnotatorBuilder::default()
    }

    pub fn config(&self) -> &AnnotatorConfig {
        &self.config
    }

    fn report_progress(&self, update: ProgressUpdate) {
        emit(self.progress_reporter.as_deref(), update);
    }

    /// Add `Generated <Field>` columns (and, if enabled, the derived vector
    /// string and score) to `df`. Returns the number of labelled rows.
    pub fn annotate_frame(
        &self,
        df: &mut DataFrame,
        source: &str,
        report: &mut RunReport,
    ) -> Result<usize> {
        require_columns(df, &[DESCRIPTION_COLUMN])?;

        let variant = self.config.variant;
        let predicted = variant.predicted_metrics();
        let descriptions = string_values(df, DESCRIPTION_COLUMN)?;
        let vendors = optional_string_values(df, VENDOR_COLUMN)?;
        let products = optional_string_values(df, PRODUCT_COLUMN)?;

        let rows = df.height();
        let batch_size = self.config.batch_size.max(1);
        let total_batches = rows.div_ceil(batch_size);
        let mut generated: Vec<Vec<Option<String>>> = vec![vec![None; rows]; predicted.len()];
        let mut labelled = 0;

        info!(
            "Annotating {} records from {} in {} batches",
            rows, source, total_batches
        );

        for (batch_idx, start) in (0..rows).step_by(batch_size).enumerate() {
            let end = (start + batch_size).min(rows);
            let batch_number = batch_idx + 1;

            let records: Vec<PromptRecord> = (start..end)
                .map(|row| PromptRecord {
                    description: descriptions[row].clone().unwrap_or_default(),
                    vendor: vendors[row].clone(),
                    product: products[row].clone(),
                })
                .collect();

            let request = CompletionRequest {
                system: system_message(variant).to_string(),
                user: build_user_prompt(variant, &records),
                max_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            };

            let response = self.config.retry.run(self.sleeper.as_ref(), |attempt| {
                debug!(
                    "Batch {}/{} attempt {} via {}",
                    batch_number,
                    total_batches,
                    attempt,
                    self.provider.name()
                );
                self.provider.complete(&request)
            });

            match response {
                Ok(text) => {
                    debug!("Batch {} response:\n{}", batch_number, text);
                    let slots = align(parse_response(&text, predicted.len()), records.len());
                    let received = slots.iter().filter(|slot| slot.is_some()).count();
                    if received < records.len() {
                        report.skip(SkipReason::LabelShortfall {
                            file: source.to_string(),
                            batch: batch_number,
                            expected: records.len(),
                            received,
                        });
                    }

                    for (offset, slot) in slots.into_iter().enumerate() {
                        let Some(labels) = slot else { continue };
                        for (column, value) in generated.iter_mut().zip(labels.values) {
                            if !value.is_empty() {
                                column[start + offset] = Some(value);
                            }
                        }
                        labelled += 1;
                    }
                }
                Err(err) => report.skip(SkipReason::BatchAbandoned {
                    file: source.to_string(),
                    batch: batch_number,
                    records: records.len(),
                    error: err.to_string(),
                }),
            }

            self.report_progress(ProgressUpdate::with_items(
                JobStage::Annotating,
                batch_number,
                total_batches,
                format!("{}: batch {}/{}", source, batch_number, total_batches),
            ));
        }

        if self.config.derive_scores {
            let (vectors, scores) = derive_scores(predicted, &generated);
            for (metric, values) in predicted.iter().zip(generated) {
                set_string_column(df, &metric.generated_column(), values)?;
            }
            set_string_column(df, GENERATED_VECTOR_COLUMN, vectors)?;
            set_string_column(df, GENERATED_SCORE_COLUMN, scores)?;
        } else {
            for (metric, values) in predicted.iter().zip(generated) {
                set_string_column(df, &metric.generated_column(), values)?;
            }
        }

        Ok(labelled)
    }

    /// Annotate one CSV file into `output`.
    pub fn annotate_file(&self, input: &Path, output: &Path) -> Result<RunReport> {
        let mut report = RunReport::new("annotate");
        report.files_seen = 1;
        self.process_csv(input, output, &mut report)?;
        report.files_processed = 1;
        self.report_progress(ProgressUpdate::complete(format!(
            "Annotated {} rows",
            report.rows_written
        )));
        report.finish();
        Ok(report)
    }

    /// Annotate every CSV in `input_dir` into `<output_dir>/scored_<stem>.csv`.
    ///
    /// A file that cannot be read or lacks the description column is skipped.
    pub fn process_dir(&self, input_dir: &Path, output_dir: &Path) -> Result<RunReport> {
        let mut report = RunReport::new("annotate");
        let files = list_files(input_dir, "csv", false)?;
        info!("Found {} CSV files in {}", files.len(), input_dir.display());

        for input in &files {
            report.files_seen += 1;
            let output = scored_output_path(input, output_dir);
            info!("Processing: {}", input.display());
            match self.process_csv(input, &output, &mut report) {
                Ok(()) => report.files_processed += 1,
                Err(err) if err.is_per_file() => {
                    report.skip(SkipReason::for_file_error(input.display().to_string(), &err))
                }
                Err(err) => return Err(err),
            }
        }

        self.report_progress(ProgressUpdate::complete(format!(
            "Annotated {} files",
            report.files_processed
        )));
        report.finish();
        Ok(report)
    }

    fn process_csv(&self, input: &Path, output: &Path, report: &mut RunReport) -> Result<()> {
        let mut df = read_csv_strings(input)?;
        let source = input.display().to_string();
        let labelled = self.annotate_frame(&mut df, &source, report)?;

        write_csv(&mut df, output)?;
        info!(
            "Output saved to {} ({} of {} rows labelled)",
            output.display(),
            labelled,
            df.height()
        );
        report.rows_written += df.height();
        report.add_output(output.display().to_string());

        if let Some(dir) = &self.config.export_json_dir {
            export_records(&df, self.config.variant, dir, report)?;
        }
        Ok(())
    }
}

/// `<output_dir>/scored_<stem>.csv`
pub fn scored_output_path(input: &Path, output_dir: &Path) -> PathBuf {
    output_dir.join(format!("scored_{}.csv", file_stem(input)))
}

/// Vector string and score for each row whose eight generated base metrics
/// are all present and canonical.
fn derive_scores(
    predicted: &[Metric],
    generated: &[Vec<Option<String>>],
) -> (Vec<Option<String>>, Vec<Option<String>>) {
    let rows = generated.first().map_or(0, Vec::len);
    let mut vectors = Vec::with_capacity(rows);
    let mut scores = Vec::with_capacity(rows);

    for row in 0..rows {
        let metrics = BaseMetrics::from_lookup(|metric| {
            predicted
                .iter()
                .position(|m| *m == metric)
                .and_then(|idx| generated[idx][row].as_deref())
        });
        match metrics {
            Some(metrics) => {
                vectors.push(Some(metrics.vector_string()));
                scores.push(Some(format!("{:.1}", metrics.base_score())));
            }
            None => {
                vectors.push(None);
                scores.push(None);
            }
        }
    }

    (vectors, scores)
}

/// Builder for [`Annotator`].
#[derive(Default)]
pub struct AnnotatorBuilder {
    config: Option<AnnotatorConfig>,
    provider: Option<Arc<dyn LabelProvider>>,
    sleeper: Option<Arc<dyn Sleeper>>,
    progress_reporter: Option<Arc<dyn ProgressReporter>>,
}

impl AnnotatorBuilder {
    pub fn config(mut self, config: AnnotatorConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the service that answers the prompts. Required.
    pub fn provider(mut self, provider: Arc<dyn LabelProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Replace the real sleeper, e.g. to record backoff delays in tests.
    pub fn sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = Some(sleeper);
        self
    }

    pub fn progress_reporter(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress_reporter = Some(reporter);
        self
    }

    /// Set a progress callback closure.
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress_reporter = Some(Arc::new(ClosureProgressReporter::new(callback)));
        self
    }

    /// Build the annotator.
    ///
    /// Returns an error if no provider was set or the configuration is invalid.
    pub fn build(self) -> Result<Annotator> {
        let config = self.config.unwrap_or_default();
        config
            .validate()
            .map_err(|e| EvalError::InvalidConfig(e.to_string()))?;

        let provider = self
            .provider
            .ok_or_else(|| EvalError::InvalidConfig("a label provider is required".to_string()))?;

        info!(
            "Annotator using {} (model: {})",
            provider.name(),
            provider.model().unwrap_or("provider default")
        );

        Ok(Annotator {
            config,
            provider,
            sleeper: self.sleeper.unwrap_or_else(|| Arc::new(ThreadSleeper)),
            progress_reporter: self.progress_reporter,
        })
    }
}
