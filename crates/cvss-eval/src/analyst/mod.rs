//! Analyst: descriptive statistics over every CSV under a base directory.
//!
//! Produces, in `<base>/<output_dir_name>/`:
//!
//! - one bar chart per categorical field (`<Field>_distribution.svg`)
//! - a description-length histogram (`description_length_distribution.svg`)
//! - a Cramér's V heatmap over the nine fields (`metrics_correlation.svg`)
//! - `analysis_summary.json` with the numbers behind the charts

mod association;
mod distribution;

pub use association::{cramers_v, AssociationMatrix, ContingencyTable};
pub use distribution::{
    standardize, DescriptionSample, DescriptionStats, Distribution, PREVIEW_CHARS,
};

use crate::config::AnalystConfig;
use crate::error::{Result, ResultExt};
use crate::progress::{emit, JobStage, ProgressReporter, ProgressUpdate};
use crate::reporting::plots::{bar_chart, heatmap, histogram_with_mean, HeatmapScale};
use crate::reporting::{ReportGenerator, RunReport, SkipReason};
use crate::types::{Metric, DESCRIPTION_COLUMN};
use crate::utils::{list_files, optional_string_values, read_csv_strings, stack_frames};
use polars::prelude::DataFrame;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Rows of every loaded CSV, with the file and data row each came from.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub frame: DataFrame,
    pub source_files: Vec<String>,
    /// 1-based data row within the source file.
    pub source_rows: Vec<usize>,
}

impl Dataset {
    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Standardized values of `metric`; all missing if the column is absent.
    pub fn standardized(&self, metric: Metric) -> Result<Vec<Option<&'static str>>> {
        let raw = optional_string_values(&self.frame, metric.column_name())?;
        Ok(standardize(metric, &raw))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.frame.column(name).is_ok()
    }
}

/// Description-length figures written to the summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptionSummary {
    pub described: usize,
    pub missing: usize,
    pub mean_length: Option<f64>,
    pub min_length: Option<f64>,
    pub max_length: Option<f64>,
    pub samples: Vec<DescriptionSample>,
}

impl From<&DescriptionStats> for DescriptionSummary {
    fn from(stats: &DescriptionStats) -> Self {
        let min = stats.lengths.iter().copied().reduce(f64::min);
        let max = stats.lengths.iter().copied().reduce(f64::max);
        Self {
            described: stats.lengths.len(),
            missing: stats.missing,
            mean_length: stats.mean(),
            min_length: min,
            max_length: max,
            samples: stats.samples.clone(),
        }
    }
}

/// Everything the analyst computed, as written to `analysis_summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSummary {
    pub files: usize,
    pub rows: usize,
    pub distributions: Vec<Distribution>,
    pub description: Option<DescriptionSummary>,
    pub correlations: Option<AssociationMatrix>,
}

impl AnalysisSummary {
    fn empty() -> Self {
        Self {
            files: 0,
            rows: 0,
            distributions: Vec::new(),
            description: None,
            correlations: None,
        }
    }

    pub fn distribution(&self, metric: Metric) -> Option<&Distribution> {
        self.distributions.iter().find(|d| d.metric == metric)
    }
}

/// Computes distributions and associations over a directory tree of CSVs.
pub struct Analyst {
    config: AnalystConfig,
    progress: Option<Arc<dyn ProgressReporter>>,
}

impl Analyst {
    pub fn new(config: AnalystConfig) -> Self {
        Self {
            config,
            progress: None,
        }
    }

    pub fn with_progress(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress = Some(reporter);
        self
    }

    pub fn config(&self) -> &AnalystConfig {
        &self.config
    }

    /// `<base_dir>/<output_dir_name>`
    pub fn output_dir(&self, base_dir: &Path) -> PathBuf {
        base_dir.join(&self.config.output_dir_name)
    }

    /// Load every CSV under `base_dir`, recursively. Unreadable files are
    /// skipped. Returns `None` when nothing could be loaded.
    pub fn load(&self, base_dir: &Path, report: &mut RunReport) -> Result<Option<Dataset>> {
        let files = list_files(base_dir, "csv", true)?;
        if files.is_empty() {
            warn!("No CSV files found in: {}", base_dir.display());
            return Ok(None);
        }

        let mut frames = Vec::new();
        let mut source_files = Vec::new();
        let mut source_rows = Vec::new();
        for (idx, path) in files.iter().enumerate() {
            report.files_seen += 1;
            emit(
                self.progress.as_deref(),
                ProgressUpdate::with_items(
                    JobStage::Analyzing,
                    idx,
                    files.len(),
                    format!("Loading {}", path.display()),
                ),
            );
            match read_csv_strings(path) {
                Ok(df) => {
                    let name = path.display().to_string();
                    source_files.extend(std::iter::repeat_n(name, df.height()));
                    source_rows.extend(1..=df.height());
                    report.files_processed += 1;
                    frames.push(df);
                }
                Err(err) => report.skip(SkipReason::for_file_error(path.display().to_string(), &err)),
            }
        }

        if frames.is_empty() {
            warn!("No valid data loaded from any CSV file");
            return Ok(None);
        }

        let frame = stack_frames(frames)?;
        info!("Loaded {} rows from {} files", frame.height(), report.files_processed);
        Ok(Some(Dataset {
            frame,
            source_files,
            source_rows,
        }))
    }

    /// Run the full analysis of `base_dir`.
    pub fn analyze(&self, base_dir: &Path) -> Result<(AnalysisSummary, RunReport)> {
        let mut report = RunReport::new("analyze");
        let Some(dataset) = self.load(base_dir, &mut report)? else {
            report.finish();
            return Ok((AnalysisSummary::empty(), report));
        };

        let output_dir = self.output_dir(base_dir);
        fs::create_dir_all(&output_dir)
            .context(format!("Failed to create {}", output_dir.display()))?;

        let mut standardized = Vec::with_capacity(Metric::ALL.len());
        for metric in Metric::ALL {
            standardized.push(dataset.standardized(metric)?);
        }

        let mut distributions = Vec::new();
        for (metric, values) in Metric::ALL.iter().zip(&standardized) {
            if !dataset.has_column(metric.column_name()) {
                warn!("Column '{}' not found; distribution skipped", metric);
                continue;
            }
            let distribution = Distribution::from_values(*metric, values);
            distribution.print();
            if self.config.render_plots {
                let path = output_dir.join(format!(
                    "{}_distribution.svg",
                    metric.column_name().replace(' ', "_")
                ));
                let result = bar_chart(
                    &path,
                    &format!("{} Distribution", metric),
                    metric.column_name(),
                    &distribution.categories(),
                    &distribution.values(),
                );
                record_plot(&mut report, &path, result);
            }
            distributions.push(distribution);
        }

        let description = if dataset.has_column(DESCRIPTION_COLUMN) {
            let descriptions = optional_string_values(&dataset.frame, DESCRIPTION_COLUMN)?;
            let stats = DescriptionStats::collect(
                &descriptions,
                &dataset.source_files,
                &dataset.source_rows,
                self.config.sample_limit,
            );
            stats.print();
            if self.config.render_plots && !stats.lengths.is_empty() {
                let path = output_dir.join("description_length_distribution.svg");
                let result = histogram_with_mean(
                    &path,
                    "Description Length Distribution",
                    "Number of Characters",
                    &stats.lengths,
                    self.config.histogram_bins,
                );
                record_plot(&mut report, &path, result);
            }
            Some(DescriptionSummary::from(&stats))
        } else {
            warn!("Column '{}' not found; length analysis skipped", DESCRIPTION_COLUMN);
            None
        };

        let correlations = AssociationMatrix::compute(&Metric::ALL, &standardized);
        if self.config.render_plots {
            let path = output_dir.join("metrics_correlation.svg");
            let labels = correlations.labels();
            let result = heatmap(
                &path,
                "Base Metric Correlations",
                &labels,
                &labels,
                &correlations.values,
                HeatmapScale::Unit,
            );
            record_plot(&mut report, &path, result);
        }

        let summary = AnalysisSummary {
            files: report.files_processed,
            rows: dataset.height(),
            distributions,
            description,
            correlations: Some(correlations),
        };
        let json = ReportGenerator::new(&output_dir).write_json(&summary, "analysis_summary.json")?;
        report.add_output(json.display().to_string());
        report.rows_written = dataset.height();

        println!("\nDone. Results saved to: {}", output_dir.display());
        emit(
            self.progress.as_deref(),
            ProgressUpdate::complete(format!("Analyzed {} rows", dataset.height())),
        );
        report.finish();
        Ok((summary, report))
    }
}

fn record_plot(report: &mut RunReport, path: &Path, result: Result<()>) {
    match result {
        Ok(()) => report.add_output(path.display().to_string()),
        Err(err) => report.skip(SkipReason::PlotFailed {
            path: path.display().to_string(),
            error: err.to_string(),
        }),
    }
}
