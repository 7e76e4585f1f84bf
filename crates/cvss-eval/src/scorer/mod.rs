//! Scorer: compare generated labels against ground truth.
//!
//! Three jobs share this module:
//!
//! - [`Scorer::accuracy`]: exact-match accuracy per field over a directory
//!   of annotated CSV files
//! - [`Scorer::score_diff`]: base-score difference buckets and vector-string
//!   matching per file
//! - [`Scorer::confusion`]: confusion matrices, macro precision / recall / F1
//!   and ROC-AUC over an ordered list of folders
//!
//! Files lacking the columns a job needs are skipped and reported; they never
//! stop the run.

mod accuracy;
mod confusion;
mod score_diff;

pub use accuracy::{normalize, required_columns, values_match, AccuracySummary, FieldAccuracy};
pub use confusion::{evaluate, ClassRoc, ConfusionMatrix, FieldConfusion};
pub use score_diff::{
    augment, score_difference, DiffCounts, ACCURACY_COLUMN, SCORE_DIFFERENCE_COLUMN,
    VECTOR_MATCH_COLUMN,
};

use crate::config::ScorerConfig;
use crate::error::{EvalError, Result, ResultExt};
use crate::progress::{emit, JobStage, ProgressReporter, ProgressUpdate};
use crate::reporting::plots::{heatmap, roc_chart, HeatmapScale};
use crate::reporting::{ReportGenerator, RunReport, SkipReason};
use crate::types::Metric;
use crate::utils::{
    file_stem, list_files, read_csv_strings, require_columns, stack_frames, string_values,
    write_csv,
};
use polars::prelude::DataFrame;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub const COMBINED_SCORED_FILE: &str = "combined_scored.csv";
pub const COMBINED_DIFF_FILE: &str = "accuracyVec_combined.csv";
pub const COMBINED_CONFUSION_FILE: &str = "combined_data.csv";

/// The eight base metrics in vector-string order.
pub fn confusion_metrics() -> Vec<Metric> {
    Metric::ALL
        .iter()
        .copied()
        .filter(|metric| *metric != Metric::Severity)
        .collect()
}

/// Runs the scoring jobs, writing into [`ScorerConfig::output_dir`].
pub struct Scorer {
    config: ScorerConfig,
    progress: Option<Arc<dyn ProgressReporter>>,
}

impl Scorer {
    pub fn new(config: ScorerConfig) -> Self {
        Self {
            config,
            progress: None,
        }
    }

    pub fn with_progress(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress = Some(reporter);
        self
    }

    pub fn config(&self) -> &ScorerConfig {
        &self.config
    }

    pub fn output_dir(&self) -> &Path {
        &self.config.output_dir
    }

    fn report_file(&self, idx: usize, total: usize, path: &Path) {
        emit(
            self.progress.as_deref(),
            ProgressUpdate::with_items(
                JobStage::Scoring,
                idx,
                total,
                format!("Scoring {}", path.display()),
            ),
        );
    }

    fn prepare_output_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.config.output_dir)
            .context(format!("Failed to create {}", self.config.output_dir.display()))
    }

    /// Record a per-file failure, or propagate anything that is not.
    fn skip_or_fail(path: &Path, err: EvalError, report: &mut RunReport) -> Result<()> {
        if err.is_per_file() {
            report.skip(SkipReason::for_file_error(path.display().to_string(), &err));
            Ok(())
        } else {
            Err(err)
        }
    }

    // ------------------------------------------------------------------------
    // Accuracy
    // ------------------------------------------------------------------------

    /// Exact-match accuracy of every field over all CSV files in `input_dir`.
    ///
    /// The rows of all accepted files are re-saved as one combined CSV.
    pub fn accuracy(&self, input_dir: &Path) -> Result<(AccuracySummary, RunReport)> {
        let mut report = RunReport::new("score-accuracy");
        let mut summary = AccuracySummary::new(&Metric::ACCURACY_ORDER);
        let files = list_files(input_dir, "csv", false)?;
        self.prepare_output_dir()?;

        let mut frames = Vec::new();
        for (idx, path) in files.iter().enumerate() {
            report.files_seen += 1;
            self.report_file(idx, files.len(), path);
            let outcome = read_csv_strings(path).and_then(|df| {
                summary.add_frame(&df)?;
                Ok(df)
            });
            match outcome {
                Ok(df) => {
                    info!("Scored {} rows from {}", df.height(), path.display());
                    report.files_processed += 1;
                    frames.push(df);
                }
                Err(err) => Self::skip_or_fail(path, err, &mut report)?,
            }
        }

        summary.print();

        if frames.is_empty() {
            warn!("No valid files found in {}", input_dir.display());
        } else {
            let mut combined = stack_frames(frames)?;
            let path = self.config.output_dir.join(COMBINED_SCORED_FILE);
            write_csv(&mut combined, &path)?;
            report.rows_written += combined.height();
            report.add_output(path.display().to_string());
        }

        let json = ReportGenerator::new(&self.config.output_dir)
            .write_json(&summary, "accuracy_summary.json")?;
        report.add_output(json.display().to_string());

        emit(
            self.progress.as_deref(),
            ProgressUpdate::complete(format!("Scored {} rows", summary.total_rows)),
        );
        report.finish();
        Ok((summary, report))
    }

    // ------------------------------------------------------------------------
    // Score difference
    // ------------------------------------------------------------------------

    /// Augment each input CSV with difference, bucket and vector-match
    /// columns, writing `accuracyVec_<stem>.csv` per file plus a combined file.
    pub fn score_diff(&self, inputs: &[PathBuf]) -> Result<(DiffCounts, RunReport)> {
        let mut report = RunReport::new("score-diff");
        let mut counts = DiffCounts::default();
        self.prepare_output_dir()?;

        let mut frames = Vec::new();
        for (idx, input) in inputs.iter().enumerate() {
            report.files_seen += 1;
            self.report_file(idx, inputs.len(), input);

            let outcome = read_csv_strings(input).and_then(|mut df| {
                augment(&mut df)?;
                Ok(df)
            });
            let mut df = match outcome {
                Ok(df) => df,
                Err(err) => {
                    Self::skip_or_fail(input, err, &mut report)?;
                    continue;
                }
            };

            let output = self
                .config
                .output_dir
                .join(format!("accuracyVec_{}.csv", file_stem(input)));
            write_csv(&mut df, &output)?;
            info!("Processed {} -> {}", input.display(), output.display());

            counts.add_frame(&df)?;
            report.files_processed += 1;
            report.rows_written += df.height();
            report.add_output(output.display().to_string());
            frames.push(df);
        }

        if !frames.is_empty() {
            let mut combined = stack_frames(frames)?;
            let path = self.config.output_dir.join(COMBINED_DIFF_FILE);
            write_csv(&mut combined, &path)?;
            info!("Combined results saved to {}", path.display());
            report.add_output(path.display().to_string());
        }

        counts.print();
        let json = ReportGenerator::new(&self.config.output_dir)
            .write_json(&counts, "score_diff_summary.json")?;
        report.add_output(json.display().to_string());

        emit(
            self.progress.as_deref(),
            ProgressUpdate::complete(format!("Compared {} files", report.files_processed)),
        );
        report.finish();
        Ok((counts, report))
    }

    // ------------------------------------------------------------------------
    // Confusion matrices
    // ------------------------------------------------------------------------

    /// Confusion statistics for the eight base metrics over every CSV in
    /// `base_dir/<folder>` for each of `folders`, in order.
    pub fn confusion(
        &self,
        base_dir: &Path,
        folders: &[String],
    ) -> Result<(Vec<FieldConfusion>, RunReport)> {
        let mut report = RunReport::new("score-confusion");
        let metrics = confusion_metrics();
        let required = required_columns(&metrics);
        self.prepare_output_dir()?;

        let mut files = Vec::new();
        for folder in folders {
            let dir = base_dir.join(folder);
            if !dir.is_dir() {
                report.skip(SkipReason::MissingDirectory {
                    path: dir.display().to_string(),
                });
                continue;
            }
            files.extend(list_files(&dir, "csv", false)?);
        }

        let mut frames = Vec::new();
        for (idx, path) in files.iter().enumerate() {
            report.files_seen += 1;
            self.report_file(idx, files.len(), path);
            let outcome = read_csv_strings(path).and_then(|df| {
                require_columns(&df, &required)?;
                Ok(df)
            });
            match outcome {
                Ok(df) => {
                    report.files_processed += 1;
                    frames.push(df);
                }
                Err(err) => Self::skip_or_fail(path, err, &mut report)?,
            }
        }

        if frames.is_empty() {
            warn!("No valid data found under {}", base_dir.display());
            report.finish();
            return Ok((Vec::new(), report));
        }

        let mut combined = stack_frames(frames)?;
        let combined_path = self.config.output_dir.join(COMBINED_CONFUSION_FILE);
        write_csv(&mut combined, &combined_path)?;
        report.rows_written += combined.height();
        report.add_output(combined_path.display().to_string());
        info!("Combined {} rows from {} files", combined.height(), report.files_processed);

        let mut results = Vec::with_capacity(metrics.len());
        for metric in &metrics {
            let result = self.evaluate_field(&combined, *metric)?;
            result.print();
            if self.config.render_plots {
                self.plot_field(&result, &mut report);
            }
            results.push(result);
        }

        println!("\nCorrect predictions per field:");
        for result in &results {
            println!("{:<24}{}/{}", result.metric.column_name(), result.correct, result.total);
        }

        let json = ReportGenerator::new(&self.config.output_dir)
            .write_json(&results, "confusion_summary.json")?;
        report.add_output(json.display().to_string());

        emit(
            self.progress.as_deref(),
            ProgressUpdate::complete(format!("Evaluated {} fields", results.len())),
        );
        report.finish();
        Ok((results, report))
    }

    fn evaluate_field(&self, df: &DataFrame, metric: Metric) -> Result<FieldConfusion> {
        let normalized = |name: &str| -> Result<Vec<Option<String>>> {
            Ok(string_values(df, name)?
                .iter()
                .map(|value| normalize(value.as_deref()))
                .collect())
        };
        let actual = normalized(metric.column_name())?;
        let predicted = normalized(&metric.generated_column())?;
        Ok(evaluate(metric, &actual, &predicted))
    }

    /// Heatmap, and ROC curves when AUC is defined. Failures are recorded.
    fn plot_field(&self, result: &FieldConfusion, report: &mut RunReport) {
        let stem = format!("combined_{}", result.metric.column_name().replace(' ', "_"));
        let labels: Vec<&str> = result.matrix.labels.iter().map(String::as_str).collect();

        let heatmap_path = self.config.output_dir.join(format!("{stem}.svg"));
        match heatmap(
            &heatmap_path,
            &result.heatmap_title(),
            &labels,
            &labels,
            &result.matrix.as_f64(),
            HeatmapScale::Counts,
        ) {
            Ok(()) => report.add_output(heatmap_path.display().to_string()),
            Err(err) => report.skip(SkipReason::PlotFailed {
                path: heatmap_path.display().to_string(),
                error: err.to_string(),
            }),
        }

        if result.auc.is_none() {
            return;
        }
        let roc_path = self.config.output_dir.join(format!("{stem}_roc.svg"));
        match roc_chart(&roc_path, &result.roc_title(), &result.roc_curves()) {
            Ok(()) => report.add_output(roc_path.display().to_string()),
            Err(err) => report.skip(SkipReason::PlotFailed {
                path: roc_path.display().to_string(),
                error: err.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScoreBucket;
    use crate::utils::{frame_from_rows, read_csv_strings};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    // -------------------------------------------------------------------------
    // Helper functions
    // -------------------------------------------------------------------------

    fn s(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    fn scorer(output_dir: &Path) -> Scorer {
        Scorer::new(
            ScorerConfig::builder()
                .output_dir(output_dir)
                .render_plots(false)
                .build()
                .unwrap(),
        )
    }

    /// One annotated row: every ground truth is the first allowed value, and
    /// every prediction is either the same or the second allowed value.
    fn annotated_row(cve: &str, correct: bool) -> (Vec<String>, Vec<Option<String>>) {
        let mut header = vec!["CVE ID".to_string()];
        let mut row = vec![s(cve)];
        for metric in Metric::ACCURACY_ORDER {
            header.push(metric.column_name().to_string());
            row.push(s(metric.allowed_values()[0]));
        }
        for metric in Metric::ACCURACY_ORDER {
            header.push(metric.generated_column());
            let idx = if correct { 0 } else { 1 };
            row.push(s(metric.allowed_values()[idx]));
        }
        (header, row)
    }

    fn write_annotated(path: &Path, rows: &[(&str, bool)]) {
        let mut header = Vec::new();
        let mut data = Vec::new();
        for (cve, correct) in rows {
            let (h, row) = annotated_row(cve, *correct);
            header = h;
            data.push(row);
        }
        let header: Vec<&str> = header.iter().map(String::as_str).collect();
        let mut df = frame_from_rows(&header, &data).unwrap();
        write_csv(&mut df, path).unwrap();
    }

    // -------------------------------------------------------------------------
    // Accuracy
    // -------------------------------------------------------------------------

    #[test]
    fn test_accuracy_skips_file_without_columns() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        write_annotated(&input.path().join("a.csv"), &[("CVE-1", true), ("CVE-2", false)]);
        let mut bad = frame_from_rows(&["CVE ID", "Scope"], &[vec![s("CVE-3"), s("CHANGED")]]).unwrap();
        write_csv(&mut bad, &input.path().join("b.csv")).unwrap();

        let (summary, report) = scorer(output.path()).accuracy(input.path()).unwrap();

        assert_eq!(summary.total_rows, 2);
        assert_eq!(summary.get(Metric::Scope).unwrap().correct, 1);
        assert_eq!(report.files_processed, 1);
        assert_eq!(report.skip_counts().get("missing_columns"), Some(&1));
        assert!(output.path().join(COMBINED_SCORED_FILE).exists());
        assert!(output.path().join("accuracy_summary.json").exists());
    }

    #[test]
    fn test_accuracy_is_reproducible_from_combined_output() {
        let input = TempDir::new().unwrap();
        let first_out = TempDir::new().unwrap();
        let second_out = TempDir::new().unwrap();
        write_annotated(&input.path().join("a.csv"), &[("CVE-1", true), ("CVE-2", false)]);
        write_annotated(&input.path().join("b.csv"), &[("CVE-3", true)]);

        let (first, _) = scorer(first_out.path()).accuracy(input.path()).unwrap();
        let (second, _) = scorer(second_out.path()).accuracy(first_out.path()).unwrap();

        assert_eq!(first.total_rows, 3);
        assert_eq!(first.fields, second.fields);
    }

    // -------------------------------------------------------------------------
    // Score difference
    // -------------------------------------------------------------------------

    #[test]
    fn test_score_diff_writes_per_file_and_combined() {
        let input = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let path = input.path().join("scored_a.csv");
        let mut df = frame_from_rows(
            &["Base Score", "Generated Score", "Vector String", "Generated Vector String"],
            &[
                vec![s("9.8"), s("9.8"), s("V1"), s("V1")],
                vec![s("7.5"), s("8.0"), s("V1"), s("V2")],
            ],
        )
        .unwrap();
        write_csv(&mut df, &path).unwrap();

        let missing = input.path().join("nope.csv");
        let (counts, report) = scorer(output.path())
            .score_diff(&[path.clone(), missing])
            .unwrap();

        assert_eq!(counts.accuracy_count(ScoreBucket::Accurate), 1);
        assert_eq!(counts.accuracy_count(ScoreBucket::FairlyAccurate), 1);
        assert_eq!(report.files_processed, 1);
        assert_eq!(report.skipped.len(), 1);

        let written = read_csv_strings(&output.path().join("accuracyVec_scored_a.csv")).unwrap();
        assert_eq!(
            string_values(&written, VECTOR_MATCH_COLUMN).unwrap(),
            vec![s("Correct"), s("Incorrect")]
        );
        assert!(output.path().join(COMBINED_DIFF_FILE).exists());
    }

    // -------------------------------------------------------------------------
    // Confusion
    // -------------------------------------------------------------------------

    #[test]
    fn test_confusion_over_folders() {
        let base = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let folder = base.path().join("run1");
        fs::create_dir_all(&folder).unwrap();
        write_annotated(&folder.join("a.csv"), &[("CVE-1", true), ("CVE-2", true)]);

        let (results, report) = scorer(output.path())
            .confusion(base.path(), &["run1".to_string(), "missing".to_string()])
            .unwrap();

        assert_eq!(results.len(), 8);
        assert_eq!(results[0].metric, Metric::AttackVector);
        for result in &results {
            assert_eq!(result.correct, 2);
            // Only one class present in the ground truth.
            assert_eq!(result.auc, None);
        }
        assert_eq!(report.skip_counts().get("missing_directory"), Some(&1));
        assert!(output.path().join(COMBINED_CONFUSION_FILE).exists());
        assert!(output.path().join("confusion_summary.json").exists());
    }

    #[test]
    fn test_confusion_with_no_data() {
        let base = TempDir::new().unwrap();
        let output = TempDir::new().unwrap();
        let (results, report) = scorer(output.path())
            .confusion(base.path(), &["absent".to_string()])
            .unwrap();
        assert!(results.is_empty());
        assert_eq!(report.files_seen, 0);
    }
}
