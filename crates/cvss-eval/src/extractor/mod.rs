//! Extractor: CVE JSON documents to flat CSV.
//!
//! One CSV row per document whose required fields are all present. Documents
//! that cannot be read, do not parse, or lack a required field are skipped
//! and listed in the [`RunReport`].

mod record;

pub use record::{CveDocument, MissingField};

use crate::config::ExtractorConfig;
use crate::error::Result;
use crate::progress::{emit, JobStage, ProgressReporter, ProgressUpdate};
use crate::reporting::{RunReport, SkipReason};
use crate::types::VulnerabilityRecord;
use crate::utils::{file_stem, frame_from_rows, list_files, list_subdirectories, write_csv};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Converts directories of CVE JSON documents into CSV files.
pub struct Extractor {
    config: ExtractorConfig,
    progress: Option<Arc<dyn ProgressReporter>>,
}

impl Extractor {
    pub fn new(config: ExtractorConfig) -> Self {
        Self {
            config,
            progress: None,
        }
    }

    pub fn with_progress(mut self, reporter: Arc<dyn ProgressReporter>) -> Self {
        self.progress = Some(reporter);
        self
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Read one JSON document. Failures are recorded in `report`.
    pub fn extract_file(&self, path: &Path, report: &mut RunReport) -> Option<VulnerabilityRecord> {
        let display = path.display().to_string();

        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(err) => {
                report.skip(SkipReason::UnreadableFile {
                    path: display,
                    error: err.to_string(),
                });
                return None;
            }
        };

        let document: CveDocument = match serde_json::from_str(&content) {
            Ok(document) => document,
            Err(err) => {
                report.skip(SkipReason::MalformedJson {
                    path: display,
                    error: err.to_string(),
                });
                return None;
            }
        };

        match document.to_record(self.config.variant) {
            Ok(record) => Some(record),
            Err(MissingField(field)) => {
                report.skip(SkipReason::MissingField {
                    path: display,
                    field,
                });
                None
            }
        }
    }

    /// Extract every `.json` file under `input_dir` into `output_csv`.
    pub fn extract_dir(&self, input_dir: &Path, output_csv: &Path) -> Result<RunReport> {
        let mut report = RunReport::new("extract");
        self.extract_into(input_dir, output_csv, &mut report)?;
        emit(
            self.progress.as_deref(),
            ProgressUpdate::complete(format!("Extracted {} records", report.rows_written)),
        );
        report.finish();
        Ok(report)
    }

    /// Extract each immediate sub-directory of `parent` into
    /// `<output_dir>/cve_data<folder>.csv`.
    pub fn extract_all(&self, parent: &Path, output_dir: &Path) -> Result<RunReport> {
        let mut report = RunReport::new("extract-all");
        let folders = list_subdirectories(parent)?;
        info!("Found {} folders under {}", folders.len(), parent.display());

        for (idx, folder) in folders.iter().enumerate() {
            emit(
                self.progress.as_deref(),
                ProgressUpdate::with_items(
                    JobStage::Extracting,
                    idx,
                    folders.len(),
                    format!("Extracting {}", folder.display()),
                ),
            );
            let output_csv = output_dir.join(format!("cve_data{}.csv", file_stem(folder)));
            self.extract_into(folder, &output_csv, &mut report)?;
        }

        emit(
            self.progress.as_deref(),
            ProgressUpdate::complete(format!(
                "Extracted {} records from {} folders",
                report.rows_written,
                folders.len()
            )),
        );
        report.finish();
        Ok(report)
    }

    fn extract_into(&self, input_dir: &Path, output_csv: &Path, report: &mut RunReport) -> Result<()> {
        let files = list_files(input_dir, "json", self.config.recursive)?;
        info!("Extracting {} JSON files from {}", files.len(), input_dir.display());

        let variant = self.config.variant;
        let mut rows = Vec::new();
        for (idx, path) in files.iter().enumerate() {
            report.files_seen += 1;
            if let Some(record) = self.extract_file(path, report) {
                report.files_processed += 1;
                rows.push(record.to_row(variant));
            }
            if idx % 500 == 0 {
                debug!("Processed {}/{} files", idx + 1, files.len());
            }
        }

        let mut df = frame_from_rows(&variant.csv_columns(), &rows)?;
        write_csv(&mut df, output_csv)?;

        info!("Wrote {} rows to {}", rows.len(), output_csv.display());
        report.rows_written += rows.len();
        report.add_output(output_csv.display().to_string());
        Ok(())
    }
}

/// Default output path for `extract`: `<input_dir>.csv` next to the input.
pub fn default_output_path(input_dir: &Path) -> PathBuf {
    let mut name = file_stem(input_dir);
    name.push_str(".csv");
    input_dir
        .parent()
        .map(|parent| parent.join(&name))
        .unwrap_or_else(|| PathBuf::from(name))
}
