use crate::error::EvalError;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Why a file, record, batch or plot was skipped.
///
/// Skips never abort a run; they are collected here and surfaced at the end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    /// The file could not be opened or read.
    UnreadableFile { path: String, error: String },
    /// The file is not valid JSON, or does not fit the record schema.
    MalformedJson { path: String, error: String },
    /// A required field is absent, empty, or `N/A`.
    MissingField { path: String, field: String },
    /// A CSV lacks columns the job needs.
    MissingColumns { path: String, columns: Vec<String> },
    /// An input directory named in the run does not exist.
    MissingDirectory { path: String },
    /// The model call failed; the batch has no generated labels.
    BatchAbandoned {
        file: String,
        batch: usize,
        records: usize,
        error: String,
    },
    /// The model answered fewer usable lines than records in the batch.
    LabelShortfall {
        file: String,
        batch: usize,
        expected: usize,
        received: usize,
    },
    /// A plot could not be rendered.
    PlotFailed { path: String, error: String },
    /// A per-record export could not be written.
    ExportFailed { path: String, error: String },
}

impl SkipReason {
    /// Skip entry for a per-file failure: missing columns are reported as
    /// such, anything else as an unreadable file.
    pub fn for_file_error(path: impl Into<String>, error: &EvalError) -> Self {
        match error.root() {
            EvalError::MissingColumns(columns) => Self::MissingColumns {
                path: path.into(),
                columns: columns.clone(),
            },
            _ => Self::UnreadableFile {
                path: path.into(),
                error: error.to_string(),
            },
        }
    }

    /// Short name used for grouping in summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnreadableFile { .. } => "unreadable_file",
            Self::MalformedJson { .. } => "malformed_json",
            Self::MissingField { .. } => "missing_field",
            Self::MissingColumns { .. } => "missing_columns",
            Self::MissingDirectory { .. } => "missing_directory",
            Self::BatchAbandoned { .. } => "batch_abandoned",
            Self::LabelShortfall { .. } => "label_shortfall",
            Self::PlotFailed { .. } => "plot_failed",
            Self::ExportFailed { .. } => "export_failed",
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnreadableFile { path, error } => write!(f, "{path}: unreadable ({error})"),
            Self::MalformedJson { path, error } => write!(f, "{path}: malformed JSON ({error})"),
            Self::MissingField { path, field } => {
                write!(f, "{path}: missing required field '{field}'")
            }
            Self::MissingColumns { path, columns } => {
                write!(f, "{path}: missing columns {}", columns.join(", "))
            }
            Self::MissingDirectory { path } => write!(f, "{path}: directory not found"),
            Self::BatchAbandoned {
                file,
                batch,
                records,
                error,
            } => write!(
                f,
                "{file}: batch {batch} ({records} records) abandoned ({error})"
            ),
            Self::LabelShortfall {
                file,
                batch,
                expected,
                received,
            } => write!(
                f,
                "{file}: batch {batch} received {received} of {expected} label lines"
            ),
            Self::PlotFailed { path, error } => write!(f, "{path}: plot failed ({error})"),
            Self::ExportFailed { path, error } => write!(f, "{path}: export failed ({error})"),
        }
    }
}

/// Outcome of one job run: what was processed and what was skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Job name (`extract`, `annotate`, ...)
    pub job: String,
    /// Timestamp when the run started
    pub started_at: String,
    /// Timestamp when the run finished, set by [`RunReport::finish`]
    pub finished_at: Option<String>,
    /// Input files the job looked at
    pub files_seen: usize,
    /// Input files that contributed rows
    pub files_processed: usize,
    /// Rows written to outputs
    pub rows_written: usize,
    /// Output files written
    pub outputs: Vec<String>,
    /// Everything that was skipped, in encounter order
    pub skipped: Vec<SkipReason>,
}

impl RunReport {
    pub fn new(job: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            started_at: timestamp(),
            finished_at: None,
            files_seen: 0,
            files_processed: 0,
            rows_written: 0,
            outputs: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Record a skip and log it.
    pub fn skip(&mut self, reason: SkipReason) {
        warn!("Skipped: {}", reason);
        self.skipped.push(reason);
    }

    pub fn add_output(&mut self, path: impl Into<String>) {
        self.outputs.push(path.into());
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(timestamp());
    }

    /// Number of skips per kind.
    pub fn skip_counts(&self) -> BTreeMap<&'static str, usize> {
        let mut counts = BTreeMap::new();
        for reason in &self.skipped {
            *counts.entry(reason.kind()).or_insert(0) += 1;
        }
        counts
    }

    pub fn has_skips(&self) -> bool {
        !self.skipped.is_empty()
    }

    /// Print a short human-readable summary.
    pub fn print_summary(&self) {
        println!();
        println!("=== {} run summary ===", self.job);
        println!("Files seen:      {}", self.files_seen);
        println!("Files processed: {}", self.files_processed);
        println!("Rows written:    {}", self.rows_written);
        for output in &self.outputs {
            println!("Output:          {}", output);
        }
        if self.skipped.is_empty() {
            println!("Skipped:         none");
        } else {
            println!("Skipped:         {}", self.skipped.len());
            for (kind, count) in self.skip_counts() {
                println!("  {:<20} {}", kind, count);
            }
        }
    }
}

fn timestamp() -> String {
    Local::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
