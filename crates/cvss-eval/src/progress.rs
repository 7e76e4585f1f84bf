//! Progress reporting for the batch jobs.
//!
//! Every job accepts an optional [`ProgressReporter`]. The annotator reports
//! once per batch, the other jobs once per input file.
//!
//! # Example
//!
//! ```rust,ignore
//! use cvss_eval::{Annotator, ClosureProgressReporter};
//! use std::sync::Arc;
//!
//! let annotator = Annotator::builder()
//!     .provider(provider)
//!     .on_progress(|update| {
//!         println!("[{:.0}%] {}", update.progress * 100.0, update.message);
//!     })
//!     .build()?;
//! ```

use serde::{Deserialize, Serialize};

/// Stage a job is in when it emits an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStage {
    /// Converting vulnerability JSON documents to CSV
    Extracting,
    /// Requesting generated labels batch by batch
    Annotating,
    /// Comparing generated labels against ground truth
    Scoring,
    /// Computing distributions and associations
    Analyzing,
    /// Job finished
    Complete,
}

impl JobStage {
    /// Returns a human-readable name for the stage.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Extracting => "Extracting Records",
            Self::Annotating => "Annotating Records",
            Self::Scoring => "Scoring Labels",
            Self::Analyzing => "Analyzing Dataset",
            Self::Complete => "Complete",
        }
    }
}

/// A single progress update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    /// Current job stage
    pub stage: JobStage,

    /// Progress within the job (0.0 - 1.0)
    pub progress: f32,

    /// Human-readable message describing current activity
    pub message: String,

    /// Number of items processed so far (batches or files)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_processed: Option<usize>,

    /// Total items expected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items_total: Option<usize>,
}

impl ProgressUpdate {
    /// Creates a new progress update without item counts.
    pub fn new(stage: JobStage, progress: f32, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
            items_processed: None,
            items_total: None,
        }
    }

    /// Creates a progress update from item counts.
    pub fn with_items(
        stage: JobStage,
        current: usize,
        total: usize,
        message: impl Into<String>,
    ) -> Self {
        let progress = if total > 0 {
            current as f32 / total as f32
        } else {
            0.0
        };
        Self {
            stage,
            progress: progress.clamp(0.0, 1.0),
            message: message.into(),
            items_processed: Some(current),
            items_total: Some(total),
        }
    }

    /// Creates a completion progress update.
    pub fn complete(message: impl Into<String>) -> Self {
        Self::new(JobStage::Complete, 1.0, message)
    }
}

/// Trait for receiving progress updates from a job.
pub trait ProgressReporter: Send + Sync {
    /// Called when progress is made. May be called once per batch, so
    /// implementations should not block.
    fn report(&self, update: ProgressUpdate);
}

/// Wrapper that implements [`ProgressReporter`] using a closure.
pub struct ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    callback: F,
}

impl<F> ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    /// Creates a new closure-based progress reporter.
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ProgressReporter for ClosureProgressReporter<F>
where
    F: Fn(ProgressUpdate) + Send + Sync,
{
    fn report(&self, update: ProgressUpdate) {
        (self.callback)(update);
    }
}

static_assertions::assert_impl_all!(ProgressUpdate: Send, Sync);

/// Send an update if a reporter is attached.
pub(crate) fn emit(reporter: Option<&dyn ProgressReporter>, update: ProgressUpdate) {
    if let Some(reporter) = reporter {
        reporter.report(update);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_with_items_computes_fraction() {
        let update = ProgressUpdate::with_items(JobStage::Annotating, 1, 4, "Batch 1/4");
        assert_eq!(update.progress, 0.25);
        assert_eq!(update.items_processed, Some(1));
        assert_eq!(update.items_total, Some(4));
    }

    #[test]
    fn test_with_items_zero_total() {
        let update = ProgressUpdate::with_items(JobStage::Scoring, 0, 0, "nothing to do");
        assert_eq!(update.progress, 0.0);
    }

    #[test]
    fn test_progress_is_clamped() {
        let update = ProgressUpdate::new(JobStage::Analyzing, 1.7, "overshoot");
        assert_eq!(update.progress, 1.0);
    }

    #[test]
    fn test_complete_update() {
        let update = ProgressUpdate::complete("done");
        assert_eq!(update.stage, JobStage::Complete);
        assert_eq!(update.progress, 1.0);
    }

    #[test]
    fn test_closure_reporter_receives_updates() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let count_clone = Arc::clone(&count);
        let seen_clone = Arc::clone(&seen);

        let reporter = ClosureProgressReporter::new(move |update: ProgressUpdate| {
            count_clone.fetch_add(1, Ordering::SeqCst);
            seen_clone.lock().unwrap().push(update.stage);
        });

        emit(Some(&reporter), ProgressUpdate::new(JobStage::Extracting, 0.5, "half"));
        emit(Some(&reporter), ProgressUpdate::complete("done"));
        emit(None, ProgressUpdate::complete("ignored"));

        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(
            *seen.lock().unwrap(),
            vec![JobStage::Extracting, JobStage::Complete]
        );
    }

    #[test]
    fn test_stage_serialization() {
        let json = serde_json::to_string(&JobStage::Annotating).unwrap();
        assert_eq!(json, "\"annotating\"");
    }
}
