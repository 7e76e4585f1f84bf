//! Integration tests for the evaluation jobs.
//!
//! These tests run the extractor, annotator, scorer and analyst end to end
//! over the CVE fixtures, with a scripted label provider in place of a model.

use cvss_eval::ai::{CompletionRequest, LabelProvider, RecordingSleeper};
use cvss_eval::utils::{read_csv_strings, string_values};
use cvss_eval::{
    AnalystConfig, Analyst, Annotator, AnnotatorConfig, Extractor, ExtractorConfig, Metric,
    ProviderError, RecordVariant, ScoreBucket, Scorer, ScorerConfig, SkipReason, VectorMatch,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

// ============================================================================
// Helper Functions
// ============================================================================

fn fixtures_path() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

/// Correct labels for CVE-2023-0001, and labels for CVE-2023-0002 that get
/// Availability Impact wrong (LOW instead of NONE).
const ANSWER: &str = "Here are the results:\n\
    1 | LOW | NETWORK | NONE | NONE | UNCHANGED | HIGH | HIGH | HIGH | CRITICAL\n\
    2 | LOW | NETWORK | NONE | REQUIRED | CHANGED | LOW | LOW | LOW | MEDIUM";

/// Replays scripted answers in order; the last one repeats.
struct ScriptedProvider {
    answers: Vec<Result<String, ProviderError>>,
    calls: Mutex<usize>,
}

impl ScriptedProvider {
    fn new(answers: Vec<Result<String, ProviderError>>) -> Arc<Self> {
        Arc::new(Self {
            answers,
            calls: Mutex::new(0),
        })
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl LabelProvider for ScriptedProvider {
    fn complete(&self, _request: &CompletionRequest) -> Result<String, ProviderError> {
        let mut calls = self.calls.lock().unwrap();
        *calls += 1;
        let idx = (*calls - 1).min(self.answers.len() - 1);
        self.answers[idx].clone()
    }

    fn name(&self) -> &str {
        "Scripted"
    }
}

fn annotator(provider: Arc<ScriptedProvider>, sleeper: Arc<RecordingSleeper>) -> Annotator {
    Annotator::builder()
        .config(
            AnnotatorConfig::builder()
                .variant(RecordVariant::DescriptionOnly)
                .batch_size(20)
                .build()
                .unwrap(),
        )
        .provider(provider)
        .sleeper(sleeper)
        .build()
        .unwrap()
}

fn scorer(output: &Path) -> Scorer {
    Scorer::new(
        ScorerConfig::builder()
            .output_dir(output)
            .render_plots(false)
            .build()
            .unwrap(),
    )
}

/// Extract the 2023 fixtures into `<root>/cve_data/cve_data2023.csv`.
fn extract_2023(root: &Path) -> PathBuf {
    let output = root.join("cve_data").join("cve_data2023.csv");
    Extractor::new(ExtractorConfig::default())
        .extract_dir(&fixtures_path().join("cves/2023"), &output)
        .unwrap();
    output
}

fn column(path: &Path, name: &str) -> Vec<Option<String>> {
    let df = read_csv_strings(path).unwrap();
    string_values(&df, name).unwrap()
}

fn s(value: &str) -> Option<String> {
    Some(value.to_string())
}

// ============================================================================
// Extractor
// ============================================================================

#[test]
fn test_extract_skips_document_without_metrics() {
    let temp = TempDir::new().unwrap();
    let output = temp.path().join("out.csv");

    let report = Extractor::new(ExtractorConfig::default())
        .extract_dir(&fixtures_path().join("cves/2023"), &output)
        .unwrap();

    assert_eq!(report.files_seen, 3);
    assert_eq!(report.rows_written, 2);
    assert_eq!(
        report.skipped,
        vec![SkipReason::MissingField {
            path: fixtures_path()
                .join("cves/2023/CVE-2023-0003.json")
                .display()
                .to_string(),
            field: "Severity".to_string(),
        }]
    );

    assert_eq!(column(&output, "CVE ID"), vec![s("CVE-2023-0001"), s("CVE-2023-0002")]);
    assert_eq!(column(&output, "Base Score"), vec![s("9.8"), s("6.1")]);
    // The English entry wins over the first description.
    assert!(column(&output, "Description")[1]
        .as_deref()
        .unwrap()
        .starts_with("A reflected cross-site scripting"));
}

#[test]
fn test_extract_all_writes_one_csv_per_folder() {
    let temp = TempDir::new().unwrap();
    let config = ExtractorConfig::builder()
        .variant(RecordVariant::VendorProduct)
        .build()
        .unwrap();

    let report = Extractor::new(config)
        .extract_all(&fixtures_path().join("cves"), temp.path())
        .unwrap();

    assert_eq!(report.rows_written, 3);
    assert_eq!(report.skip_counts().get("missing_field"), Some(&1));
    assert_eq!(report.skip_counts().get("malformed_json"), Some(&1));

    let csv_2024 = temp.path().join("cve_data2024.csv");
    assert_eq!(column(&csv_2024, "Vendor"), vec![s("Umbrella Labs")]);
    assert_eq!(column(&csv_2024, "Attack Vector"), vec![s("PHYSICAL")]);
    assert!(temp.path().join("cve_data2023.csv").exists());
}

// ============================================================================
// Full Pipeline
// ============================================================================

#[test]
fn test_extract_annotate_score_analyze() {
    let temp = TempDir::new().unwrap();
    let extracted = extract_2023(temp.path());
    let scored_dir = temp.path().join("runs").join("scored");

    // Annotate
    let provider = ScriptedProvider::new(vec![Ok(ANSWER.to_string())]);
    let sleeper = Arc::new(RecordingSleeper::new());
    let report = annotator(Arc::clone(&provider), Arc::clone(&sleeper))
        .process_dir(extracted.parent().unwrap(), &scored_dir)
        .unwrap();

    assert_eq!(provider.calls(), 1);
    assert!(sleeper.delays().is_empty());
    assert!(!report.has_skips());

    let scored = scored_dir.join("scored_cve_data2023.csv");
    assert_eq!(
        column(&scored, "Generated Availability Impact"),
        vec![s("HIGH"), s("LOW")]
    );
    assert_eq!(column(&scored, "Generated Score"), vec![s("9.8"), s("7.1")]);

    // Accuracy
    let results = temp.path().join("results");
    let (summary, _) = scorer(&results).accuracy(&scored_dir).unwrap();
    assert_eq!(summary.total_rows, 2);
    assert_eq!(summary.get(Metric::Scope).unwrap().percentage(), 100.0);
    assert_eq!(
        summary.get(Metric::AvailabilityImpact).unwrap().percentage(),
        50.0
    );

    // Score difference
    let (counts, _) = scorer(&results).score_diff(&[scored.clone()]).unwrap();
    assert_eq!(counts.accuracy_count(ScoreBucket::Accurate), 1);
    assert_eq!(counts.accuracy_count(ScoreBucket::Inaccurate), 1);
    assert_eq!(counts.vector_count(VectorMatch::Correct), 1);
    assert_eq!(counts.vector_count(VectorMatch::Incorrect), 1);

    // Confusion
    let (fields, report) = scorer(&results)
        .confusion(&temp.path().join("runs"), &["scored".to_string()])
        .unwrap();
    assert_eq!(report.files_processed, 1);
    let scope = fields.iter().find(|f| f.metric == Metric::Scope).unwrap();
    assert_eq!(scope.auc, Some(1.0));
    assert_eq!(scope.precision, 1.0);
    let availability = fields
        .iter()
        .find(|f| f.metric == Metric::AvailabilityImpact)
        .unwrap();
    assert_eq!(availability.auc, None);
    assert_eq!(availability.correct, 1);

    // Analyze
    let analyst = Analyst::new(AnalystConfig::builder().render_plots(false).build().unwrap());
    let (analysis, _) = analyst.analyze(extracted.parent().unwrap()).unwrap();
    assert_eq!(analysis.rows, 2);
    assert_eq!(
        analysis.distribution(Metric::Severity).unwrap().count("CRITICAL"),
        1
    );
    assert!(temp
        .path()
        .join("cve_data/analysis_results/analysis_summary.json")
        .exists());
}

#[test]
fn test_annotating_twice_is_byte_identical() {
    let temp = TempDir::new().unwrap();
    let extracted = extract_2023(temp.path());

    let run = |dir: &str| {
        let provider = ScriptedProvider::new(vec![Ok(ANSWER.to_string())]);
        let output = temp.path().join(dir).join("scored.csv");
        annotator(provider, Arc::new(RecordingSleeper::new()))
            .annotate_file(&extracted, &output)
            .unwrap();
        fs::read(output).unwrap()
    };

    assert_eq!(run("first"), run("second"));
}

// ============================================================================
// Failure Handling
// ============================================================================

#[test]
fn test_rate_limited_batch_backs_off_then_succeeds() {
    let temp = TempDir::new().unwrap();
    let extracted = extract_2023(temp.path());
    let rate_limited = || Err(ProviderError::RateLimited("429 Too Many Requests".to_string()));
    let provider = ScriptedProvider::new(vec![
        rate_limited(),
        rate_limited(),
        Ok(ANSWER.to_string()),
    ]);
    let sleeper = Arc::new(RecordingSleeper::new());

    let output = temp.path().join("scored.csv");
    let report = annotator(Arc::clone(&provider), Arc::clone(&sleeper))
        .annotate_file(&extracted, &output)
        .unwrap();

    assert_eq!(provider.calls(), 3);
    assert_eq!(
        sleeper.delays(),
        vec![Duration::from_secs(5), Duration::from_secs(10)]
    );
    assert!(!report.has_skips());
    assert_eq!(column(&output, "Generated Scope"), vec![s("UNCHANGED"), s("CHANGED")]);
}

#[test]
fn test_failed_batch_keeps_rows_with_empty_labels() {
    let temp = TempDir::new().unwrap();
    let extracted = extract_2023(temp.path());
    let provider = ScriptedProvider::new(vec![Err(ProviderError::Request(
        "500 Internal Server Error".to_string(),
    ))]);

    let output = temp.path().join("scored.csv");
    let report = annotator(Arc::clone(&provider), Arc::new(RecordingSleeper::new()))
        .annotate_file(&extracted, &output)
        .unwrap();

    assert_eq!(provider.calls(), 1);
    assert_eq!(report.skip_counts().get("batch_abandoned"), Some(&1));
    assert_eq!(column(&output, "CVE ID").len(), 2);
    assert_eq!(column(&output, "Generated Scope"), vec![None, None]);
}
