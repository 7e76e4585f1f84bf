use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Column names
// ============================================================================

pub const CVE_ID_COLUMN: &str = "CVE ID";
pub const DESCRIPTION_COLUMN: &str = "Description";
pub const VENDOR_COLUMN: &str = "Vendor";
pub const PRODUCT_COLUMN: &str = "Product";
pub const BASE_SCORE_COLUMN: &str = "Base Score";
pub const VECTOR_STRING_COLUMN: &str = "Vector String";
pub const GENERATED_SCORE_COLUMN: &str = "Generated Score";
pub const GENERATED_VECTOR_COLUMN: &str = "Generated Vector String";

/// Prefix of every column written by the annotator.
pub const GENERATED_PREFIX: &str = "Generated ";

// ============================================================================
// Metrics
// ============================================================================

/// One of the nine categorical CVSS v3.1 fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Metric {
    AttackVector,
    AttackComplexity,
    PrivilegesRequired,
    UserInteraction,
    Scope,
    ConfidentialityImpact,
    IntegrityImpact,
    AvailabilityImpact,
    Severity,
}

impl Metric {
    /// Analysis order: the eight base metrics as they appear in a vector
    /// string, then severity.
    pub const ALL: [Metric; 9] = [
        Metric::AttackVector,
        Metric::AttackComplexity,
        Metric::PrivilegesRequired,
        Metric::UserInteraction,
        Metric::Scope,
        Metric::ConfidentialityImpact,
        Metric::IntegrityImpact,
        Metric::AvailabilityImpact,
        Metric::Severity,
    ];

    /// The eight base metrics in the order the model answers them.
    pub const BASE: [Metric; 8] = [
        Metric::AttackComplexity,
        Metric::AttackVector,
        Metric::PrivilegesRequired,
        Metric::UserInteraction,
        Metric::Scope,
        Metric::ConfidentialityImpact,
        Metric::IntegrityImpact,
        Metric::AvailabilityImpact,
    ];

    /// Base metrics followed by severity, as answered by the
    /// description-only prompt.
    pub const BASE_WITH_SEVERITY: [Metric; 9] = [
        Metric::AttackComplexity,
        Metric::AttackVector,
        Metric::PrivilegesRequired,
        Metric::UserInteraction,
        Metric::Scope,
        Metric::ConfidentialityImpact,
        Metric::IntegrityImpact,
        Metric::AvailabilityImpact,
        Metric::Severity,
    ];

    /// Order of the accuracy summary table.
    pub const ACCURACY_ORDER: [Metric; 9] = [
        Metric::Severity,
        Metric::AttackComplexity,
        Metric::AttackVector,
        Metric::PrivilegesRequired,
        Metric::UserInteraction,
        Metric::Scope,
        Metric::ConfidentialityImpact,
        Metric::IntegrityImpact,
        Metric::AvailabilityImpact,
    ];

    /// Column order of the extracted CSV files.
    pub const EXTRACT_ORDER: [Metric; 9] = [
        Metric::Severity,
        Metric::AttackComplexity,
        Metric::AttackVector,
        Metric::AvailabilityImpact,
        Metric::ConfidentialityImpact,
        Metric::IntegrityImpact,
        Metric::PrivilegesRequired,
        Metric::Scope,
        Metric::UserInteraction,
    ];

    /// CSV column holding the ground truth.
    pub fn column_name(&self) -> &'static str {
        match self {
            Self::AttackVector => "Attack Vector",
            Self::AttackComplexity => "Attack Complexity",
            Self::PrivilegesRequired => "Privileges Required",
            Self::UserInteraction => "User Interaction",
            Self::Scope => "Scope",
            Self::ConfidentialityImpact => "Confidentiality Impact",
            Self::IntegrityImpact => "Integrity Impact",
            Self::AvailabilityImpact => "Availability Impact",
            Self::Severity => "Severity",
        }
    }

    /// CSV column holding the model's prediction.
    pub fn generated_column(&self) -> String {
        format!("{}{}", GENERATED_PREFIX, self.column_name())
    }

    /// Key of the field inside a `cvssV3_1` object.
    pub fn json_key(&self) -> &'static str {
        match self {
            Self::AttackVector => "attackVector",
            Self::AttackComplexity => "attackComplexity",
            Self::PrivilegesRequired => "privilegesRequired",
            Self::UserInteraction => "userInteraction",
            Self::Scope => "scope",
            Self::ConfidentialityImpact => "confidentialityImpact",
            Self::IntegrityImpact => "integrityImpact",
            Self::AvailabilityImpact => "availabilityImpact",
            Self::Severity => "baseSeverity",
        }
    }

    /// Key used in per-record JSON exports.
    pub fn export_key(&self) -> &'static str {
        match self {
            Self::AttackVector => "Attack_Vector",
            Self::AttackComplexity => "Attack_Complexity",
            Self::PrivilegesRequired => "Privileges_Required",
            Self::UserInteraction => "User_Interaction",
            Self::Scope => "Scope",
            Self::ConfidentialityImpact => "Confidentiality_Impact",
            Self::IntegrityImpact => "Integrity_Impact",
            Self::AvailabilityImpact => "Availability_Impact",
            Self::Severity => "Base_Severity",
        }
    }

    /// Canonical values, in reporting order.
    pub fn allowed_values(&self) -> &'static [&'static str] {
        match self {
            Self::AttackVector => &["NETWORK", "ADJACENT_NETWORK", "LOCAL", "PHYSICAL"],
            Self::AttackComplexity => &["LOW", "HIGH"],
            Self::PrivilegesRequired => &["NONE", "LOW", "HIGH"],
            Self::UserInteraction => &["NONE", "REQUIRED"],
            Self::Scope => &["UNCHANGED", "CHANGED"],
            Self::ConfidentialityImpact | Self::IntegrityImpact | Self::AvailabilityImpact => {
                &["NONE", "LOW", "HIGH"]
            }
            Self::Severity => &["NONE", "LOW", "MEDIUM", "HIGH", "CRITICAL"],
        }
    }

    /// Trim and upper-case `raw`, returning the canonical value it names.
    pub fn canonicalize(&self, raw: &str) -> Option<&'static str> {
        let normalized = raw.trim().to_uppercase();
        self.allowed_values()
            .iter()
            .copied()
            .find(|value| *value == normalized)
    }

    /// Look a metric up by its ground-truth column name.
    pub fn from_column_name(name: &str) -> Option<Metric> {
        Self::ALL
            .iter()
            .copied()
            .find(|metric| metric.column_name() == name.trim())
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.column_name())
    }
}

// ============================================================================
// Record variants
// ============================================================================

/// Which input fields a record carries, and therefore which prompt is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum RecordVariant {
    /// Description only; the model also predicts severity.
    #[default]
    DescriptionOnly,
    /// Description plus vendor and product; eight base metrics predicted.
    VendorProduct,
}

impl RecordVariant {
    /// Fields the model answers for this variant, in response order.
    pub fn predicted_metrics(&self) -> &'static [Metric] {
        match self {
            Self::DescriptionOnly => &Metric::BASE_WITH_SEVERITY,
            Self::VendorProduct => &Metric::BASE,
        }
    }

    /// Number of `|`-separated fields in a response line.
    pub fn field_count(&self) -> usize {
        self.predicted_metrics().len()
    }

    pub fn includes_vendor(&self) -> bool {
        matches!(self, Self::VendorProduct)
    }

    /// Header of the CSV written by the extractor.
    pub fn csv_columns(&self) -> Vec<&'static str> {
        let mut columns = vec![CVE_ID_COLUMN, DESCRIPTION_COLUMN];
        if self.includes_vendor() {
            columns.push(VENDOR_COLUMN);
            columns.push(PRODUCT_COLUMN);
        }
        columns.extend(Metric::EXTRACT_ORDER.iter().map(Metric::column_name));
        columns.push(BASE_SCORE_COLUMN);
        columns.push(VECTOR_STRING_COLUMN);
        columns
    }
}

// ============================================================================
// Records
// ============================================================================

/// One vulnerability extracted from a CVE JSON document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityRecord {
    pub cve_id: Option<String>,
    pub description: String,
    pub vendor: Option<String>,
    pub product: Option<String>,
    /// Ground truth for the eight base metrics and severity.
    pub metrics: BTreeMap<Metric, String>,
    pub base_score: Option<f64>,
    pub vector_string: Option<String>,
}

impl VulnerabilityRecord {
    /// Cells in the order of [`RecordVariant::csv_columns`].
    pub fn to_row(&self, variant: RecordVariant) -> Vec<Option<String>> {
        let mut row = vec![self.cve_id.clone(), Some(self.description.clone())];
        if variant.includes_vendor() {
            row.push(self.vendor.clone());
            row.push(self.product.clone());
        }
        for metric in Metric::EXTRACT_ORDER {
            row.push(self.metrics.get(&metric).cloned());
        }
        row.push(self.base_score.map(|score| format!("{score:.1}")));
        row.push(self.vector_string.clone());
        row
    }
}

/// Labels parsed from one response line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedLabelSet {
    /// Record number echoed by the model (1-based within its batch).
    pub record_number: Option<usize>,
    /// Upper-cased values, aligned with [`RecordVariant::predicted_metrics`].
    pub values: Vec<String>,
}

impl GeneratedLabelSet {
    pub fn new(record_number: Option<usize>, values: Vec<String>) -> Self {
        Self {
            record_number,
            values: values.into_iter().map(|v| v.to_uppercase()).collect(),
        }
    }

    /// The value predicted for `metric` under `variant`, if any.
    pub fn get(&self, variant: RecordVariant, metric: Metric) -> Option<&str> {
        variant
            .predicted_metrics()
            .iter()
            .position(|m| *m == metric)
            .and_then(|idx| self.values.get(idx))
            .map(String::as_str)
    }
}

// ============================================================================
// Scoring outcomes
// ============================================================================

/// Bucket of the absolute difference between base and generated score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScoreBucket {
    Accurate,
    FairlyAccurate,
    Inaccurate,
    NotApplicable,
}

impl ScoreBucket {
    pub const ALL: [ScoreBucket; 4] = [
        ScoreBucket::Accurate,
        ScoreBucket::FairlyAccurate,
        ScoreBucket::Inaccurate,
        ScoreBucket::NotApplicable,
    ];

    /// Bucket a (rounded) absolute difference; `None` means a score was
    /// missing or non-numeric.
    pub fn from_difference(difference: Option<f64>) -> Self {
        match difference {
            None => Self::NotApplicable,
            Some(d) if d == 0.0 => Self::Accurate,
            Some(d) if d <= 0.5 => Self::FairlyAccurate,
            Some(_) => Self::Inaccurate,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accurate => "Accurate",
            Self::FairlyAccurate => "Fairly Accurate",
            Self::Inaccurate => "Inaccurate",
            Self::NotApplicable => "N/A",
        }
    }
}

/// Outcome of comparing the two vector strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VectorMatch {
    Correct,
    Incorrect,
    NotApplicable,
}

impl VectorMatch {
    pub const ALL: [VectorMatch; 3] = [
        VectorMatch::Correct,
        VectorMatch::Incorrect,
        VectorMatch::NotApplicable,
    ];

    pub fn compare(original: Option<&str>, generated: Option<&str>) -> Self {
        match (original, generated) {
            (Some(a), Some(b)) if a == b => Self::Correct,
            (Some(_), Some(_)) => Self::Incorrect,
            _ => Self::NotApplicable,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Correct => "Correct",
            Self::Incorrect => "Incorrect",
            Self::NotApplicable => "N/A",
        }
    }
}
