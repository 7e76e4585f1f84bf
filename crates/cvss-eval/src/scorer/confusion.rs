//! Confusion matrices and classification metrics over a field's fixed
//! label set.
//!
//! Precision and recall follow the usual multi-label convention: rows whose
//! value lies outside the label set still count toward a class's predicted
//! or true totals, and a zero denominator yields 0. ROC-AUC is computed from
//! hard predictions, so each one-vs-rest curve has a single operating point.

use crate::reporting::plots::RocCurve;
use crate::reporting::format_table;
use crate::types::Metric;
use serde::{Deserialize, Serialize};

/// Counts indexed `[actual][predicted]` over `labels`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<String>,
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Pairs with either side outside `labels` are not counted.
    pub fn new(labels: &[&str], actual: &[Option<String>], predicted: &[Option<String>]) -> Self {
        let index = |value: &Option<String>| {
            value
                .as_deref()
                .and_then(|v| labels.iter().position(|label| *label == v))
        };

        let mut counts = vec![vec![0; labels.len()]; labels.len()];
        for (a, p) in actual.iter().zip(predicted) {
            if let (Some(i), Some(j)) = (index(a), index(p)) {
                counts[i][j] += 1;
            }
        }

        Self {
            labels: labels.iter().map(|l| l.to_string()).collect(),
            counts,
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn as_f64(&self) -> Vec<Vec<f64>> {
        self.counts
            .iter()
            .map(|row| row.iter().map(|&c| c as f64).collect())
            .collect()
    }

    /// Actual labels down, predicted across.
    pub fn table(&self) -> String {
        let mut headers = vec![""];
        headers.extend(self.labels.iter().map(String::as_str));
        let rows: Vec<Vec<String>> = self
            .labels
            .iter()
            .zip(&self.counts)
            .map(|(label, row)| {
                std::iter::once(label.clone())
                    .chain(row.iter().map(|c| c.to_string()))
                    .collect()
            })
            .collect();
        format_table(&headers, &rows)
    }
}

/// One-vs-rest outcome for a single class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRoc {
    pub label: String,
    pub fpr: f64,
    pub tpr: f64,
    pub auc: f64,
}

impl ClassRoc {
    /// `(0,0) → (fpr,tpr) → (1,1)`
    pub fn points(&self) -> Vec<(f64, f64)> {
        vec![(0.0, 0.0), (self.fpr, self.tpr), (1.0, 1.0)]
    }
}

/// Metrics for one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldConfusion {
    pub metric: Metric,
    pub matrix: ConfusionMatrix,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// `None` when a class is absent from, or universal in, the ground truth.
    pub auc: Option<f64>,
    pub roc: Vec<ClassRoc>,
    pub correct: usize,
    pub total: usize,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

/// One-vs-rest ROC point for `label`; `None` when the ground truth has no
/// positives or no negatives.
fn class_roc(label: &str, actual: &[Option<String>], predicted: &[Option<String>]) -> Option<ClassRoc> {
    let (mut tp, mut fp, mut positives, mut negatives) = (0usize, 0usize, 0usize, 0usize);
    for (a, p) in actual.iter().zip(predicted) {
        let is_positive = a.as_deref() == Some(label);
        let predicted_positive = p.as_deref() == Some(label);
        if is_positive {
            positives += 1;
            if predicted_positive {
                tp += 1;
            }
        } else {
            negatives += 1;
            if predicted_positive {
                fp += 1;
            }
        }
    }

    if positives == 0 || negatives == 0 {
        return None;
    }

    let tpr = tp as f64 / positives as f64;
    let fpr = fp as f64 / negatives as f64;
    Some(ClassRoc {
        label: label.to_string(),
        fpr,
        tpr,
        auc: (1.0 + tpr - fpr) / 2.0,
    })
}

/// Evaluate normalized (trimmed, upper-cased) values for `metric`.
pub fn evaluate(metric: Metric, actual: &[Option<String>], predicted: &[Option<String>]) -> FieldConfusion {
    let labels = metric.allowed_values();
    let matrix = ConfusionMatrix::new(labels, actual, predicted);

    let mut precisions = Vec::with_capacity(labels.len());
    let mut recalls = Vec::with_capacity(labels.len());
    let mut f1s = Vec::with_capacity(labels.len());
    for (idx, label) in labels.iter().enumerate() {
        let tp = matrix.counts[idx][idx];
        let predicted_total = predicted.iter().filter(|p| p.as_deref() == Some(*label)).count();
        let actual_total = actual.iter().filter(|a| a.as_deref() == Some(*label)).count();
        precisions.push(ratio(tp, predicted_total));
        recalls.push(ratio(tp, actual_total));
        f1s.push(ratio(2 * tp, predicted_total + actual_total));
    }
    let mean = |values: &[f64]| values.iter().sum::<f64>() / values.len().max(1) as f64;

    let (auc, roc) = if labels.len() == 2 {
        match class_roc(labels[1], actual, predicted) {
            Some(curve) => (Some(curve.auc), vec![curve]),
            None => (None, Vec::new()),
        }
    } else {
        let curves: Vec<Option<ClassRoc>> = labels
            .iter()
            .map(|label| class_roc(label, actual, predicted))
            .collect();
        if curves.iter().all(Option::is_some) {
            let curves: Vec<ClassRoc> = curves.into_iter().flatten().collect();
            let macro_auc = curves.iter().map(|c| c.auc).sum::<f64>() / curves.len() as f64;
            (Some(macro_auc), curves)
        } else {
            (None, Vec::new())
        }
    };

    let correct = actual
        .iter()
        .zip(predicted)
        .filter(|(a, p)| a.is_some() && a == p)
        .count();

    FieldConfusion {
        metric,
        matrix,
        precision: mean(&precisions),
        recall: mean(&recalls),
        f1: mean(&f1s),
        auc,
        roc,
        correct,
        total: actual.len(),
    }
}

impl FieldConfusion {
    pub fn heatmap_title(&self) -> String {
        let mut title = format!(
            "{} Confusion Matrix (Precision={:.2}, Recall={:.2}, F1={:.2}",
            self.metric, self.precision, self.recall, self.f1
        );
        if let Some(auc) = self.auc {
            title.push_str(&format!(", AUC={auc:.2}"));
        }
        title.push(')');
        title
    }

    pub fn roc_title(&self) -> String {
        match self.auc {
            Some(auc) if self.roc.len() > 1 => {
                format!("ROC Curve for {} (macro AUC = {:.2})", self.metric, auc)
            }
            Some(auc) => format!("ROC Curve for {} (AUC = {:.2})", self.metric, auc),
            None => format!("ROC Curve for {}", self.metric),
        }
    }

    /// Curves for plotting, labelled with their AUC.
    pub fn roc_curves(&self) -> Vec<RocCurve> {
        self.roc
            .iter()
            .map(|curve| RocCurve {
                label: if self.roc.len() > 1 {
                    format!("{} (AUC = {:.2})", curve.label, curve.auc)
                } else {
                    format!("AUC = {:.2}", curve.auc)
                },
                points: curve.points(),
            })
            .collect()
    }

    pub fn print(&self) {
        println!("\nConfusion Matrix for {}:", self.metric);
        println!("{}", self.matrix.table());
        println!("Precision (macro): {:.4}", self.precision);
        println!("Recall (macro):    {:.4}", self.recall);
        println!("F1 Score (macro):  {:.4}", self.f1);
        let label = if self.metric.allowed_values().len() == 2 {
            "ROC AUC:        "
        } else {
            "ROC AUC (macro):"
        };
        match self.auc {
            Some(auc) => println!("{}   {:.4}", label, auc),
            None => println!("{}   could not compute (only one class present)", label),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn values(items: &[&str]) -> Vec<Option<String>> {
        items
            .iter()
            .map(|v| if v.is_empty() { None } else { Some(v.to_string()) })
            .collect()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    // -------------------------------------------------------------------------
    // Binary fields
    // -------------------------------------------------------------------------

    #[test]
    fn test_binary_metrics() {
        let actual = values(&["LOW", "LOW", "HIGH", "HIGH"]);
        let predicted = values(&["LOW", "HIGH", "HIGH", "HIGH"]);
        let result = evaluate(Metric::AttackComplexity, &actual, &predicted);

        assert_eq!(result.matrix.counts, vec![vec![1, 1], vec![0, 2]]);
        // LOW: p=1, r=0.5; HIGH: p=2/3, r=1
        assert!(approx(result.precision, (1.0 + 2.0 / 3.0) / 2.0));
        assert!(approx(result.recall, 0.75));
        // f1 LOW = 2/3, HIGH = 0.8
        assert!(approx(result.f1, (2.0 / 3.0 + 0.8) / 2.0));
        // positive class HIGH: tpr=1, fpr=0.5
        assert!(approx(result.auc.unwrap(), 0.75));
        assert_eq!(result.correct, 3);
    }

    #[test]
    fn test_binary_auc_undefined_when_positive_class_absent() {
        let actual = values(&["UNCHANGED", "UNCHANGED"]);
        let predicted = values(&["UNCHANGED", "CHANGED"]);
        let result = evaluate(Metric::Scope, &actual, &predicted);
        assert_eq!(result.auc, None);
        assert!(result.roc.is_empty());
    }

    #[test]
    fn test_out_of_set_values_count_against_totals() {
        let actual = values(&["LOW", "LOW", "BOGUS"]);
        let predicted = values(&["LOW", "", "LOW"]);
        let result = evaluate(Metric::AttackComplexity, &actual, &predicted);
        assert_eq!(result.matrix.total(), 1);
        // LOW precision = 1/2, recall = 1/2; HIGH has no support: 0.
        assert!(approx(result.precision, 0.25));
        assert!(approx(result.recall, 0.25));
    }

    // -------------------------------------------------------------------------
    // Multi-class fields
    // -------------------------------------------------------------------------

    #[test]
    fn test_multiclass_macro_auc() {
        let actual = values(&["NONE", "LOW", "HIGH", "HIGH"]);
        let predicted = values(&["NONE", "HIGH", "HIGH", "HIGH"]);
        let result = evaluate(Metric::PrivilegesRequired, &actual, &predicted);

        // NONE: tpr 1, fpr 0 -> 1.0; LOW: tpr 0, fpr 0 -> 0.5;
        // HIGH: tpr 1, fpr 1/2 -> 0.75
        assert!(approx(result.auc.unwrap(), (1.0 + 0.5 + 0.75) / 3.0));
        assert_eq!(result.roc.len(), 3);
        assert_eq!(result.roc[2].points(), vec![(0.0, 0.0), (0.5, 1.0), (1.0, 1.0)]);
    }

    #[test]
    fn test_multiclass_auc_undefined_when_class_missing() {
        let actual = values(&["NETWORK", "LOCAL", "NETWORK"]);
        let predicted = values(&["NETWORK", "LOCAL", "LOCAL"]);
        let result = evaluate(Metric::AttackVector, &actual, &predicted);
        assert_eq!(result.auc, None);
        assert!(result.heatmap_title().contains("F1="));
        assert!(!result.heatmap_title().contains("AUC"));
        assert!(result.roc_curves().is_empty());
    }

    #[test]
    fn test_matrix_table_layout() {
        let matrix = ConfusionMatrix::new(
            &["LOW", "HIGH"],
            &values(&["LOW", "HIGH"]),
            &values(&["HIGH", "HIGH"]),
        );
        let table = matrix.table();
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("LOW"));
        assert!(lines[1].starts_with("LOW"));
    }
}
