//! Per-field exact-match accuracy.

use crate::error::Result;
use crate::reporting::format_table;
use crate::types::Metric;
use crate::utils::{require_columns, string_values};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// Trim and upper-case a cell; empty cells count as missing.
pub fn normalize(value: Option<&str>) -> Option<String> {
    value
        .map(|v| v.trim().to_uppercase())
        .filter(|v| !v.is_empty())
}

/// Whether ground truth and prediction agree. Missing on either side is a
/// mismatch.
pub fn values_match(original: Option<&str>, generated: Option<&str>) -> bool {
    match (normalize(original), normalize(generated)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Ground-truth and generated column names for `metrics`.
pub fn required_columns(metrics: &[Metric]) -> Vec<String> {
    metrics
        .iter()
        .map(|m| m.column_name().to_string())
        .chain(metrics.iter().map(Metric::generated_column))
        .collect()
}

/// Matches for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldAccuracy {
    pub metric: Metric,
    pub correct: usize,
    pub total: usize,
}

impl FieldAccuracy {
    /// Percentage of matching rows; 0 when there are no rows.
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64 * 100.0
        }
    }
}

/// Accuracy of every field over all processed rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccuracySummary {
    pub fields: Vec<FieldAccuracy>,
    pub total_rows: usize,
}

impl AccuracySummary {
    pub fn new(metrics: &[Metric]) -> Self {
        Self {
            fields: metrics
                .iter()
                .map(|metric| FieldAccuracy {
                    metric: *metric,
                    correct: 0,
                    total: 0,
                })
                .collect(),
            total_rows: 0,
        }
    }

    /// Count matches in `df` and add them to the running totals.
    pub fn add_frame(&mut self, df: &DataFrame) -> Result<()> {
        let metrics: Vec<Metric> = self.fields.iter().map(|f| f.metric).collect();
        require_columns(df, &required_columns(&metrics))?;

        for field in &mut self.fields {
            let original = string_values(df, field.metric.column_name())?;
            let generated = string_values(df, &field.metric.generated_column())?;
            field.correct += original
                .iter()
                .zip(&generated)
                .filter(|(a, b)| values_match(a.as_deref(), b.as_deref()))
                .count();
            field.total += df.height();
        }
        self.total_rows += df.height();
        Ok(())
    }

    pub fn get(&self, metric: Metric) -> Option<&FieldAccuracy> {
        self.fields.iter().find(|f| f.metric == metric)
    }

    /// `Variable / Correct / Accuracy` table.
    pub fn table(&self) -> String {
        let rows: Vec<Vec<String>> = self
            .fields
            .iter()
            .map(|f| {
                vec![
                    f.metric.column_name().to_string(),
                    f.correct.to_string(),
                    format!("{:.2}%", f.percentage()),
                ]
            })
            .collect();
        format_table(&["Variable", "Correct", "Accuracy"], &rows)
    }

    pub fn print(&self) {
        println!("\nAccuracy Summary:");
        println!("{}", self.table());
        println!("\nTotal CVEs processed: {}", self.total_rows);
    }
}
