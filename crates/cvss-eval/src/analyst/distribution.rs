//! Category frequencies and description-length statistics.

use crate::reporting::format_table;
use crate::types::Metric;
use crate::utils::truncate_chars;
use serde::{Deserialize, Serialize};

/// Characters of a description shown in a missing-description sample.
pub const PREVIEW_CHARS: usize = 100;

/// Map raw cells onto the canonical values of `metric`; anything else is
/// missing.
pub fn standardize(metric: Metric, values: &[Option<String>]) -> Vec<Option<&'static str>> {
    values
        .iter()
        .map(|value| value.as_deref().and_then(|v| metric.canonicalize(v)))
        .collect()
}

/// Counts of every canonical value of one field, zeros included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distribution {
    pub metric: Metric,
    pub counts: Vec<(String, usize)>,
    /// Rows with no canonical value.
    pub missing: usize,
}

impl Distribution {
    pub fn from_values(metric: Metric, values: &[Option<&'static str>]) -> Self {
        let counts = metric
            .allowed_values()
            .iter()
            .map(|category| {
                let count = values.iter().filter(|v| **v == Some(*category)).count();
                (category.to_string(), count)
            })
            .collect();
        Self {
            metric,
            counts,
            missing: values.iter().filter(|v| v.is_none()).count(),
        }
    }

    /// Rows with a canonical value.
    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, count)| count).sum()
    }

    pub fn count(&self, category: &str) -> usize {
        self.counts
            .iter()
            .find(|(name, _)| name == category)
            .map_or(0, |(_, count)| *count)
    }

    pub fn categories(&self) -> Vec<&str> {
        self.counts.iter().map(|(name, _)| name.as_str()).collect()
    }

    pub fn values(&self) -> Vec<usize> {
        self.counts.iter().map(|(_, count)| *count).collect()
    }

    pub fn print(&self) {
        println!("\n{} Distribution:", self.metric);
        let rows: Vec<Vec<String>> = self
            .counts
            .iter()
            .map(|(name, count)| vec![name.clone(), count.to_string()])
            .collect();
        println!("{}", format_table(&[self.metric.column_name(), "Count"], &rows));
    }
}

/// A row whose description is missing or blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DescriptionSample {
    pub file: String,
    pub row: usize,
    pub preview: String,
}

/// Description length statistics, in characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DescriptionStats {
    pub lengths: Vec<f64>,
    pub missing: usize,
    pub samples: Vec<DescriptionSample>,
}

impl DescriptionStats {
    /// `sources[i]` and `rows[i]` locate `descriptions[i]` in its input file.
    /// At most `sample_limit` problem rows are kept as samples.
    pub fn collect(
        descriptions: &[Option<String>],
        sources: &[String],
        rows: &[usize],
        sample_limit: usize,
    ) -> Self {
        let mut lengths = Vec::with_capacity(descriptions.len());
        let mut missing = 0;
        let mut samples = Vec::new();

        for (idx, description) in descriptions.iter().enumerate() {
            if let Some(text) = description {
                lengths.push(text.chars().count() as f64);
            }
            let blank = description.as_deref().is_none_or(|text| text.trim().is_empty());
            if blank {
                missing += 1;
                if samples.len() < sample_limit {
                    samples.push(DescriptionSample {
                        file: sources.get(idx).cloned().unwrap_or_else(|| "?".to_string()),
                        row: rows.get(idx).copied().unwrap_or(idx),
                        preview: truncate_chars(description.as_deref().unwrap_or(""), PREVIEW_CHARS),
                    });
                }
            }
        }

        Self {
            lengths,
            missing,
            samples,
        }
    }

    /// `None` when no description is present.
    pub fn mean(&self) -> Option<f64> {
        if self.lengths.is_empty() {
            None
        } else {
            Some(self.lengths.iter().sum::<f64>() / self.lengths.len() as f64)
        }
    }

    pub fn print(&self) {
        println!("Rows with missing or empty Description: {}", self.missing);
        if !self.samples.is_empty() {
            println!("Sample problematic rows (file, row, and first {PREVIEW_CHARS} chars):");
            for sample in &self.samples {
                println!(
                    "File: {}, Row: {}, Description: {:?}",
                    sample.file, sample.row, sample.preview
                );
            }
        }
        println!(
            "Processed {} descriptions for length analysis.",
            self.lengths.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn s(value: &str) -> Option<String> {
        Some(value.to_string())
    }

    #[test]
    fn test_standardize_drops_non_canonical() {
        let values = vec![s(" network"), s("ADJACENT"), None, s("Physical")];
        assert_eq!(
            standardize(Metric::AttackVector, &values),
            vec![Some("NETWORK"), None, None, Some("PHYSICAL")]
        );
    }

    #[test]
    fn test_distribution_reindexes_all_categories() {
        let values = vec![Some("LOW"), Some("LOW"), None];
        let dist = Distribution::from_values(Metric::PrivilegesRequired, &values);
        assert_eq!(
            dist.counts,
            vec![
                ("NONE".to_string(), 0),
                ("LOW".to_string(), 2),
                ("HIGH".to_string(), 0)
            ]
        );
        assert_eq!(dist.total(), 2);
        assert_eq!(dist.missing, 1);
        assert_eq!(dist.categories(), vec!["NONE", "LOW", "HIGH"]);
    }

    #[test]
    fn test_description_stats() {
        let long = "x".repeat(150);
        let descriptions = vec![s("abcd"), None, s("  "), s(&long)];
        let sources = vec!["a.csv".to_string(); 4];
        let rows = vec![0, 1, 2, 3];

        let stats = DescriptionStats::collect(&descriptions, &sources, &rows, 1);

        assert_eq!(stats.lengths, vec![4.0, 2.0, 150.0]);
        assert_eq!(stats.missing, 2);
        assert_eq!(stats.samples.len(), 1);
        assert_eq!(stats.samples[0].row, 1);
        assert_eq!(stats.mean(), Some(52.0));
    }

    #[test]
    fn test_preview_is_truncated() {
        let descriptions = vec![s(&" ".repeat(120))];
        let stats = DescriptionStats::collect(&descriptions, &["f.csv".to_string()], &[7], 10);
        assert_eq!(stats.samples[0].preview.chars().count(), PREVIEW_CHARS);
        assert_eq!(stats.samples[0].row, 7);
    }

    #[test]
    fn test_no_descriptions_has_no_mean() {
        let stats = DescriptionStats::collect(&[], &[], &[], 10);
        assert_eq!(stats.mean(), None);
        assert_eq!(stats.missing, 0);
    }
}
