//! Pairwise association between categorical fields (bias-corrected
//! Cramér's V).

use crate::types::Metric;
use serde::Serialize;
use std::collections::BTreeMap;

/// Observed counts of `(x, y)` pairs; rows where either side is missing are
/// left out. Row and column categories are sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContingencyTable {
    pub rows: Vec<String>,
    pub cols: Vec<String>,
    pub counts: Vec<Vec<usize>>,
}

impl ContingencyTable {
    pub fn new(x: &[Option<&str>], y: &[Option<&str>]) -> Self {
        let mut pairs: BTreeMap<(&str, &str), usize> = BTreeMap::new();
        for (a, b) in x.iter().zip(y) {
            if let (Some(a), Some(b)) = (a, b) {
                *pairs.entry((*a, *b)).or_insert(0) += 1;
            }
        }

        let mut rows: Vec<&str> = pairs.keys().map(|(a, _)| *a).collect();
        rows.dedup();
        let mut cols: Vec<&str> = pairs.keys().map(|(_, b)| *b).collect();
        cols.sort_unstable();
        cols.dedup();

        let mut counts = vec![vec![0; cols.len()]; rows.len()];
        for ((a, b), count) in &pairs {
            if let (Ok(i), Ok(j)) = (rows.binary_search(a), cols.binary_search(b)) {
                counts[i][j] = *count;
            }
        }

        Self {
            rows: rows.into_iter().map(str::to_string).collect(),
            cols: cols.into_iter().map(str::to_string).collect(),
            counts,
        }
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    /// Pearson chi-square statistic, with Yates' continuity correction when
    /// the table has one degree of freedom.
    pub fn chi_square(&self) -> f64 {
        let n = self.total() as f64;
        if n == 0.0 {
            return 0.0;
        }
        let row_sums: Vec<f64> = self
            .counts
            .iter()
            .map(|row| row.iter().sum::<usize>() as f64)
            .collect();
        let col_sums: Vec<f64> = (0..self.cols.len())
            .map(|j| self.counts.iter().map(|row| row[j]).sum::<usize>() as f64)
            .collect();
        let yates = (self.rows.len().saturating_sub(1)) * (self.cols.len().saturating_sub(1)) == 1;

        let mut chi2 = 0.0;
        for (i, row) in self.counts.iter().enumerate() {
            for (j, &count) in row.iter().enumerate() {
                let expected = row_sums[i] * col_sums[j] / n;
                if expected == 0.0 {
                    continue;
                }
                let mut observed = count as f64;
                if yates {
                    let diff = expected - observed;
                    observed += diff.signum() * diff.abs().min(0.5);
                }
                chi2 += (observed - expected).powi(2) / expected;
            }
        }
        chi2
    }

    /// Bias-corrected Cramér's V; NaN for tables too small to measure.
    pub fn cramers_v(&self) -> f64 {
        let n = self.total() as f64;
        let r = self.rows.len() as f64;
        let k = self.cols.len() as f64;
        if n <= 1.0 || r < 2.0 || k < 2.0 {
            return f64::NAN;
        }

        let phi2 = self.chi_square() / n;
        let phi2corr = (phi2 - (k - 1.0) * (r - 1.0) / (n - 1.0)).max(0.0);
        let rcorr = r - (r - 1.0).powi(2) / (n - 1.0);
        let kcorr = k - (k - 1.0).powi(2) / (n - 1.0);
        let denominator = (kcorr - 1.0).min(rcorr - 1.0);
        if denominator <= 0.0 {
            return f64::NAN;
        }
        (phi2corr / denominator).sqrt()
    }
}

/// Cramér's V of two equally long columns.
pub fn cramers_v(x: &[Option<&str>], y: &[Option<&str>]) -> f64 {
    ContingencyTable::new(x, y).cramers_v()
}

/// Symmetric matrix of Cramér's V over a set of fields. Undefined entries
/// are NaN and serialize as `null`.
#[derive(Debug, Clone, Serialize)]
pub struct AssociationMatrix {
    pub metrics: Vec<Metric>,
    pub values: Vec<Vec<f64>>,
}

impl AssociationMatrix {
    /// `columns[i]` holds the standardized values of `metrics[i]`.
    pub fn compute(metrics: &[Metric], columns: &[Vec<Option<&str>>]) -> Self {
        let size = metrics.len().min(columns.len());
        let mut values = vec![vec![f64::NAN; size]; size];
        for i in 0..size {
            for j in i..size {
                let v = cramers_v(&columns[i], &columns[j]);
                values[i][j] = v;
                values[j][i] = v;
            }
        }
        Self {
            metrics: metrics[..size].to_vec(),
            values,
        }
    }

    pub fn labels(&self) -> Vec<&'static str> {
        self.metrics.iter().map(Metric::column_name).collect()
    }

    pub fn get(&self, a: Metric, b: Metric) -> Option<f64> {
        let i = self.metrics.iter().position(|m| *m == a)?;
        let j = self.metrics.iter().position(|m| *m == b)?;
        Some(self.values[i][j])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(values: &[&'static str]) -> Vec<Option<&'static str>> {
        values
            .iter()
            .map(|v| if v.is_empty() { None } else { Some(*v) })
            .collect()
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    // -------------------------------------------------------------------------
    // Contingency tables
    // -------------------------------------------------------------------------

    #[test]
    fn test_table_drops_incomplete_pairs() {
        let table = ContingencyTable::new(&column(&["A", "B", "", "A"]), &column(&["P", "Q", "P", ""]));
        assert_eq!(table.rows, vec!["A", "B"]);
        assert_eq!(table.cols, vec!["P", "Q"]);
        assert_eq!(table.counts, vec![vec![1, 0], vec![0, 1]]);
        assert_eq!(table.total(), 2);
    }

    #[test]
    fn test_yates_correction_on_two_by_two() {
        let x = column(&["A", "A", "A", "A", "B", "B", "B", "B"]);
        let table = ContingencyTable::new(&x, &x);
        // Expected 2 per cell; each observed count moves 0.5 toward it.
        assert!(approx(table.chi_square(), 4.5));
    }

    // -------------------------------------------------------------------------
    // Cramér's V
    // -------------------------------------------------------------------------

    #[test]
    fn test_perfect_association_two_by_two() {
        let x = column(&["A", "A", "A", "A", "B", "B", "B", "B"]);
        let expected = ((0.5625_f64 - 1.0 / 7.0) / (1.0 - 1.0 / 7.0)).sqrt();
        assert!(approx(cramers_v(&x, &x), expected));
    }

    #[test]
    fn test_independent_fields_are_zero() {
        let x = column(&["A", "A", "A", "B", "B", "B", "C", "C", "C"]);
        let y = column(&["P", "Q", "R", "P", "Q", "R", "P", "Q", "R"]);
        assert!(approx(cramers_v(&x, &y), 0.0));
    }

    #[test]
    fn test_constant_field_is_nan() {
        let x = column(&["A", "A", "A", "A"]);
        let y = column(&["P", "Q", "P", "Q"]);
        assert!(cramers_v(&x, &y).is_nan());
    }

    #[test]
    fn test_undersized_tables_are_nan() {
        assert!(cramers_v(&[], &[]).is_nan());
        assert!(cramers_v(&column(&["A"]), &column(&["P"])).is_nan());
        // n = 2 leaves a zero corrected denominator.
        assert!(cramers_v(&column(&["A", "B"]), &column(&["P", "Q"])).is_nan());
    }

    #[test]
    fn test_matrix_is_symmetric() {
        let a = column(&["A", "A", "B", "B", "A", "B"]);
        let b = column(&["P", "P", "Q", "Q", "Q", "P"]);
        let matrix = AssociationMatrix::compute(&[Metric::Scope, Metric::UserInteraction], &[a, b]);
        let ab = matrix.get(Metric::Scope, Metric::UserInteraction).unwrap();
        let ba = matrix.get(Metric::UserInteraction, Metric::Scope).unwrap();
        assert_eq!(ab.to_bits(), ba.to_bits());
        assert_eq!(matrix.labels(), vec!["Scope", "User Interaction"]);
    }

    #[test]
    fn test_nan_serializes_as_null() {
        let constant = column(&["A", "A"]);
        let matrix = AssociationMatrix::compute(&[Metric::Scope], &[constant]);
        let json = serde_json::to_value(&matrix).unwrap();
        assert!(json["values"][0][0].is_null());
    }
}
