//! Base-score difference buckets and vector-string matching.

use crate::error::Result;
use crate::types::{
    ScoreBucket, VectorMatch, BASE_SCORE_COLUMN, GENERATED_SCORE_COLUMN, GENERATED_VECTOR_COLUMN,
    VECTOR_STRING_COLUMN,
};
use crate::utils::{
    is_missing_value, parse_score, require_columns, round6, set_string_column, string_values,
    NOT_AVAILABLE,
};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const SCORE_DIFFERENCE_COLUMN: &str = "Score Difference";
pub const ACCURACY_COLUMN: &str = "Accuracy";
pub const VECTOR_MATCH_COLUMN: &str = "Vector Match";

pub const REQUIRED_COLUMNS: [&str; 4] = [
    BASE_SCORE_COLUMN,
    GENERATED_SCORE_COLUMN,
    VECTOR_STRING_COLUMN,
    GENERATED_VECTOR_COLUMN,
];

/// Absolute difference rounded to six decimals; `None` if either score is
/// missing or not a number.
pub fn score_difference(base: Option<&str>, generated: Option<&str>) -> Option<f64> {
    match (parse_score(base), parse_score(generated)) {
        (Some(a), Some(b)) => Some(round6((a - b).abs())),
        _ => None,
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !is_missing_value(v))
}

/// Append `Score Difference`, `Accuracy` and `Vector Match` to `df`.
pub fn augment(df: &mut DataFrame) -> Result<()> {
    require_columns(df, &REQUIRED_COLUMNS)?;

    let base = string_values(df, BASE_SCORE_COLUMN)?;
    let generated = string_values(df, GENERATED_SCORE_COLUMN)?;
    let vectors = string_values(df, VECTOR_STRING_COLUMN)?;
    let generated_vectors = string_values(df, GENERATED_VECTOR_COLUMN)?;

    let mut differences = Vec::with_capacity(df.height());
    let mut buckets = Vec::with_capacity(df.height());
    let mut matches = Vec::with_capacity(df.height());

    for row in 0..df.height() {
        let difference = score_difference(base[row].as_deref(), generated[row].as_deref());
        differences.push(Some(
            difference.map_or_else(|| NOT_AVAILABLE.to_string(), |d| d.to_string()),
        ));
        buckets.push(Some(ScoreBucket::from_difference(difference).as_str().to_string()));
        matches.push(Some(
            VectorMatch::compare(present(&vectors[row]), present(&generated_vectors[row]))
                .as_str()
                .to_string(),
        ));
    }

    set_string_column(df, SCORE_DIFFERENCE_COLUMN, differences)?;
    set_string_column(df, ACCURACY_COLUMN, buckets)?;
    set_string_column(df, VECTOR_MATCH_COLUMN, matches)?;
    Ok(())
}

/// Value counts of the two outcome columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffCounts {
    pub accuracy: BTreeMap<String, usize>,
    pub vector_match: BTreeMap<String, usize>,
}

impl DiffCounts {
    /// Count outcomes in an augmented frame.
    pub fn add_frame(&mut self, df: &DataFrame) -> Result<()> {
        for value in string_values(df, ACCURACY_COLUMN)?.into_iter().flatten() {
            *self.accuracy.entry(value).or_insert(0) += 1;
        }
        for value in string_values(df, VECTOR_MATCH_COLUMN)?.into_iter().flatten() {
            *self.vector_match.entry(value).or_insert(0) += 1;
        }
        Ok(())
    }

    pub fn accuracy_count(&self, bucket: ScoreBucket) -> usize {
        self.accuracy.get(bucket.as_str()).copied().unwrap_or(0)
    }

    pub fn vector_count(&self, outcome: VectorMatch) -> usize {
        self.vector_match.get(outcome.as_str()).copied().unwrap_or(0)
    }

    pub fn print(&self) {
        println!("Accuracy Counts:");
        for bucket in ScoreBucket::ALL {
            println!("{:<18}{}", bucket.as_str(), self.accuracy_count(bucket));
        }
        println!("\nVector Match Counts:");
        for outcome in VectorMatch::ALL {
            println!("{:<18}{}", outcome.as_str(), self.vector_count(outcome));
        }
    }
}
