//! Shared CSV and filesystem helpers.
//!
//! Every CSV in this toolkit is handled as a table of nullable strings; the
//! helpers below keep that convention in one place.

use crate::error::{EvalError, Result, ResultExt};
use polars::io::csv::read::CsvReadOptions;
use polars::prelude::*;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

// =============================================================================
// Value Utilities
// =============================================================================

/// Placeholder used by the source data for an absent value.
pub const NOT_AVAILABLE: &str = "N/A";

/// A value is missing if it is empty, whitespace-only, or the `N/A` marker.
pub fn is_missing_value(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed == NOT_AVAILABLE
}

/// Parse a score cell. Anything that is not a finite number is `None`.
pub fn parse_score(value: Option<&str>) -> Option<f64> {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Round to six decimals, enough to make one-decimal score arithmetic exact.
pub fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

/// Truncate to at most `max_chars` characters without splitting a code point.
pub fn truncate_chars(value: &str, max_chars: usize) -> String {
    value.chars().take(max_chars).collect()
}

// =============================================================================
// CSV Utilities
// =============================================================================

/// Read a CSV file with every column as a string and header names trimmed.
pub fn read_csv_strings(path: &Path) -> Result<DataFrame> {
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_infer_schema_length(Some(0))
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .context(format!("Failed to open {}", path.display()))?
        .finish()
        .context(format!("Failed to parse {}", path.display()))?;

    let trimmed: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|name| name.trim().to_string())
        .collect();
    df.set_column_names(trimmed)?;

    debug!(
        "Loaded {} rows x {} columns from {}",
        df.height(),
        df.width(),
        path.display()
    );
    Ok(df)
}

/// Write a DataFrame as CSV, creating the parent directory if needed.
pub fn write_csv(df: &mut DataFrame, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).context(format!("Failed to create {}", parent.display()))?;
    }
    let mut file = File::create(path).context(format!("Failed to create {}", path.display()))?;
    CsvWriter::new(&mut file)
        .include_header(true)
        .with_separator(b',')
        .with_quote_char(b'"')
        .finish(df)?;
    Ok(())
}

/// Fail with [`EvalError::MissingColumns`] unless every name is present.
pub fn require_columns<S: AsRef<str>>(df: &DataFrame, required: &[S]) -> Result<()> {
    let present: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
    let missing: Vec<String> = required
        .iter()
        .map(|name| name.as_ref())
        .filter(|name| !present.contains(name))
        .map(String::from)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(EvalError::MissingColumns(missing))
    }
}

/// Owned copy of a string column's values.
pub fn string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    let column = df.column(name)?;
    let values = column
        .str()?
        .into_iter()
        .map(|value| value.map(str::to_string))
        .collect();
    Ok(values)
}

/// Like [`string_values`], but an absent column reads as all nulls.
pub fn optional_string_values(df: &DataFrame, name: &str) -> Result<Vec<Option<String>>> {
    if df.column(name).is_ok() {
        string_values(df, name)
    } else {
        Ok(vec![None; df.height()])
    }
}

/// Replace `name` if it exists, append it otherwise.
pub fn set_string_column(df: &mut DataFrame, name: &str, values: Vec<Option<String>>) -> Result<()> {
    let series = Series::new(name.into(), values);
    if df.get_column_names().iter().any(|n| n.as_str() == name) {
        df.replace(name, series)?;
    } else {
        df.with_column(series)?;
    }
    Ok(())
}

/// Build a string DataFrame from a header and row-major cells.
pub fn frame_from_rows(header: &[&str], rows: &[Vec<Option<String>>]) -> Result<DataFrame> {
    let columns: Vec<Column> = header
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            let values: Vec<Option<String>> = rows
                .iter()
                .map(|row| row.get(idx).cloned().flatten())
                .collect();
            Series::new((*name).into(), values).into()
        })
        .collect();
    Ok(DataFrame::new(columns)?)
}

/// Concatenate frames row-wise. Columns are the union in first-seen order;
/// a frame lacking a column contributes nulls.
pub fn stack_frames(frames: Vec<DataFrame>) -> Result<DataFrame> {
    let mut names: Vec<String> = Vec::new();
    for df in &frames {
        for name in df.get_column_names() {
            if !names.iter().any(|n| n == name.as_str()) {
                names.push(name.to_string());
            }
        }
    }

    let mut combined: Option<DataFrame> = None;
    for mut df in frames {
        for name in &names {
            if df.column(name).is_err() {
                let nulls = Series::full_null(name.as_str().into(), df.height(), &DataType::String);
                df.with_column(nulls)?;
            }
        }
        let df = df.select(names.iter().map(String::as_str))?;
        match combined.as_mut() {
            Some(acc) => {
                acc.vstack_mut(&df)?;
            }
            None => combined = Some(df),
        }
    }

    Ok(combined.unwrap_or_else(DataFrame::empty))
}

// =============================================================================
// Filesystem Utilities
// =============================================================================

/// Files under `dir` with the given extension, sorted by path.
pub fn list_files(dir: &Path, extension: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(EvalError::InputNotFound(dir.display().to_string()));
    }

    let mut walker = WalkDir::new(dir).sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry?;
        if entry.file_type().is_file()
            && entry
                .path()
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
        {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Immediate sub-directories of `dir`, sorted by name.
pub fn list_subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(EvalError::InputNotFound(dir.display().to_string()));
    }
    let mut dirs = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}

/// File stem as an owned string, for naming derived outputs.
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn column_names(df: &DataFrame) -> Vec<String> {
        df.get_column_names().iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn test_is_missing_value() {
        assert!(is_missing_value(""));
        assert!(is_missing_value(" "));
        assert!(is_missing_value("N/A"));
        assert!(is_missing_value(" N/A "));
        assert!(!is_missing_value("NETWORK"));
    }

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score(Some("9.8")), Some(9.8));
        assert_eq!(parse_score(Some(" 5 ")), Some(5.0));
        assert_eq!(parse_score(Some("N/A")), None);
        assert_eq!(parse_score(Some("nan")), None);
        assert_eq!(parse_score(None), None);
    }

    #[test]
    fn test_round6_makes_score_differences_exact() {
        assert_eq!(round6((7.5_f64 - 7.0).abs()), 0.5);
        assert_eq!(round6((9.8_f64 - 9.3).abs()), 0.5);
        assert_eq!(round6((6.1_f64 - 6.1).abs()), 0.0);
    }

    #[test]
    fn test_truncate_chars_respects_code_points() {
        assert_eq!(truncate_chars("héllo wörld", 4), "héll");
        assert_eq!(truncate_chars("ab", 100), "ab");
    }

    #[test]
    fn test_csv_round_trip_trims_headers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("in.csv");
        fs::write(&path, " Scope ,Generated Scope\nUNCHANGED,changed\n,UNCHANGED\n").unwrap();

        let df = read_csv_strings(&path).unwrap();
        require_columns(&df, &["Scope", "Generated Scope"]).unwrap();
        assert_eq!(
            string_values(&df, "Scope").unwrap(),
            vec![Some("UNCHANGED".to_string()), None]
        );
    }

    #[test]
    fn test_require_columns_lists_missing() {
        let df = frame_from_rows(&["Scope"], &[vec![Some("CHANGED".to_string())]]).unwrap();
        let err = require_columns(&df, &["Scope", "Severity", "Generated Scope"]).unwrap_err();
        match err {
            EvalError::MissingColumns(missing) => {
                assert_eq!(missing, vec!["Severity".to_string(), "Generated Scope".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_set_string_column_appends_and_replaces() {
        let mut df = frame_from_rows(&["A"], &[vec![Some("1".to_string())]]).unwrap();
        set_string_column(&mut df, "B", vec![Some("x".to_string())]).unwrap();
        set_string_column(&mut df, "A", vec![None]).unwrap();
        assert_eq!(column_names(&df), vec!["A", "B"]);
        assert_eq!(string_values(&df, "A").unwrap(), vec![None]);
    }

    #[test]
    fn test_stack_frames_unions_columns() {
        let a = frame_from_rows(&["A", "B"], &[vec![Some("1".into()), Some("2".into())]]).unwrap();
        let b = frame_from_rows(&["B", "C"], &[vec![Some("3".into()), Some("4".into())]]).unwrap();

        let combined = stack_frames(vec![a, b]).unwrap();
        assert_eq!(column_names(&combined), vec!["A", "B", "C"]);
        assert_eq!(combined.height(), 2);
        assert_eq!(
            string_values(&combined, "A").unwrap(),
            vec![Some("1".to_string()), None]
        );
        assert_eq!(
            string_values(&combined, "B").unwrap(),
            vec![Some("2".to_string()), Some("3".to_string())]
        );
    }

    #[test]
    fn test_stack_frames_empty() {
        let combined = stack_frames(Vec::new()).unwrap();
        assert_eq!(combined.height(), 0);
    }

    #[test]
    fn test_list_files_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.json"), "{}").unwrap();
        fs::write(dir.path().join("a.json"), "{}").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::write(dir.path().join("nested/c.json"), "{}").unwrap();

        let flat = list_files(dir.path(), "json", false).unwrap();
        assert_eq!(flat.len(), 2);
        assert!(flat[0].ends_with("a.json"));

        let deep = list_files(dir.path(), "json", true).unwrap();
        assert_eq!(deep.len(), 3);
    }

    #[test]
    fn test_list_files_missing_directory() {
        let err = list_files(Path::new("/definitely/not/here"), "csv", true).unwrap_err();
        assert_eq!(err.error_code(), "INPUT_NOT_FOUND");
    }
}
