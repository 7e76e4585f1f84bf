use super::RunReport;
use crate::error::{Result, ResultExt};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Writes JSON reports into one output directory.
#[derive(Debug, Clone)]
pub struct ReportGenerator {
    output_dir: PathBuf,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./outputs"),
        }
    }
}

impl ReportGenerator {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Serialize `value` as pretty JSON to `<output_dir>/<file_name>`.
    pub fn write_json<T: Serialize>(&self, value: &T, file_name: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)
            .context(format!("Failed to create {}", self.output_dir.display()))?;

        let path = self.output_dir.join(file_name);
        let mut file = File::create(&path).context(format!("Failed to create {}", path.display()))?;
        file.write_all(serde_json::to_string_pretty(value)?.as_bytes())?;

        info!("Report saved: {}", path.display());
        Ok(path)
    }

    /// Write the run report as `<job>_report.json`.
    pub fn write_run_report(&self, report: &RunReport) -> Result<PathBuf> {
        self.write_json(report, &format!("{}_report.json", report.job.replace('-', "_")))
    }
}

/// Render a left-aligned text table with one column width per header.
pub fn format_table(headers: &[&str], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(idx) {
                *width = (*width).max(cell.chars().count());
            }
        }
    }

    let render = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = *width + 2))
            .collect::<String>()
            .trim_end()
            .to_string()
    };

    let mut out = render(headers.to_vec());
    for row in rows {
        out.push('\n');
        out.push_str(&render(row.iter().map(String::as_str).collect()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporting::SkipReason;
    use tempfile::TempDir;

    #[test]
    fn test_write_run_report() {
        let dir = TempDir::new().unwrap();
        let generator = ReportGenerator::new(dir.path().join("reports"));

        let mut report = RunReport::new("score-diff");
        report.skip(SkipReason::MissingDirectory {
            path: "2005_scored".to_string(),
        });
        let path = generator.write_run_report(&report).unwrap();

        assert!(path.ends_with("score_diff_report.json"));
        let content = fs::read_to_string(path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(json["job"], "score-diff");
        assert_eq!(json["skipped"][0]["kind"], "missing_directory");
    }

    #[test]
    fn test_format_table_aligns_columns() {
        let table = format_table(
            &["Variable", "Correct", "Accuracy"],
            &[
                vec!["Severity".into(), "3".into(), "75.00%".into()],
                vec!["Attack Complexity".into(), "4".into(), "100.00%".into()],
            ],
        );
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Variable           Correct"));
        assert!(lines[2].starts_with("Attack Complexity  4"));
    }
}
