//! Per-record JSON export: `CVE_<id>_scored.json` with the original and
//! generated value of every predicted attribute.

use crate::error::{Result, ResultExt};
use crate::reporting::{RunReport, SkipReason};
use crate::types::{
    Metric, RecordVariant, CVE_ID_COLUMN, DESCRIPTION_COLUMN, PRODUCT_COLUMN, VENDOR_COLUMN,
};
use crate::utils::optional_string_values;
use polars::prelude::DataFrame;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::fs;
use std::path::Path;
use tracing::{debug, info};

#[derive(Debug, Serialize)]
struct AttributePair {
    #[serde(rename = "Original")]
    original: Option<String>,
    #[serde(rename = "Generated")]
    generated: Option<String>,
}

/// Attributes in reporting order.
#[derive(Debug)]
struct Attributes(Vec<(&'static str, AttributePair)>);

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, pair) in &self.0 {
            map.serialize_entry(key, pair)?;
        }
        map.end()
    }
}

#[derive(Debug, Serialize)]
struct ScoredRecord {
    #[serde(rename = "CVE_ID")]
    cve_id: String,
    #[serde(rename = "Description")]
    description: Option<String>,
    #[serde(rename = "Vendor", skip_serializing_if = "Option::is_none")]
    vendor: Option<String>,
    #[serde(rename = "Product", skip_serializing_if = "Option::is_none")]
    product: Option<String>,
    #[serde(rename = "Attributes")]
    attributes: Attributes,
}

/// Severity first when predicted, then the base metrics in prompt order.
fn export_order(variant: RecordVariant) -> Vec<Metric> {
    let predicted = variant.predicted_metrics();
    let mut order = Vec::with_capacity(predicted.len());
    if predicted.contains(&Metric::Severity) {
        order.push(Metric::Severity);
    }
    order.extend(predicted.iter().copied().filter(|m| *m != Metric::Severity));
    order
}

fn file_name(cve_id: &str) -> String {
    let safe: String = cve_id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("CVE_{safe}_scored.json")
}

/// Write one JSON file per row into `dir`. Rows without a CVE ID are not
/// exported. Returns the number of files written.
pub fn export_records(
    df: &DataFrame,
    variant: RecordVariant,
    dir: &Path,
    report: &mut RunReport,
) -> Result<usize> {
    fs::create_dir_all(dir).context(format!("Failed to create {}", dir.display()))?;

    let ids = optional_string_values(df, CVE_ID_COLUMN)?;
    let descriptions = optional_string_values(df, DESCRIPTION_COLUMN)?;
    let (vendors, products) = if variant.includes_vendor() {
        (
            optional_string_values(df, VENDOR_COLUMN)?,
            optional_string_values(df, PRODUCT_COLUMN)?,
        )
    } else {
        (vec![None; df.height()], vec![None; df.height()])
    };

    let order = export_order(variant);
    let mut columns = Vec::with_capacity(order.len());
    for metric in &order {
        columns.push((
            optional_string_values(df, metric.column_name())?,
            optional_string_values(df, &metric.generated_column())?,
        ));
    }

    let mut written = 0;
    for row in 0..df.height() {
        let Some(cve_id) = ids[row].clone().filter(|id| !id.trim().is_empty()) else {
            debug!("Row {} has no CVE ID; not exported", row + 1);
            continue;
        };

        let attributes = order
            .iter()
            .zip(&columns)
            .map(|(metric, (original, generated))| {
                (
                    metric.export_key(),
                    AttributePair {
                        original: original[row].clone(),
                        generated: generated[row].clone(),
                    },
                )
            })
            .collect();

        let record = ScoredRecord {
            cve_id: cve_id.clone(),
            description: descriptions[row].clone(),
            vendor: vendors[row].clone(),
            product: products[row].clone(),
            attributes: Attributes(attributes),
        };

        let path = dir.join(file_name(&cve_id));
        let result = serde_json::to_string_pretty(&record)
            .map_err(|e| e.to_string())
            .and_then(|json| fs::write(&path, json).map_err(|e| e.to_string()));
        match result {
            Ok(()) => written += 1,
            Err(error) => report.skip(SkipReason::ExportFailed {
                path: path.display().to_string(),
                error,
            }),
        }
    }

    info!("Exported {} scored records to {}", written, dir.display());
    Ok(written)
}
