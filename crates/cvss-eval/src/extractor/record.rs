//! Serde model of the CVE JSON record format (only the parts we read).

use crate::types::{Metric, RecordVariant, VulnerabilityRecord};
use crate::utils::is_missing_value;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Default, Deserialize)]
pub struct CveDocument {
    #[serde(rename = "cveMetadata")]
    pub cve_metadata: Option<CveMetadata>,
    pub containers: Option<Containers>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CveMetadata {
    #[serde(rename = "cveId")]
    pub cve_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Containers {
    pub cna: Option<CnaContainer>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CnaContainer {
    pub descriptions: Option<Vec<DescriptionEntry>>,
    pub affected: Option<Vec<AffectedEntry>>,
    pub metrics: Option<Vec<MetricsEntry>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DescriptionEntry {
    pub lang: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AffectedEntry {
    pub vendor: Option<String>,
    pub product: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MetricsEntry {
    #[serde(rename = "cvssV3_1")]
    pub cvss_v3_1: Option<BTreeMap<String, Value>>,
}

/// A required field was absent, empty, or `N/A`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("missing required field '{0}'")]
pub struct MissingField(pub String);

/// Scalar JSON value as text; strings are trimmed, numbers printed.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
    .filter(|s| !is_missing_value(s))
}

fn present(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !is_missing_value(v))
        .map(str::to_string)
}

impl CveDocument {
    fn cna(&self) -> Option<&CnaContainer> {
        self.containers.as_ref().and_then(|c| c.cna.as_ref())
    }

    pub fn cve_id(&self) -> Option<String> {
        present(self.cve_metadata.as_ref().and_then(|m| m.cve_id.as_deref()))
    }

    /// First description whose language is English.
    pub fn english_description(&self) -> Option<String> {
        let entry = self
            .cna()?
            .descriptions
            .as_ref()?
            .iter()
            .find(|d| d.lang.as_deref().is_some_and(|l| l.eq_ignore_ascii_case("en")))?;
        present(entry.value.as_deref())
    }

    fn first_affected(&self) -> Option<&AffectedEntry> {
        self.cna()?.affected.as_ref()?.first()
    }

    pub fn vendor(&self) -> Option<String> {
        present(self.first_affected()?.vendor.as_deref())
    }

    pub fn product(&self) -> Option<String> {
        present(self.first_affected()?.product.as_deref())
    }

    /// The `cvssV3_1` block of the first metrics entry that carries one.
    pub fn cvss_v3_1(&self) -> Option<&BTreeMap<String, Value>> {
        self.cna()?
            .metrics
            .as_ref()?
            .iter()
            .find_map(|entry| entry.cvss_v3_1.as_ref())
    }

    /// Flatten into a record, requiring every field `variant` needs.
    pub fn to_record(&self, variant: RecordVariant) -> Result<VulnerabilityRecord, MissingField> {
        let description = self
            .english_description()
            .ok_or_else(|| MissingField("Description".to_string()))?;

        let (vendor, product) = (self.vendor(), self.product());
        if variant.includes_vendor() {
            if vendor.is_none() {
                return Err(MissingField("Vendor".to_string()));
            }
            if product.is_none() {
                return Err(MissingField("Product".to_string()));
            }
        }

        let cvss = self.cvss_v3_1();
        let field = |key: &str| cvss.and_then(|block| block.get(key)).and_then(value_text);

        let mut metrics = BTreeMap::new();
        for metric in Metric::EXTRACT_ORDER {
            let value = field(metric.json_key())
                .ok_or_else(|| MissingField(metric.column_name().to_string()))?;
            metrics.insert(metric, value);
        }

        let base_score = field("baseScore")
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|s| s.is_finite());

        Ok(VulnerabilityRecord {
            cve_id: self.cve_id(),
            description,
            vendor,
            product,
            metrics,
            base_score,
            vector_string: field("vectorString"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn document(value: Value) -> CveDocument {
        serde_json::from_value(value).unwrap()
    }

    fn full_cvss() -> Value {
        json!({
            "attackVector": "NETWORK",
            "attackComplexity": "LOW",
            "privilegesRequired": "NONE",
            "userInteraction": "REQUIRED",
            "scope": "CHANGED",
            "confidentialityImpact": "LOW",
            "integrityImpact": "LOW",
            "availabilityImpact": "NONE",
            "baseSeverity": "MEDIUM",
            "baseScore": 6.1,
            "vectorString": "CVSS:3.1/AV:N/AC:L/PR:N/UI:R/S:C/C:L/I:L/A:N"
        })
    }

    #[test]
    fn test_picks_first_english_description() {
        let doc = document(json!({
            "containers": {"cna": {"descriptions": [
                {"lang": "es", "value": "Una vulnerabilidad"},
                {"lang": "EN", "value": "A vulnerability"},
                {"lang": "en", "value": "Second English"}
            ]}}
        }));
        assert_eq!(doc.english_description(), Some("A vulnerability".to_string()));
    }

    #[test]
    fn test_cvss_block_from_first_entry_that_has_one() {
        let doc = document(json!({
            "containers": {"cna": {"metrics": [
                {"other": {}},
                {"cvssV3_1": full_cvss()}
            ]}}
        }));
        let block = doc.cvss_v3_1().unwrap();
        assert_eq!(block["attackVector"], "NETWORK");
    }

    #[test]
    fn test_full_record() {
        let doc = document(json!({
            "cveMetadata": {"cveId": "CVE-2023-0001"},
            "containers": {"cna": {
                "descriptions": [{"lang": "en", "value": "XSS in Splunk Config Explorer"}],
                "affected": [{"vendor": "Splunk", "product": "Config Explorer"}],
                "metrics": [{"cvssV3_1": full_cvss()}]
            }}
        }));

        let record = doc.to_record(RecordVariant::VendorProduct).unwrap();
        assert_eq!(record.cve_id.as_deref(), Some("CVE-2023-0001"));
        assert_eq!(record.vendor.as_deref(), Some("Splunk"));
        assert_eq!(record.metrics[&Metric::Severity], "MEDIUM");
        assert_eq!(record.metrics[&Metric::Scope], "CHANGED");
        assert_eq!(record.base_score, Some(6.1));
        assert_eq!(
            record.vector_string.as_deref(),
            Some("CVSS:3.1/AV:N/AC:L/PR:N/UI:R/S:C/C:L/I:L/A:N")
        );
    }

    #[test]
    fn test_placeholder_metric_is_missing() {
        let mut cvss = full_cvss();
        cvss["scope"] = json!("N/A");
        let doc = document(json!({
            "containers": {"cna": {
                "descriptions": [{"lang": "en", "value": "desc"}],
                "metrics": [{"cvssV3_1": cvss}]
            }}
        }));
        assert_eq!(
            doc.to_record(RecordVariant::DescriptionOnly).unwrap_err(),
            MissingField("Scope".to_string())
        );
    }

    #[test]
    fn test_vendor_required_only_for_vendor_variant() {
        let doc = document(json!({
            "containers": {"cna": {
                "descriptions": [{"lang": "en", "value": "desc"}],
                "affected": [{"vendor": " ", "product": "thing"}],
                "metrics": [{"cvssV3_1": full_cvss()}]
            }}
        }));
        assert!(doc.to_record(RecordVariant::DescriptionOnly).is_ok());
        assert_eq!(
            doc.to_record(RecordVariant::VendorProduct).unwrap_err(),
            MissingField("Vendor".to_string())
        );
    }

    #[test]
    fn test_optional_fields_absent() {
        let mut cvss = full_cvss();
        cvss.as_object_mut().unwrap().remove("baseScore");
        cvss.as_object_mut().unwrap().remove("vectorString");
        let doc = document(json!({
            "containers": {"cna": {
                "descriptions": [{"lang": "en", "value": "desc"}],
                "metrics": [{"cvssV3_1": cvss}]
            }}
        }));
        let record = doc.to_record(RecordVariant::DescriptionOnly).unwrap();
        assert_eq!(record.cve_id, None);
        assert_eq!(record.base_score, None);
        assert_eq!(record.vector_string, None);
    }
}
