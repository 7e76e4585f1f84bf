//! Prompt text for the two record variants.

use crate::types::RecordVariant;

const DESCRIPTION_ONLY_SYSTEM: &str = "You are a cybersecurity expert trained in analyzing CVE \
descriptions and generating their target variables, Attack Vector, Attack Complexity, Privileges \
Required, User Interaction, Scope, Confidentiality Impact, Integrity Impact, Availability Impact, \
and Base Severity.";

const VENDOR_PRODUCT_SYSTEM: &str = "You are a cybersecurity expert trained in analyzing CVE \
descriptions and generating its 8 target variables that make up the vector string, Attack \
Vector, Attack Complexity, Privileges Required, User Interaction, Scope, Confidentiality Impact, \
Integrity Impact, and Availability Impact.";

const METRIC_VALUES: &str = "\
- Attack Vector: NETWORK, ADJACENT_NETWORK, LOCAL, PHYSICAL
- Attack Complexity: LOW, HIGH
- Privileges Required: NONE, LOW, HIGH
- User Interaction: NONE, REQUIRED
- Scope: UNCHANGED, CHANGED
- Confidentiality Impact: NONE, LOW, HIGH
- Integrity Impact: NONE, LOW, HIGH
- Availability Impact: NONE, LOW, HIGH";

/// A worked example: description and the expected answer, base metrics in
/// response order (AC, AV, PR, UI, S, C, I, A) followed by severity.
struct Example {
    description: &'static str,
    answer: [&'static str; 9],
}

const EXAMPLES: [Example; 5] = [
    Example {
        description: "Cross-site scripting vulnerability exists in Splunk Config Explorer versions \
prior to 1.7.16. If this vulnerability is exploited, an arbitrary script may be executed on the \
web browser of the user who is using the product.",
        answer: ["LOW", "NETWORK", "NONE", "REQUIRED", "CHANGED", "LOW", "LOW", "NONE", "MEDIUM"],
    },
    Example {
        description: "An issue in the API wait function of NASA AIT-Core v2.5.2 allows attackers \
to execute arbitrary code via supplying a crafted string.",
        answer: [
            "HIGH",
            "ADJACENT_NETWORK",
            "NONE",
            "NONE",
            "UNCHANGED",
            "HIGH",
            "HIGH",
            "HIGH",
            "HIGH",
        ],
    },
    Example {
        description: "J2EEFAST v2.7.0 was discovered to contain a SQL injection vulnerability via \
the findPage function in SysLoginInfoMapper.xml.",
        answer: ["LOW", "NETWORK", "LOW", "NONE", "UNCHANGED", "HIGH", "HIGH", "HIGH", "HIGH"],
    },
    Example {
        description: "Ubiquiti AirMax firmware version 8 allows attackers with physical access to \
gain a privileged command shell via the UART Debugging Port.",
        answer: ["LOW", "PHYSICAL", "LOW", "NONE", "UNCHANGED", "HIGH", "HIGH", "HIGH", "MEDIUM"],
    },
    Example {
        description: "eladmin v2.7 and before is vulnerable to Server-Side Request Forgery (SSRF) \
which allows an attacker to execute arbitrary code via the DatabaseController.java component.",
        answer: ["LOW", "NETWORK", "NONE", "NONE", "UNCHANGED", "HIGH", "HIGH", "HIGH", "CRITICAL"],
    },
];

const FIELD_LABELS: [&str; 9] = [
    "Attack Complexity",
    "Attack Vector",
    "Privileges Required",
    "User Interaction",
    "Scope",
    "Confidentiality Impact",
    "Integrity Impact",
    "Availability Impact",
    "Base Severity",
];

/// Input for one numbered entry of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptRecord {
    pub description: String,
    pub vendor: Option<String>,
    pub product: Option<String>,
}

impl PromptRecord {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            vendor: None,
            product: None,
        }
    }
}

pub fn system_message(variant: RecordVariant) -> &'static str {
    match variant {
        RecordVariant::DescriptionOnly => DESCRIPTION_ONLY_SYSTEM,
        RecordVariant::VendorProduct => VENDOR_PRODUCT_SYSTEM,
    }
}

fn example_count(variant: RecordVariant) -> usize {
    match variant {
        RecordVariant::DescriptionOnly => 2,
        RecordVariant::VendorProduct => 5,
    }
}

/// The fixed instructional part of the user message.
pub fn instructions(variant: RecordVariant) -> String {
    let fields = variant.field_count();
    let labels = &FIELD_LABELS[..fields];
    let mut metric_list = METRIC_VALUES.to_string();
    if variant == RecordVariant::DescriptionOnly {
        metric_list.push_str("\n- Base Severity: NONE, LOW, MEDIUM, HIGH, CRITICAL");
    }

    let source = if variant.includes_vendor() {
        "Using each CVE's description, vendor and product"
    } else {
        "From each CVE description"
    };

    let mut text = format!(
        "You are a cybersecurity expert specializing in analyzing CVE descriptions to determine \
CVSS v3.1 Base Scores. Your task involves:\n\n\
### Step 1. Extracting Metrics\n\
{source}, identify the following {fields} metrics:\n\n\
{metric_list}\n\n\
### Step 2. Output Findings\n\
For each CVE, output one line in the following format, starting with the number of the CVE \
it answers:\n\
Number | {}\n\n",
        labels.join(" | ")
    );

    text.push_str("### CVE Examples:\n");
    for (idx, example) in EXAMPLES.iter().take(example_count(variant)).enumerate() {
        text.push_str(&format!(
            "\nExample {}:\nCVE Description: {}\n",
            idx + 1,
            example.description
        ));
        for (label, value) in labels.iter().zip(&example.answer[..fields]) {
            text.push_str(&format!("{label}: {value}\n"));
        }
        text.push_str(&format!(
            "Output: {} | {}\n",
            idx + 1,
            example.answer[..fields].join(" | ")
        ));
    }

    let sample: Vec<String> = EXAMPLES
        .iter()
        .take(2)
        .enumerate()
        .map(|(idx, example)| format!("{} | {}", idx + 1, example.answer[..fields].join(" | ")))
        .collect();
    text.push_str(&format!(
        "\nDo NOT provide any additional commentary or detail. Output exactly one line per CVE, \
each line starting with the CVE's number, for example:\n{}\n\n### CVEs:\n",
        sample.join("\n")
    ));

    text
}

/// Full user message: instructions followed by the numbered records.
pub fn build_user_prompt(variant: RecordVariant, records: &[PromptRecord]) -> String {
    let mut prompt = instructions(variant);
    for (idx, record) in records.iter().enumerate() {
        prompt.push_str(&format!("{}. {}", idx + 1, record.description));
        if variant.includes_vendor() {
            if let Some(vendor) = &record.vendor {
                prompt.push_str(&format!(" (Vendor: {vendor}"));
                match &record.product {
                    Some(product) => prompt.push_str(&format!(", Product: {product})")),
                    None => prompt.push(')'),
                }
            } else if let Some(product) = &record.product {
                prompt.push_str(&format!(" (Product: {product})"));
            }
        }
        prompt.push('\n');
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_only_has_nine_fields_and_two_examples() {
        let text = instructions(RecordVariant::DescriptionOnly);
        assert!(text.contains("identify the following 9 metrics"));
        assert!(text.contains("Base Severity: NONE, LOW, MEDIUM, HIGH, CRITICAL"));
        assert!(text.contains("Example 2:"));
        assert!(!text.contains("Example 3:"));
        assert!(text.contains("Output: 1 | LOW | NETWORK | NONE | REQUIRED | CHANGED | LOW | LOW | NONE | MEDIUM"));
    }

    #[test]
    fn test_vendor_product_has_eight_fields_and_five_examples() {
        let text = instructions(RecordVariant::VendorProduct);
        assert!(text.contains("identify the following 8 metrics"));
        assert!(!text.contains("Base Severity"));
        assert!(text.contains("Example 5:"));
        assert!(text.contains("Output: 4 | LOW | PHYSICAL | LOW | NONE | UNCHANGED | HIGH | HIGH | HIGH\n"));
    }

    #[test]
    fn test_records_are_numbered() {
        let records = vec![PromptRecord::new("first"), PromptRecord::new("second")];
        let prompt = build_user_prompt(RecordVariant::DescriptionOnly, &records);
        assert!(prompt.ends_with("1. first\n2. second\n"));
    }

    #[test]
    fn test_vendor_appended_for_vendor_variant_only() {
        let record = PromptRecord {
            description: "overflow".to_string(),
            vendor: Some("Acme".to_string()),
            product: Some("Router".to_string()),
        };
        let vendor = build_user_prompt(RecordVariant::VendorProduct, std::slice::from_ref(&record));
        assert!(vendor.ends_with("1. overflow (Vendor: Acme, Product: Router)\n"));

        let plain = build_user_prompt(RecordVariant::DescriptionOnly, &[record]);
        assert!(plain.ends_with("1. overflow\n"));
    }

    #[test]
    fn test_system_messages_differ() {
        assert!(system_message(RecordVariant::DescriptionOnly).contains("Base Severity"));
        assert!(system_message(RecordVariant::VendorProduct).contains("8 target variables"));
    }
}
