//! Response parsing and label alignment.
//!
//! A response line is accepted when it splits on `|` into exactly the
//! expected number of fields, or one more whose first field is a record
//! number. Everything else is discarded.

use crate::types::GeneratedLabelSet;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

/// A bare record number such as `3`, `3.`, `(3)` or `#3`.
static RECORD_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[#(\[]?\s*(\d{1,5})\s*[.):\]]?$").expect("Invalid regex: record number"));

/// A record number glued to the first value, as in `3. LOW`.
static NUMBERED_VALUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,5})[.)]\s+(\S.*)$").expect("Invalid regex: numbered value"));

/// Parse one response line into a label set with `field_count` values.
pub fn parse_line(line: &str, field_count: usize) -> Option<GeneratedLabelSet> {
    let line = line.trim();
    if !line.contains('|') {
        return None;
    }

    let mut parts: Vec<&str> = line.split('|').map(str::trim).collect();
    // Markdown table rows carry a pipe at both ends.
    if line.starts_with('|') && line.ends_with('|') && parts.len() >= 2 {
        parts.remove(0);
        parts.pop();
    }

    if parts.len() == field_count + 1 {
        let number = RECORD_NUMBER
            .captures(parts[0])
            .and_then(|caps| caps[1].parse::<usize>().ok())?;
        let values = parts[1..].iter().map(|v| v.to_string()).collect();
        return Some(GeneratedLabelSet::new(Some(number), values));
    }

    if parts.len() == field_count {
        let mut values: Vec<String> = parts.iter().map(|v| v.to_string()).collect();
        let mut number = None;
        if let Some(caps) = NUMBERED_VALUE.captures(parts[0]) {
            number = caps[1].parse::<usize>().ok();
            values[0] = caps[2].trim().to_string();
        }
        return Some(GeneratedLabelSet::new(number, values));
    }

    None
}

/// Every accepted line of a response, in order.
pub fn parse_response(text: &str, field_count: usize) -> Vec<GeneratedLabelSet> {
    text.lines()
        .filter_map(|line| parse_line(line, field_count))
        .collect()
}

/// Assign label sets to the `batch_len` records of a batch.
///
/// When every label set carries a record number, numbers decide the slot
/// (1-based; out-of-range and repeated numbers are dropped). Otherwise the
/// i-th label set goes to the i-th record. Surplus label sets are dropped.
pub fn align(labels: Vec<GeneratedLabelSet>, batch_len: usize) -> Vec<Option<GeneratedLabelSet>> {
    let mut slots: Vec<Option<GeneratedLabelSet>> = vec![None; batch_len];

    let numbered = !labels.is_empty() && labels.iter().all(|l| l.record_number.is_some());
    if numbered {
        for label in labels {
            let Some(number) = label.record_number else {
                continue;
            };
            match number.checked_sub(1).and_then(|idx| slots.get_mut(idx)) {
                Some(slot) if slot.is_none() => *slot = Some(label),
                Some(_) => debug!("Dropping repeated answer for record {}", number),
                None => debug!("Dropping answer for unknown record {}", number),
            }
        }
    } else {
        for (slot, label) in slots.iter_mut().zip(labels) {
            *slot = Some(label);
        }
    }

    slots
}
