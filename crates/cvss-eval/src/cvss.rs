//! CVSS v3.1 base score and vector string.
//!
//! Used to derive `Generated Score` and `Generated Vector String` from the
//! eight predicted base metrics.

use crate::types::Metric;

/// Prefix of every v3.1 vector string.
pub const VECTOR_PREFIX: &str = "CVSS:3.1";

/// The eight base metrics in canonical form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BaseMetrics {
    pub attack_vector: &'static str,
    pub attack_complexity: &'static str,
    pub privileges_required: &'static str,
    pub user_interaction: &'static str,
    pub scope: &'static str,
    pub confidentiality: &'static str,
    pub integrity: &'static str,
    pub availability: &'static str,
}

impl BaseMetrics {
    /// Canonicalize each value through `lookup`. Returns `None` when any
    /// metric is missing or outside its allowed set.
    pub fn from_lookup<'a, F>(mut lookup: F) -> Option<Self>
    where
        F: FnMut(Metric) -> Option<&'a str>,
    {
        let mut get = |metric: Metric| lookup(metric).and_then(|raw| metric.canonicalize(raw));
        Some(Self {
            attack_vector: get(Metric::AttackVector)?,
            attack_complexity: get(Metric::AttackComplexity)?,
            privileges_required: get(Metric::PrivilegesRequired)?,
            user_interaction: get(Metric::UserInteraction)?,
            scope: get(Metric::Scope)?,
            confidentiality: get(Metric::ConfidentialityImpact)?,
            integrity: get(Metric::IntegrityImpact)?,
            availability: get(Metric::AvailabilityImpact)?,
        })
    }

    fn scope_changed(&self) -> bool {
        self.scope == "CHANGED"
    }

    /// `CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H` form.
    pub fn vector_string(&self) -> String {
        format!(
            "{}/AV:{}/AC:{}/PR:{}/UI:{}/S:{}/C:{}/I:{}/A:{}",
            VECTOR_PREFIX,
            abbreviate(self.attack_vector),
            abbreviate(self.attack_complexity),
            abbreviate(self.privileges_required),
            abbreviate(self.user_interaction),
            abbreviate(self.scope),
            abbreviate(self.confidentiality),
            abbreviate(self.integrity),
            abbreviate(self.availability),
        )
    }

    /// Base score, rounded up to one decimal.
    pub fn base_score(&self) -> f64 {
        let changed = self.scope_changed();

        let iss = 1.0
            - (1.0 - impact_weight(self.confidentiality))
                * (1.0 - impact_weight(self.integrity))
                * (1.0 - impact_weight(self.availability));

        let impact = if changed {
            7.52 * (iss - 0.029) - 3.25 * (iss - 0.02).powi(15)
        } else {
            6.42 * iss
        };

        let exploitability = 8.22
            * attack_vector_weight(self.attack_vector)
            * attack_complexity_weight(self.attack_complexity)
            * privileges_weight(self.privileges_required, changed)
            * user_interaction_weight(self.user_interaction);

        if impact <= 0.0 {
            return 0.0;
        }

        if changed {
            roundup(f64::min(1.08 * (impact + exploitability), 10.0))
        } else {
            roundup(f64::min(impact + exploitability, 10.0))
        }
    }
}

/// Round up to one decimal, tolerant of floating-point noise.
pub fn roundup(value: f64) -> f64 {
    let int_input = (value * 100_000.0).round() as i64;
    if int_input % 10_000 == 0 {
        int_input as f64 / 100_000.0
    } else {
        ((int_input / 10_000) + 1) as f64 / 10.0
    }
}

fn abbreviate(value: &str) -> &'static str {
    match value {
        "NETWORK" => "N",
        "ADJACENT_NETWORK" => "A",
        "LOCAL" => "L",
        "PHYSICAL" => "P",
        "LOW" => "L",
        "HIGH" => "H",
        "NONE" => "N",
        "REQUIRED" => "R",
        "UNCHANGED" => "U",
        "CHANGED" => "C",
        _ => "X",
    }
}

fn attack_vector_weight(value: &str) -> f64 {
    match value {
        "NETWORK" => 0.85,
        "ADJACENT_NETWORK" => 0.62,
        "LOCAL" => 0.55,
        _ => 0.2,
    }
}

fn attack_complexity_weight(value: &str) -> f64 {
    match value {
        "LOW" => 0.77,
        _ => 0.44,
    }
}

fn privileges_weight(value: &str, scope_changed: bool) -> f64 {
    match (value, scope_changed) {
        ("NONE", _) => 0.85,
        ("LOW", false) => 0.62,
        ("LOW", true) => 0.68,
        (_, false) => 0.27,
        (_, true) => 0.5,
    }
}

fn user_interaction_weight(value: &str) -> f64 {
    match value {
        "NONE" => 0.85,
        _ => 0.62,
    }
}

fn impact_weight(value: &str) -> f64 {
    match value {
        "HIGH" => 0.56,
        "LOW" => 0.22,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn metrics(values: [&'static str; 8]) -> BaseMetrics {
        let map: HashMap<Metric, &str> = Metric::BASE.iter().copied().zip(values).collect();
        BaseMetrics::from_lookup(|metric| map.get(&metric).copied()).unwrap()
    }

    #[test]
    fn test_critical_network_vector() {
        // AC, AV, PR, UI, S, C, I, A
        let m = metrics(["LOW", "NETWORK", "NONE", "NONE", "UNCHANGED", "HIGH", "HIGH", "HIGH"]);
        assert_eq!(m.base_score(), 9.8);
        assert_eq!(
            m.vector_string(),
            "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H"
        );
    }

    #[test]
    fn test_scope_changed_xss_vector() {
        let m = metrics(["LOW", "NETWORK", "NONE", "REQUIRED", "CHANGED", "LOW", "LOW", "NONE"]);
        assert_eq!(m.base_score(), 6.1);
        assert_eq!(
            m.vector_string(),
            "CVSS:3.1/AV:N/AC:L/PR:N/UI:R/S:C/C:L/I:L/A:N"
        );
    }

    #[test]
    fn test_physical_low_privileges() {
        let m = metrics(["LOW", "PHYSICAL", "LOW", "NONE", "UNCHANGED", "HIGH", "HIGH", "HIGH"]);
        assert_eq!(m.base_score(), 6.6);
    }

    #[test]
    fn test_adjacent_high_complexity() {
        let m = metrics([
            "HIGH",
            "ADJACENT_NETWORK",
            "NONE",
            "NONE",
            "UNCHANGED",
            "HIGH",
            "HIGH",
            "HIGH",
        ]);
        assert_eq!(m.base_score(), 7.5);
        assert!(m.vector_string().contains("AV:A/AC:H"));
    }

    #[test]
    fn test_no_impact_scores_zero() {
        let m = metrics(["LOW", "NETWORK", "NONE", "NONE", "UNCHANGED", "NONE", "NONE", "NONE"]);
        assert_eq!(m.base_score(), 0.0);
    }

    #[test]
    fn test_from_lookup_rejects_non_canonical_values() {
        let result = BaseMetrics::from_lookup(|metric| match metric {
            Metric::AttackVector => Some("ADJACENT"),
            _ => Some("LOW"),
        });
        assert!(result.is_none());

        let result = BaseMetrics::from_lookup(|_| None);
        assert!(result.is_none());
    }

    #[test]
    fn test_from_lookup_normalizes_case() {
        let m = metrics(["low", "network ", "none", "none", "unchanged", "high", "high", "high"]);
        assert_eq!(m.attack_vector, "NETWORK");
        assert_eq!(m.base_score(), 9.8);
    }

    #[test]
    fn test_roundup() {
        assert_eq!(roundup(4.0), 4.0);
        assert_eq!(roundup(4.02), 4.1);
        assert_eq!(roundup(4.000_000_1), 4.0);
    }
}
