//! Cumulative displacement per entity

use std::collections::BTreeMap;

use serde::ser::{Serialize, Serializer};

use crate::geometry::{round_centi, Vec3};

use super::error::SolverError;

/// Translation applied to each entity since the relaxation loop started.
///
/// Serialises as `{"name": [dx, dy, dz]}` with sorted keys and components
/// rounded to two decimals.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DisplacementLedger {
    entries: BTreeMap<String, Vec3>,
}

impl DisplacementLedger {
    /// Ledger with a zero entry for every name
    pub fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            entries: names
                .into_iter()
                .map(|n| (n.to_string(), Vec3::ZERO))
                .collect(),
        }
    }

    pub fn record(&mut self, name: &str, step: Vec3) {
        *self.entries.entry(name.to_string()).or_insert(Vec3::ZERO) += step;
    }

    pub fn get(&self, name: &str) -> Option<Vec3> {
        self.entries.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Vec3)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Components rounded to two decimals
    pub fn rounded(&self) -> BTreeMap<String, [f64; 3]> {
        self.entries
            .iter()
            .map(|(k, v)| (k.clone(), v.to_array().map(rounded_component)))
            .collect()
    }

    pub fn to_json(&self) -> Result<String, SolverError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, SolverError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Round, folding `-0.0` into `0.0`
fn rounded_component(v: f64) -> f64 {
    let r = round_centi(v);
    if r == 0.0 {
        0.0
    } else {
        r
    }
}

impl Serialize for DisplacementLedger {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(
            self.entries
                .iter()
                .map(|(k, v)| (k, v.to_array().map(rounded_component))),
        )
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_record_accumulates() {
        let mut ledger = DisplacementLedger::new(["sofa", "table"]);
        ledger.record("table", Vec3::new(0.1, 0.0, -0.2));
        ledger.record("table", Vec3::new(0.05, 0.0, 0.0));
        let t = ledger.get("table").unwrap();
        assert!((t.x - 0.15).abs() < 1e-12);
        assert_eq!(ledger.get("sofa"), Some(Vec3::ZERO));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_json_is_sorted_and_rounded() {
        let mut ledger = DisplacementLedger::new(["sofa", "armchair"]);
        ledger.record("sofa", Vec3::new(0.123, 0.0, -0.004));
        assert_eq!(
            ledger.to_json().unwrap(),
            r#"{"armchair":[0.0,0.0,0.0],"sofa":[0.12,0.0,0.0]}"#
        );
    }
}
