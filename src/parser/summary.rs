use serde::Serialize;

use super::extract::FlatRecord;
use crate::fetch::Scenario;

/// Record shape consumed by the globe visualization. Values missing from
/// the flat record stay `null`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImpactSummary {
    pub energy_joules: Option<f64>,
    pub energy_megatons: Option<f64>,
    pub size_meters: f64,
    pub crater_diameter_meters: Option<f64>,
    pub target_city: Option<String>,
}

impl ImpactSummary {
    pub fn from_record(record: &FlatRecord, scenario: &Scenario, target_city: Option<String>) -> Self {
        Self {
            energy_joules: find(record, "energy_before_entry", "_j"),
            energy_megatons: find(record, "energy_before_entry", "_megatons"),
            size_meters: scenario.diam,
            crater_diameter_meters: crater_diameter_m(record),
            target_city,
        }
    }
}

/// First numeric value whose key has this prefix and unit suffix.
fn find(record: &FlatRecord, prefix: &str, suffix: &str) -> Option<f64> {
    record
        .iter()
        .filter(|(k, _)| k.starts_with(prefix) && k.ends_with(suffix))
        .find_map(|(_, v)| v.as_f64())
}

fn crater_diameter_m(record: &FlatRecord) -> Option<f64> {
    find(record, "final_crater_diameter", "_m")
        .or_else(|| find(record, "final_crater_diameter", "_km").map(|km| km * 1000.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::extract::FlatValue;

    fn record(entries: &[(&str, f64)]) -> FlatRecord {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), FlatValue::Number(*v)))
            .collect()
    }

    #[test]
    fn summary_from_full_record() {
        let r = record(&[
            ("energy_before_entry_1_j", 3.14e20),
            ("energy_before_entry_2_megatons", 7.5e4),
            ("final_crater_diameter_1_km", 21.7),
            ("final_crater_diameter_2_miles", 13.5),
        ]);
        let s = ImpactSummary::from_record(&r, &Scenario::default(), Some("Paris".into()));
        assert_eq!(s.energy_joules, Some(3.14e20));
        assert_eq!(s.energy_megatons, Some(7.5e4));
        assert_eq!(s.size_meters, 1000.0);
        assert_eq!(s.crater_diameter_meters, Some(21700.0));

        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["energyJoules"], 3.14e20);
        assert_eq!(json["targetCity"], "Paris");
    }

    #[test]
    fn missing_keys_become_none() {
        let s = ImpactSummary::from_record(&FlatRecord::new(), &Scenario::default(), None);
        assert_eq!(s.energy_joules, None);
        assert_eq!(s.crater_diameter_meters, None);
        assert!(serde_json::to_value(&s).unwrap()["energyJoules"].is_null());
    }

    #[test]
    fn crater_in_meters_preferred() {
        let r = record(&[("final_crater_diameter_m", 850.0)]);
        let s = ImpactSummary::from_record(&r, &Scenario::default(), None);
        assert_eq!(s.crater_diameter_meters, Some(850.0));
    }
}
