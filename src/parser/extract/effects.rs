//! Rule tables for the secondary-effects sections of the report: thermal
//! radiation, seismic shaking, ejecta and the air blast.
//!
//! Arrival-time sentences end in prose ("seconds after impact."), so those
//! rules keep only the value and write a fixed `_s` key.

use std::sync::LazyLock;

use super::{number, seconds_entry, Entries, Rule};
use crate::parser::quantity::QuantityPair;

pub const THERMAL_TITLE: &str = "Thermal Radiation";
pub const SEISMIC_TITLE: &str = "Seismic Effects";
pub const EJECTA_TITLE: &str = "Ejecta";
pub const AIR_BLAST_TITLE: &str = "Air Blast";

pub static THERMAL_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::custom(r"time for maximum radiation", |_, pairs| {
            seconds_entry("time_max_radiation_s", pairs)
        }),
        Rule::pairs(r"visible fireball radius", "fireball_radius"),
    ]
});

pub static SEISMIC_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::custom(r"seismic shaking will arrive", |_, pairs| {
            seconds_entry("seismic_arrival_s", pairs)
        }),
        Rule::custom(r"richter scale magnitude", richter_magnitude),
    ]
});

pub static EJECTA_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::custom(r"ejecta will arrive", |_, pairs| {
            seconds_entry("ejecta_arrival_s", pairs)
        }),
        Rule::pairs(r"average ejecta thickness", "ejecta_thickness"),
        Rule::pairs(r"mean fragment diameter", "ejecta_fragment_diameter"),
    ]
});

pub static AIR_BLAST_RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::custom(r"air blast will arrive", |_, pairs| {
            seconds_entry("air_blast_arrival_s", pairs)
        }),
        Rule::pairs(r"peak overpressure", "peak_overpressure"),
        Rule::pairs(r"max(?:imum)? wind velocity", "max_wind_velocity"),
        Rule::pairs(r"sound intensity", "sound_intensity"),
    ]
});

/// Magnitude is unitless; only the first number counts.
fn richter_magnitude(_line: &str, pairs: &[QuantityPair]) -> Entries {
    pairs
        .first()
        .map(|p| vec![number("richter_magnitude".to_string(), p.value)])
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::extract::flatten_section;
    use crate::parser::sections::{Item, Section};

    fn section(title: &str, lines: &[&str]) -> Section {
        Section {
            title: title.to_string(),
            items: lines.iter().map(|l| Item::Line(l.to_string())).collect(),
        }
    }

    fn keys(title: &str, lines: &[&str]) -> Vec<(String, Option<f64>)> {
        flatten_section(&section(title, lines))
            .into_iter()
            .map(|(k, v)| (k, v.as_f64()))
            .collect()
    }

    #[test]
    fn ejecta_lines() {
        let got = keys(
            EJECTA_TITLE,
            &[
                "The ejecta will arrive approximately 44.2 seconds after the impact.",
                "Average Ejecta Thickness: 2.33 cm ( = 0.917 inches )",
                "Mean Fragment Diameter: 1.04 cm ( = 0.409 inches )",
            ],
        );
        assert_eq!(
            got,
            vec![
                ("ejecta_arrival_s".to_string(), Some(44.2)),
                ("ejecta_thickness_1_cm".to_string(), Some(2.33)),
                ("ejecta_thickness_2_inches".to_string(), Some(0.917)),
                ("ejecta_fragment_diameter_1_cm".to_string(), Some(1.04)),
                ("ejecta_fragment_diameter_2_inches".to_string(), Some(0.409)),
            ]
        );
    }

    #[test]
    fn arrival_without_seconds_is_absent() {
        assert!(keys(AIR_BLAST_TITLE, &["The air blast will arrive shortly."]).is_empty());
        assert!(keys(AIR_BLAST_TITLE, &["The air blast will arrive in 3 minutes."]).is_empty());
    }

    #[test]
    fn richter_takes_first_number() {
        let got = keys(
            SEISMIC_TITLE,
            &["Richter Scale Magnitude: 6.4 = 7 by 8"],
        );
        assert_eq!(got, vec![("richter_magnitude".to_string(), Some(6.4))]);
    }
}
