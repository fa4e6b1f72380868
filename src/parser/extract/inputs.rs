use std::sync::LazyLock;

use regex::Regex;

use super::{Entries, FlatValue};
use crate::parser::sections::Section;

pub const TITLE: &str = "Your Inputs";

static NON_WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^0-9a-z_]+").unwrap());

/// `Key: value` lines become `input_<key>` → value, text left untouched.
pub fn extract(section: &Section) -> Entries {
    section
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once(':')?;
            let key = normalize_key(key);
            if key.is_empty() {
                return None;
            }
            Some((
                format!("input_{key}"),
                FlatValue::Text(value.trim().to_string()),
            ))
        })
        .collect()
}

fn normalize_key(key: &str) -> String {
    let lower = key.trim().to_lowercase();
    NON_WORD_RE
        .replace_all(&lower, "_")
        .trim_matches('_')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::sections::Item;

    fn inputs(lines: &[&str]) -> Section {
        Section {
            title: TITLE.to_string(),
            items: lines.iter().map(|l| Item::Line(l.to_string())).collect(),
        }
    }

    #[test]
    fn key_value_lines() {
        let entries = extract(&inputs(&[
            "Projectile diameter: 1000 m",
            "Impact Velocity: 20.00 km per second ( = 12.40 miles per second )",
        ]));
        assert_eq!(
            entries,
            vec![
                (
                    "input_projectile_diameter".to_string(),
                    FlatValue::Text("1000 m".into())
                ),
                (
                    "input_impact_velocity".to_string(),
                    FlatValue::Text("20.00 km per second ( = 12.40 miles per second )".into())
                ),
            ]
        );
    }

    #[test]
    fn only_first_colon_splits() {
        let entries = extract(&inputs(&["Target Type: rock: crystalline"]));
        assert_eq!(entries[0].0, "input_target_type");
        assert_eq!(entries[0].1, FlatValue::Text("rock: crystalline".into()));
    }

    #[test]
    fn odd_keys() {
        assert_eq!(normalize_key("  (Projectile) Density --  "), "projectile_density");
        let entries = extract(&inputs(&["no colon here", ": value without key", "??: x"]));
        assert!(entries.is_empty());
    }

    #[test]
    fn bullets_are_ignored() {
        let section = Section {
            title: TITLE.to_string(),
            items: vec![Item::Bullets {
                bullets: vec!["Hidden: 1".into()],
            }],
        };
        assert!(extract(&section).is_empty());
    }
}
