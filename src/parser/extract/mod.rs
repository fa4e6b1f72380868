pub mod crater;
pub mod effects;
pub mod energy;
pub mod entry;
pub mod inputs;

use std::collections::BTreeMap;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::quantity::{extract_pairs, QuantityPair};
use super::sections::{Report, Section};

/// A flattened value: a number for extracted quantities, the raw text for
/// "Your Inputs" entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FlatValue {
    Number(f64),
    Text(String),
}

impl FlatValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FlatValue::Number(n) => Some(*n),
            FlatValue::Text(_) => None,
        }
    }
}

/// Normalized key → value. Sorted so serialized output is stable.
pub type FlatRecord = BTreeMap<String, FlatValue>;

/// Entries produced by one rule hit, in write order.
pub type Entries = Vec<(String, FlatValue)>;

pub enum Action {
    /// Write every pair on the line under this base key.
    Pairs(&'static str),
    Custom(fn(&str, &[QuantityPair]) -> Entries),
}

pub struct Rule {
    pattern: Regex,
    action: Action,
}

impl Rule {
    pub fn pairs(pattern: &str, base: &'static str) -> Self {
        Self::new(pattern, Action::Pairs(base))
    }

    pub fn custom(pattern: &str, handler: fn(&str, &[QuantityPair]) -> Entries) -> Self {
        Self::new(pattern, Action::Custom(handler))
    }

    fn new(pattern: &str, action: Action) -> Self {
        Self {
            pattern: Regex::new(&format!("(?i){pattern}")).unwrap(),
            action,
        }
    }

    fn apply(&self, line: &str) -> Entries {
        let pairs = extract_pairs(line);
        match self.action {
            Action::Pairs(base) => pair_entries(base, &pairs),
            Action::Custom(handler) => handler(line, &pairs),
        }
    }
}

/// Rule table for a section title; `None` means the section is passed
/// through without flattening.
fn rules_for(title: &str) -> Option<&'static [Rule]> {
    match title {
        energy::TITLE => Some(energy::RULES.as_slice()),
        entry::TITLE => Some(entry::RULES.as_slice()),
        crater::TITLE => Some(crater::RULES.as_slice()),
        effects::THERMAL_TITLE => Some(effects::THERMAL_RULES.as_slice()),
        effects::SEISMIC_TITLE => Some(effects::SEISMIC_RULES.as_slice()),
        effects::EJECTA_TITLE => Some(effects::EJECTA_RULES.as_slice()),
        effects::AIR_BLAST_TITLE => Some(effects::AIR_BLAST_RULES.as_slice()),
        _ => None,
    }
}

/// Project a decomposed report into one flat record. Later writes to the
/// same key replace earlier ones.
pub fn flatten(report: &Report) -> FlatRecord {
    let mut record = FlatRecord::new();
    for section in &report.sections {
        record.extend(flatten_section(section));
    }
    record
}

pub fn flatten_section(section: &Section) -> Entries {
    if section.title == inputs::TITLE {
        return inputs::extract(section);
    }

    let Some(rules) = rules_for(&section.title) else {
        debug!(title = %section.title, "no rule table, section passed through");
        return Vec::new();
    };
    scan(section, rules)
}

/// First matching rule wins for each line; unmatched lines are dropped.
fn scan(section: &Section, rules: &[Rule]) -> Entries {
    let mut entries = Vec::new();
    for line in section.lines() {
        let Some(rule) = rules.iter().find(|r| r.pattern.is_match(line)) else {
            continue;
        };
        let hits = rule.apply(line);
        if hits.is_empty() {
            debug!(section = %section.title, line, "rule matched but nothing extracted");
        } else {
            debug!(section = %section.title, keys = hits.len(), "rule hit");
        }
        entries.extend(hits);
    }
    entries
}

/// One pair → `base_<unit>`; several → `base_1_<unit>`, `base_2_<unit>`, ...
pub fn pair_entries(base: &str, pairs: &[QuantityPair]) -> Entries {
    match pairs {
        [] => Vec::new(),
        [single] => vec![number(pair_key(base, None, single.unit.as_deref()), single.value)],
        many => many
            .iter()
            .enumerate()
            .map(|(i, p)| number(pair_key(base, Some(i + 1), p.unit.as_deref()), p.value))
            .collect(),
    }
}

pub fn pair_key(base: &str, idx: Option<usize>, unit: Option<&str>) -> String {
    let mut key = base.to_string();
    if let Some(i) = idx {
        key.push_str(&format!("_{i}"));
    }
    let suffix = unit.map(unit_suffix).unwrap_or_default();
    if !suffix.is_empty() {
        key.push('_');
        key.push_str(&suffix);
    }
    key
}

/// `km/s` → `km_per_s`, `MegaTons TNT` → `megatons_tnt`, `ft .` → `ft`.
fn unit_suffix(unit: &str) -> String {
    unit.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '/')
        .collect::<String>()
        .trim_matches('_')
        .replace('/', "_per_")
}

pub fn number(key: String, value: f64) -> (String, FlatValue) {
    (key, FlatValue::Number(value))
}

/// Ellipse of scattered fragments: the first two `km` pairs, as the major
/// and minor axis.
pub(crate) fn fragment_ellipse(_line: &str, pairs: &[QuantityPair]) -> Entries {
    pairs
        .iter()
        .filter(|p| p.unit.as_deref().is_some_and(|u| u.eq_ignore_ascii_case("km")))
        .zip(["fragment_ellipse_km_a", "fragment_ellipse_km_b"])
        .map(|(p, key)| number(key.to_string(), p.value))
        .collect()
}

/// First pair measured in seconds, written as `<key>` (already suffixed).
pub(crate) fn seconds_entry(key: &str, pairs: &[QuantityPair]) -> Entries {
    pairs
        .iter()
        .find(|p| {
            p.unit
                .as_deref()
                .is_some_and(|u| u.to_lowercase().starts_with("second"))
        })
        .map(|p| vec![number(key.to_string(), p.value)])
        .unwrap_or_default()
}

// ── Tests ──
