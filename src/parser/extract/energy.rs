use std::sync::LazyLock;

use super::{number, pair_key, Entries, Rule};
use crate::parser::quantity::{find_years, QuantityPair};

pub const TITLE: &str = "Energy";

pub static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::pairs(r"energy before atmospheric entry", "energy_before_entry"),
        Rule::custom(r"average interval between impacts", average_interval),
    ]
});

/// The interval sentence also mentions the observation window ("the last
/// 4 billion years"), so take the number written directly before `years`.
fn average_interval(line: &str, pairs: &[QuantityPair]) -> Entries {
    let years = find_years(line).or_else(|| {
        pairs
            .iter()
            .find(|p| p.unit_contains("years"))
            .map(|p| p.value)
    });
    years
        .map(|v| vec![number(pair_key("avg_interval", None, Some("years")), v)])
        .unwrap_or_default()
}
