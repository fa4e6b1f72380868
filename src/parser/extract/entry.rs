use std::sync::LazyLock;

use super::{fragment_ellipse, Rule};

pub const TITLE: &str = "Atmospheric Entry";

// "energy lost" must precede "impact energy": both can appear in one sentence.
pub static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::pairs(r"begins to break.?up at an altitude", "breakup_altitude"),
        Rule::pairs(r"mass of projectile strikes .* velocity", "ground_velocity"),
        Rule::pairs(r"energy lost in the atmosphere", "energy_lost_atmosphere"),
        Rule::pairs(r"impact energy", "impact_energy"),
        Rule::custom(r"ellipse of dimension", fragment_ellipse),
    ]
});
