use std::sync::LazyLock;

use super::{fragment_ellipse, Rule};

pub const TITLE: &str = "Crater Dimensions";

pub static RULES: LazyLock<Vec<Rule>> = LazyLock::new(|| {
    vec![
        Rule::pairs(r"transient crater.*diameter", "transient_crater_diameter"),
        Rule::pairs(r"transient crater depth", "transient_crater_depth"),
        Rule::pairs(r"final crater.*diameter", "final_crater_diameter"),
        Rule::pairs(r"final crater depth", "final_crater_depth"),
        Rule::pairs(r"volume of the target melted or vaporized", "melt_volume"),
        Rule::pairs(r"average thickness", "avg_melt_thickness"),
        Rule::custom(r"ellipse of dimension", fragment_ellipse),
    ]
});
