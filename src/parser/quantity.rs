use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

/// Mantissa, then either `x 10^B` / `* 10^B` (the `10^` marker may repeat,
/// the last exponent wins) or a plain `eN` suffix.
const NUMBER: &str =
    r"([+-]?\d*\.?\d+)(?:\s*[x*×]\s*(?:10\s*\^\s*)+([+-]?\d+)|[eE]([+-]?\d+))?";

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(&format!("(?i){NUMBER}")).unwrap());
static YEARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i){NUMBER}\s*years")).unwrap());
static CHUNK_SPLIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\s*=\s*|\s+by\s+").unwrap());

static PAREN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\([^)]*\)").unwrap());
static PER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\s+per\s+").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Verbose unit spellings and their short forms. Applied in order, first
/// occurrence only; anything unmatched is kept as written.
static UNIT_SYNONYMS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        (r"(?i)\bmegatons?(?:\s+TNT)?\b", "megatons"),
        (r"(?i)\bjoules?\b", "J"),
        (r"(?i)\bmeters?\b", "m"),
        (r"(?i)\bkilometers?\b", "km"),
        (r"(?i)\bmiles?\b", "miles"),
        (r"(?i)\bfeet\b", "ft"),
        (r"(?i)\byears?\b", "years"),
        (r"(?i)\bkm\s*/\s*s(?:ec(?:ond)?s?)?\b", "km/s"),
        (r"(?i)\bmiles\s*/\s*s(?:ec(?:ond)?s?)?\b", "miles/s"),
        (r"(?i)\bkm\^?3\b", "km3"),
        (r"(?i)\b(?:miles|mi)\^?3\b", "mi3"),
        (r"(?i)\bkg\s*/\s*m\^?3\b", "kg/m3"),
    ]
    .into_iter()
    .map(|(pattern, short)| (Regex::new(pattern).unwrap(), short))
    .collect()
});

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuantityPair {
    pub value: f64,
    pub unit: Option<String>,
}

impl QuantityPair {
    pub fn unit_contains(&self, needle: &str) -> bool {
        self.unit.as_deref().is_some_and(|u| u.contains(needle))
    }
}

/// All `(value, unit)` pairs in a cleaned text line, left to right.
///
/// The line is split into chunks on `=` and `by`; each chunk contributes at
/// most one pair (its first number, with the rest of the chunk as the unit).
/// A line with no numbers gives an empty list.
pub fn extract_pairs(line: &str) -> Vec<QuantityPair> {
    let line = strip_thousands(line);

    let mut pairs: Vec<QuantityPair> = CHUNK_SPLIT_RE
        .split(&line)
        .map(str::trim)
        .filter(|chunk| !chunk.is_empty())
        .filter_map(chunk_pair)
        .collect();

    if pairs.is_empty() {
        if let Some(value) = find_years(&line) {
            pairs.push(QuantityPair {
                value,
                unit: Some("years".into()),
            });
        }
    }

    pairs
}

/// The first `<number> years` occurrence in a line.
pub fn find_years(line: &str) -> Option<f64> {
    let line = strip_thousands(line);
    YEARS_RE.captures(&line).and_then(|caps| number_value(&caps))
}

fn chunk_pair(chunk: &str) -> Option<QuantityPair> {
    let caps = NUMBER_RE.captures(chunk)?;
    let value = number_value(&caps)?;
    let rest = &chunk[caps.get(0)?.end()..];
    Some(QuantityPair {
        value,
        unit: normalize_unit(rest),
    })
}

fn number_value(caps: &regex::Captures) -> Option<f64> {
    let mantissa = caps.get(1)?.as_str();
    let exponent = caps.get(2).or_else(|| caps.get(3)).map(|m| m.as_str());
    let literal = match exponent {
        Some(exp) => format!("{mantissa}e{exp}"),
        None => mantissa.to_string(),
    };
    literal.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Canonical unit text, or `None` when nothing is left after cleanup.
pub fn normalize_unit(raw: &str) -> Option<String> {
    let without_asides = PAREN_RE.replace_all(raw, "");
    // an aside cut in half by an `=` split leaves a dangling bracket
    let without_asides = without_asides.replace(['(', ')'], " ");
    let slashed = PER_RE.replace_all(&without_asides, "/");
    let mut unit = WS_RE.replace_all(&slashed, " ").trim().to_string();

    for (re, short) in UNIT_SYNONYMS.iter() {
        unit = re.replace(&unit, *short).into_owned();
    }

    // sentence punctuation trailing the last quantity on a line
    let unit = unit.trim_end_matches(|c: char| c == '.' || c == ',' || c.is_whitespace());
    let unit = unit.trim().to_string();
    if unit.is_empty() {
        None
    } else {
        Some(unit)
    }
}

/// Remove commas used as thousands separators (a comma between digits).
fn strip_thousands(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len());
    for (i, &c) in chars.iter().enumerate() {
        let between_digits = c == ','
            && i > 0
            && chars[i - 1].is_ascii_digit()
            && chars.get(i + 1).is_some_and(|n| n.is_ascii_digit());
        if !between_digits {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(s: &str) -> Option<f64> {
        extract_pairs(s).first().map(|p| p.value)
    }

    fn pair(value: f64, unit: &str) -> QuantityPair {
        QuantityPair {
            value,
            unit: Some(unit.to_string()),
        }
    }

    #[test]
    fn scientific_with_x() {
        let pairs = extract_pairs("Energy before atmospheric entry: 3.14 x 10^20 Joules");
        assert_eq!(pairs, vec![pair(3.14e20, "J")]);
    }

    #[test]
    fn scientific_whitespace_variants() {
        for s in [
            "3.14 x 10^20",
            "3.14x10^20",
            "3.14 X 10 ^ 20",
            "3.14 * 10^20",
            "3.14*10^20",
            "3.14 *  10 ^20",
        ] {
            assert_eq!(extract_pairs(s), vec![QuantityPair { value: 3.14e20, unit: None }], "{s}");
        }
        assert_eq!(value("-2.5 x 10^-3"), Some(-2.5e-3));
        assert_eq!(value("7 * 10^+4"), Some(7e4));
    }

    #[test]
    fn repeated_exponent_marker_takes_last() {
        assert_eq!(value("1.5 * 10^ 10^7"), Some(1.5e7));
        assert_eq!(value("1.5 x 10^10^7"), Some(1.5e7));
    }

    #[test]
    fn plain_and_e_suffix() {
        assert_eq!(value("722"), Some(722.0));
        assert_eq!(value("2.04e+06 Pa"), Some(2.04e6));
        assert_eq!(value("-0.5"), Some(-0.5));
        assert_eq!(value("186,000"), Some(186000.0));
        assert_eq!(value("twelve"), None);
    }

    #[test]
    fn alternate_units() {
        let pairs = extract_pairs("Energy before atmospheric entry: 3.14 x 10^20 Joules = 7.50 x 10^4 MegaTons TNT");
        assert_eq!(pairs, vec![pair(3.14e20, "J"), pair(7.50e4, "megatons")]);

        let pairs = extract_pairs("56600 meters = 186000 ft");
        assert_eq!(pairs, vec![pair(56600.0, "m"), pair(186000.0, "ft")]);
    }

    #[test]
    fn rate_units() {
        let pairs = extract_pairs("The mass of projectile strikes the surface at velocity 19.8 km/s = 12.3 miles/s");
        assert_eq!(pairs, vec![pair(19.8, "km/s"), pair(12.3, "miles/s")]);

        let pairs = extract_pairs("Impact Velocity: 20.00 km per second ( = 12.40 miles per second )");
        assert_eq!(pairs, vec![pair(20.0, "km/s"), pair(12.40, "miles/s")]);
    }

    #[test]
    fn dimension_pair() {
        let pairs = extract_pairs("Crater forms an ellipse of dimension 2.56 km by 1.28 km");
        assert_eq!(pairs, vec![pair(2.56, "km"), pair(1.28, "km")]);
    }

    #[test]
    fn volume_and_density_units() {
        let pairs = extract_pairs("The volume of the target melted or vaporized is 27.8 km^3 = 6.67 miles^3");
        assert_eq!(pairs, vec![pair(27.8, "km3"), pair(6.67, "mi3")]);

        assert_eq!(extract_pairs("3000 kg/m^3"), vec![pair(3000.0, "kg/m3")]);
    }

    #[test]
    fn parenthetical_asides_dropped() {
        let pairs = extract_pairs("Transient Crater Diameter: 16.5 km ( = 10.2 miles )");
        assert_eq!(pairs, vec![pair(16.5, "km"), pair(10.2, "miles")]);

        let pairs = extract_pairs("Richter Scale Magnitude: 8.3 (This is greater than any earthquake in recorded history)");
        assert_eq!(
            pairs,
            vec![QuantityPair {
                value: 8.3,
                unit: None
            }]
        );
    }

    #[test]
    fn trailing_sentence_punctuation_dropped() {
        let pairs = extract_pairs("Transient Crater Depth: 5.73 km ( = 3.56 miles ).");
        assert_eq!(pairs, vec![pair(5.73, "km"), pair(3.56, "miles")]);
        assert_eq!(normalize_unit("meters,").as_deref(), Some("m"));
    }

    #[test]
    fn unknown_units_kept_verbatim() {
        assert_eq!(extract_pairs("Sound Intensity: 126 dB"), vec![pair(126.0, "dB")]);
        assert_eq!(extract_pairs("3 Gt"), vec![pair(3.0, "Gt")]);
    }

    #[test]
    fn thousands_separators() {
        assert_eq!(
            extract_pairs("56,600 meters = 186,000 ft"),
            vec![pair(56600.0, "m"), pair(186000.0, "ft")]
        );
    }

    #[test]
    fn years_fallback() {
        assert_eq!(extract_pairs("6.2 x 10^5years"), vec![pair(6.2e5, "years")]);
        assert_eq!(
            find_years("during the last 4 billion years is 1.7 x 10^5 years"),
            Some(1.7e5)
        );
    }

    #[test]
    fn no_digits_no_pairs() {
        for line in [
            "",
            "The crater formed is a complex crater.",
            "What does this mean?",
            "by = per x ^",
        ] {
            assert!(extract_pairs(line).is_empty(), "{line}");
        }
    }
}
