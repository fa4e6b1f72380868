use std::sync::LazyLock;

use regex::Regex;
use scraper::Html;

static SUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<sup\b[^>]*>(.*?)</sup\s*>").unwrap());
static NBSP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)&nbsp;|&#160;|&#x0*a0;").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Turn an HTML fragment into plain text: `<sup>20</sup>` becomes `^20`,
/// `&nbsp;` becomes a space, tags are dropped and whitespace is collapsed.
pub fn clean_fragment(fragment: &str) -> String {
    if fragment.trim().is_empty() {
        return String::new();
    }

    let with_carets = SUP_RE.replace_all(fragment, "^${1}");
    let spaced = NBSP_RE.replace_all(&with_carets, " ");

    let parsed = Html::parse_fragment(&spaced);
    let text: String = parsed.root_element().text().collect();
    collapse_whitespace(&text)
}

/// Collapse runs of whitespace (including newlines and U+00A0) to one space.
pub fn collapse_whitespace(s: &str) -> String {
    WS_RE.replace_all(s, " ").trim().to_string()
}
