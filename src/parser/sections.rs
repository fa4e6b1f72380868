use std::sync::LazyLock;

use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use serde::Serialize;

use super::text::{clean_fragment, collapse_whitespace};
use crate::error::PipelineError;

static HEADING_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(
        "dl > dt > h1, dl > dt > h2, dl > dt > h3, dl > dt > h4, dl > dt > h5, dl > dt > h6",
    )
    .unwrap()
});
static BULLET_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("ul li").unwrap());
static NOTICE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("p").unwrap());
static TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("title").unwrap());
static BR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)<br\b[^>]*>").unwrap());
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[A-Za-z!/?]").unwrap());

/// Nested structures that never count as an entry's own text.
const NESTED_TAGS: &[&str] = &["ul", "dl"];
const BULLET_SKIP: &[&str] = &["ul", "ol", "dl"];
/// Elements whose boundaries separate words.
const BLOCK_TAGS: &[&str] = &["div", "p", "ol", "table", "tr", "td", "th", "blockquote"];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Item {
    Line(String),
    Bullets { bullets: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    pub title: String,
    pub items: Vec<Item>,
}

impl Section {
    /// Plain text lines, skipping bullet groups.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.items.iter().filter_map(|item| match item {
            Item::Line(line) => Some(line.as_str()),
            Item::Bullets { .. } => None,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub title: Option<String>,
    pub notice: Option<String>,
    pub sections: Vec<Section>,
}

impl Report {
    #[cfg(test)]
    pub fn section(&self, title: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.title == title)
    }
}

/// Split a report document into its `<dl>` sections.
///
/// Each `<dt>` heading names a section whose extent is the enclosing `<dl>`;
/// only the direct `<dd>` children of that list are read, so a nested list
/// becomes its own section rather than leaking into its parent.
pub fn decompose(html: &str) -> Result<Report, PipelineError> {
    if html.trim().is_empty() {
        return Err(PipelineError::MalformedDocument("empty body".into()));
    }
    if !TAG_RE.is_match(html) {
        return Err(PipelineError::MalformedDocument(
            "body contains no markup".into(),
        ));
    }

    let doc = Html::parse_document(html);

    let title = doc
        .select(&TITLE_SEL)
        .next()
        .map(|t| collapse_whitespace(&t.text().collect::<String>()))
        .filter(|t| !t.is_empty());
    let notice = doc
        .select(&NOTICE_SEL)
        .next()
        .map(|p| collapse_whitespace(&p.text().collect::<String>()))
        .filter(|t| !t.is_empty());

    let mut sections = Vec::new();
    for heading in doc.select(&HEADING_SEL) {
        let Some(dl) = heading
            .ancestors()
            .filter_map(ElementRef::wrap)
            .find(|e| e.value().name() == "dl")
        else {
            continue;
        };

        let raw_title = collapse_whitespace(&heading.text().collect::<String>());
        let title = raw_title.strip_suffix(':').unwrap_or(&raw_title).trim().to_string();

        let mut items = Vec::new();
        for dd in dl
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|e| e.value().name() == "dd")
        {
            let bullets = extract_bullets(dd);
            if !bullets.is_empty() {
                items.push(Item::Bullets { bullets });
            }
            items.extend(extract_lines(dd).into_iter().map(Item::Line));
        }

        sections.push(Section { title, items });
    }

    Ok(Report {
        title,
        notice,
        sections,
    })
}

/// Bullets from any `<ul>` inside this entry, excluding lists that belong to
/// a deeper `<dd>`. A bullet's text stops at any list nested inside it.
fn extract_bullets(dd: ElementRef) -> Vec<String> {
    dd.select(&BULLET_SEL)
        .filter(|li| {
            li.ancestors()
                .filter_map(ElementRef::wrap)
                .find(|e| e.value().name() == "dd")
                .is_some_and(|owner| owner.id() == dd.id())
        })
        .map(|li| {
            let mut markup = String::new();
            push_own_markup(li, BULLET_SKIP, &mut markup);
            clean_fragment(&BR_RE.replace_all(&markup, " "))
        })
        .filter(|t| !t.is_empty())
        .collect()
}

/// The entry's own text, one line per `<br>`-separated segment. Items of an
/// `<ol>` stay in the text as separate lines.
fn extract_lines(dd: ElementRef) -> Vec<String> {
    let mut markup = String::new();
    push_own_markup(dd, NESTED_TAGS, &mut markup);
    BR_RE
        .split(&markup)
        .map(clean_fragment)
        .filter(|t| !t.is_empty())
        .collect()
}

/// Rebuild `parent`'s content as minimal markup: text, `<br>` and `<sup>`
/// survive, any element named in `skip` is cut out at whatever depth it sits.
fn push_own_markup(parent: ElementRef, skip: &[&str], out: &mut String) {
    for child in parent.children() {
        match child.value() {
            Node::Text(t) => out.push_str(&escape_text(t)),
            Node::Element(e) => {
                let Some(el) = ElementRef::wrap(child) else {
                    continue;
                };
                let name = e.name();
                if skip.contains(&name) {
                    out.push(' ');
                } else if name == "br" || name == "li" {
                    out.push_str("<br>");
                    push_own_markup(el, skip, out);
                    out.push_str("<br>");
                } else if name == "sup" {
                    out.push_str("<sup>");
                    push_own_markup(el, skip, out);
                    out.push_str("</sup>");
                } else if BLOCK_TAGS.contains(&name) {
                    out.push(' ');
                    push_own_markup(el, skip, out);
                    out.push(' ');
                } else {
                    push_own_markup(el, skip, out);
                }
            }
            _ => {}
        }
    }
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;")
}

// ── Tests ──

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture() -> Report {
        let html = std::fs::read_to_string("tests/fixtures/impact_earth.html").unwrap();
        decompose(&html).unwrap()
    }

    fn lines(report: &Report, title: &str) -> Vec<String> {
        report
            .section(title)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn fixture_section_titles() {
        let report = fixture();
        let titles: Vec<&str> = report.sections.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Your Inputs",
                "Energy",
                "Atmospheric Entry",
                "Crater Dimensions",
                "Thermal Radiation",
                "Seismic Effects",
                "Nested Heading",
                "Ejecta",
                "Air Blast",
                "Tsunami Wave",
            ]
        );
    }

    #[test]
    fn title_and_notice() {
        let report = fixture();
        assert_eq!(report.title.as_deref(), Some("Impact Effects"));
        let notice = report.notice.unwrap();
        assert!(notice.starts_with("Please note: the results below"));
        assert!(!notice.contains('\n'));
    }

    #[test]
    fn br_splits_into_lines() {
        let report = fixture();
        let entry = lines(&report, "Atmospheric Entry");
        assert_eq!(entry.len(), 5);
        assert_eq!(
            entry[0],
            "The projectile begins to breakup at an altitude of 59700 meters = 196000 ft"
        );
        assert!(entry[4].ends_with("ellipse of dimension 2.56 km by 1.28 km"));
    }

    #[test]
    fn superscripts_survive() {
        let report = fixture();
        let energy = lines(&report, "Energy");
        assert_eq!(
            energy[0],
            "Energy before atmospheric entry: 3.14 x 10^20 Joules = 7.50 x 10^4 MegaTons TNT"
        );
    }

    #[test]
    fn bullets_become_one_group() {
        let report = fixture();
        let thermal = report.section("Thermal Radiation").unwrap();
        let groups: Vec<&Vec<String>> = thermal
            .items
            .iter()
            .filter_map(|i| match i {
                Item::Bullets { bullets } => Some(bullets),
                Item::Line(_) => None,
            })
            .collect();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0][0], "Clothing ignites");
        assert_eq!(groups[0].len(), 3);
        // bullet text stays out of the entry's own line
        assert!(thermal
            .lines()
            .any(|l| l == "The fireball appears 211 times larger than the sun"));
        assert!(!thermal.lines().any(|l| l.contains("Clothing")));
    }

    #[test]
    fn nested_list_does_not_leak() {
        let report = fixture();
        let seismic = lines(&report, "Seismic Effects");
        assert_eq!(seismic.len(), 3);
        assert!(seismic.iter().all(|l| !l.contains("Nested entry")));
        assert_eq!(
            lines(&report, "Nested Heading"),
            vec!["Nested entry must stay in its own section"]
        );
    }

    #[test]
    fn ordered_list_items_stay_as_lines() {
        let html = "<dl><dt><h2>Energy:</h2></dt><dd>Intro<ol>\
                    <li>Energy before atmospheric entry: 1 Joules</li><li>Second</li>\
                    </ol></dd></dl>";
        let report = decompose(html).unwrap();
        assert_eq!(
            report.sections[0].items,
            vec![
                Item::Line("Intro".into()),
                Item::Line("Energy before atmospheric entry: 1 Joules".into()),
                Item::Line("Second".into()),
            ]
        );
    }

    #[test]
    fn wrapped_bullet_list_stays_out_of_line() {
        let html = "<dl><dt><h2>Thermal Radiation:</h2></dt>\
                    <dd><div>Fireball<ul><li>Clothing ignites</li></ul>visible</div></dd></dl>";
        let report = decompose(html).unwrap();
        assert_eq!(
            report.sections[0].items,
            vec![
                Item::Bullets {
                    bullets: vec!["Clothing ignites".into()]
                },
                Item::Line("Fireball visible".into()),
            ]
        );
    }

    #[test]
    fn nested_bullets_appear_once() {
        let html = "<dl><dt><h2>Air Blast:</h2></dt>\
                    <dd>Damage:<ul><li>A<ul><li>B</li></ul></li><li>C<br>D</li></ul></dd></dl>";
        let report = decompose(html).unwrap();
        assert_eq!(
            report.sections[0].items,
            vec![
                Item::Bullets {
                    bullets: vec!["A".into(), "B".into(), "C D".into()]
                },
                Item::Line("Damage:".into()),
            ]
        );
    }

    #[test]
    fn empty_entries_are_skipped() {
        let html = "<dl><dt><h2>Energy:</h2></dt><dd>  </dd><dd><br><br></dd><dd>1 J</dd></dl>";
        let report = decompose(html).unwrap();
        assert_eq!(report.sections[0].items, vec![Item::Line("1 J".into())]);
    }

    #[test]
    fn no_definition_lists() {
        let report = decompose("<html><body><p>Nothing here</p></body></html>").unwrap();
        assert!(report.sections.is_empty());
        assert_eq!(report.notice.as_deref(), Some("Nothing here"));
    }

    #[test]
    fn malformed_documents() {
        assert!(matches!(
            decompose(""),
            Err(PipelineError::MalformedDocument(_))
        ));
        assert!(matches!(
            decompose("   \n\t"),
            Err(PipelineError::MalformedDocument(_))
        ));
        assert!(matches!(
            decompose("{\"error\": \"rate limited\"}"),
            Err(PipelineError::MalformedDocument(_))
        ));
    }
}
