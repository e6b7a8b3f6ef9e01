//! Link extraction and relevance scoring for crawled pages.
//!
//! Parsing is synchronous; callers hand over the fetched HTML and get a
//! fully parsed `CrawledPage` back, so no parser state lives across an
//! await point.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use scraper::{ElementRef, Html, Node, Selector};
use tracing::debug;
use url::Url;

use crate::models::{CandidateLink, CrawledPage, FileType};

/// Keywords that make a URL path look like a disclosure location.
const URL_KEYWORDS: &[&str] = &[
    "price",
    "charge",
    "chargemaster",
    "transparency",
    "standard",
    "cdm",
    "machine-readable",
    "mrf",
];

/// Keywords that make anchor text look like a disclosure link.
const ANCHOR_KEYWORDS: &[&str] = &[
    "price",
    "charge",
    "transparency",
    "chargemaster",
    "standard charges",
    "machine readable",
    "machine-readable",
    "cost",
];

/// Heading vocabulary that introduces a facility disclosure list.
const DISCLOSURE_HEADINGS: &[&str] = &[
    "standard charges",
    "price transparency",
    "machine-readable",
    "machine readable",
    "chargemaster",
];

/// Vocabulary that marks a list item as naming a facility.
const FACILITY_WORDS: &[&str] = &[
    "hospital",
    "medical center",
    "health",
    "campus",
    "clinic",
    "regional",
];

/// CMS machine-readable file naming convention:
/// `<ein>_<hospital-name>_standardcharges.<ext>`.
static CMS_FILENAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\d{2}-?\d{7}_[^/]+_standardcharges\.[a-z0-9]+$").unwrap()
});

static LINK_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());
static HEADING_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h1, h2, h3, h4").unwrap());
static LIST_ITEM_SELECTOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("li").unwrap());
static ITEM_LINK_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").unwrap());

/// Parse fetched HTML into a `CrawledPage` with scored candidate links.
pub fn parse_page(url: &str, html: &str) -> CrawledPage {
    let document = Html::parse_document(html);

    let mut links = extract_links(url, &document);
    annotate_facility_lists(url, &document, &mut links);
    links.sort_by(|a, b| b.score.total_cmp(&a.score));

    let text_content = extract_text(&document);

    debug!("Parsed {} candidate links from {}", links.len(), url);

    CrawledPage {
        url: url.to_string(),
        content: html.to_string(),
        text_content,
        links,
        crawled_at: Utc::now(),
    }
}

/// Extract, normalize and score every anchor on the page. Duplicate
/// URLs keep the highest-scoring occurrence.
fn extract_links(page_url: &str, document: &Html) -> Vec<CandidateLink> {
    let base = Url::parse(page_url).ok();
    let mut by_url: HashMap<String, CandidateLink> = HashMap::new();

    for anchor in document.select(&LINK_SELECTOR) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let Some(url) = normalize_url(base.as_ref(), href) else {
            continue;
        };

        let text = anchor
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");

        let file_type = FileType::from_url(&url);
        let score = score_link(&url, &text, file_type.is_some());
        if score <= 0.0 {
            continue;
        }

        let candidate = CandidateLink {
            url: url.clone(),
            text,
            file_type,
            score,
            facility_name: None,
        };

        match by_url.get(&url) {
            Some(existing) if existing.score >= candidate.score => {}
            _ => {
                by_url.insert(url, candidate);
            }
        }
    }

    by_url.into_values().collect()
}

/// Relevance score for one link.
///
/// File links start at 0.5 and collect keyword bonuses; directory links
/// are admitted at a flat 0.3 when they carry disclosure vocabulary.
/// Links following the CMS filename convention are near-certain hits no
/// matter what the anchor says.
pub fn score_link(url: &str, anchor_text: &str, is_file: bool) -> f32 {
    let url_lower = url.to_lowercase();
    let text_lower = anchor_text.to_lowercase();

    if CMS_FILENAME.is_match(&url_lower) {
        return 0.95;
    }

    let url_hits = URL_KEYWORDS.iter().filter(|k| url_lower.contains(**k)).count();
    let text_hits = ANCHOR_KEYWORDS
        .iter()
        .filter(|k| text_lower.contains(**k))
        .count();

    if !is_file {
        return if url_hits > 0 || text_hits > 0 { 0.3 } else { 0.0 };
    }

    let mut score = 0.5;
    score += 0.1 * url_hits as f32;
    score += 0.2 * text_hits as f32;

    let combined = format!("{url_lower} {text_lower}");
    if combined.contains("price") && combined.contains("transparency") {
        score += 0.3;
    }

    score.min(1.0)
}

/// Resolve a href against the page URL; drop fragments and non-HTTP
/// schemes.
fn normalize_url(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
    {
        return None;
    }

    let mut resolved = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };

    if !matches!(resolved.scheme(), "http" | "https") {
        return None;
    }
    resolved.set_fragment(None);
    Some(resolved.into())
}

/// Detect facility disclosure lists and tag their links with the
/// facility name from the enclosing list item.
///
/// A disclosure heading followed by a list whose items carry facility
/// vocabulary means the page covers several facilities; the matcher
/// needs to know which facility each file belongs to. Items without a
/// link of their own fall back to the page's best file link.
fn annotate_facility_lists(page_url: &str, document: &Html, links: &mut Vec<CandidateLink>) {
    let base = Url::parse(page_url).ok();

    let mut facility_links: Vec<(String, Option<String>)> = Vec::new();

    for heading in document.select(&HEADING_SELECTOR) {
        let heading_text = heading.text().collect::<String>().to_lowercase();
        if !DISCLOSURE_HEADINGS.iter().any(|k| heading_text.contains(k)) {
            continue;
        }

        for list in following_lists(heading) {
            for item in list.select(&LIST_ITEM_SELECTOR) {
                let item_text = item
                    .text()
                    .collect::<String>()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ");
                let item_lower = item_text.to_lowercase();

                if !FACILITY_WORDS.iter().any(|w| item_lower.contains(w)) {
                    continue;
                }

                let item_url = item
                    .select(&ITEM_LINK_SELECTOR)
                    .next()
                    .and_then(|a| a.value().attr("href"))
                    .and_then(|href| normalize_url(base.as_ref(), href));

                facility_links.push((item_text, item_url));
            }
        }
    }

    if facility_links.is_empty() {
        return;
    }

    let best_file_url = links
        .iter()
        .filter(|l| l.is_file())
        .max_by(|a, b| a.score.total_cmp(&b.score))
        .map(|l| l.url.clone());

    for (facility, item_url) in facility_links {
        match item_url {
            Some(url) => {
                if let Some(existing) = links.iter_mut().find(|l| l.url == url) {
                    existing.facility_name = Some(facility);
                    existing.score = existing.score.max(0.5);
                } else {
                    let file_type = FileType::from_url(&url);
                    links.push(CandidateLink {
                        url,
                        text: facility.clone(),
                        file_type,
                        score: 0.5,
                        facility_name: Some(facility),
                    });
                }
            }
            None => {
                if let Some(ref url) = best_file_url {
                    links.push(CandidateLink {
                        url: url.clone(),
                        text: facility.clone(),
                        file_type: FileType::from_url(url),
                        score: 0.4,
                        facility_name: Some(facility),
                    });
                }
            }
        }
    }
}

/// Lists (ul/ol/table) that follow a heading before the next heading.
fn following_lists<'a>(heading: ElementRef<'a>) -> Vec<ElementRef<'a>> {
    let mut lists = Vec::new();

    for sibling in heading.next_siblings() {
        let Some(element) = ElementRef::wrap(sibling) else {
            continue;
        };
        match element.value().name() {
            "h1" | "h2" | "h3" | "h4" => break,
            "ul" | "ol" | "table" => lists.push(element),
            // A wrapper div directly after the heading often holds the list.
            "div" | "section" => {
                if let Ok(selector) = Selector::parse("ul, ol, table") {
                    lists.extend(element.select(&selector));
                }
            }
            _ => {}
        }
    }

    lists
}

/// Tags whose text is never page content.
const EXCLUDED_TAGS: &[&str] = &["script", "style", "nav", "header", "footer", "noscript"];

/// Plain text of the page with scripts and chrome stripped.
fn extract_text(document: &Html) -> String {
    let mut out = String::new();

    for node in document.tree.nodes() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let excluded = node.ancestors().any(|a| {
            matches!(a.value(), Node::Element(e) if EXCLUDED_TAGS.contains(&e.name()))
        });
        if excluded {
            continue;
        }

        let trimmed = text.trim();
        if !trimmed.is_empty() {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(trimmed);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_link_scoring() {
        // Data extension plus URL and anchor keywords.
        let score = score_link(
            "https://example.org/files/standard-charges.csv",
            "Standard Charges (CSV)",
            true,
        );
        assert!(score > 0.5);

        // Plain file with no keywords keeps the extension base.
        let base = score_link("https://example.org/report.csv", "Annual report", true);
        assert!((base - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn price_transparency_cooccurrence_bonus() {
        let with = score_link(
            "https://example.org/price-transparency/data.csv",
            "download",
            true,
        );
        let without = score_link("https://example.org/price/data.csv", "download", true);
        assert!(with > without);
    }

    #[test]
    fn score_is_capped() {
        let score = score_link(
            "https://example.org/price-transparency/chargemaster-standard-charges.csv",
            "Price Transparency Standard Charges Chargemaster Machine Readable Cost",
            true,
        );
        assert!(score <= 1.0);
    }

    #[test]
    fn cms_filename_trumps_keywords() {
        let score = score_link(
            "https://cdn.example.org/12-3456789_mercy-hospital_standardcharges.json",
            "",
            true,
        );
        assert!((score - 0.95).abs() < f32::EPSILON);
    }

    #[test]
    fn directory_links_admitted_with_keywords() {
        assert!((score_link("https://example.org/price-transparency/", "Prices", false) - 0.3).abs() < f32::EPSILON);
        assert_eq!(score_link("https://example.org/about/", "About us", false), 0.0);
    }

    #[test]
    fn parse_page_extracts_and_ranks_links() {
        let html = r##"
            <html><body>
              <a href="/prices/standard-charges.csv">Standard Charges</a>
              <a href="/about">About</a>
              <a href="https://example.org/price-transparency">Price Transparency</a>
              <a href="#top">Back to top</a>
              <a href="mailto:info@example.org">Contact</a>
            </body></html>
        "##;

        let page = parse_page("https://example.org/billing", html);
        assert_eq!(page.links.len(), 2);
        assert_eq!(page.links[0].url, "https://example.org/prices/standard-charges.csv");
        assert!(page.links[0].is_file());
        assert_eq!(page.links[1].url, "https://example.org/price-transparency");
        assert!(!page.links[1].is_file());
    }

    #[test]
    fn facility_list_names_attach_to_links() {
        let html = r#"
            <html><body>
              <h2>Standard Charges Files</h2>
              <ul>
                <li>Mercy Hospital Springfield <a href="/files/springfield.csv">download</a></li>
                <li>Mercy Medical Center Joplin <a href="/files/joplin.csv">download</a></li>
              </ul>
            </body></html>
        "#;

        let page = parse_page("https://mercy.example.org/transparency", html);
        let springfield = page
            .links
            .iter()
            .find(|l| l.url.ends_with("springfield.csv"))
            .unwrap();
        assert!(springfield
            .facility_name
            .as_deref()
            .unwrap()
            .contains("Springfield"));
    }

    #[test]
    fn linkless_facility_items_fall_back_to_best_file() {
        let html = r#"
            <html><body>
              <a href="/all_standardcharges.csv">All standard charges</a>
              <h2>Price Transparency</h2>
              <ul>
                <li>Lakeside Hospital</li>
              </ul>
            </body></html>
        "#;

        let page = parse_page("https://example.org/prices", html);
        let fallback = page
            .links
            .iter()
            .find(|l| l.facility_name.as_deref() == Some("Lakeside Hospital"))
            .unwrap();
        assert!(fallback.url.ends_with("all_standardcharges.csv"));
    }

    #[test]
    fn text_extraction_skips_chrome() {
        let html = r#"
            <html><body>
              <nav>Home | Billing</nav>
              <script>var x = 1;</script>
              <p>Our standard charges are listed below.</p>
            </body></html>
        "#;

        let page = parse_page("https://example.org/", html);
        assert!(page.text_content.contains("standard charges"));
        assert!(!page.text_content.contains("var x"));
        assert!(!page.text_content.contains("Home | Billing"));
    }
}
