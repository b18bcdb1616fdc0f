//! HTML flattening and structural facts
//!
//! Parses a page once and pulls out everything the extractor needs from the
//! DOM: visible text, title, `og:site_name`, anchors and contact forms.

use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Elements whose text is never visible to a reader
const HIDDEN_TAGS: [&str; 6] = ["script", "style", "noscript", "template", "svg", "iframe"];

/// One `<a href>` on the page
#[derive(Debug, Clone)]
pub(crate) struct Anchor {
    /// Raw href attribute, trimmed
    pub href: String,
    /// Absolute HTTP(S) URL, when the href resolves to one
    pub absolute: Option<Url>,
    pub text: String,
}

/// The parsed view of one HTML document
#[derive(Debug, Clone)]
pub(crate) struct ParsedPage {
    /// Visible text with whitespace collapsed
    pub text: String,
    pub title: Option<String>,
    pub site_name: Option<String>,
    pub anchors: Vec<Anchor>,
    /// Values of `<time datetime>` attributes
    pub time_stamps: Vec<String>,
    pub has_contact_form: bool,
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// Parses `html`, resolving relative links against `base_url`
pub(crate) fn parse_page(html: &str, base_url: &Url) -> ParsedPage {
    let document = Html::parse_document(html);

    ParsedPage {
        text: visible_text(&document),
        title: extract_title(&document),
        site_name: extract_meta_content(&document, "meta[property='og:site_name']"),
        anchors: extract_anchors(&document, base_url),
        time_stamps: extract_time_stamps(&document),
        has_contact_form: detect_contact_form(&document),
    }
}

/// Flattens the document to the text a reader would see
///
/// Comments are skipped along with script, style and similar containers.
fn visible_text(document: &Html) -> String {
    let mut raw = String::new();

    for node in document.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };

        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map_or(false, |el| HIDDEN_TAGS.contains(&el.name()))
        });
        if !hidden {
            raw.push_str(text);
            raw.push(' ');
        }
    }

    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn extract_title(document: &Html) -> Option<String> {
    let title_selector = selector("title")?;

    document
        .select(&title_selector)
        .next()
        .map(|element| element.text().collect::<String>().trim().to_string())
        .filter(|s| !s.is_empty())
}

fn extract_meta_content(document: &Html, css: &str) -> Option<String> {
    let meta_selector = selector(css)?;

    document
        .select(&meta_selector)
        .filter_map(|element| element.value().attr("content"))
        .map(|content| content.trim().to_string())
        .find(|content| !content.is_empty())
}

fn extract_anchors(document: &Html, base_url: &Url) -> Vec<Anchor> {
    let Some(a_selector) = selector("a[href]") else {
        return Vec::new();
    };

    document
        .select(&a_selector)
        .filter_map(|element| {
            let href = element.value().attr("href")?.trim();
            if href.is_empty() || href.starts_with('#') {
                return None;
            }

            Some(Anchor {
                href: href.to_string(),
                absolute: resolve_link(href, base_url),
                text: element_text(&element),
            })
        })
        .collect()
}

fn element_text(element: &ElementRef<'_>) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves an href to an absolute HTTP(S) URL
///
/// Returns None for `javascript:`, `mailto:`, `tel:` and `data:` links and
/// for anything that fails to parse.
fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    matches!(absolute.scheme(), "http" | "https").then_some(absolute)
}

fn extract_time_stamps(document: &Html) -> Vec<String> {
    let Some(time_selector) = selector("time[datetime]") else {
        return Vec::new();
    };

    document
        .select(&time_selector)
        .filter_map(|element| element.value().attr("datetime"))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

/// A form that asks for an email address or free text counts as a contact form
fn detect_contact_form(document: &Html) -> bool {
    let (Some(form_selector), Some(field_selector)) = (
        selector("form"),
        selector("input[type='email'], input[name*='email'], textarea"),
    ) else {
        return false;
    };

    document
        .select(&form_selector)
        .any(|form| form.select(&field_selector).next().is_some())
}
