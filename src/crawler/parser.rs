//! HTML extraction and link scoping
//!
//! This module turns a rendered or fetched HTML document into the fields the
//! crawler records for a page:
//! - Title (from `<title>`, falling back to the first `<h1>`)
//! - Description (`<meta name="description">` or `og:description`)
//! - Visible body text, whitespace-collapsed
//! - Outbound links, resolved against the page URL

use crate::url::{normalize_url, same_site};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use url::Url;

/// Elements whose text is never visible
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg", "head"];

/// Content extracted from one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedPage {
    /// URL the content was served from, after redirects
    pub final_url: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub text: String,
    /// Absolute http(s) links in appearance order, unscoped
    pub links: Vec<String>,
}

/// Parses an HTML document served from `base_url`
///
/// # Example
///
/// ```
/// use delve::crawler::parse_html;
/// use url::Url;
///
/// let html = r#"<html><head><title>Test</title></head><body><p>Hi</p><a href="/page">Link</a></body></html>"#;
/// let base_url = Url::parse("https://example.com/").unwrap();
/// let page = parse_html(html, &base_url);
/// assert_eq!(page.title.as_deref(), Some("Test"));
/// assert_eq!(page.text, "Hi Link");
/// assert_eq!(page.links, vec!["https://example.com/page"]);
/// ```
pub fn parse_html(html: &str, base_url: &Url) -> ExtractedPage {
    let document = Html::parse_document(html);

    let hrefs = select_all(&document, "a[href]")
        .filter(|a| a.value().attr("download").is_none())
        .filter_map(|a| a.value().attr("href"));

    ExtractedPage {
        final_url: base_url.to_string(),
        title: extract_title(&document),
        description: extract_description(&document),
        text: extract_text(&document),
        links: resolve_links(hrefs, base_url),
    }
}

fn select_all<'a>(document: &'a Html, selector: &str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    let selector = Selector::parse(selector).ok();
    selector
        .into_iter()
        .flat_map(move |s| document.select(&s).collect::<Vec<_>>())
}

fn element_text(element: ElementRef<'_>) -> Option<String> {
    let text = collapse_whitespace(&element.text().collect::<String>());
    (!text.is_empty()).then_some(text)
}

fn extract_title(document: &Html) -> Option<String> {
    select_all(document, "title")
        .next()
        .and_then(element_text)
        .or_else(|| select_all(document, "h1").next().and_then(element_text))
}

fn extract_description(document: &Html) -> Option<String> {
    select_all(document, "meta[name='description'], meta[property='og:description']")
        .filter_map(|meta| meta.value().attr("content"))
        .map(collapse_whitespace)
        .find(|d| !d.is_empty())
}

/// Visible text of the document body
fn extract_text(document: &Html) -> String {
    let Some(body) = select_all(document, "body").next() else {
        return String::new();
    };

    let mut words: Vec<&str> = Vec::new();
    for node in body.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .map_or(false, |e| HIDDEN_ELEMENTS.contains(&e.name()))
        });
        if !hidden {
            words.extend(text.split_whitespace());
        }
    }
    words.join(" ")
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Resolves hrefs against the page URL, keeping only http(s) targets
pub fn resolve_links<'a>(hrefs: impl IntoIterator<Item = &'a str>, base_url: &Url) -> Vec<String> {
    hrefs
        .into_iter()
        .filter_map(|href| resolve_link(href, base_url))
        .collect()
}

fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    matches!(absolute.scheme(), "http" | "https").then(|| absolute.to_string())
}

/// Narrows links to the crawl root's site
///
/// Links are normalized, kept only when they share the root's registrable
/// domain, de-duplicated in appearance order and capped at `max_links`.
pub fn scope_links(links: &[String], root: &Url, max_links: usize) -> Vec<Url> {
    let mut seen = HashSet::new();
    let mut scoped = Vec::new();

    for link in links {
        if scoped.len() >= max_links {
            break;
        }
        let Ok(url) = normalize_url(link) else {
            continue;
        };
        if !same_site(&url, root) {
            continue;
        }
        if seen.insert(url.as_str().to_string()) {
            scoped.push(url);
        }
    }

    scoped
}
