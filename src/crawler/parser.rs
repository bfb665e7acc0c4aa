//! HTML querying for catalog pages
//!
//! This module wraps `scraper` to provide:
//! - Anchor enumeration, resolved to absolute URLs
//! - Selector-based text and attribute extraction
//! - Presence checks for marker elements
//!
//! A [`Document`] is not `Send`; parse, query and drop it without holding it
//! across an `.await`.

use scraper::{Html, Selector};
use url::Url;

/// A parsed HTML page
pub struct Document {
    html: Html,
}

impl Document {
    pub fn parse(body: &str) -> Self {
        Self {
            html: Html::parse_document(body),
        }
    }

    /// Returns the page title (from the `<title>` tag)
    pub fn title(&self) -> Option<String> {
        self.text("title")
    }

    /// Returns true if any element matches the selector
    pub fn exists(&self, selector: &str) -> bool {
        match Selector::parse(selector) {
            Ok(selector) => self.html.select(&selector).next().is_some(),
            Err(_) => false,
        }
    }

    /// Returns the trimmed text of the first matching element
    ///
    /// Whitespace runs inside the text collapse to a single space. Returns
    /// `None` if nothing matches or the text is empty.
    pub fn text(&self, selector: &str) -> Option<String> {
        let selector = Selector::parse(selector).ok()?;

        self.html
            .select(&selector)
            .next()
            .map(|element| {
                element
                    .text()
                    .collect::<String>()
                    .split_whitespace()
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|s| !s.is_empty())
    }

    /// Returns an attribute of the first matching element
    pub fn attr(&self, selector: &str, attr: &str) -> Option<String> {
        let selector = Selector::parse(selector).ok()?;

        self.html
            .select(&selector)
            .next()
            .and_then(|element| element.value().attr(attr))
            .map(|value| value.trim().to_string())
    }

    /// Extracts all followable links, resolved against `base_url`
    ///
    /// # Link Extraction Rules
    ///
    /// **Include:** `<a href="...">` anywhere in the document
    ///
    /// **Exclude:**
    /// - `<a href="..." download>`
    /// - `javascript:`, `mailto:`, `tel:` links and data URIs
    /// - Fragment-only links
    /// - Anything that does not resolve to HTTP(S)
    pub fn links(&self, base_url: &Url) -> Vec<String> {
        let mut links = Vec::new();

        if let Ok(a_selector) = Selector::parse("a[href]") {
            for element in self.html.select(&a_selector) {
                // Skip if it has the download attribute
                if element.value().attr("download").is_some() {
                    continue;
                }

                if let Some(href) = element.value().attr("href") {
                    if let Some(absolute_url) = resolve_link(href, base_url) {
                        links.push(absolute_url);
                    }
                }
            }
        }

        links
    }
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
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

    let absolute_url = base_url.join(href).ok()?;
    match absolute_url.scheme() {
        "http" | "https" => Some(absolute_url.to_string()),
        _ => None,
    }
}

/// Convenience function for extracting just the links from HTML
pub fn extract_links(html: &str, base_url: &Url) -> Vec<String> {
    Document::parse(html).links(base_url)
}
