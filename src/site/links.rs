//! Listing-page link discovery
//!
//! A listing page is a set of repeated containers (one per recipe teaser or
//! per category); the first `<a href>` inside each container is the link.

use crate::extract::Document;
use scraper::{ElementRef, Selector};
use url::Url;

/// Takes the first anchor of every container matching `containers`
///
/// # Arguments
///
/// * `document` - The parsed listing page
/// * `containers` - Compiled container selector
/// * `base_url` - The base URL for resolving relative links
///
/// # Returns
///
/// Absolute http(s) URLs in document order. Containers without a usable
/// anchor are skipped.
pub(crate) fn first_links(document: &Document, containers: &Selector, base_url: &Url) -> Vec<String> {
    let Ok(anchor) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .html()
        .select(containers)
        .filter_map(|container| first_anchor(container, &anchor))
        .filter_map(|href| resolve_link(href, base_url))
        .collect()
}

fn first_anchor<'a>(container: ElementRef<'a>, anchor: &Selector) -> Option<&'a str> {
    if container.value().name() == "a" {
        if let Some(href) = container.value().attr("href") {
            return Some(href);
        }
    }

    container
        .select(anchor)
        .next()
        .and_then(|element| element.value().attr("href"))
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - fragment-only links
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
pub(crate) fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    if href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with("data:")
    {
        return None;
    }

    match base_url.join(href) {
        Ok(absolute_url) if matches!(absolute_url.scheme(), "http" | "https") => {
            Some(absolute_url.to_string())
        }
        _ => None,
    }
}
