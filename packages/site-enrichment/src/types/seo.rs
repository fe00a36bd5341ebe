//! On-page SEO metadata scraped from rendered HTML.

use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use url::Url;

/// Metadata snapshot of a rendered page. Any field may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeoMetadata {
    pub title: Option<String>,
    pub meta_description: Option<String>,
    pub og_title: Option<String>,
    pub og_description: Option<String>,
    pub og_image: Option<String>,
    pub twitter_card: Option<String>,
    pub twitter_title: Option<String>,
    pub twitter_description: Option<String>,
    pub twitter_image: Option<String>,
    pub favicon_url: Option<String>,
    pub canonical_url: Option<String>,
    pub h1: Option<String>,
}

impl SeoMetadata {
    /// Parse metadata out of rendered HTML.
    ///
    /// Relative image, favicon and canonical URLs are resolved against `page_url`.
    pub fn from_html(html: &str, page_url: &str) -> Self {
        let document = Html::parse_document(html);
        let base = Url::parse(page_url).ok();
        let resolve = |href: Option<String>| href.map(|h| absolutize(base.as_ref(), &h));

        Self {
            title: first_text(&document, "title"),
            meta_description: meta_content(&document, "name", "description"),
            og_title: meta_content(&document, "property", "og:title"),
            og_description: meta_content(&document, "property", "og:description"),
            og_image: resolve(meta_content(&document, "property", "og:image")),
            twitter_card: twitter_meta(&document, "twitter:card"),
            twitter_title: twitter_meta(&document, "twitter:title"),
            twitter_description: twitter_meta(&document, "twitter:description"),
            twitter_image: resolve(twitter_meta(&document, "twitter:image")),
            favicon_url: resolve(
                link_href(&document, "icon").or_else(|| link_href(&document, "shortcut icon")),
            ),
            canonical_url: resolve(link_href(&document, "canonical")),
            h1: first_text(&document, "h1"),
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

fn first_text(document: &Html, tag: &str) -> Option<String> {
    let selector = Selector::parse(tag).ok()?;
    let element = document.select(&selector).next()?;
    non_empty(collapse_whitespace(&element.text().collect::<String>()))
}

fn meta_content(document: &Html, attr: &str, key: &str) -> Option<String> {
    let selector = Selector::parse(&format!(r#"meta[{attr}="{key}"]"#)).ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("content"))
        .find_map(|c| non_empty(c.trim().to_string()))
}

/// Twitter tags show up under both `name` and `property`.
fn twitter_meta(document: &Html, key: &str) -> Option<String> {
    meta_content(document, "name", key).or_else(|| meta_content(document, "property", key))
}

fn link_href(document: &Html, rel: &str) -> Option<String> {
    let selector = Selector::parse(&format!(r#"link[rel="{rel}"]"#)).ok()?;
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .find_map(|h| non_empty(h.trim().to_string()))
}

fn absolutize(base: Option<&Url>, href: &str) -> String {
    match base.and_then(|b| b.join(href).ok()) {
        Some(url) => url.to_string(),
        None => href.to_string(),
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(s: String) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}
