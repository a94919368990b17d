//! HTML parser for link discovery and content extraction
//!
//! This module handles parsing HTML content to extract:
//! - Anchor targets to follow
//! - Page title, description and keywords
//! - The main content, rendered as markdown

use scraper::{ElementRef, Html, Selector};

/// Elements whose content never belongs in a document body
const SKIPPED_ELEMENTS: &[&str] = &[
    "script", "style", "noscript", "template", "nav", "header", "footer", "aside", "form",
    "svg", "iframe", "button",
];

/// Extracted information from an HTML page
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    /// The page title (from `<title>`, falling back to the first `<h1>`)
    pub title: Option<String>,

    /// Meta description (`description`, falling back to `og:description`)
    pub description: Option<String>,

    /// Meta keywords, split on commas
    pub keywords: Vec<String>,

    /// Main content rendered as markdown
    pub body_markdown: String,
}

/// Extracts the raw `href` of every followable anchor
///
/// Anchors carrying a `download` attribute are skipped. Hrefs are returned
/// verbatim, in document order; resolution and filtering happen in
/// [`normalize_and_filter`](crate::url::normalize_and_filter).
///
/// # Example
///
/// ```
/// use site_scribe::crawler::extract_anchor_hrefs;
///
/// let html = r#"<a href="/a">A</a><a href="/file.zip" download>Get</a><a>none</a>"#;
/// assert_eq!(extract_anchor_hrefs(html), vec!["/a".to_string()]);
/// ```
pub fn extract_anchor_hrefs(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter(|element| element.value().attr("download").is_none())
        .filter_map(|element| element.value().attr("href"))
        .map(|href| href.to_string())
        .collect()
}

/// Parses a full HTML document into its title, metadata and markdown body
pub fn parse_document(html: &str) -> ParsedDocument {
    let mut document = Html::parse_document(html);

    let title = extract_title(&document);
    let description = extract_description(&document);
    let keywords = extract_keywords(&document);
    strip_chrome(&mut document);

    ParsedDocument {
        title,
        description,
        keywords,
        body_markdown: extract_body(&document),
    }
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .filter_map(|element| element.value().attr("content"))
        .map(collapse_whitespace)
        .find(|s| !s.is_empty())
}

fn extract_title(document: &Html) -> Option<String> {
    first_text(document, "title").or_else(|| first_text(document, "h1"))
}

fn extract_description(document: &Html) -> Option<String> {
    meta_content(document, "meta[name='description']")
        .or_else(|| meta_content(document, "meta[property='og:description']"))
}

fn extract_keywords(document: &Html) -> Vec<String> {
    meta_content(document, "meta[name='keywords']")
        .map(|content| {
            content
                .split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Detaches navigation, scripts and other non-content subtrees
fn strip_chrome(document: &mut Html) {
    let Ok(selector) = Selector::parse(&SKIPPED_ELEMENTS.join(", ")) else {
        return;
    };

    let ids: Vec<_> = document.select(&selector).map(|element| element.id()).collect();
    for id in ids {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn extract_body(document: &Html) -> String {
    for candidate in ["main", "article", "body"] {
        if let Ok(selector) = Selector::parse(candidate) {
            if let Some(root) = document.select(&selector).next() {
                return html_to_markdown(root);
            }
        }
    }

    html_to_markdown(document.root_element())
}

/// Renders an element subtree as markdown
pub fn html_to_markdown(root: ElementRef) -> String {
    html2md::parse_html(&root.html()).trim().to_string()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
