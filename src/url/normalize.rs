use crate::url::{extract_domain, UrlFilter};
use crate::UrlError;
use url::Url;

/// Schemes that never lead to a crawlable page
const SKIPPED_SCHEMES: &[&str] = &["javascript:", "mailto:", "tel:", "data:"];

/// Parses and canonicalizes the seed URL of a job
///
/// The seed goes through the same canonical form as discovered links, so it
/// dedups against later links to the same page.
///
/// # Examples
///
/// ```
/// use site_scribe::url::canonicalize_seed;
///
/// let url = canonicalize_seed("https://Example.com/docs#intro").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/docs");
/// ```
pub fn canonicalize_seed(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(format!(
            "Only HTTP and HTTPS schemes are supported, got: {}",
            url.scheme()
        )));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingDomain);
    }

    canonicalize(&mut url);
    Ok(url)
}

/// Canonicalizes a discovered link and decides whether it may be crawled
///
/// # Rules
///
/// 1. Empty, fragment-only and `javascript:`/`mailto:`/`tel:`/`data:` hrefs are rejected
/// 2. Relative references are resolved against `context_url`
/// 3. Only http and https URLs survive
/// 4. The fragment is removed; the query string is kept
/// 5. The URL's domain must equal the filter's job domain
/// 6. Paths ending in a skipped extension or containing a skipped segment are rejected
///
/// Pure and deterministic for a given input triple.
///
/// # Examples
///
/// ```
/// use site_scribe::url::{normalize_and_filter, UrlFilter};
/// use url::Url;
///
/// let context = Url::parse("https://example.com/guide/").unwrap();
/// let filter = UrlFilter::new("example.com");
///
/// let url = normalize_and_filter("setup?lang=en#top", &context, &filter).unwrap();
/// assert_eq!(url.as_str(), "https://example.com/guide/setup?lang=en");
///
/// assert!(normalize_and_filter("https://other.com/", &context, &filter).is_none());
/// assert!(normalize_and_filter("/files/manual.pdf", &context, &filter).is_none());
/// ```
pub fn normalize_and_filter(candidate: &str, context_url: &Url, filter: &UrlFilter) -> Option<Url> {
    let candidate = candidate.trim();

    if candidate.is_empty() || candidate.starts_with('#') {
        return None;
    }

    let lowered = candidate.to_lowercase();
    if SKIPPED_SCHEMES.iter().any(|scheme| lowered.starts_with(scheme)) {
        return None;
    }

    let mut url = context_url.join(candidate).ok()?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    canonicalize(&mut url);

    if extract_domain(&url)? != filter.domain() {
        return None;
    }

    let path = url.path();
    if filter.has_skipped_extension(path) || filter.has_skipped_segment(path) {
        return None;
    }

    Some(url)
}

/// Removes the fragment and an empty trailing `?`
fn canonicalize(url: &mut Url) {
    url.set_fragment(None);
    if url.query() == Some("") {
        url.set_query(None);
    }
}
