//! Filename derivation for artifacts
//!
//! A URL maps to a slug built from its path, plus a short hash of its query
//! string. Collision handling lives in [`CrawlState::allocate_filename`]
//! because it depends on what the job has already allocated.
//!
//! [`CrawlState::allocate_filename`]: crate::state::CrawlState::allocate_filename

use sha2::{Digest, Sha256};
use url::Url;

/// Slug used for the site root
pub const INDEX_SLUG: &str = "index";

/// Extension of every artifact
pub const ARTIFACT_EXTENSION: &str = "md";

/// Maximum slug length in characters, before collision suffixes
pub const MAX_SLUG_LEN: usize = 100;

/// Number of hex characters of the query hash appended to the slug
const QUERY_HASH_LEN: usize = 8;

/// Derives the collision-free-candidate stem for a URL (no extension)
///
/// # Rules
///
/// - path with surrounding `/` trimmed, inner `/` replaced by `_`
/// - an empty path becomes `index`
/// - `_` and the first 8 hex characters of SHA-256(query) are appended when a query is present
/// - only alphanumerics, `-` and `_` are kept
/// - the result is cut to 100 characters
///
/// # Examples
///
/// ```
/// use site_scribe::state::derive_slug;
/// use url::Url;
///
/// let url = Url::parse("https://example.com/guide/getting-started/").unwrap();
/// assert_eq!(derive_slug(&url), "guide_getting-started");
///
/// let url = Url::parse("https://example.com/").unwrap();
/// assert_eq!(derive_slug(&url), "index");
/// ```
pub fn derive_slug(url: &Url) -> String {
    let path = url.path().trim_matches('/').replace('/', "_");

    let mut slug = if path.is_empty() {
        INDEX_SLUG.to_string()
    } else {
        path
    };

    if let Some(query) = url.query().filter(|q| !q.is_empty()) {
        slug.push('_');
        slug.push_str(&query_hash(query));
    }

    let sanitized: String = slug
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
        .take(MAX_SLUG_LEN)
        .collect();

    if sanitized.is_empty() {
        INDEX_SLUG.to_string()
    } else {
        sanitized
    }
}

/// Appends the artifact extension to a stem
pub fn with_extension(stem: &str) -> String {
    format!("{}.{}", stem, ARTIFACT_EXTENSION)
}

/// Short, stable hash of a query string
fn query_hash(query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(query.as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..QUERY_HASH_LEN].to_string()
}
