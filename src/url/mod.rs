//! URL handling module for Site-Scribe
//!
//! This module provides URL canonicalization, domain extraction and the
//! same-domain eligibility filter applied to every discovered link.

mod domain;
mod normalize;

use crate::config::FilterConfig;

// Re-export main functions
pub use domain::extract_domain;
pub use normalize::{canonicalize_seed, normalize_and_filter};

/// Path suffixes that never lead to a document page
pub const DEFAULT_SKIP_EXTENSIONS: &[&str] = &[
    ".pdf", ".jpg", ".jpeg", ".png", ".gif", ".svg", ".webp", ".ico", ".bmp", ".zip", ".tar",
    ".gz", ".rar", ".7z", ".exe", ".dmg", ".msi", ".mp4", ".mp3", ".avi", ".mov", ".wav",
    ".webm", ".woff", ".woff2", ".ttf", ".css", ".js",
];

/// Path fragments for administrative, authentication and static-asset areas
pub const DEFAULT_SKIP_PATHS: &[&str] = &[
    "/login", "/logout", "/admin", "/api/", "/assets/", "/static/",
];

/// Eligibility rules for one crawl job
///
/// Holds the job domain together with the blacklisted extensions and path
/// segments. Configured entries extend the defaults; they never replace them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlFilter {
    domain: String,
    skip_extensions: Vec<String>,
    skip_paths: Vec<String>,
}

impl UrlFilter {
    /// Creates a filter for `domain` with the built-in skip lists
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into().to_lowercase(),
            skip_extensions: DEFAULT_SKIP_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            skip_paths: DEFAULT_SKIP_PATHS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Appends the configured extensions and path segments
    pub fn with_config(mut self, config: &FilterConfig) -> Self {
        for ext in &config.skip_extensions {
            let ext = ext.trim().to_lowercase();
            if ext.is_empty() {
                continue;
            }
            let ext = if ext.starts_with('.') {
                ext
            } else {
                format!(".{}", ext)
            };
            if !self.skip_extensions.contains(&ext) {
                self.skip_extensions.push(ext);
            }
        }

        for segment in &config.skip_paths {
            let segment = segment.trim().to_lowercase();
            if !segment.is_empty() && !self.skip_paths.contains(&segment) {
                self.skip_paths.push(segment);
            }
        }

        self
    }

    /// The job domain (`host` or `host:port`)
    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Returns true if the path ends with a blacklisted extension
    pub fn has_skipped_extension(&self, path: &str) -> bool {
        let path = path.to_lowercase();
        self.skip_extensions.iter().any(|ext| path.ends_with(ext))
    }

    /// Returns true if the path contains a blacklisted segment
    pub fn has_skipped_segment(&self, path: &str) -> bool {
        let path = path.to_lowercase();
        self.skip_paths.iter().any(|segment| path.contains(segment))
    }
}
