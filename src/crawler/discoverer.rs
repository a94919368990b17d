//! Link discovery
//!
//! Fetches a page and returns the in-scope, normalized links it contains that the
//! crawl has not already settled.

use crate::crawler::fetcher::{fetch_url, FetchResult};
use crate::crawler::parser::extract_anchor_hrefs;
use crate::state::CrawlState;
use crate::url::{normalize_and_filter, UrlFilter};
use reqwest::Client;
use std::collections::HashSet;
use url::Url;

/// Discovers followable links on pages of a single domain
#[derive(Debug, Clone)]
pub struct LinkDiscoverer {
    client: Client,
    filter: UrlFilter,
}

impl LinkDiscoverer {
    pub fn new(client: Client, filter: UrlFilter) -> Self {
        Self { client, filter }
    }

    pub fn filter(&self) -> &UrlFilter {
        &self.filter
    }

    /// Fetches `url` and returns its new links
    ///
    /// Fetch failures are logged and produce no links; they never affect the page's
    /// own outcome.
    ///
    /// # Returns
    ///
    /// Normalized URLs in document order, deduplicated, excluding anything already
    /// visited or failed.
    pub async fn discover(&self, url: &Url, state: &CrawlState) -> Vec<Url> {
        match fetch_url(&self.client, url).await {
            FetchResult::Success {
                final_url, body, ..
            } => self.links_in_page(&body, &final_url, state),
            FetchResult::HttpError { status_code } => {
                tracing::warn!("Link discovery on {} got HTTP {}", url, status_code);
                Vec::new()
            }
            FetchResult::NetworkError { error } => {
                tracing::warn!("Link discovery on {} failed: {}", url, error);
                Vec::new()
            }
        }
    }

    /// Extracts new links from already-fetched HTML
    ///
    /// `context_url` is the page's final URL and is used to resolve relative hrefs.
    pub fn links_in_page(&self, html: &str, context_url: &Url, state: &CrawlState) -> Vec<Url> {
        let mut seen = HashSet::new();

        extract_anchor_hrefs(html)
            .iter()
            .filter_map(|href| normalize_and_filter(href, context_url, &self.filter))
            .filter(|link| seen.insert(link.to_string()))
            .filter(|link| !state.is_visited(link.as_str()) && !state.is_failed(link.as_str()))
            .collect()
    }
}
