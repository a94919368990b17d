//! Content extraction
//!
//! The orchestrator hands every visited URL to a [`ContentExtractor`] and gets back a
//! [`ContentRecord`]. Extraction failures never stop a crawl: the orchestrator turns
//! them into degraded records via [`ContentRecord::degraded`].

use crate::config::Config;
use crate::crawler::fetcher::{build_http_client, fetch_url, FetchResult};
use crate::crawler::parser::parse_document;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashSet;
use thiserror::Error;
use url::Url;

/// Title used when the extractor could not find one
pub const UNTITLED: &str = "Untitled";

/// Errors an extractor can report for a single URL
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("HTTP status {status_code}")]
    Http { status_code: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unsupported content type: {0}")]
    UnsupportedContent(String),

    #[error("{0}")]
    Message(String),
}

/// Loosely-typed extraction output
///
/// Every field is optional so that partial results from any backend (including
/// JSON produced by an external service) can be normalized in one place.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawExtraction {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "content")]
    pub body: Option<String>,
    #[serde(alias = "keywords")]
    pub tags: Option<Vec<String>>,
    pub error: Option<String>,
}

/// Normalized extraction result for one URL
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRecord {
    pub title: String,
    pub description: String,
    /// Markdown body
    pub body: String,
    pub tags: Vec<String>,
    pub source_url: String,
    pub extracted_at: DateTime<Utc>,
    /// Set when the record stands in for a failed extraction
    pub error: Option<String>,
}

impl ContentRecord {
    /// Normalizes a raw extraction
    ///
    /// Blank titles become [`UNTITLED`]; tags are trimmed, stripped of a leading `#`,
    /// and deduplicated in order.
    pub fn from_raw(raw: RawExtraction, url: &Url) -> Self {
        let title = raw
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED.to_string());

        let mut seen = HashSet::new();
        let tags = raw
            .tags
            .unwrap_or_default()
            .into_iter()
            .map(|t| t.trim().trim_start_matches('#').trim().to_string())
            .filter(|t| !t.is_empty())
            .filter(|t| seen.insert(t.to_lowercase()))
            .collect();

        Self {
            title,
            description: raw.description.map(|d| d.trim().to_string()).unwrap_or_default(),
            body: raw.body.map(|b| b.trim().to_string()).unwrap_or_default(),
            tags,
            source_url: url.to_string(),
            extracted_at: Utc::now(),
            error: raw.error.filter(|e| !e.trim().is_empty()),
        }
    }

    /// Placeholder record for a URL whose extraction failed
    pub fn degraded(url: &Url, error: &str) -> Self {
        Self {
            title: format!("Error: {}", url.path()),
            description: "Content extraction failed".to_string(),
            body: format!("Failed to extract content: {}", error),
            tags: Vec::new(),
            source_url: url.to_string(),
            extracted_at: Utc::now(),
            error: Some(error.to_string()),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// HTML downloaded while extracting a page
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Final URL after redirects, used to resolve relative links
    pub final_url: Url,
    pub html: String,
}

/// A content record plus the page it was built from, when available
#[derive(Debug, Clone)]
pub struct Extraction {
    pub record: ContentRecord,
    pub page: Option<FetchedPage>,
}

/// Turns a URL into a content record
///
/// Implementations must be safe to share between concurrently running jobs.
#[async_trait]
pub trait ContentExtractor: Send + Sync {
    async fn extract(&self, url: &Url) -> Result<ContentRecord, ExtractionError>;

    /// Like [`extract`](Self::extract), also returning the fetched HTML
    ///
    /// Extractors that download the page themselves override this so link
    /// discovery can reuse the body instead of requesting the page again.
    async fn extract_page(&self, url: &Url) -> Result<Extraction, ExtractionError> {
        Ok(Extraction {
            record: self.extract(url).await?,
            page: None,
        })
    }
}

/// Extractor that fetches the page itself and converts its HTML to markdown
#[derive(Debug, Clone)]
pub struct HtmlContentExtractor {
    client: Client,
}

impl HtmlContentExtractor {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Builds an extractor with the job's user agent and fetch timeout
    pub fn from_config(config: &Config) -> Result<Self, reqwest::Error> {
        let client = build_http_client(&config.user_agent, config.crawler.fetch_timeout())?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl ContentExtractor for HtmlContentExtractor {
    async fn extract(&self, url: &Url) -> Result<ContentRecord, ExtractionError> {
        self.extract_page(url).await.map(|extraction| extraction.record)
    }

    async fn extract_page(&self, url: &Url) -> Result<Extraction, ExtractionError> {
        let (final_url, content_type, body) = match fetch_url(&self.client, url).await {
            FetchResult::Success {
                final_url,
                content_type,
                body,
                ..
            } => (final_url, content_type, body),
            FetchResult::HttpError { status_code } => {
                return Err(ExtractionError::Http { status_code })
            }
            FetchResult::NetworkError { error } => return Err(ExtractionError::Network(error)),
        };

        if !content_type.is_empty() && !content_type.contains("html") {
            return Err(ExtractionError::UnsupportedContent(content_type));
        }

        let document = parse_document(&body);
        let raw = RawExtraction {
            title: document.title,
            description: document.description,
            body: Some(document.body_markdown),
            tags: Some(document.keywords),
            error: None,
        };

        Ok(Extraction {
            record: ContentRecord::from_raw(raw, url),
            page: Some(FetchedPage {
                final_url,
                html: body,
            }),
        })
    }
}
