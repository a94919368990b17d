//! Crawler module for page fetching, extraction and job control
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching and HTML parsing
//! - Link discovery within the job's domain
//! - Pluggable content extraction
//! - The per-job orchestration loop
//! - A registry for running several jobs side by side

mod coordinator;
mod discoverer;
mod extractor;
mod fetcher;
mod parser;
mod registry;

pub use coordinator::{run_crawl, CrawlReport, JobState, JobStatus, Orchestrator};
pub use discoverer::LinkDiscoverer;
pub use extractor::{
    ContentExtractor, ContentRecord, Extraction, ExtractionError, FetchedPage,
    HtmlContentExtractor, RawExtraction, UNTITLED,
};
pub use fetcher::{build_http_client, fetch_url, FetchResult};
pub use parser::{extract_anchor_hrefs, html_to_markdown, parse_document, ParsedDocument};
pub use registry::{JobId, JobRegistry, RegistryError};

use crate::config::Config;
use crate::ScribeError;
use tokio_util::sync::CancellationToken;

/// Runs a complete crawl operation
///
/// This is the main entry point for a one-shot crawl. It will:
/// 1. Validate the configuration and prepare the output directory
/// 2. Resume from the checkpoint, or start from the seed URL
/// 3. Crawl breadth-first, writing one markdown artifact per page
/// 4. Checkpoint periodically and at the end
/// 5. Write the navigation index
///
/// # Arguments
///
/// * `config` - The crawl configuration
/// * `cancel` - Token that requests a cooperative stop
///
/// # Returns
///
/// * `Ok(CrawlReport)` - Crawl completed or was stopped
/// * `Err(ScribeError)` - Crawl could not start, or failed
pub async fn crawl(config: Config, cancel: CancellationToken) -> Result<CrawlReport, ScribeError> {
    run_crawl(config, cancel).await
}
