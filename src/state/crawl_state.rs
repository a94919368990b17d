//! Durable progress record of one crawl job

use crate::state::filename::{derive_slug, with_extension};
use crate::storage::Checkpoint;
use crate::url::{canonicalize_seed, extract_domain};
use crate::{UrlError, UrlResult};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet, VecDeque};
use url::Url;

/// Progress of a single crawl job
///
/// Owned exclusively by the orchestrator running the job. All invariants are
/// maintained here:
///
/// - a URL is never both pending and visited, and never pending twice
/// - once visited, a URL is never enqueued again
/// - `failed` is a subset of `visited`
/// - `url_to_filename` is append-only and allocation is idempotent
#[derive(Debug, Clone)]
pub struct CrawlState {
    base_url: Url,
    domain: String,
    visited: HashSet<String>,
    failed: HashSet<String>,
    pending: VecDeque<(Url, u32)>,
    /// Mirror of the URLs in `pending`, for O(1) membership checks
    queued: HashSet<String>,
    processed_count: u64,
    file_counter: u64,
    url_to_filename: BTreeMap<String, String>,
    /// Mirror of the values of `url_to_filename`
    allocated: HashSet<String>,
    checkpoint_timestamp: Option<DateTime<Utc>>,
}

impl CrawlState {
    /// Creates a fresh state whose frontier holds only the seed at depth 0
    pub fn new(base_url: Url) -> UrlResult<Self> {
        let domain = extract_domain(&base_url).ok_or(UrlError::MissingDomain)?;

        let mut state = Self {
            base_url: base_url.clone(),
            domain,
            visited: HashSet::new(),
            failed: HashSet::new(),
            pending: VecDeque::new(),
            queued: HashSet::new(),
            processed_count: 0,
            file_counter: 0,
            url_to_filename: BTreeMap::new(),
            allocated: HashSet::new(),
            checkpoint_timestamp: None,
        };
        state.enqueue(base_url, 0);

        Ok(state)
    }

    /// Rebuilds a state from a checkpoint
    ///
    /// Malformed pending entries are dropped, failed URLs are folded into the
    /// visited set, and pending entries that are already visited or repeated are
    /// discarded, so the restored state satisfies every invariant even when the
    /// checkpoint file did not.
    pub fn from_checkpoint(checkpoint: Checkpoint) -> UrlResult<Self> {
        let base_url = canonicalize_seed(&checkpoint.base_url)?;
        let domain = extract_domain(&base_url).ok_or(UrlError::MissingDomain)?;

        let failed: HashSet<String> = checkpoint.failed_urls.into_iter().collect();
        let mut visited: HashSet<String> = checkpoint.visited_urls.into_iter().collect();
        visited.extend(failed.iter().cloned());

        let allocated = checkpoint.url_to_filename.values().cloned().collect();

        let mut state = Self {
            base_url,
            domain,
            visited,
            failed,
            pending: VecDeque::new(),
            queued: HashSet::new(),
            processed_count: checkpoint.processed_count,
            file_counter: checkpoint.file_counter,
            url_to_filename: checkpoint.url_to_filename,
            allocated,
            checkpoint_timestamp: Some(checkpoint.timestamp),
        };

        for (raw, depth) in checkpoint.pending_urls {
            match Url::parse(&raw) {
                Ok(url) => {
                    state.enqueue(url, depth);
                }
                Err(e) => tracing::warn!("Dropping malformed pending URL {}: {}", raw, e),
            }
        }

        Ok(state)
    }

    /// Snapshot of the state for the state store, stamped with the current time
    pub fn checkpoint_now(&mut self) -> Checkpoint {
        let now = Utc::now();
        self.checkpoint_timestamp = Some(now);
        self.to_checkpoint(now)
    }

    /// Snapshot of the state stamped with `timestamp`
    ///
    /// Set-valued fields are sorted so identical states serialize identically.
    pub fn to_checkpoint(&self, timestamp: DateTime<Utc>) -> Checkpoint {
        let mut visited_urls: Vec<String> = self.visited.iter().cloned().collect();
        visited_urls.sort();
        let mut failed_urls: Vec<String> = self.failed.iter().cloned().collect();
        failed_urls.sort();

        Checkpoint {
            base_url: self.base_url.to_string(),
            visited_urls,
            failed_urls,
            pending_urls: self
                .pending
                .iter()
                .map(|(url, depth)| (url.to_string(), *depth))
                .collect(),
            processed_count: self.processed_count,
            file_counter: self.file_counter,
            url_to_filename: self.url_to_filename.clone(),
            timestamp,
        }
    }

    // ===== Frontier =====

    /// Appends a URL to the frontier
    ///
    /// Returns false (and leaves the frontier untouched) when the URL is
    /// already visited, failed or pending.
    pub fn enqueue(&mut self, url: Url, depth: u32) -> bool {
        let key = url.as_str();
        if self.visited.contains(key) || self.failed.contains(key) || self.queued.contains(key) {
            return false;
        }

        self.queued.insert(key.to_string());
        self.pending.push_back((url, depth));
        true
    }

    /// Enqueues URLs discovered on a page at `parent_depth`
    ///
    /// Every accepted URL gets depth `parent_depth + 1`. Returns how many were
    /// newly added.
    pub fn enqueue_discovered(&mut self, parent_depth: u32, urls: Vec<Url>) -> usize {
        let depth = parent_depth + 1;
        urls.into_iter()
            .filter(|url| self.enqueue(url.clone(), depth))
            .count()
    }

    /// Removes and returns the head of the frontier (FIFO)
    pub fn pop_next(&mut self) -> Option<(Url, u32)> {
        let (url, depth) = self.pending.pop_front()?;
        self.queued.remove(url.as_str());
        Some((url, depth))
    }

    /// Iterates the frontier in order
    pub fn pending(&self) -> impl Iterator<Item = &(Url, u32)> {
        self.pending.iter()
    }

    // ===== Outcome tracking =====

    /// Records that a URL has been attempted
    ///
    /// Returns false if it was already visited.
    pub fn mark_visited(&mut self, url: &Url) -> bool {
        self.visited.insert(url.to_string())
    }

    /// Records that extraction or persistence failed for a URL
    pub fn mark_failed(&mut self, url: &Url) {
        let key = url.to_string();
        self.visited.insert(key.clone());
        self.failed.insert(key);
    }

    /// Records one successfully written artifact
    pub fn record_processed(&mut self) {
        self.processed_count += 1;
    }

    // ===== Filename allocation =====

    /// Returns the artifact filename for a URL, allocating one if needed
    ///
    /// Allocation is idempotent. When the derived name already belongs to a
    /// different URL, `file_counter` is advanced and appended as a suffix until
    /// the name is unused.
    pub fn allocate_filename(&mut self, url: &Url) -> String {
        if let Some(existing) = self.url_to_filename.get(url.as_str()) {
            return existing.clone();
        }

        let stem = derive_slug(url);
        let mut filename = with_extension(&stem);

        while self.allocated.contains(&filename) {
            self.file_counter += 1;
            filename = with_extension(&format!("{}_{}", stem, self.file_counter));
        }

        self.allocated.insert(filename.clone());
        self.url_to_filename
            .insert(url.to_string(), filename.clone());
        filename
    }

    // ===== Accessors =====

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    pub fn is_failed(&self, url: &str) -> bool {
        self.failed.contains(url)
    }

    pub fn is_pending(&self, url: &str) -> bool {
        self.queued.contains(url)
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn processed_count(&self) -> u64 {
        self.processed_count
    }

    pub fn file_counter(&self) -> u64 {
        self.file_counter
    }

    pub fn url_to_filename(&self) -> &BTreeMap<String, String> {
        &self.url_to_filename
    }

    pub fn checkpoint_timestamp(&self) -> Option<DateTime<Utc>> {
        self.checkpoint_timestamp
    }
}
