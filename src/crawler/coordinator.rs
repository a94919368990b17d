//! Crawl orchestration
//!
//! The [`Orchestrator`] owns one job's [`CrawlState`] and drives its lifecycle:
//!
//! ```text
//! Idle -> Running -> Completed | Stopped | Failed
//! ```
//!
//! Every iteration pops the head of the frontier, extracts and persists the
//! page, discovers its links while the depth budget allows, checkpoints on
//! schedule, and sleeps for the politeness delay. Stop requests are honored
//! between pages and interrupt the delay.

use crate::config::{validate, Config};
use crate::crawler::discoverer::LinkDiscoverer;
use crate::crawler::extractor::{ContentExtractor, ContentRecord};
use crate::crawler::fetcher::build_http_client;
use crate::output::{summarize, write_index, ArtifactWriter, CrawlSummary};
use crate::state::CrawlState;
use crate::storage::{JsonStateStore, StateStore};
use crate::url::{canonicalize_seed, extract_domain, UrlFilter};
use crate::{ConfigError, ScribeError, UrlError};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Number of processed pages between progress log lines
const PROGRESS_LOG_INTERVAL: u64 = 10;

/// Lifecycle state of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Idle,
    Running,
    /// Frontier exhausted or page budget reached
    Completed,
    /// Stopped on request; resumable
    Stopped,
    /// A checkpoint could not be persisted
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Stopped | Self::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of a job's progress, published after every page
#[derive(Debug, Clone, PartialEq)]
pub struct JobStatus {
    pub state: JobState,
    pub processed: u64,
    pub visited: usize,
    pub failed: usize,
    pub pending: usize,
    /// URL being processed, while running
    pub current_url: Option<String>,
    /// Reason for a `Failed` state
    pub error: Option<String>,
}

impl JobStatus {
    pub fn idle() -> Self {
        Self {
            state: JobState::Idle,
            processed: 0,
            visited: 0,
            failed: 0,
            pending: 0,
            current_url: None,
            error: None,
        }
    }

    fn snapshot(state: JobState, crawl: &CrawlState) -> Self {
        Self {
            state,
            processed: crawl.processed_count(),
            visited: crawl.visited_count(),
            failed: crawl.failed_count(),
            pending: crawl.pending_count(),
            current_url: None,
            error: None,
        }
    }
}

/// Outcome of a finished run
#[derive(Debug, Clone)]
pub struct CrawlReport {
    /// `Completed` or `Stopped`
    pub outcome: JobState,
    pub summary: CrawlSummary,
    pub output_dir: PathBuf,
    pub index_path: PathBuf,
}

/// Drives a single crawl job
pub struct Orchestrator {
    config: Config,
    seed: Url,
    output_dir: PathBuf,
    extractor: Arc<dyn ContentExtractor>,
    discoverer: LinkDiscoverer,
    writer: ArtifactWriter,
    store: Box<dyn StateStore>,
    status_tx: watch::Sender<JobStatus>,
}

impl Orchestrator {
    /// Creates an orchestrator for `config`
    ///
    /// Validates the configuration, creates the output directory and checks
    /// that it is writable. The checkpoint lives in the output directory unless
    /// replaced with [`Orchestrator::with_store`].
    ///
    /// # Errors
    ///
    /// Returns `ScribeError::Config` for invalid settings or an unusable output
    /// directory, and `ScribeError::Reqwest` if the HTTP client cannot be built.
    pub fn new(config: Config, extractor: Arc<dyn ContentExtractor>) -> Result<Self, ScribeError> {
        validate(&config)?;

        let seed = canonicalize_seed(&config.target.url)?;
        let domain = extract_domain(&seed).ok_or(UrlError::MissingDomain)?;

        let output_dir = PathBuf::from(&config.output.directory);
        ensure_writable(&output_dir)?;

        let filter = UrlFilter::new(domain).with_config(&config.filter);
        let client = build_http_client(&config.user_agent, config.crawler.fetch_timeout())?;

        let (status_tx, _) = watch::channel(JobStatus::idle());

        Ok(Self {
            seed,
            discoverer: LinkDiscoverer::new(client, filter),
            writer: ArtifactWriter::new(&output_dir),
            store: Box::new(JsonStateStore::in_directory(&output_dir)),
            output_dir,
            extractor,
            status_tx,
            config,
        })
    }

    /// Replaces the checkpoint store
    pub fn with_store(mut self, store: Box<dyn StateStore>) -> Self {
        self.store = store;
        self
    }

    /// Subscribes to status updates
    ///
    /// The receiver keeps the last published status after the run ends.
    pub fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.status_tx.subscribe()
    }

    pub fn status(&self) -> JobStatus {
        self.status_tx.borrow().clone()
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Runs the job until the frontier is exhausted, the page budget is reached,
    /// `cancel` fires, or a checkpoint cannot be written
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlReport)` - The job ended `Completed` or `Stopped`; the final
    ///   checkpoint and the index have been written
    /// * `Err(ScribeError)` - The job ended `Failed`
    pub async fn run(self, cancel: CancellationToken) -> Result<CrawlReport, ScribeError> {
        let mut state = self.initial_state()?;
        let started = Instant::now();

        tracing::info!(
            "Starting crawl of {} (max depth {}, max pages {}, {} already processed)",
            state.base_url(),
            self.config.crawler.max_depth,
            self.config.crawler.max_pages,
            state.processed_count()
        );
        self.publish(JobStatus::snapshot(JobState::Running, &state));

        let outcome = match self.crawl_loop(&mut state, &cancel, started).await {
            Ok(outcome) => outcome,
            Err(e) => return Err(self.fail(&state, e)),
        };

        if let Err(e) = self.checkpoint_with_retry(&mut state) {
            return Err(self.fail(&state, e));
        }

        let index_path = match write_index(&self.output_dir, &state) {
            Ok(path) => path,
            Err(e) => return Err(self.fail(&state, e.into())),
        };

        let summary = summarize(&state, started.elapsed());
        tracing::info!(
            "Crawl {}: {} pages processed, {} failed, {} pending, in {:?}",
            outcome,
            summary.processed,
            summary.failed,
            summary.pending,
            summary.elapsed
        );
        self.publish(JobStatus::snapshot(outcome, &state));

        Ok(CrawlReport {
            outcome,
            summary,
            output_dir: self.output_dir.clone(),
            index_path,
        })
    }

    /// Loads the checkpoint when resuming, otherwise starts from the seed
    fn initial_state(&self) -> Result<CrawlState, ScribeError> {
        if self.config.crawler.resume {
            match self.store.restore().map(CrawlState::from_checkpoint) {
                Some(Ok(state)) if state.domain() == self.discoverer.filter().domain() => {
                    tracing::info!(
                        "Resuming from checkpoint at {}: {} visited, {} pending, {} processed",
                        self.store.location(),
                        state.visited_count(),
                        state.pending_count(),
                        state.processed_count()
                    );
                    if state.processed_count() >= self.config.crawler.max_pages {
                        tracing::warn!(
                            "Checkpoint already holds {} processed pages (max {}), nothing left to do",
                            state.processed_count(),
                            self.config.crawler.max_pages
                        );
                    }
                    return Ok(state);
                }
                Some(Ok(state)) => tracing::warn!(
                    "Checkpoint belongs to {}, not {}; starting fresh",
                    state.domain(),
                    self.discoverer.filter().domain()
                ),
                Some(Err(e)) => tracing::warn!("Checkpoint has an unusable base URL ({}); starting fresh", e),
                None => tracing::info!("No previous checkpoint, starting fresh"),
            }
        }

        Ok(CrawlState::new(self.seed.clone())?)
    }

    async fn crawl_loop(
        &self,
        state: &mut CrawlState,
        cancel: &CancellationToken,
        started: Instant,
    ) -> Result<JobState, ScribeError> {
        let max_pages = self.config.crawler.max_pages;
        let interval = self.config.crawler.checkpoint_interval;
        let delay = self.config.crawler.delay();

        loop {
            if cancel.is_cancelled() {
                tracing::info!("Stop requested, ending crawl");
                return Ok(JobState::Stopped);
            }

            if state.processed_count() >= max_pages {
                tracing::info!("Reached max pages ({})", max_pages);
                return Ok(JobState::Completed);
            }

            let Some((url, depth)) = state.pop_next() else {
                tracing::info!("Frontier is empty, crawl complete");
                return Ok(JobState::Completed);
            };

            if !state.mark_visited(&url) {
                tracing::debug!("Skipping already visited URL: {}", url);
                continue;
            }

            let mut status = JobStatus::snapshot(JobState::Running, state);
            status.current_url = Some(url.to_string());
            self.publish(status);

            let processed_before = state.processed_count();
            self.process_url(state, &url, depth).await;
            let processed = state.processed_count();

            if processed > processed_before {
                if processed % interval == 0 {
                    self.checkpoint_with_retry(state)?;
                }

                if processed % PROGRESS_LOG_INTERVAL == 0 {
                    let rate = processed as f64 / started.elapsed().as_secs_f64().max(f64::EPSILON);
                    tracing::info!(
                        "Progress: {}/{} pages, {} in frontier, {:.2} pages/sec",
                        processed,
                        max_pages,
                        state.pending_count(),
                        rate
                    );
                }
            }

            self.publish(JobStatus::snapshot(JobState::Running, state));

            let finished = state.pending_count() == 0 || state.processed_count() >= max_pages;
            if !finished {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => {}
                }
            }
        }
    }

    /// Extracts, persists and expands one URL
    ///
    /// Failures are isolated: an extraction failure still produces a degraded
    /// artifact and link discovery runs regardless of the page's own outcome.
    /// When the extractor already fetched the HTML, links are read from it
    /// without a second request.
    async fn process_url(&self, state: &mut CrawlState, url: &Url, depth: u32) {
        tracing::debug!("Processing URL (depth {}): {}", depth, url);

        let (record, page) = match self.extractor.extract_page(url).await {
            Ok(extraction) => (extraction.record, extraction.page),
            Err(e) => {
                tracing::warn!("Extraction failed for {}: {}", url, e);
                (ContentRecord::degraded(url, &e.to_string()), None)
            }
        };
        let mut failed = record.is_degraded();

        let filename = state.allocate_filename(url);
        match self.writer.write(&record, &filename) {
            Ok(path) => {
                state.record_processed();
                tracing::debug!("Saved {} to {}", url, path.display());
            }
            Err(e) => {
                tracing::warn!("Failed to save artifact for {}: {}", url, e);
                failed = true;
            }
        }

        if failed {
            state.mark_failed(url);
        }

        if depth < self.config.crawler.max_depth {
            let links = match page {
                Some(page) => self.discoverer.links_in_page(&page.html, &page.final_url, state),
                None => self.discoverer.discover(url, state).await,
            };
            let added = state.enqueue_discovered(depth, links);
            tracing::debug!("Queued {} new links from {}", added, url);
        }
    }

    /// Persists a checkpoint, retrying once before giving up
    fn checkpoint_with_retry(&self, state: &mut CrawlState) -> Result<(), ScribeError> {
        let checkpoint = state.checkpoint_now();

        if let Err(first) = self.store.checkpoint(&checkpoint) {
            tracing::warn!(
                "Checkpoint to {} failed, retrying: {}",
                self.store.location(),
                first
            );
            self.store.checkpoint(&checkpoint).map_err(|e| {
                ScribeError::CheckpointFailed(format!("{}: {}", self.store.location(), e))
            })?;
        }

        Ok(())
    }

    fn fail(&self, state: &CrawlState, error: ScribeError) -> ScribeError {
        tracing::error!("Crawl failed: {}", error);
        let mut status = JobStatus::snapshot(JobState::Failed, state);
        status.error = Some(error.to_string());
        self.publish(status);
        error
    }

    fn publish(&self, status: JobStatus) {
        self.status_tx.send_replace(status);
    }
}

/// Creates `dir` if needed and checks that files can be created in it
fn ensure_writable(dir: &Path) -> Result<(), ConfigError> {
    let unusable = |e: std::io::Error| {
        ConfigError::Validation(format!(
            "Output directory {} is not writable: {}",
            dir.display(),
            e
        ))
    };

    fs::create_dir_all(dir).map_err(unusable)?;
    let probe = dir.join(".site-scribe-write-test");
    fs::write(&probe, b"").map_err(unusable)?;
    fs::remove_file(&probe).map_err(unusable)?;

    Ok(())
}

/// Runs a complete crawl with the built-in HTML extractor
///
/// # Example
///
/// ```no_run
/// use site_scribe::config::load_config;
/// use site_scribe::crawler::run_crawl;
/// use std::path::Path;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// let report = run_crawl(config, CancellationToken::new()).await?;
/// println!("{} pages", report.summary.processed);
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    cancel: CancellationToken,
) -> Result<CrawlReport, ScribeError> {
    let extractor = crate::crawler::HtmlContentExtractor::from_config(&config)?;
    let orchestrator = Orchestrator::new(config, Arc::new(extractor))?;
    orchestrator.run(cancel).await
}
