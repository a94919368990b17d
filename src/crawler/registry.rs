//! Registry of concurrently running crawl jobs
//!
//! Each job runs as its own tokio task with its own state, output directory and
//! stop token. Jobs share only the content extractor.

use crate::config::{validate, Config};
use crate::ConfigError;
use crate::crawler::coordinator::{CrawlReport, JobStatus, Orchestrator};
use crate::crawler::extractor::ContentExtractor;
use crate::ScribeError;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Identifier of a registered job
pub type JobId = u64;

/// Errors raised by registry operations
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("No job with id {0}")]
    NotFound(JobId),

    #[error("Job {0} is already running")]
    AlreadyRunning(JobId),

    #[error("Job {0} has not been started")]
    NotStarted(JobId),

    #[error("Job {0} is already being awaited")]
    AlreadyAwaited(JobId),

    #[error("Output directory {directory} is already used by job {owner}")]
    OutputDirInUse { directory: String, owner: JobId },

    #[error("Job task failed: {0}")]
    Join(String),
}

struct JobEntry {
    config: Config,
    output_dir: PathBuf,
    cancel: CancellationToken,
    status: watch::Receiver<JobStatus>,
    handle: Option<JoinHandle<Result<CrawlReport, ScribeError>>>,
    /// Cleared by the job's task when it ends, even if the handle was taken
    active: Arc<AtomicBool>,
    started: bool,
}

impl JobEntry {
    fn is_running(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// Marks a job inactive when its task finishes or is dropped
struct ActiveGuard(Arc<AtomicBool>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Tracks crawl jobs by id
///
/// # Example
///
/// ```no_run
/// use site_scribe::{Config, HtmlContentExtractor, JobRegistry};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Config::for_url("https://docs.example.com/");
/// let extractor = HtmlContentExtractor::from_config(&config)?;
/// let registry = JobRegistry::new(Arc::new(extractor));
///
/// let id = registry.create(config)?;
/// registry.start(id)?;
/// let report = registry.wait(id).await?;
/// println!("{}: {} pages", report.outcome, report.summary.processed);
/// # Ok(())
/// # }
/// ```
pub struct JobRegistry {
    extractor: Arc<dyn ContentExtractor>,
    jobs: Mutex<HashMap<JobId, JobEntry>>,
    next_id: AtomicU64,
}

impl JobRegistry {
    pub fn new(extractor: Arc<dyn ContentExtractor>) -> Self {
        Self {
            extractor,
            jobs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    fn jobs(&self) -> MutexGuard<'_, HashMap<JobId, JobEntry>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a job in the `Idle` state
    ///
    /// # Errors
    ///
    /// Fails on invalid configuration, an output directory that cannot be
    /// created, or when another registered job already owns the directory.
    /// Directories are compared by canonical path.
    pub fn create(&self, config: Config) -> Result<JobId, ScribeError> {
        validate(&config)?;
        let output_dir = canonical_output_dir(&config)?;

        let mut jobs = self.jobs();
        if let Some((owner, _)) = jobs.iter().find(|(_, job)| job.output_dir == output_dir) {
            return Err(RegistryError::OutputDirInUse {
                directory: output_dir.display().to_string(),
                owner: *owner,
            }
            .into());
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (_, status) = watch::channel(JobStatus::idle());
        jobs.insert(
            id,
            JobEntry {
                config,
                output_dir,
                cancel: CancellationToken::new(),
                status,
                handle: None,
                active: Arc::new(AtomicBool::new(false)),
                started: false,
            },
        );

        tracing::info!("Registered job {}", id);
        Ok(id)
    }

    /// Starts (or restarts after a terminal state) a job on the tokio runtime
    ///
    /// A restart resumes from the job's checkpoint when its configuration has
    /// `resume` enabled. Must be called from within a tokio runtime.
    pub fn start(&self, id: JobId) -> Result<(), ScribeError> {
        let mut jobs = self.jobs();
        let job = jobs.get_mut(&id).ok_or(RegistryError::NotFound(id))?;

        if job.is_running() {
            return Err(RegistryError::AlreadyRunning(id).into());
        }

        let orchestrator = Orchestrator::new(job.config.clone(), Arc::clone(&self.extractor))?;
        job.cancel = CancellationToken::new();
        job.status = orchestrator.subscribe();

        job.active = Arc::new(AtomicBool::new(true));
        let guard = ActiveGuard(Arc::clone(&job.active));
        let run = orchestrator.run(job.cancel.clone());
        job.handle = Some(tokio::spawn(async move {
            let _guard = guard;
            run.await
        }));
        job.started = true;

        tracing::info!("Started job {} for {}", id, job.config.target.url);
        Ok(())
    }

    /// Requests a cooperative stop
    ///
    /// The job finishes its current page, writes a checkpoint and ends `Stopped`.
    pub fn stop(&self, id: JobId) -> Result<(), RegistryError> {
        let jobs = self.jobs();
        let job = jobs.get(&id).ok_or(RegistryError::NotFound(id))?;

        if !job.started {
            return Err(RegistryError::NotStarted(id));
        }

        job.cancel.cancel();
        tracing::info!("Stop requested for job {}", id);
        Ok(())
    }

    /// Latest status snapshot of a job
    pub fn status(&self, id: JobId) -> Result<JobStatus, RegistryError> {
        let jobs = self.jobs();
        let job = jobs.get(&id).ok_or(RegistryError::NotFound(id))?;
        let status = job.status.borrow().clone();
        Ok(status)
    }

    /// Status of every registered job, ordered by id
    pub fn list(&self) -> Vec<(JobId, JobStatus)> {
        let jobs = self.jobs();
        let mut all: Vec<(JobId, JobStatus)> = jobs
            .iter()
            .map(|(id, job)| (*id, job.status.borrow().clone()))
            .collect();
        all.sort_by_key(|(id, _)| *id);
        all
    }

    /// Waits for a started job to finish and returns its report
    ///
    /// Only one caller can wait for a given run. The job stays registered and
    /// counts as running until its task ends.
    pub async fn wait(&self, id: JobId) -> Result<CrawlReport, ScribeError> {
        let handle = {
            let mut jobs = self.jobs();
            let job = jobs.get_mut(&id).ok_or(RegistryError::NotFound(id))?;
            if !job.started {
                return Err(RegistryError::NotStarted(id).into());
            }
            job.handle.take().ok_or(RegistryError::AlreadyAwaited(id))?
        };

        handle
            .await
            .map_err(|e| ScribeError::from(RegistryError::Join(e.to_string())))?
    }

    /// Removes a job, stopping it first if it is still running
    pub fn remove(&self, id: JobId) -> Result<(), RegistryError> {
        let job = self.jobs().remove(&id).ok_or(RegistryError::NotFound(id))?;

        if job.is_running() {
            tracing::info!("Stopping job {} before removal", id);
        }
        job.cancel.cancel();

        tracing::info!("Removed job {}", id);
        Ok(())
    }
}

/// Creates the job's output directory and returns its canonical path
fn canonical_output_dir(config: &Config) -> Result<PathBuf, ConfigError> {
    let dir = PathBuf::from(&config.output.directory);
    let unusable = |e: std::io::Error| {
        ConfigError::Validation(format!(
            "Output directory {} is not usable: {}",
            dir.display(),
            e
        ))
    };

    fs::create_dir_all(&dir).map_err(unusable)?;
    fs::canonicalize(&dir).map_err(unusable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::coordinator::JobState;
    use crate::crawler::extractor::{ContentRecord, ExtractionError, RawExtraction};
    use async_trait::async_trait;
    use std::time::Duration;
    use tempfile::TempDir;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct PathExtractor;

    #[async_trait]
    impl ContentExtractor for PathExtractor {
        async fn extract(&self, url: &Url) -> Result<ContentRecord, ExtractionError> {
            let raw = RawExtraction {
                title: Some(url.path().to_string()),
                ..Default::default()
            };
            Ok(ContentRecord::from_raw(raw, url))
        }
    }

    async fn site() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string(r#"<a href="/a">A</a><a href="/b">B</a>"#)
                    .insert_header("content-type", "text/html"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<p>leaf</p>")
                    .insert_header("content-type", "text/html"),
            )
            .mount(&server)
            .await;
        server
    }

    fn config(seed: &str, dir: &TempDir) -> Config {
        let mut config = Config::for_url(seed);
        config.crawler.delay_seconds = 0.1;
        config.output.directory = dir.path().display().to_string();
        config
    }

    fn registry() -> JobRegistry {
        JobRegistry::new(Arc::new(PathExtractor))
    }

    #[test]
    fn test_create_is_idle() {
        let registry = registry();
        let dir = TempDir::new().unwrap();

        let id = registry.create(config("https://example.com/", &dir)).unwrap();

        assert_eq!(registry.status(id).unwrap().state, JobState::Idle);
        assert_eq!(registry.list().len(), 1);
    }

    #[test]
    fn test_output_dir_exclusive() {
        let registry = registry();
        let dir = TempDir::new().unwrap();

        let first = registry.create(config("https://example.com/", &dir)).unwrap();
        let second = registry.create(config("https://other.com/", &dir));

        match second {
            Err(ScribeError::Registry(RegistryError::OutputDirInUse { owner, .. })) => {
                assert_eq!(owner, first)
            }
            other => panic!("unexpected result: {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_output_dir_compared_canonically() {
        let registry = registry();
        let dir = TempDir::new().unwrap();
        let first = registry.create(config("https://example.com/", &dir)).unwrap();

        let mut aliased = config("https://other.com/", &dir);
        aliased.output.directory = format!("{}/./", dir.path().display());

        assert!(matches!(
            registry.create(aliased),
            Err(ScribeError::Registry(RegistryError::OutputDirInUse { owner, .. })) if owner == first
        ));
    }

    #[test]
    fn test_unknown_job() {
        let registry = registry();

        assert!(matches!(registry.status(42), Err(RegistryError::NotFound(42))));
        assert!(matches!(registry.stop(42), Err(RegistryError::NotFound(42))));
        assert!(matches!(registry.remove(42), Err(RegistryError::NotFound(42))));
    }

    #[test]
    fn test_stop_before_start() {
        let registry = registry();
        let dir = TempDir::new().unwrap();
        let id = registry.create(config("https://example.com/", &dir)).unwrap();

        assert!(matches!(registry.stop(id), Err(RegistryError::NotStarted(_))));
    }

    #[tokio::test]
    async fn test_jobs_run_independently() {
        let server = site().await;
        let seed = format!("{}/", server.uri());
        let registry = registry();
        let dir_a = TempDir::new().unwrap();
        let dir_b = TempDir::new().unwrap();

        let a = registry.create(config(&seed, &dir_a)).unwrap();
        let mut limited = config(&seed, &dir_b);
        limited.crawler.max_pages = 1;
        let b = registry.create(limited).unwrap();

        registry.start(a).unwrap();
        registry.start(b).unwrap();

        let report_a = registry.wait(a).await.unwrap();
        let report_b = registry.wait(b).await.unwrap();

        assert_eq!(report_a.outcome, JobState::Completed);
        assert_eq!(report_a.summary.processed, 3);
        assert_eq!(report_b.summary.processed, 1);
        assert_eq!(registry.status(a).unwrap().state, JobState::Completed);
        assert!(dir_a.path().join("a.md").exists());
        assert!(!dir_b.path().join("a.md").exists());
    }

    #[tokio::test]
    async fn test_stop_running_job() {
        let server = site().await;
        let registry = registry();
        let dir = TempDir::new().unwrap();
        let id = registry
            .create(config(&format!("{}/", server.uri()), &dir))
            .unwrap();

        registry.start(id).unwrap();
        assert!(matches!(
            registry.start(id),
            Err(ScribeError::Registry(RegistryError::AlreadyRunning(_)))
        ));
        registry.stop(id).unwrap();

        let report = registry.wait(id).await.unwrap();

        assert_eq!(report.outcome, JobState::Stopped);
        assert!(report.summary.processed <= 1);
        assert_eq!(registry.status(id).unwrap().state, JobState::Stopped);
    }

    #[tokio::test]
    async fn test_awaited_job_still_counts_as_running() {
        let server = site().await;
        let registry = registry();
        let dir = TempDir::new().unwrap();
        let id = registry
            .create(config(&format!("{}/", server.uri()), &dir))
            .unwrap();
        registry.start(id).unwrap();

        let waiting = registry.wait(id);
        tokio::pin!(waiting);
        tokio::select! {
            biased;
            _ = &mut waiting => panic!("job finished before the delay elapsed"),
            _ = tokio::time::sleep(Duration::from_millis(10)) => {}
        }

        assert!(matches!(
            registry.start(id),
            Err(ScribeError::Registry(RegistryError::AlreadyRunning(_)))
        ));
        assert!(matches!(
            registry.wait(id).await,
            Err(ScribeError::Registry(RegistryError::AlreadyAwaited(_)))
        ));

        registry.stop(id).unwrap();
        let report = waiting.await.unwrap();
        assert_eq!(report.outcome, JobState::Stopped);
    }

    #[tokio::test]
    async fn test_remove_stops_awaited_job() {
        let server = site().await;
        let registry = registry();
        let dir = TempDir::new().unwrap();
        let id = registry
            .create(config(&format!("{}/", server.uri()), &dir))
            .unwrap();
        registry.start(id).unwrap();

        let waiting = registry.wait(id);
        tokio::pin!(waiting);
        tokio::select! {
            biased;
            _ = &mut waiting => panic!("job finished before the delay elapsed"),
            _ = tokio::time::sleep(Duration::from_millis(10)) => {}
        }

        registry.remove(id).unwrap();

        assert!(matches!(registry.status(id), Err(RegistryError::NotFound(_))));
        let report = waiting.await.unwrap();
        assert_eq!(report.outcome, JobState::Stopped);
        assert!(report.summary.processed < 3);
    }
}
