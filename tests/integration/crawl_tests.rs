//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end, with a recording extractor standing in
//! for real content extraction.

use async_trait::async_trait;
use site_scribe::config::Config;
use site_scribe::crawler::{
    ContentExtractor, ContentRecord, ExtractionError, HtmlContentExtractor, RawExtraction,
};
use site_scribe::output::INDEX_FILE_NAME;
use site_scribe::storage::{JsonStateStore, StateStore};
use site_scribe::{CrawlState, JobState, Orchestrator};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Extractor that records every URL it is asked for
#[derive(Default)]
struct RecordingExtractor {
    calls: Mutex<Vec<String>>,
    failing_paths: HashSet<String>,
    cancel_on: Option<(String, CancellationToken)>,
}

impl RecordingExtractor {
    fn failing(paths: &[&str]) -> Self {
        Self {
            failing_paths: paths.iter().map(|p| p.to_string()).collect(),
            ..Default::default()
        }
    }

    fn cancelling_on(path: &str, token: CancellationToken) -> Self {
        Self {
            cancel_on: Some((path.to_string(), token)),
            ..Default::default()
        }
    }

    fn paths(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|u| Url::parse(u).unwrap().path().to_string())
            .collect()
    }
}

#[async_trait]
impl ContentExtractor for RecordingExtractor {
    async fn extract(&self, url: &Url) -> Result<ContentRecord, ExtractionError> {
        self.calls.lock().unwrap().push(url.to_string());

        if let Some((path, token)) = &self.cancel_on {
            if url.path() == path {
                token.cancel();
            }
        }

        if self.failing_paths.contains(url.path()) {
            return Err(ExtractionError::Message("model timeout".to_string()));
        }

        Ok(ContentRecord::from_raw(
            RawExtraction {
                title: Some(format!("Page {}", url.path())),
                body: Some(format!("Content of {}", url.path())),
                ..Default::default()
            },
            url,
        ))
    }
}

/// Mounts an HTML page at `page_path` linking to each of `links`
async fn mount_page(server: &MockServer, page_path: &str, links: &[&str]) {
    let anchors: String = links
        .iter()
        .map(|link| format!(r#"<a href="{}">{}</a>"#, link, link))
        .collect();

    Mock::given(method("GET"))
        .and(path(page_path))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(format!(
                    "<html><head><title>{}</title></head><body>{}</body></html>",
                    page_path, anchors
                ))
                .insert_header("content-type", "text/html"),
        )
        .mount(server)
        .await;
}

/// Creates a test configuration crawling `server` into `dir`
fn create_test_config(server: &MockServer, dir: &Path, max_depth: u32, max_pages: u64) -> Config {
    let mut config = Config::for_url(format!("{}/", server.uri()));
    config.crawler.max_depth = max_depth;
    config.crawler.max_pages = max_pages;
    config.crawler.delay_seconds = 0.1;
    config.crawler.resume = false;
    config.output.directory = dir.display().to_string();
    config
}

fn artifact_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .unwrap()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .filter(|name| name.ends_with(".md") && name != INDEX_FILE_NAME)
        .collect();
    names.sort();
    names
}

fn load_state(dir: &Path) -> CrawlState {
    let checkpoint = JsonStateStore::in_directory(dir).load().unwrap().unwrap();
    CrawlState::from_checkpoint(checkpoint).unwrap()
}

async fn run(config: Config, extractor: Arc<RecordingExtractor>) -> site_scribe::CrawlReport {
    Orchestrator::new(config, extractor)
        .unwrap()
        .run(CancellationToken::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_full_crawl_small_site() {
    let server = MockServer::start().await;
    mount_page(&server, "/", &["/a", "/b", "/c"]).await;
    mount_page(&server, "/a", &[]).await;
    mount_page(&server, "/b", &[]).await;
    mount_page(&server, "/c", &[]).await;

    let dir = TempDir::new().unwrap();
    let extractor = Arc::new(RecordingExtractor::default());
    let report = run(create_test_config(&server, dir.path(), 1, 10), extractor.clone()).await;

    assert_eq!(report.outcome, JobState::Completed);
    assert_eq!(report.summary.processed, 4);
    assert_eq!(report.summary.failed, 0);
    assert_eq!(report.summary.pending, 0);
    assert_eq!(extractor.paths(), vec!["/", "/a", "/b", "/c"]);

    assert_eq!(
        artifact_names(dir.path()),
        vec!["a.md", "b.md", "c.md", "index.md"]
    );

    let index = fs::read_to_string(&report.index_path).unwrap();
    assert_eq!(index.lines().filter(|l| l.starts_with("- [")).count(), 4);
    assert!(index.contains("> **Total Pages:** 4"));

    let artifact = fs::read_to_string(dir.path().join("a.md")).unwrap();
    assert!(artifact.starts_with("# Page /a"));
    assert!(artifact.contains("Content of /a"));

    let state = load_state(dir.path());
    assert_eq!(state.processed_count(), 4);
    assert_eq!(state.visited_count(), 4);
}

#[tokio::test]
async fn test_depth_cutoff() {
    let server = MockServer::start().await;
    mount_page(&server, "/", &["/a"]).await;
    mount_page(&server, "/a", &["/b"]).await;
    mount_page(&server, "/b", &[]).await;

    let dir = TempDir::new().unwrap();
    let extractor = Arc::new(RecordingExtractor::default());
    let report = run(create_test_config(&server, dir.path(), 1, 10), extractor.clone()).await;

    assert_eq!(report.summary.processed, 2);
    assert_eq!(extractor.paths(), vec!["/", "/a"]);

    let state = load_state(dir.path());
    let b = format!("{}/b", server.uri());
    assert!(!state.is_visited(&b));
    assert!(!state.is_pending(&b));
}

#[tokio::test]
async fn test_cycles_are_visited_once() {
    let server = MockServer::start().await;
    mount_page(&server, "/", &["/a", "/b"]).await;
    mount_page(&server, "/a", &["/", "/b", "/a#top"]).await;
    mount_page(&server, "/b", &["/a", "/"]).await;

    let dir = TempDir::new().unwrap();
    let extractor = Arc::new(RecordingExtractor::default());
    let report = run(create_test_config(&server, dir.path(), 3, 10), extractor.clone()).await;

    assert_eq!(report.outcome, JobState::Completed);
    assert_eq!(report.summary.processed, 3);
    assert_eq!(extractor.paths(), vec!["/", "/a", "/b"]);
}

#[tokio::test]
async fn test_out_of_scope_links_ignored() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        &[
            "https://elsewhere.example/",
            "/manual.pdf",
            "/admin/panel",
            "mailto:docs@example.com",
            "/guide",
        ],
    )
    .await;
    mount_page(&server, "/guide", &[]).await;

    let dir = TempDir::new().unwrap();
    let extractor = Arc::new(RecordingExtractor::default());
    run(create_test_config(&server, dir.path(), 2, 10), extractor.clone()).await;

    assert_eq!(extractor.paths(), vec!["/", "/guide"]);
}

#[tokio::test]
async fn test_page_budget_then_resume() {
    let server = MockServer::start().await;
    mount_page(&server, "/", &["/p1", "/p2", "/p3", "/p4", "/p5"]).await;
    for page in ["/p1", "/p2", "/p3", "/p4", "/p5"] {
        mount_page(&server, page, &[]).await;
    }

    let dir = TempDir::new().unwrap();
    let first = Arc::new(RecordingExtractor::default());
    let report = run(create_test_config(&server, dir.path(), 2, 3), first.clone()).await;

    assert_eq!(report.outcome, JobState::Completed);
    assert_eq!(report.summary.processed, 3);
    assert_eq!(report.summary.pending, 3);
    assert_eq!(artifact_names(dir.path()).len(), 3);

    let state = load_state(dir.path());
    let pending: Vec<(String, u32)> = state
        .pending()
        .map(|(url, depth)| (url.path().to_string(), *depth))
        .collect();
    assert_eq!(
        pending,
        vec![
            ("/p3".to_string(), 1),
            ("/p4".to_string(), 1),
            ("/p5".to_string(), 1)
        ]
    );

    let mut config = create_test_config(&server, dir.path(), 2, 10);
    config.crawler.resume = true;
    let second = Arc::new(RecordingExtractor::default());
    let report = run(config, second.clone()).await;

    assert_eq!(report.outcome, JobState::Completed);
    assert_eq!(report.summary.processed, 6);
    assert_eq!(report.summary.pending, 0);
    assert_eq!(second.paths(), vec!["/p3", "/p4", "/p5"]);
    assert_eq!(artifact_names(dir.path()).len(), 6);
}

#[tokio::test]
async fn test_extraction_failure_is_isolated() {
    let server = MockServer::start().await;
    mount_page(&server, "/", &["/ok1", "/bad", "/ok2"]).await;
    mount_page(&server, "/ok1", &[]).await;
    mount_page(&server, "/bad", &["/behind-bad"]).await;
    mount_page(&server, "/ok2", &[]).await;
    mount_page(&server, "/behind-bad", &[]).await;

    let dir = TempDir::new().unwrap();
    let extractor = Arc::new(RecordingExtractor::failing(&["/bad"]));
    let report = run(create_test_config(&server, dir.path(), 2, 10), extractor.clone()).await;

    assert_eq!(report.outcome, JobState::Completed);
    assert_eq!(report.summary.processed, 5);
    assert_eq!(report.summary.failed, 1);
    assert!(extractor.paths().contains(&"/behind-bad".to_string()));

    let degraded = fs::read_to_string(dir.path().join("bad.md")).unwrap();
    assert!(degraded.starts_with("# Error: /bad"));
    assert!(degraded.contains("Failed to extract content: model timeout"));

    let state = load_state(dir.path());
    assert!(state.is_failed(&format!("{}/bad", server.uri())));
    assert!(!state.is_failed(&format!("{}/ok1", server.uri())));
}

#[tokio::test]
async fn test_artifact_write_failure_is_isolated() {
    let server = MockServer::start().await;
    mount_page(&server, "/", &["/bad", "/ok"]).await;
    mount_page(&server, "/bad", &["/behind-bad"]).await;
    mount_page(&server, "/ok", &[]).await;
    mount_page(&server, "/behind-bad", &[]).await;

    let dir = TempDir::new().unwrap();
    // A directory where the artifact should go makes the write fail
    fs::create_dir(dir.path().join("bad.md")).unwrap();

    let extractor = Arc::new(RecordingExtractor::default());
    let report = run(create_test_config(&server, dir.path(), 2, 10), extractor.clone()).await;

    assert_eq!(report.outcome, JobState::Completed);
    assert_eq!(report.summary.processed, 3);
    assert_eq!(report.summary.failed, 1);
    assert_eq!(report.summary.pending, 0);
    assert_eq!(extractor.paths(), vec!["/", "/bad", "/ok", "/behind-bad"]);
    assert!(dir.path().join("ok.md").is_file());
    assert!(dir.path().join("behind-bad.md").is_file());

    let index = fs::read_to_string(&report.index_path).unwrap();
    assert!(!index.contains("(bad.md)"));
    assert!(index.contains("(ok.md)"));
    assert!(index.contains("> **Total Pages:** 3"));

    let state = load_state(dir.path());
    assert!(state.is_failed(&format!("{}/bad", server.uri())));
    assert_eq!(state.processed_count(), 3);
}

#[tokio::test]
async fn test_builtin_extractor_fetches_each_page_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><head><title>Home</title></head><body><main><p>Welcome</p><a href="/guide">Guide</a></main></body></html>"#,
            "text/html",
        ))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/guide"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(
            r#"<html><head><title>Guide</title></head><body><main><p>Steps</p></main></body></html>"#,
            "text/html",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = create_test_config(&server, dir.path(), 3, 10);
    let extractor = HtmlContentExtractor::from_config(&config).unwrap();
    let report = Orchestrator::new(config, Arc::new(extractor))
        .unwrap()
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.summary.processed, 2);
    let guide = fs::read_to_string(dir.path().join("guide.md")).unwrap();
    assert!(guide.starts_with("# Guide"));
    assert!(guide.contains("Steps"));
    server.verify().await;
}

#[tokio::test]
async fn test_discovery_failure_keeps_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let extractor = Arc::new(RecordingExtractor::default());
    let report = run(create_test_config(&server, dir.path(), 3, 10), extractor.clone()).await;

    assert_eq!(report.outcome, JobState::Completed);
    assert_eq!(report.summary.processed, 1);
    assert_eq!(report.summary.failed, 0);
    assert!(dir.path().join("index.md").exists());
}

#[tokio::test]
async fn test_stop_mid_crawl_then_resume() {
    let server = MockServer::start().await;
    mount_page(&server, "/", &["/a", "/b", "/c"]).await;
    mount_page(&server, "/a", &[]).await;
    mount_page(&server, "/b", &[]).await;
    mount_page(&server, "/c", &[]).await;

    let dir = TempDir::new().unwrap();
    let cancel = CancellationToken::new();
    let extractor = Arc::new(RecordingExtractor::cancelling_on("/a", cancel.clone()));
    let config = create_test_config(&server, dir.path(), 2, 10);

    let report = Orchestrator::new(config, extractor.clone())
        .unwrap()
        .run(cancel)
        .await
        .unwrap();

    assert_eq!(report.outcome, JobState::Stopped);
    assert_eq!(report.summary.processed, 2);
    assert_eq!(report.summary.pending, 2);
    assert!(dir.path().join("a.md").exists());

    let mut config = create_test_config(&server, dir.path(), 2, 10);
    config.crawler.resume = true;
    let resumed = Arc::new(RecordingExtractor::default());
    let report = run(config, resumed.clone()).await;

    assert_eq!(report.outcome, JobState::Completed);
    assert_eq!(report.summary.processed, 4);
    assert_eq!(resumed.paths(), vec!["/b", "/c"]);
}

#[tokio::test]
async fn test_status_updates_published() {
    let server = MockServer::start().await;
    mount_page(&server, "/", &["/a"]).await;
    mount_page(&server, "/a", &[]).await;

    let dir = TempDir::new().unwrap();
    let orchestrator = Orchestrator::new(
        create_test_config(&server, dir.path(), 2, 10),
        Arc::new(RecordingExtractor::default()),
    )
    .unwrap();
    let status = orchestrator.subscribe();
    assert_eq!(status.borrow().state, JobState::Idle);

    orchestrator.run(CancellationToken::new()).await.unwrap();

    let last = status.borrow().clone();
    assert_eq!(last.state, JobState::Completed);
    assert_eq!(last.processed, 2);
    assert_eq!(last.pending, 0);
    assert!(last.current_url.is_none());
}
