use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for a Site-Scribe crawl job
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub target: TargetConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent", default)]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub filter: FilterConfig,
}

impl Config {
    /// Builds a configuration for `url` with every other setting at its default
    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            target: TargetConfig { url: url.into() },
            crawler: CrawlerConfig::default(),
            user_agent: UserAgentConfig::default(),
            output: OutputConfig::default(),
            filter: FilterConfig::default(),
        }
    }
}

/// The site being crawled
#[derive(Debug, Clone, Deserialize)]
pub struct TargetConfig {
    /// Seed URL; its host defines the crawl domain
    pub url: String,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Maximum depth to crawl from the seed URL
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Maximum number of pages to turn into artifacts
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u64,

    /// Politeness delay between pages (seconds)
    #[serde(rename = "delay-seconds", default = "default_delay_seconds")]
    pub delay_seconds: f64,

    /// Continue from the checkpoint in the output directory if one exists
    #[serde(default = "default_resume")]
    pub resume: bool,

    /// Number of newly processed pages between checkpoints
    #[serde(rename = "checkpoint-interval", default = "default_checkpoint_interval")]
    pub checkpoint_interval: u64,

    /// Timeout for a single HTTP fetch (seconds)
    #[serde(
        rename = "fetch-timeout-seconds",
        default = "default_fetch_timeout_seconds"
    )]
    pub fetch_timeout_seconds: u64,
}

impl CrawlerConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs_f64(self.delay_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_seconds)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_pages: default_max_pages(),
            delay_seconds: default_delay_seconds(),
            resume: default_resume(),
            checkpoint_interval: default_checkpoint_interval(),
            fetch_timeout_seconds: default_fetch_timeout_seconds(),
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name", default = "default_crawler_name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version", default = "default_crawler_version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url", default)]
    pub contact_url: Option<String>,
}

impl UserAgentConfig {
    /// Formats the User-Agent header value: `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(contact) => format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, contact
            ),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: default_crawler_name(),
            crawler_version: default_crawler_version(),
            contact_url: None,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving artifacts, the index and the checkpoint
    #[serde(default = "default_output_directory")]
    pub directory: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_output_directory(),
        }
    }
}

/// Additional link filter rules, appended to the built-in lists
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterConfig {
    /// Path suffixes to skip, e.g. ".xml"
    #[serde(rename = "skip-extensions", default)]
    pub skip_extensions: Vec<String>,

    /// Path fragments to skip, e.g. "/private/"
    #[serde(rename = "skip-paths", default)]
    pub skip_paths: Vec<String>,
}

fn default_max_depth() -> u32 {
    3
}

fn default_max_pages() -> u64 {
    100
}

fn default_delay_seconds() -> f64 {
    2.0
}

fn default_resume() -> bool {
    true
}

fn default_checkpoint_interval() -> u64 {
    10
}

fn default_fetch_timeout_seconds() -> u64 {
    10
}

fn default_crawler_name() -> String {
    "site-scribe".to_string()
}

fn default_crawler_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn default_output_directory() -> String {
    "docs".to_string()
}
