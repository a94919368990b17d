//! Site-Scribe main entry point
//!
//! This is the command-line interface for the Site-Scribe documentation crawler.

use anyhow::{bail, Context};
use clap::Parser;
use site_scribe::config::{load_config_with_hash, validate, Config};
use site_scribe::crawler::crawl;
use site_scribe::output::{print_summary, summarize, write_index};
use site_scribe::storage::{JsonStateStore, StateStore};
use site_scribe::CrawlState;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Site-Scribe: turn a website into markdown documentation
///
/// Site-Scribe crawls a single site breadth-first, writes one markdown file
/// per page plus a navigation index, and checkpoints its progress so an
/// interrupted crawl picks up where it stopped.
#[derive(Parser, Debug)]
#[command(name = "site-scribe")]
#[command(version)]
#[command(about = "Turn a website into markdown documentation", long_about = None)]
struct Cli {
    /// Website to crawl (overrides the URL in the config file)
    #[arg(value_name = "URL")]
    url: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Maximum crawl depth
    #[arg(short, long)]
    depth: Option<u32>,

    /// Maximum number of pages to process
    #[arg(short, long)]
    pages: Option<u64>,

    /// Output directory
    #[arg(short, long, value_name = "DIR")]
    output: Option<String>,

    /// Delay between pages in seconds
    #[arg(long, value_name = "SECONDS")]
    delay: Option<f64>,

    /// Start a fresh crawl, ignoring any checkpoint
    #[arg(long)]
    no_resume: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "export_index"])]
    dry_run: bool,

    /// Show statistics from the checkpoint and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_index"])]
    stats: bool,

    /// Regenerate the index from the checkpoint and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export_index: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let config = resolve_config(&cli)?;

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.export_index {
        handle_export_index(&config)?;
    } else {
        handle_crawl(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site_scribe=info,warn"),
            1 => EnvFilter::new("site_scribe=debug,info"),
            2 => EnvFilter::new("site_scribe=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Builds the effective configuration from the config file and flags
///
/// Flags override file values; a bare host gets an `https://` scheme.
fn resolve_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match (&cli.config, &cli.url) {
        (Some(path), _) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        (None, Some(url)) => Config::for_url(url.clone()),
        (None, None) => bail!("Either a URL or --config is required"),
    };

    if let Some(url) = &cli.url {
        config.target.url = url.clone();
    }
    if !config.target.url.contains("://") {
        config.target.url = format!("https://{}", config.target.url);
    }

    if let Some(depth) = cli.depth {
        config.crawler.max_depth = depth;
    }
    if let Some(pages) = cli.pages {
        config.crawler.max_pages = pages;
    }
    if let Some(output) = &cli.output {
        config.output.directory = output.clone();
    }
    if let Some(delay) = cli.delay {
        config.crawler.delay_seconds = delay;
    }
    if cli.no_resume {
        config.crawler.resume = false;
    }

    validate(&config).context("Invalid configuration")?;
    Ok(config)
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Site-Scribe Dry Run ===\n");

    println!("Target: {}", config.target.url);

    println!("\nCrawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Delay: {}s", config.crawler.delay_seconds);
    println!("  Resume: {}", config.crawler.resume);
    println!("  Checkpoint interval: {}", config.crawler.checkpoint_interval);
    println!("  Fetch timeout: {}s", config.crawler.fetch_timeout_seconds);

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput: {}", config.output.directory);

    if !config.filter.skip_extensions.is_empty() || !config.filter.skip_paths.is_empty() {
        println!("\nExtra Filters:");
        for ext in &config.filter.skip_extensions {
            println!("  - extension {}", ext);
        }
        for segment in &config.filter.skip_paths {
            println!("  - path segment {}", segment);
        }
    }

    println!("\n✓ Configuration is valid");
}

fn load_checkpointed_state(output_dir: &Path) -> anyhow::Result<CrawlState> {
    let store = JsonStateStore::in_directory(output_dir);
    let checkpoint = store
        .load()
        .with_context(|| format!("Failed to read {}", store.location()))?
        .with_context(|| format!("No checkpoint found at {}", store.location()))?;

    Ok(CrawlState::from_checkpoint(checkpoint)?)
}

/// Handles the --stats mode: shows statistics from the checkpoint
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let output_dir = Path::new(&config.output.directory);
    println!("Output: {}\n", output_dir.display());

    let state = load_checkpointed_state(output_dir)?;
    if let Some(timestamp) = state.checkpoint_timestamp() {
        println!("Checkpoint taken: {}\n", timestamp.format("%Y-%m-%d %H:%M:%S UTC"));
    }

    print_summary(&summarize(&state, Duration::ZERO));
    Ok(())
}

/// Handles the --export-index mode: rewrites the index from the checkpoint
fn handle_export_index(config: &Config) -> anyhow::Result<()> {
    let output_dir = Path::new(&config.output.directory);

    println!("=== Exporting Index ===\n");
    println!("Output: {}", output_dir.display());

    let state = load_checkpointed_state(output_dir)?;
    let path = write_index(output_dir, &state)?;

    println!("✓ Index exported to: {}", path.display());
    Ok(())
}

/// Handles the main crawl operation
///
/// Ctrl+C requests a cooperative stop; the crawl checkpoints and can be resumed.
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    if config.crawler.resume {
        tracing::info!("Starting crawl (will resume from checkpoint if one exists)");
    } else {
        tracing::info!("Starting fresh crawl (ignoring previous state)");
    }

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current page");
            ctrl_c_token.cancel();
        }
    });

    match crawl(config, cancel).await {
        Ok(report) => {
            println!();
            print_summary(&report.summary);
            println!("\nOutput: {}", report.output_dir.display());
            println!("Index: {}", report.index_path.display());
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
