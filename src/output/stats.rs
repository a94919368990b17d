//! Crawl statistics
//!
//! This module provides functionality for summarizing a crawl state and
//! displaying the result.

use crate::state::CrawlState;
use std::time::Duration;

/// Crawl statistics summary
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlSummary {
    /// The job's seed URL
    pub base_url: String,

    /// Artifacts written (degraded ones included)
    pub processed: u64,

    /// URLs attempted
    pub visited: usize,

    /// URLs whose extraction or persistence failed
    pub failed: usize,

    /// URLs still waiting in the frontier
    pub pending: usize,

    /// Wall-clock duration of the run
    pub elapsed: Duration,

    /// Processing throughput over `elapsed`
    pub pages_per_second: f64,
}

impl CrawlSummary {
    /// Share of processed pages that were extracted successfully, in percent
    pub fn success_rate(&self) -> f64 {
        if self.processed == 0 {
            return 0.0;
        }
        let succeeded = self.processed.saturating_sub(self.failed as u64);
        (succeeded as f64 / self.processed as f64) * 100.0
    }
}

/// Summarizes a crawl state
///
/// # Arguments
///
/// * `state` - The crawl state to summarize
/// * `elapsed` - Duration of the run that produced it
pub fn summarize(state: &CrawlState, elapsed: Duration) -> CrawlSummary {
    let seconds = elapsed.as_secs_f64();
    let pages_per_second = if seconds > 0.0 {
        state.processed_count() as f64 / seconds
    } else {
        0.0
    };

    CrawlSummary {
        base_url: state.base_url().to_string(),
        processed: state.processed_count(),
        visited: state.visited_count(),
        failed: state.failed_count(),
        pending: state.pending_count(),
        elapsed,
        pages_per_second,
    }
}

/// Prints a summary to stdout in a formatted manner
pub fn print_summary(summary: &CrawlSummary) {
    println!("=== Crawl Summary ===\n");

    println!("Site: {}", summary.base_url);
    println!();

    println!("Pages:");
    println!("  Processed: {}", summary.processed);
    println!("  Visited: {}", summary.visited);
    println!("  Failed: {}", summary.failed);
    println!("  Pending: {}", summary.pending);
    println!();

    println!(
        "Elapsed: {:.1}s ({:.2} pages/sec)",
        summary.elapsed.as_secs_f64(),
        summary.pages_per_second
    );
    println!(
        "Success Rate: {:.1}% ({} / {} pages extracted cleanly)",
        summary.success_rate(),
        summary.processed.saturating_sub(summary.failed as u64),
        summary.processed
    );
}
