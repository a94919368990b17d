//! Storage module for persisting crawl checkpoints
//!
//! This module provides:
//! - The `Checkpoint` record, the on-disk shape of a crawl state
//! - The `StateStore` trait abstracting checkpoint persistence
//! - A JSON file implementation living in the job's output directory

mod json;
mod traits;

pub use json::{JsonStateStore, CHECKPOINT_FILE_NAME};
pub use traits::{StateStore, StorageError, StorageResult};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Serialized crawl state
///
/// Every field except `base_url` defaults when missing, so checkpoints written
/// by older versions still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Canonical seed URL of the job
    pub base_url: String,

    /// Every URL attempted so far
    #[serde(default)]
    pub visited_urls: Vec<String>,

    /// URLs whose extraction or persistence failed
    #[serde(default)]
    pub failed_urls: Vec<String>,

    /// The frontier as `[url, depth]` pairs, in crawl order
    #[serde(default)]
    pub pending_urls: Vec<(String, u32)>,

    /// Number of artifacts written
    #[serde(default)]
    pub processed_count: u64,

    /// Filename collision counter
    #[serde(default)]
    pub file_counter: u64,

    /// Allocated artifact filenames
    #[serde(default)]
    pub url_to_filename: BTreeMap<String, String>,

    /// When the checkpoint was taken
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}
