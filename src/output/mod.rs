//! Output module for generating crawl artifacts and reports
//!
//! This module handles:
//! - Rendering one markdown artifact per crawled page
//! - Generating the navigation index over all artifacts
//! - Summarizing crawl statistics

mod artifact;
mod index;
pub mod stats;

pub use artifact::{render_artifact, ArtifactWriter};
pub use index::{build_index, derive_title, write_index, INDEX_FILE_NAME};
pub use stats::{print_summary, summarize, CrawlSummary};

use std::fs;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during output generation
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Replaces `path` with `contents` via a sibling temporary file
///
/// Readers never observe a partially written file.
pub(crate) fn write_atomically(path: &Path, contents: &str) -> OutputResult<()> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp = path.with_file_name(format!(".{}.tmp", file_name));

    let write_error = |source| OutputError::Write {
        path: path.display().to_string(),
        source,
    };

    fs::write(&temp, contents).map_err(write_error)?;
    if let Err(e) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(write_error(e));
    }

    Ok(())
}
