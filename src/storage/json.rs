//! JSON checkpoint file

use crate::storage::traits::{StateStore, StorageResult};
use crate::storage::Checkpoint;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Name of the checkpoint file inside a job's output directory
pub const CHECKPOINT_FILE_NAME: &str = "crawl_state.json";

/// Checkpoint store backed by a pretty-printed JSON file
///
/// Writes go to a sibling temporary file that is then renamed over the
/// checkpoint, so a crash mid-write leaves the previous checkpoint intact.
#[derive(Debug, Clone)]
pub struct JsonStateStore {
    path: PathBuf,
}

impl JsonStateStore {
    /// Store at `<output_dir>/crawl_state.json`
    pub fn in_directory(output_dir: &Path) -> Self {
        Self {
            path: output_dir.join(CHECKPOINT_FILE_NAME),
        }
    }

    /// Store at an explicit path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for JsonStateStore {
    fn checkpoint(&self, checkpoint: &Checkpoint) -> StorageResult<()> {
        let json = serde_json::to_string_pretty(checkpoint)?;
        let temp = self.temp_path();

        fs::write(&temp, json)?;
        fs::rename(&temp, &self.path)?;

        tracing::debug!(
            "Checkpoint written to {} ({} pending, {} visited)",
            self.path.display(),
            checkpoint.pending_urls.len(),
            checkpoint.visited_urls.len()
        );
        Ok(())
    }

    fn load(&self) -> StorageResult<Option<Checkpoint>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let checkpoint: Checkpoint = serde_json::from_str(&content)?;
        Ok(Some(checkpoint))
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
