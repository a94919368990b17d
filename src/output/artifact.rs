//! Per-page markdown artifacts

use crate::crawler::ContentRecord;
use crate::output::{write_atomically, OutputResult};
use std::path::{Path, PathBuf};

/// Renders a content record as a markdown document
///
/// Layout: title heading, a metadata quote block (source, generation time,
/// description), optional tags, then the body between horizontal rules and a
/// provenance footer.
pub fn render_artifact(record: &ContentRecord) -> String {
    let mut md = String::new();

    md.push_str(&format!("# {}\n\n", record.title));

    md.push_str(&format!("> **Source:** {}  \n", record.source_url));
    md.push_str(&format!(
        "> **Generated:** {}  \n",
        record.extracted_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    md.push_str(&format!("> **Description:** {}\n\n", record.description));

    if !record.tags.is_empty() {
        let tags: Vec<String> = record
            .tags
            .iter()
            .map(|t| format!("#{}", t.split_whitespace().collect::<Vec<_>>().join("-")))
            .collect();
        md.push_str(&format!("**Tags:** {}\n\n", tags.join(" ")));
    }

    md.push_str("---\n\n");
    md.push_str(record.body.trim());
    md.push_str("\n\n---\n\n");
    md.push_str(&format!(
        "*This document was automatically generated from {}*\n",
        record.source_url
    ));

    md
}

/// Writes artifacts into a job's output directory
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    output_dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Renders `record` and writes it as `filename`, replacing any previous version
    ///
    /// # Returns
    ///
    /// * `Ok(PathBuf)` - Path of the written artifact
    /// * `Err(OutputError)` - The artifact could not be written
    pub fn write(&self, record: &ContentRecord, filename: &str) -> OutputResult<PathBuf> {
        let path = self.output_dir.join(filename);
        write_atomically(&path, &render_artifact(record))?;
        Ok(path)
    }
}
