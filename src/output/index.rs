//! Navigation index over all artifacts of a job

use crate::output::{write_atomically, OutputResult};
use crate::state::CrawlState;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Name of the index file; the leading underscore keeps it out of the slug space
pub const INDEX_FILE_NAME: &str = "_index.md";

/// Derives a display title from an artifact filename
///
/// The extension is dropped, underscores become spaces, and each run of letters
/// is capitalized.
///
/// # Examples
///
/// ```
/// use site_scribe::output::derive_title;
///
/// assert_eq!(derive_title("getting-started.md"), "Getting-Started");
/// assert_eq!(derive_title("api_reference_v2.md"), "Api Reference V2");
/// ```
pub fn derive_title(filename: &str) -> String {
    let stem = filename.strip_suffix(".md").unwrap_or(filename);

    let mut title = String::with_capacity(stem.len());
    let mut previous_is_letter = false;
    for c in stem.replace('_', " ").chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                title.extend(c.to_lowercase());
            } else {
                title.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            title.push(c);
            previous_is_letter = false;
        }
    }

    title
}

/// Builds the index document
///
/// # Arguments
///
/// * `base_url` - The job's seed URL
/// * `url_to_filename` - The artifacts to list
/// * `page_count` - Number of processed pages
/// * `generated_at` - Timestamp shown in the header
///
/// Entries are sorted by filename.
pub fn build_index(
    base_url: &str,
    url_to_filename: &BTreeMap<String, String>,
    page_count: u64,
    generated_at: DateTime<Utc>,
) -> String {
    let mut md = String::new();

    md.push_str("# Documentation Index\n\n");
    md.push_str(&format!("> **Website:** {}  \n", base_url));
    md.push_str(&format!(
        "> **Generated:** {}  \n",
        generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    md.push_str(&format!("> **Total Pages:** {}\n\n", page_count));

    md.push_str("## Pages\n\n");

    let mut filenames: Vec<&String> = url_to_filename.values().collect();
    filenames.sort();
    for filename in filenames {
        md.push_str(&format!("- [{}]({})\n", derive_title(filename), filename));
    }

    md.push_str("\n---\n\n");
    md.push_str(&format!("*Index generated automatically from {}*\n", base_url));

    md
}

/// Writes `_index.md` for the given crawl state
///
/// Only artifacts present in `output_dir` are listed; a URL whose artifact
/// could not be written keeps its allocated name but gets no entry.
///
/// # Returns
///
/// * `Ok(PathBuf)` - Path of the index file
/// * `Err(OutputError)` - The index could not be written
pub fn write_index(output_dir: &Path, state: &CrawlState) -> OutputResult<PathBuf> {
    let path = output_dir.join(INDEX_FILE_NAME);
    let written: BTreeMap<String, String> = state
        .url_to_filename()
        .iter()
        .filter(|(_, filename)| output_dir.join(filename.as_str()).is_file())
        .map(|(url, filename)| (url.clone(), filename.clone()))
        .collect();

    let content = build_index(
        state.base_url().as_str(),
        &written,
        state.processed_count(),
        Utc::now(),
    );

    write_atomically(&path, &content)?;
    tracing::info!(
        "Index with {} entries written to {}",
        written.len(),
        path.display()
    );

    Ok(path)
}
