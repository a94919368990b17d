//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlState`: visited/failed sets, the FIFO frontier, counters and the filename map
//! - `filename`: URL → artifact filename derivation

mod crawl_state;
mod filename;

// Re-export main types
pub use crawl_state::CrawlState;
pub use filename::{derive_slug, with_extension, ARTIFACT_EXTENSION, INDEX_SLUG, MAX_SLUG_LEN};
