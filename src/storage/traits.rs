//! Storage traits and error types
//!
//! This module defines the trait interface for checkpoint stores and
//! associated error types.

use crate::storage::Checkpoint;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for checkpoint persistence backends
///
/// A store belongs to exactly one job; only that job's loop writes to it.
pub trait StateStore: Send + Sync {
    /// Persists a checkpoint, replacing the previous one
    fn checkpoint(&self, checkpoint: &Checkpoint) -> StorageResult<()>;

    /// Loads the most recent checkpoint
    ///
    /// # Returns
    ///
    /// * `Ok(Some(Checkpoint))` - A checkpoint was found and parsed
    /// * `Ok(None)` - No checkpoint exists
    /// * `Err(StorageError)` - A checkpoint exists but could not be read
    fn load(&self) -> StorageResult<Option<Checkpoint>>;

    /// Loads the most recent checkpoint, treating unreadable data as absent
    ///
    /// A corrupt checkpoint is never fatal: the job starts fresh instead.
    fn restore(&self) -> Option<Checkpoint> {
        match self.load() {
            Ok(checkpoint) => checkpoint,
            Err(e) => {
                tracing::warn!("Ignoring unreadable checkpoint, starting fresh: {}", e);
                None
            }
        }
    }

    /// Human-readable location of the store, for logging
    fn location(&self) -> String;
}
