//! Error types for session memory stores.

use std::time::Duration;

/// Errors from a backing store. [`crate::SessionMemory`] logs and swallows
/// these; they never reach request handlers.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
}

impl From<rusqlite::Error> for MemoryError {
    fn from(err: rusqlite::Error) -> Self {
        MemoryError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for MemoryError {
    fn from(err: serde_json::Error) -> Self {
        MemoryError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MemoryError>;
