//! Error types for session persistence

use thiserror::Error;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur while saving or loading session snapshots
#[derive(Error, Debug)]
pub enum StoreError {
    /// Session or snapshot version not found
    #[error("Snapshot not found: {0}")]
    NotFound(String),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Binary serialization error
    #[error("Binary serialization error: {0}")]
    BinarySerialization(#[from] bincode::Error),

    /// Backend failure that is not an I/O error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Malformed snapshot or request
    #[error("Invalid snapshot: {0}")]
    Invalid(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
