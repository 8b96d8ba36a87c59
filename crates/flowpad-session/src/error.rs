//! Error types for the session engine

use flowpad_storage::StorageError;
use thiserror::Error;

/// Result type alias for session operations
pub type SessionResult<T> = std::result::Result<T, SessionError>;

/// Session error types
#[derive(Error, Debug)]
pub enum SessionError {
    /// Rejected before any storage call was made
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("A save or load is already in progress")]
    Busy,

    #[error(transparent)]
    Graph(#[from] flowpad_core::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Worker error: {0}")]
    Worker(String),
}
