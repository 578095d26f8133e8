//! Error types for state tracking.

use std::io;
use thiserror::Error;

/// Result type for state operations.
pub type StateResult<T> = Result<T, StateError>;

/// Errors that can occur while reading or writing sync state.
#[derive(Debug, Error)]
pub enum StateError {
    /// I/O error from a persistent store.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The persisted table could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The persisted table violates the row rules.
    #[error("corrupt state table: {message}")]
    Corrupt {
        /// Description of the problem.
        message: String,
    },
}

impl StateError {
    /// Creates a corrupt table error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }
}
