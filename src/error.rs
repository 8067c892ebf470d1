//! Error types for store operations.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while reading or writing the note store.
///
/// Any error returned from a write means the surrounding transaction was
/// rolled back: the notes, tags, links, and search index are unchanged.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A required field was missing or blank, or a value was out of range.
    #[error("{field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    /// The full-text engine rejected the match expression.
    #[error("Invalid search query: {0}")]
    InvalidQuery(String),

    /// SQLite error, including failed commits.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create the directory holding the database file.
    #[error("Failed to create database directory '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A stored timestamp did not match the expected format.
    #[error("Invalid stored timestamp: {0}")]
    Timestamp(String),
}

impl StoreError {
    /// Creates a validation error for the given field.
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    /// Returns true for errors caused by caller input rather than storage.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::InvalidQuery(_))
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
