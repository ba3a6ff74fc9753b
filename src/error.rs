//! Custom error types for book-revisions
//!
//! This module defines the error hierarchy for the library using thiserror
//! for ergonomic error definitions.

use thiserror::Error;

/// The main error type for book-revisions operations
#[derive(Error, Debug)]
pub enum HistoryError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// A malformed entity was handed to `save`
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// The caller's copy of an entity is older than the stored one
    #[error(
        "{entity_type} {identifier} was modified concurrently: expected version {expected}, found {actual}"
    )]
    ConcurrencyConflict {
        entity_type: &'static str,
        identifier: String,
        expected: u64,
        actual: u64,
    },

    /// Transient contention on the revision counter
    #[error("Revision log busy: {0}")]
    Retryable(String),

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),
}

impl HistoryError {
    /// Create a "not found" error for books
    pub fn book_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Book",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if this is an optimistic-lock violation
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }

    /// Check if the caller may simply try the same operation again
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }
}

impl From<std::io::Error> for HistoryError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for HistoryError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Result type alias for book-revisions operations
pub type HistoryResult<T> = Result<T, HistoryError>;
