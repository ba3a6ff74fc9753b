//! Book model
//!
//! The one tracked entity type shipped with the crate. Besides its business
//! fields a book carries its optimistic-lock version and the usual audit
//! columns (who created it, who touched it last, and when).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::audited::Audited;
use super::ids::BookId;
use crate::error::{HistoryError, HistoryResult};

/// Upper bound for author and title lengths
pub const MAX_FIELD_LEN: usize = 255;

/// A book record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Assigned by the store on first save
    pub id: Option<BookId>,

    pub author: String,

    pub title: String,

    /// Optimistic concurrency token
    #[serde(default)]
    pub version: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_date: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified_date: Option<DateTime<Utc>>,
}

impl Book {
    /// Create an unsaved book
    pub fn new(author: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: None,
            author: author.into(),
            title: title.into(),
            version: 0,
            created_by: None,
            created_date: None,
            last_modified_by: None,
            last_modified_date: None,
        }
    }

    /// Whether the book has been saved at least once
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }
}

impl fmt::Display for Book {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} by {}", self.title, self.author)
    }
}

impl Audited for Book {
    const ENTITY_TYPE: &'static str = "book";
    const DISPLAY_NAME: &'static str = "Book";

    fn key(&self) -> Option<Uuid> {
        self.id.map(Uuid::from)
    }

    fn assign_key(&mut self, key: Uuid) {
        self.id = Some(BookId::from_uuid(key));
    }

    fn version(&self) -> u64 {
        self.version
    }

    fn set_version(&mut self, version: u64) {
        self.version = version;
    }

    fn validate(&self) -> HistoryResult<()> {
        validate_field("author", &self.author)?;
        validate_field("title", &self.title)?;
        Ok(())
    }

    fn stamp(&mut self, auditor: &str, at: DateTime<Utc>, created: bool) {
        if created {
            self.created_by = Some(auditor.to_string());
            self.created_date = Some(at);
        }
        self.last_modified_by = Some(auditor.to_string());
        self.last_modified_date = Some(at);
    }

    fn label(&self) -> Option<String> {
        Some(self.title.clone())
    }
}

/// Validation errors for books
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookValidationError {
    Blank(&'static str),
    TooLong(&'static str, usize),
}

impl fmt::Display for BookValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Blank(field) => write!(f, "Book {} cannot be blank", field),
            Self::TooLong(field, len) => write!(
                f,
                "Book {} too long ({} chars, max {})",
                field, len, MAX_FIELD_LEN
            ),
        }
    }
}

impl std::error::Error for BookValidationError {}

impl From<BookValidationError> for HistoryError {
    fn from(err: BookValidationError) -> Self {
        HistoryError::Validation(err.to_string())
    }
}

fn validate_field(name: &'static str, value: &str) -> Result<(), BookValidationError> {
    if value.trim().is_empty() {
        return Err(BookValidationError::Blank(name));
    }
    let len = value.chars().count();
    if len > MAX_FIELD_LEN {
        return Err(BookValidationError::TooLong(name, len));
    }
    Ok(())
}
