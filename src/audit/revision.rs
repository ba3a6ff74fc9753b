//! Revision data structures
//!
//! A commit produces one [`RevisionMetadata`] and one [`Revision`] per entity
//! it touched; together they form a [`CommitRecord`], the unit written to the
//! revision log.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{HistoryError, HistoryResult};

/// Position of a commit in the store-wide commit sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevisionNumber(u64);

impl RevisionNumber {
    /// The number handed to the very first commit
    pub const FIRST: RevisionNumber = RevisionNumber(1);

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RevisionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RevisionNumber {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Kind of mutation a revision records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RevisionType {
    Created,
    Modified,
    Deleted,
}

impl fmt::Display for RevisionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RevisionType::Created => write!(f, "CREATED"),
            RevisionType::Modified => write!(f, "MODIFIED"),
            RevisionType::Deleted => write!(f, "DELETED"),
        }
    }
}

/// Who committed a revision, and when
///
/// Shared by every entity touched in the same commit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionMetadata {
    pub revision_number: RevisionNumber,
    pub author: String,
    pub timestamp: DateTime<Utc>,
}

/// Snapshot of one entity at one revision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Revision {
    pub revision_number: RevisionNumber,

    pub entity_type: String,

    pub entity_key: Uuid,

    pub revision_type: RevisionType,

    /// Optimistic-lock version the entity had after this revision
    pub version: u64,

    /// Field values after the change; absent for a tombstone
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<serde_json::Value>,
}

impl Revision {
    pub fn is_tombstone(&self) -> bool {
        self.fields.is_none()
    }

    /// Rebuild the typed entity recorded by this revision
    ///
    /// Returns `Ok(None)` for tombstones.
    pub fn entity<T: DeserializeOwned>(&self) -> HistoryResult<Option<T>> {
        match &self.fields {
            Some(fields) => serde_json::from_value(fields.clone()).map(Some).map_err(|e| {
                HistoryError::Json(format!(
                    "Failed to rebuild {} {} at revision {}: {}",
                    self.entity_type, self.entity_key, self.revision_number, e
                ))
            }),
            None => Ok(None),
        }
    }
}

/// Everything a single commit appended to the log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub metadata: RevisionMetadata,
    pub revisions: Vec<Revision>,
}

impl CommitRecord {
    pub fn revision_number(&self) -> RevisionNumber {
        self.metadata.revision_number
    }

    /// Format the commit for human-readable output
    pub fn format_human_readable(&self) -> String {
        let mut output = format!(
            "[{}] r{} by {}",
            self.metadata.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
            self.metadata.revision_number,
            self.metadata.author
        );

        for revision in &self.revisions {
            output.push_str(&format!(
                "\n  {} {} {}",
                revision.revision_type, revision.entity_type, revision.entity_key
            ));
        }

        output
    }
}
