//! Change interception
//!
//! Every save and delete staged in a unit of work goes through the
//! [`ChangeInterceptor`]: it stamps and snapshots the entity, and at commit
//! time seals all staged changes into one [`CommitRecord`] under a single
//! revision number and a single author.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::{HistoryError, HistoryResult};
use crate::models::Audited;

use super::identity::IdentitySource;
use super::revision::{CommitRecord, Revision, RevisionMetadata, RevisionNumber, RevisionType};

/// A change staged in a unit of work, not yet committed
#[derive(Debug, Clone, PartialEq)]
pub struct PendingChange {
    pub entity_type: &'static str,
    pub entity_name: &'static str,
    pub key: Uuid,
    pub revision_type: RevisionType,
    /// Version of the stored row this change was staged against (0 = no row)
    pub base_version: u64,
    /// Field snapshot; `None` for a deletion
    pub fields: Option<serde_json::Value>,
}

impl PendingChange {
    /// Version the row carries once this change commits
    pub fn version(&self) -> u64 {
        self.base_version + 1
    }

    pub fn is_tombstone(&self) -> bool {
        self.fields.is_none()
    }
}

/// Changes staged in one unit of work, at most one per entity
///
/// Repeated changes to the same entity collapse so that a commit records the
/// net effect: created then modified is still a creation, modified then
/// deleted is a deletion, and created then deleted leaves nothing behind.
#[derive(Debug, Default)]
pub struct ChangeSet {
    changes: Vec<PendingChange>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, entity_type: &str, key: Uuid) -> Option<&PendingChange> {
        self.changes
            .iter()
            .find(|c| c.entity_type == entity_type && c.key == key)
    }

    /// Stage a change, folding it into an earlier one for the same entity
    pub fn record(&mut self, change: PendingChange) {
        let position = self
            .changes
            .iter()
            .position(|c| c.entity_type == change.entity_type && c.key == change.key);

        let Some(position) = position else {
            self.changes.push(change);
            return;
        };

        match (self.changes[position].revision_type, change.revision_type) {
            (RevisionType::Created, RevisionType::Deleted) => {
                self.changes.remove(position);
            }
            (RevisionType::Created, _) => {
                self.changes[position].fields = change.fields;
            }
            (_, revision_type) => {
                let earlier = &mut self.changes[position];
                earlier.revision_type = revision_type;
                earlier.fields = change.fields;
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingChange> {
        self.changes.iter()
    }
}

/// Captures who changed what for every staged mutation
#[derive(Clone)]
pub struct ChangeInterceptor {
    source: Arc<dyn IdentitySource>,
    fallback: String,
}

impl ChangeInterceptor {
    /// `fallback` is recorded whenever the source knows no identity
    pub fn new(source: Arc<dyn IdentitySource>, fallback: impl Into<String>) -> Self {
        Self {
            source,
            fallback: fallback.into(),
        }
    }

    /// Resolve the author of a commit
    ///
    /// An explicit identity wins over the source; a blank or missing one
    /// falls back to the configured placeholder.
    pub fn resolve_identity(&self, explicit: Option<&str>) -> HistoryResult<String> {
        let resolved = explicit
            .map(str::to_string)
            .filter(|s| !s.trim().is_empty())
            .or_else(|| {
                self.source
                    .current_identity()
                    .filter(|s| !s.trim().is_empty())
            })
            .unwrap_or_else(|| self.fallback.clone());

        let resolved = resolved.trim().to_string();
        if resolved.is_empty() {
            return Err(HistoryError::Validation(
                "Auditor identity cannot be blank".into(),
            ));
        }
        Ok(resolved)
    }

    /// Stage a save
    ///
    /// `base_version` is the stored row's version (0 when the entity is new);
    /// the returned entity carries its key, its post-commit version and the
    /// commit's audit stamp.
    pub fn intercept_save<T: Audited>(
        &self,
        mut entity: T,
        base_version: u64,
        author: &str,
        at: DateTime<Utc>,
    ) -> HistoryResult<(T, PendingChange)> {
        entity.validate()?;

        let created = base_version == 0;
        let key = match entity.key() {
            Some(key) => key,
            None => {
                let key = Uuid::new_v4();
                entity.assign_key(key);
                key
            }
        };

        entity.set_version(base_version + 1);
        entity.stamp(author, at, created);

        let fields = serde_json::to_value(&entity)?;
        if !fields.is_object() {
            return Err(HistoryError::Validation(format!(
                "{} must serialize to an object",
                T::DISPLAY_NAME
            )));
        }

        let change = PendingChange {
            entity_type: T::ENTITY_TYPE,
            entity_name: T::DISPLAY_NAME,
            key,
            revision_type: if created {
                RevisionType::Created
            } else {
                RevisionType::Modified
            },
            base_version,
            fields: Some(fields),
        };

        Ok((entity, change))
    }

    /// Stage a deletion as a tombstone
    pub fn intercept_delete<T: Audited>(&self, key: Uuid, base_version: u64) -> PendingChange {
        PendingChange {
            entity_type: T::ENTITY_TYPE,
            entity_name: T::DISPLAY_NAME,
            key,
            revision_type: RevisionType::Deleted,
            base_version,
            fields: None,
        }
    }

    /// Turn the staged changes of a unit into the record the log appends
    pub fn seal(
        &self,
        number: RevisionNumber,
        author: &str,
        timestamp: DateTime<Utc>,
        changes: &ChangeSet,
    ) -> CommitRecord {
        CommitRecord {
            metadata: RevisionMetadata {
                revision_number: number,
                author: author.to_string(),
                timestamp,
            },
            revisions: changes
                .iter()
                .map(|change| Revision {
                    revision_number: number,
                    entity_type: change.entity_type.to_string(),
                    entity_key: change.key,
                    revision_type: change.revision_type,
                    version: change.version(),
                    fields: change.fields.clone(),
                })
                .collect(),
        }
    }
}
