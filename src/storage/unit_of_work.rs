//! Units of work
//!
//! A [`UnitOfWork`] stages saves and deletes of any tracked entity types and
//! commits them together: one revision number, one author, one log line, and
//! one row-file write. Dropping a unit without committing rolls it back.

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::audit::{ChangeSet, RevisionNumber};
use crate::error::{HistoryError, HistoryResult};
use crate::models::Audited;

use super::Storage;

/// A transactional batch of entity mutations
pub struct UnitOfWork<'s> {
    storage: &'s Storage,
    author: String,
    started_at: DateTime<Utc>,
    changes: ChangeSet,
}

impl<'s> UnitOfWork<'s> {
    pub(super) fn new(storage: &'s Storage, author: String) -> Self {
        Self {
            storage,
            author,
            started_at: Utc::now(),
            changes: ChangeSet::new(),
        }
    }

    /// Identity every revision of this unit will be attributed to
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Number of entities with staged changes
    pub fn pending(&self) -> usize {
        self.changes.len()
    }

    /// `(base, current)` versions of an entity as this unit sees it
    ///
    /// `None` if the entity does not exist or is already staged for deletion.
    fn visible_version<T: Audited>(&self, key: Uuid) -> HistoryResult<Option<(u64, u64)>> {
        if let Some(staged) = self.changes.get(T::ENTITY_TYPE, key) {
            if staged.is_tombstone() {
                return Ok(None);
            }
            return Ok(Some((staged.base_version, staged.version())));
        }

        Ok(self
            .storage
            .entities()
            .version_of(T::ENTITY_TYPE, key)?
            .map(|v| (v, v)))
    }

    /// Stage an insert (entity without a key) or an update
    ///
    /// Returns the entity as it will be stored: with its key, its new version
    /// and this unit's audit stamp.
    pub fn save<T: Audited>(&mut self, entity: T) -> HistoryResult<T> {
        let base_version = match entity.key() {
            None => 0,
            Some(key) => {
                let (base, current) = self
                    .visible_version::<T>(key)?
                    .ok_or_else(|| not_found::<T>(key))?;

                if entity.version() != current {
                    return Err(conflict::<T>(key, entity.version(), current));
                }
                base
            }
        };

        let (saved, change) = self.storage.interceptor().intercept_save(
            entity,
            base_version,
            &self.author,
            self.started_at,
        )?;

        debug!(
            entity_type = change.entity_type,
            key = %change.key,
            revision_type = %change.revision_type,
            "staged save"
        );
        self.changes.record(change);

        Ok(saved)
    }

    /// Stage a deletion by key
    pub fn delete<T: Audited>(&mut self, key: impl Into<Uuid>) -> HistoryResult<()> {
        let key = key.into();
        let (base, _) = self
            .visible_version::<T>(key)?
            .ok_or_else(|| not_found::<T>(key))?;

        let change = self.storage.interceptor().intercept_delete::<T>(key, base);
        debug!(entity_type = change.entity_type, key = %key, "staged delete");
        self.changes.record(change);

        Ok(())
    }

    /// Stage a deletion, failing if `entity` is not the latest version
    pub fn delete_entity<T: Audited>(&mut self, entity: &T) -> HistoryResult<()> {
        let key = entity.key().ok_or_else(|| {
            HistoryError::Validation(format!("{} has never been saved", T::DISPLAY_NAME))
        })?;

        let (_, current) = self
            .visible_version::<T>(key)?
            .ok_or_else(|| not_found::<T>(key))?;
        if entity.version() != current {
            return Err(conflict::<T>(key, entity.version(), current));
        }

        self.delete::<T>(key)
    }

    /// Commit all staged changes under one revision number
    ///
    /// Returns `None` when nothing was staged. Either every row change and
    /// its revision become durable and visible, or none do.
    pub fn commit(self) -> HistoryResult<Option<RevisionNumber>> {
        if self.changes.is_empty() {
            debug!("nothing to commit");
            return Ok(None);
        }

        let storage = self.storage;
        let mut guard = storage.revisions().lock()?;

        // Rows may have moved on since the changes were staged
        for change in self.changes.iter() {
            let stored = storage
                .entities()
                .version_of(change.entity_type, change.key)?;
            match stored {
                None if change.base_version != 0 => {
                    return Err(HistoryError::NotFound {
                        entity_type: change.entity_name,
                        identifier: change.key.to_string(),
                    });
                }
                Some(actual) if actual != change.base_version => {
                    return Err(HistoryError::ConcurrencyConflict {
                        entity_type: change.entity_name,
                        identifier: change.key.to_string(),
                        expected: change.base_version,
                        actual,
                    });
                }
                _ => {}
            }
        }

        let record =
            storage
                .interceptor()
                .seal(guard.next_number(), &self.author, Utc::now(), &self.changes);

        let offset = guard.write(&record)?;
        if let Err(e) = storage.entities().apply(std::slice::from_ref(&record)) {
            if let Err(discard_err) = guard.discard(offset) {
                error!(
                    revision = %record.revision_number(),
                    error = %discard_err,
                    "failed to discard revision; commits are blocked until the store is reloaded"
                );
            }
            return Err(e);
        }

        let number = guard.publish(record)?;
        info!(
            revision = %number,
            author = %self.author,
            entities = self.changes.len(),
            "committed"
        );

        Ok(Some(number))
    }

    /// Discard all staged changes
    pub fn rollback(self) {
        debug!(discarded = self.changes.len(), "unit of work rolled back");
    }
}

fn not_found<T: Audited>(key: Uuid) -> HistoryError {
    HistoryError::NotFound {
        entity_type: T::DISPLAY_NAME,
        identifier: key.to_string(),
    }
}

fn conflict<T: Audited>(key: Uuid, expected: u64, actual: u64) -> HistoryError {
    HistoryError::ConcurrencyConflict {
        entity_type: T::DISPLAY_NAME,
        identifier: key.to_string(),
        expected,
        actual,
    }
}
