//! History service
//!
//! Read-only queries over the revisions of one tracked entity type. Every
//! answer is an [`AuditedEntityView`]: the entity as it was after a commit,
//! together with who made that commit and when.

use std::marker::PhantomData;

use uuid::Uuid;

use crate::audit::{summarize_changes, Revision, RevisionMetadata, RevisionNumber, RevisionType};
use crate::error::{HistoryError, HistoryResult};
use crate::models::Audited;
use crate::storage::Storage;

/// An entity as recorded by one revision
#[derive(Debug, Clone, PartialEq)]
pub struct AuditedEntityView<T> {
    pub key: Uuid,
    pub revision_number: RevisionNumber,
    pub revision_type: RevisionType,
    pub metadata: RevisionMetadata,
    /// `None` for the tombstone written by a deletion
    pub entity: Option<T>,
    /// What a MODIFIED revision changed relative to the one before it
    pub changes: Option<String>,
}

impl<T> AuditedEntityView<T> {
    pub fn author(&self) -> &str {
        &self.metadata.author
    }

    pub fn is_deleted(&self) -> bool {
        self.entity.is_none()
    }
}

/// Service for querying the history of entities of type `T`
pub struct HistoryService<'a, T: Audited> {
    storage: &'a Storage,
    _entity: PhantomData<T>,
}

impl<'a, T: Audited> HistoryService<'a, T> {
    /// Create a new history service
    pub fn new(storage: &'a Storage) -> Self {
        Self {
            storage,
            _entity: PhantomData,
        }
    }

    /// Number of revisions recorded for `key`, tombstone included
    pub fn get_revision_count(&self, key: impl Into<Uuid>) -> HistoryResult<usize> {
        self.storage
            .revisions()
            .revision_count(T::ENTITY_TYPE, key.into())
    }

    /// Every revision of `key`, oldest first
    ///
    /// Unknown keys yield an empty list.
    pub fn get_all_revisions(&self, key: impl Into<Uuid>) -> HistoryResult<Vec<AuditedEntityView<T>>> {
        let revisions = self
            .storage
            .revisions()
            .find_revisions(T::ENTITY_TYPE, key.into())?;

        let mut views = Vec::with_capacity(revisions.len());
        let mut previous: Option<&Revision> = None;
        for revision in &revisions {
            views.push(self.view(revision, previous)?);
            previous = Some(revision);
        }

        Ok(views)
    }

    /// State of `key` as of commit `at`
    ///
    /// Returns `None` if the entity did not exist yet at `at`. At or after its
    /// deletion the view carries no entity.
    pub fn get_state_as_of(
        &self,
        key: impl Into<Uuid>,
        at: impl Into<RevisionNumber>,
    ) -> HistoryResult<Option<AuditedEntityView<T>>> {
        let key = key.into();
        let revision = self
            .storage
            .revisions()
            .find_revision_at(T::ENTITY_TYPE, key, at.into())?;

        revision.map(|r| self.view_with_predecessor(&r)).transpose()
    }

    /// The revision `key` received in exactly commit `number`
    pub fn find_revision(
        &self,
        key: impl Into<Uuid>,
        number: impl Into<RevisionNumber>,
    ) -> HistoryResult<Option<AuditedEntityView<T>>> {
        let revision = self
            .storage
            .revisions()
            .find_revision(T::ENTITY_TYPE, key.into(), number.into())?;

        revision.map(|r| self.view_with_predecessor(&r)).transpose()
    }

    /// Most recent revision of `key`
    pub fn get_last_change_revision(
        &self,
        key: impl Into<Uuid>,
    ) -> HistoryResult<Option<AuditedEntityView<T>>> {
        let revision = self
            .storage
            .revisions()
            .find_last_change_revision(T::ENTITY_TYPE, key.into())?;

        revision.map(|r| self.view_with_predecessor(&r)).transpose()
    }

    /// Identity that committed the most recent change to `key`
    pub fn get_last_change_author(&self, key: impl Into<Uuid>) -> HistoryResult<Option<String>> {
        let revision = self
            .storage
            .revisions()
            .find_last_change_revision(T::ENTITY_TYPE, key.into())?;

        match revision {
            Some(revision) => Ok(Some(self.metadata(&revision)?.author)),
            None => Ok(None),
        }
    }

    fn view_with_predecessor(&self, revision: &Revision) -> HistoryResult<AuditedEntityView<T>> {
        let previous = match (revision.revision_type, revision.revision_number.get()) {
            (RevisionType::Modified, n) if n > 1 => self.storage.revisions().find_revision_at(
                T::ENTITY_TYPE,
                revision.entity_key,
                RevisionNumber::new(n - 1),
            )?,
            _ => None,
        };

        self.view(revision, previous.as_ref())
    }

    fn view(
        &self,
        revision: &Revision,
        previous: Option<&Revision>,
    ) -> HistoryResult<AuditedEntityView<T>> {
        let changes = match (revision.revision_type, previous) {
            (RevisionType::Modified, Some(previous)) => {
                match (&previous.fields, &revision.fields) {
                    (Some(before), Some(after)) => summarize_changes(before, after),
                    _ => None,
                }
            }
            _ => None,
        };

        Ok(AuditedEntityView {
            key: revision.entity_key,
            revision_number: revision.revision_number,
            revision_type: revision.revision_type,
            metadata: self.metadata(revision)?,
            entity: revision.entity()?,
            changes,
        })
    }

    fn metadata(&self, revision: &Revision) -> HistoryResult<RevisionMetadata> {
        self.storage
            .revisions()
            .metadata(revision.revision_number)?
            .ok_or_else(|| {
                HistoryError::Storage(format!(
                    "Revision {} has no commit metadata",
                    revision.revision_number
                ))
            })
    }
}
