//! Storage layer for book-revisions
//!
//! Current rows live in an atomically rewritten JSON file, history in an
//! append-only JSONL log. Every mutation goes through a [`UnitOfWork`], so
//! no row can change without a revision being recorded for it.

pub mod entities;
pub mod file_io;
pub mod unit_of_work;

pub use entities::{EntityStore, StoredRow};
pub use file_io::{read_json, write_json_atomic};
pub use unit_of_work::UnitOfWork;

use std::sync::Arc;

use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::audit::{ChangeInterceptor, IdentitySource, LockPolicy, RevisionLog, RevisionNumber};
use crate::config::{HistoryPaths, Settings};
use crate::error::{HistoryError, HistoryResult};
use crate::models::Audited;

/// Main storage coordinator
pub struct Storage {
    paths: HistoryPaths,
    entities: EntityStore,
    revisions: RevisionLog,
    interceptor: ChangeInterceptor,
}

impl Storage {
    /// Create a new Storage instance
    pub fn new(
        paths: HistoryPaths,
        settings: &Settings,
        identity: Arc<dyn IdentitySource>,
    ) -> HistoryResult<Self> {
        paths.ensure_directories()?;

        Ok(Self {
            entities: EntityStore::new(paths.entities_file()),
            revisions: RevisionLog::new(paths.revision_log(), LockPolicy::from_settings(settings)),
            interceptor: ChangeInterceptor::new(identity, settings.default_auditor.clone()),
            paths,
        })
    }

    /// Create a Storage instance and load everything from disk
    pub fn open(
        paths: HistoryPaths,
        settings: &Settings,
        identity: Arc<dyn IdentitySource>,
    ) -> HistoryResult<Self> {
        let storage = Self::new(paths, settings, identity)?;
        storage.load_all()?;
        Ok(storage)
    }

    pub fn paths(&self) -> &HistoryPaths {
        &self.paths
    }

    pub fn interceptor(&self) -> &ChangeInterceptor {
        &self.interceptor
    }

    /// Current rows, read-only
    ///
    /// Rows change only through a committed [`UnitOfWork`]:
    ///
    /// ```compile_fail
    /// # fn bypass(storage: &book_revisions::storage::Storage, records: &[book_revisions::audit::CommitRecord]) {
    /// storage.entities().apply(records).unwrap();
    /// # }
    /// ```
    pub fn entities(&self) -> &EntityStore {
        &self.entities
    }

    /// The revision log, for history queries
    pub fn revisions(&self) -> &RevisionLog {
        &self.revisions
    }

    /// Load the log and the rows, then bring the rows up to date with the log
    pub fn load_all(&self) -> HistoryResult<()> {
        self.revisions.load()?;
        self.entities.load()?;
        self.recover()?;
        Ok(())
    }

    /// Replay commits the row file has not seen yet
    ///
    /// Returns the number of replayed commits.
    fn recover(&self) -> HistoryResult<usize> {
        let _guard = self.revisions.lock()?;

        let applied = self.entities.last_revision()?;
        let logged = self.revisions.last_revision_number()?;
        if applied > logged {
            return Err(HistoryError::Storage(format!(
                "Entity rows reflect r{} but the revision log ends at {}",
                applied.map_or(0, RevisionNumber::get),
                logged.map_or_else(|| "nothing".to_string(), |n| format!("r{}", n))
            )));
        }

        let pending = self.revisions.commits_after(applied)?;
        if !pending.is_empty() {
            info!(commits = pending.len(), "replaying revision log onto entity rows");
            self.entities.apply(&pending)?;
        }

        Ok(pending.len())
    }

    /// Check if anything has ever been committed
    pub fn is_initialized(&self) -> bool {
        self.revisions.exists()
    }

    /// Start a unit of work attributed to the identity source's actor
    pub fn begin(&self) -> HistoryResult<UnitOfWork<'_>> {
        let author = self.interceptor.resolve_identity(None)?;
        Ok(UnitOfWork::new(self, author))
    }

    /// Start a unit of work attributed to an explicit identity
    pub fn begin_as(&self, identity: &str) -> HistoryResult<UnitOfWork<'_>> {
        let author = self.interceptor.resolve_identity(Some(identity))?;
        Ok(UnitOfWork::new(self, author))
    }

    /// Save one entity in its own unit of work
    pub fn save<T: Audited>(&self, entity: T) -> HistoryResult<T> {
        let mut unit = self.begin()?;
        let saved = unit.save(entity)?;
        unit.commit()?;
        Ok(saved)
    }

    /// Delete one entity in its own unit of work
    pub fn delete<T: Audited>(&self, key: impl Into<Uuid>) -> HistoryResult<()> {
        let mut unit = self.begin()?;
        unit.delete::<T>(key)?;
        unit.commit()?;
        Ok(())
    }

    pub fn find_by_key<T: Audited>(&self, key: impl Into<Uuid>) -> HistoryResult<Option<T>> {
        let key = key.into();
        self.entities
            .get_row(T::ENTITY_TYPE, key)?
            .map(|row| decode::<T>(key, row))
            .transpose()
    }

    /// All live entities of a type, ordered by key
    pub fn find_all<T: Audited>(&self) -> HistoryResult<Vec<T>> {
        self.entities
            .rows(T::ENTITY_TYPE)?
            .into_iter()
            .map(|(key, row)| decode::<T>(key, row))
            .collect()
    }

    /// Entities whose top-level field `field` equals `value`
    ///
    /// Works on a snapshot of the rows taken at call time; matching and
    /// decoding happen as the iterator is consumed.
    pub fn find_all_by_field<T: Audited>(
        &self,
        field: &str,
        value: impl Into<Value>,
    ) -> HistoryResult<impl Iterator<Item = HistoryResult<T>>> {
        let field = field.to_string();
        let value = value.into();
        let rows = self.entities.rows(T::ENTITY_TYPE)?;

        Ok(rows
            .into_iter()
            .filter(move |(_, row)| row.fields.get(&field) == Some(&value))
            .map(|(key, row)| decode::<T>(key, row)))
    }

    pub fn count<T: Audited>(&self) -> HistoryResult<usize> {
        self.entities.count(T::ENTITY_TYPE)
    }
}

fn decode<T: Audited>(key: Uuid, row: StoredRow) -> HistoryResult<T> {
    serde_json::from_value(row.fields).map_err(|e| {
        HistoryError::Json(format!("Failed to decode {} {}: {}", T::DISPLAY_NAME, key, e))
    })
}
