//! Entity row storage
//!
//! Holds the current row of every live entity, grouped by entity type, in
//! entities.json. Rows only ever change by applying a committed
//! [`CommitRecord`], and the file remembers the last revision it reflects so
//! that a log which ran ahead of it can be replayed on load.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::audit::{CommitRecord, RevisionNumber};
use crate::error::{HistoryError, HistoryResult};

use super::file_io::{read_json, write_json_atomic};

/// The current state of one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRow {
    pub version: u64,
    pub fields: Value,
}

/// Serializable entity data structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct EntityData {
    /// Newest commit reflected in `tables`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_revision: Option<RevisionNumber>,

    #[serde(default)]
    tables: BTreeMap<String, BTreeMap<Uuid, StoredRow>>,
}

impl EntityData {
    fn apply(&mut self, record: &CommitRecord) {
        for revision in &record.revisions {
            let table = self.tables.entry(revision.entity_type.clone()).or_default();
            match &revision.fields {
                Some(fields) => {
                    table.insert(
                        revision.entity_key,
                        StoredRow {
                            version: revision.version,
                            fields: fields.clone(),
                        },
                    );
                }
                None => {
                    table.remove(&revision.entity_key);
                }
            }
        }
        self.last_revision = Some(record.revision_number());
    }
}

/// Repository for current entity rows
pub struct EntityStore {
    path: PathBuf,
    data: RwLock<EntityData>,
}

impl EntityStore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            data: RwLock::new(EntityData::default()),
        }
    }

    /// Load rows from disk
    pub(crate) fn load(&self) -> HistoryResult<()> {
        let file_data: EntityData = read_json(&self.path)?;

        let mut data = self.data.write().map_err(|e| {
            HistoryError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;
        *data = file_data;

        Ok(())
    }

    pub fn get_row(&self, entity_type: &str, key: Uuid) -> HistoryResult<Option<StoredRow>> {
        let data = self.data.read().map_err(|e| {
            HistoryError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(data
            .tables
            .get(entity_type)
            .and_then(|table| table.get(&key))
            .cloned())
    }

    /// Stored version of an entity, `None` if it has no row
    pub fn version_of(&self, entity_type: &str, key: Uuid) -> HistoryResult<Option<u64>> {
        Ok(self.get_row(entity_type, key)?.map(|row| row.version))
    }

    /// Snapshot of every row of a type, ordered by key
    pub fn rows(&self, entity_type: &str) -> HistoryResult<Vec<(Uuid, StoredRow)>> {
        let data = self.data.read().map_err(|e| {
            HistoryError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(data
            .tables
            .get(entity_type)
            .map(|table| table.iter().map(|(k, row)| (*k, row.clone())).collect())
            .unwrap_or_default())
    }

    pub fn count(&self, entity_type: &str) -> HistoryResult<usize> {
        let data = self.data.read().map_err(|e| {
            HistoryError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;

        Ok(data.tables.get(entity_type).map_or(0, |table| table.len()))
    }

    /// Newest commit the rows reflect
    pub fn last_revision(&self) -> HistoryResult<Option<RevisionNumber>> {
        let data = self.data.read().map_err(|e| {
            HistoryError::Storage(format!("Failed to acquire read lock: {}", e))
        })?;
        Ok(data.last_revision)
    }

    /// Apply committed records, in order, and persist the result
    ///
    /// The in-memory rows only change once the file has been written, so a
    /// failed write leaves the store exactly as it was.
    pub(crate) fn apply(&self, records: &[CommitRecord]) -> HistoryResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut data = self.data.write().map_err(|e| {
            HistoryError::Storage(format!("Failed to acquire write lock: {}", e))
        })?;

        let mut next = data.clone();
        for record in records {
            next.apply(record);
        }

        write_json_atomic(&self.path, &next)?;
        *data = next;

        Ok(())
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}
