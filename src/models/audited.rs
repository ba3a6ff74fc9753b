//! The contract every tracked entity type fulfils
//!
//! The entity store and revision log are type-erased: rows and snapshots are
//! JSON objects filed under `ENTITY_TYPE` and a UUID key. This trait is the
//! bridge between those rows and a concrete model.

use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::error::HistoryResult;

/// A business record whose every committed mutation produces a revision
pub trait Audited: Serialize + DeserializeOwned + Clone {
    /// Table name for rows and revisions of this type
    const ENTITY_TYPE: &'static str;

    /// Name used in error messages
    const DISPLAY_NAME: &'static str;

    /// Key of the entity, `None` until its first save
    fn key(&self) -> Option<Uuid>;

    fn assign_key(&mut self, key: Uuid);

    /// Optimistic concurrency token; 0 means never persisted
    fn version(&self) -> u64;

    fn set_version(&mut self, version: u64);

    /// Reject malformed entities before anything is staged
    fn validate(&self) -> HistoryResult<()>;

    /// Record the commit's identity and clock on the entity itself
    fn stamp(&mut self, _auditor: &str, _at: DateTime<Utc>, _created: bool) {}

    /// Human-readable label for display and audit summaries
    fn label(&self) -> Option<String> {
        None
    }
}
