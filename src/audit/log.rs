//! Append-only revision log
//!
//! Every commit is written as a single JSON line holding its metadata and
//! all revisions it produced (JSONL). The log also owns the store-wide
//! revision counter: the only way to obtain a revision number is to hold a
//! [`CommitGuard`], and holding one serializes all writers.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard};
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::error::{HistoryError, HistoryResult};

use super::revision::{CommitRecord, Revision, RevisionMetadata, RevisionNumber};

/// Bounded wait for the revision counter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockPolicy {
    /// Wait per attempt
    pub timeout: Duration,
    /// Attempts after the first one
    pub retries: u32,
}

impl LockPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            timeout: settings.commit_lock_timeout(),
            retries: settings.commit_retries,
        }
    }
}

impl Default for LockPolicy {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

/// In-memory view of the log file
#[derive(Debug, Default)]
struct LogIndex {
    /// All revisions, ascending by revision number
    revisions: Vec<Revision>,
    metadata: BTreeMap<RevisionNumber, RevisionMetadata>,
    /// Index: (entity_type, key) -> positions in `revisions`
    by_entity: HashMap<(String, Uuid), Vec<usize>>,
}

impl LogIndex {
    fn push(&mut self, record: CommitRecord) {
        for revision in record.revisions {
            let position = self.revisions.len();
            self.by_entity
                .entry((revision.entity_type.clone(), revision.entity_key))
                .or_default()
                .push(position);
            self.revisions.push(revision);
        }
        self.metadata
            .insert(record.metadata.revision_number, record.metadata);
    }

    fn entity<'a>(
        &'a self,
        entity_type: &str,
        key: Uuid,
    ) -> impl DoubleEndedIterator<Item = &'a Revision> + 'a {
        self.by_entity
            .get(&(entity_type.to_string(), key))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
            .iter()
            .map(move |&i| &self.revisions[i])
    }
}

/// The revision ledger
pub struct RevisionLog {
    path: PathBuf,
    policy: LockPolicy,
    /// Last committed revision number
    counter: Mutex<RevisionNumber>,
    index: RwLock<LogIndex>,
    /// Set when an unpublished line could not be cut off the file; the
    /// on-disk log and the counter disagree until the next `load`
    failure: Mutex<Option<String>>,
}

impl RevisionLog {
    /// Create a revision log backed by the given file
    pub fn new(path: PathBuf, policy: LockPolicy) -> Self {
        Self {
            path,
            policy,
            counter: Mutex::new(RevisionNumber::new(0)),
            index: RwLock::new(LogIndex::default()),
            failure: Mutex::new(None),
        }
    }

    /// Load all commits from disk and rebuild the index
    ///
    /// A final line without its newline is the remains of an interrupted
    /// write: it is dropped and cut off the file.
    pub(crate) fn load(&self) -> HistoryResult<()> {
        let mut counter = self.counter.lock();
        let mut index = LogIndex::default();
        let mut last = RevisionNumber::new(0);

        if self.path.exists() {
            let contents = fs::read(&self.path)
                .map_err(|e| HistoryError::Io(format!("Failed to read revision log: {}", e)))?;

            let mut offset = 0usize;
            for (line_num, segment) in contents.split_inclusive(|b| *b == b'\n').enumerate() {
                if !segment.ends_with(b"\n") {
                    warn!(
                        path = %self.path.display(),
                        line = line_num + 1,
                        bytes = segment.len(),
                        "discarding torn revision log tail"
                    );
                    truncate(&self.path, offset as u64)?;
                    break;
                }
                offset += segment.len();

                let line = std::str::from_utf8(segment).map_err(|e| {
                    HistoryError::Storage(format!(
                        "Revision log line {} is not UTF-8: {}",
                        line_num + 1,
                        e
                    ))
                })?;
                if line.trim().is_empty() {
                    continue;
                }

                let record: CommitRecord = serde_json::from_str(line).map_err(|e| {
                    HistoryError::Json(format!(
                        "Failed to parse revision log line {}: {}",
                        line_num + 1,
                        e
                    ))
                })?;

                if record.revision_number() <= last {
                    return Err(HistoryError::Storage(format!(
                        "Revision log out of order at line {}: r{} after r{}",
                        line_num + 1,
                        record.revision_number(),
                        last
                    )));
                }
                last = record.revision_number();
                index.push(record);
            }
        }

        debug!(last_revision = %last, "revision log loaded");

        *self.index.write().map_err(|e| {
            HistoryError::Storage(format!("Failed to acquire write lock: {}", e))
        })? = index;
        *counter = last;
        *self.failure.lock() = None;

        Ok(())
    }

    /// Take the right to commit
    ///
    /// Each attempt waits at most the policy timeout; after the last attempt
    /// the contention is surfaced as [`HistoryError::Retryable`].
    pub fn lock(&self) -> HistoryResult<CommitGuard<'_>> {
        let attempts = self.policy.retries + 1;
        for attempt in 1..=attempts {
            if let Some(last) = self.counter.try_lock_for(self.policy.timeout) {
                self.ensure_usable()?;
                return Ok(CommitGuard { log: self, last });
            }
            debug!(attempt, attempts, "revision counter busy");
        }

        Err(HistoryError::Retryable(format!(
            "no revision number available after {} attempts",
            attempts
        )))
    }

    fn ensure_usable(&self) -> HistoryResult<()> {
        match self.failure.lock().as_ref() {
            Some(reason) => Err(HistoryError::Storage(format!(
                "Revision log needs a reload before further commits: {}",
                reason
            ))),
            None => Ok(()),
        }
    }

    /// Refuse commits until the log is reloaded from disk
    fn mark_failed(&self, reason: String) {
        error!(path = %self.path.display(), %reason, "revision log marked unusable");
        *self.failure.lock() = Some(reason);
    }

    /// Whether an earlier failure blocks commits
    pub fn is_failed(&self) -> bool {
        self.failure.lock().is_some()
    }

    fn read_index(&self) -> HistoryResult<RwLockReadGuard<'_, LogIndex>> {
        self.index
            .read()
            .map_err(|e| HistoryError::Storage(format!("Failed to acquire read lock: {}", e)))
    }

    /// All revisions of an entity, oldest first, including its tombstone
    pub fn find_revisions(&self, entity_type: &str, key: Uuid) -> HistoryResult<Vec<Revision>> {
        let index = self.read_index()?;
        let revisions = index.entity(entity_type, key).cloned().collect();
        Ok(revisions)
    }

    /// The most recent revision of an entity at or before `at`
    pub fn find_revision_at(
        &self,
        entity_type: &str,
        key: Uuid,
        at: RevisionNumber,
    ) -> HistoryResult<Option<Revision>> {
        let index = self.read_index()?;
        let found = index
            .entity(entity_type, key)
            .rev()
            .find(|r| r.revision_number <= at)
            .cloned();
        Ok(found)
    }

    /// The revision an entity received in exactly the given commit
    pub fn find_revision(
        &self,
        entity_type: &str,
        key: Uuid,
        number: RevisionNumber,
    ) -> HistoryResult<Option<Revision>> {
        let index = self.read_index()?;
        let found = index
            .entity(entity_type, key)
            .find(|r| r.revision_number == number)
            .cloned();
        Ok(found)
    }

    pub fn find_last_change_revision(
        &self,
        entity_type: &str,
        key: Uuid,
    ) -> HistoryResult<Option<Revision>> {
        let index = self.read_index()?;
        let found = index.entity(entity_type, key).next_back().cloned();
        Ok(found)
    }

    pub fn revision_count(&self, entity_type: &str, key: Uuid) -> HistoryResult<usize> {
        let index = self.read_index()?;
        let count = index.entity(entity_type, key).count();
        Ok(count)
    }

    /// Metadata of a commit
    pub fn metadata(&self, number: RevisionNumber) -> HistoryResult<Option<RevisionMetadata>> {
        let index = self.read_index()?;
        Ok(index.metadata.get(&number).cloned())
    }

    pub fn last_revision_number(&self) -> HistoryResult<Option<RevisionNumber>> {
        let index = self.read_index()?;
        Ok(index.metadata.keys().next_back().copied())
    }

    /// Number of commits in the log
    pub fn commit_count(&self) -> HistoryResult<usize> {
        Ok(self.read_index()?.metadata.len())
    }

    /// Commits newer than `after` (all commits for `None`), oldest first
    pub fn commits_after(&self, after: Option<RevisionNumber>) -> HistoryResult<Vec<CommitRecord>> {
        let index = self.read_index()?;
        let floor = after.unwrap_or(RevisionNumber::new(0));

        let start = index
            .revisions
            .partition_point(|r| r.revision_number <= floor);
        let mut revisions = index.revisions[start..].iter().peekable();

        let mut commits = Vec::new();
        for (number, metadata) in index.metadata.range(floor.next()..) {
            let mut record = CommitRecord {
                metadata: metadata.clone(),
                revisions: Vec::new(),
            };
            while let Some(revision) = revisions.next_if(|r| r.revision_number == *number) {
                record.revisions.push(revision.clone());
            }
            commits.push(record);
        }

        Ok(commits)
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

/// Exclusive right to append the next commit
///
/// Writing and publishing are separate steps so the caller can persist its
/// own state in between and [`discard`](CommitGuard::discard) the write if
/// that fails. Dropping the guard without publishing leaves the counter
/// untouched.
pub struct CommitGuard<'a> {
    log: &'a RevisionLog,
    last: MutexGuard<'a, RevisionNumber>,
}

impl CommitGuard<'_> {
    /// The number the commit being prepared will receive
    pub fn next_number(&self) -> RevisionNumber {
        self.last.next()
    }

    /// Durably append a commit without making it visible to readers
    ///
    /// Returns the file length before the write, for [`discard`](Self::discard).
    pub(crate) fn write(&mut self, record: &CommitRecord) -> HistoryResult<u64> {
        self.log.ensure_usable()?;

        if record.revision_number() != self.next_number() {
            return Err(HistoryError::Storage(format!(
                "Commit carries r{} but the next revision is r{}",
                record.revision_number(),
                self.next_number()
            )));
        }

        let mut line = serde_json::to_string(record).map_err(|e| {
            HistoryError::Json(format!("Failed to serialize commit: {}", e))
        })?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log.path)
            .map_err(|e| HistoryError::Io(format!("Failed to open revision log: {}", e)))?;

        let offset = file
            .metadata()
            .map_err(|e| HistoryError::Io(format!("Failed to stat revision log: {}", e)))?
            .len();

        if let Err(e) = file
            .write_all(line.as_bytes())
            .and_then(|_| file.sync_data())
        {
            drop(file);
            let write_err = format!(
                "Failed to write revision r{}: {}",
                record.revision_number(),
                e
            );
            if let Err(truncate_err) = truncate(&self.log.path, offset) {
                self.log.mark_failed(format!(
                    "partial write of r{} could not be removed: {}",
                    record.revision_number(),
                    truncate_err
                ));
                return Err(HistoryError::Storage(format!(
                    "{}; removing the partial line also failed: {}",
                    write_err, truncate_err
                )));
            }
            return Err(HistoryError::Io(write_err));
        }

        Ok(offset)
    }

    /// Undo a [`write`](Self::write)
    ///
    /// If the line cannot be removed the log refuses further commits until
    /// it is reloaded, so the number it carries is never handed out twice.
    pub(crate) fn discard(&mut self, offset: u64) -> HistoryResult<()> {
        let number = self.next_number();
        warn!(revision = %number, "discarding unpublished commit");
        if let Err(e) = truncate(&self.log.path, offset) {
            self.log
                .mark_failed(format!("unpublished r{} could not be discarded: {}", number, e));
            return Err(e);
        }
        Ok(())
    }

    /// Make a written commit visible and advance the counter
    pub(crate) fn publish(mut self, record: CommitRecord) -> HistoryResult<RevisionNumber> {
        let number = record.revision_number();
        self.log
            .index
            .write()
            .map_err(|e| HistoryError::Storage(format!("Failed to acquire write lock: {}", e)))?
            .push(record);
        *self.last = number;
        Ok(number)
    }
}

fn truncate(path: &Path, len: u64) -> HistoryResult<()> {
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| HistoryError::Io(format!("Failed to open revision log: {}", e)))?;
    file.set_len(len)
        .and_then(|_| file.sync_data())
        .map_err(|e| HistoryError::Io(format!("Failed to truncate revision log: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::revision::RevisionType;
    use chrono::Utc;
    use serde_json::json;
    use tempfile::TempDir;

    fn create_test_log() -> (RevisionLog, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let log = RevisionLog::new(temp_dir.path().join("revisions.jsonl"), LockPolicy::default());
        log.load().unwrap();
        (log, temp_dir)
    }

    fn record(number: RevisionNumber, changes: &[(Uuid, RevisionType, Option<serde_json::Value>)]) -> CommitRecord {
        CommitRecord {
            metadata: RevisionMetadata {
                revision_number: number,
                author: "wade.wilson".into(),
                timestamp: Utc::now(),
            },
            revisions: changes
                .iter()
                .map(|(key, revision_type, fields)| Revision {
                    revision_number: number,
                    entity_type: "book".into(),
                    entity_key: *key,
                    revision_type: *revision_type,
                    version: 1,
                    fields: fields.clone(),
                })
                .collect(),
        }
    }

    fn commit(log: &RevisionLog, changes: &[(Uuid, RevisionType, Option<serde_json::Value>)]) -> RevisionNumber {
        let mut guard = log.lock().unwrap();
        let rec = record(guard.next_number(), changes);
        guard.write(&rec).unwrap();
        guard.publish(rec).unwrap()
    }

    #[test]
    fn test_empty_log() {
        let (log, _temp) = create_test_log();

        assert!(!log.exists());
        assert_eq!(log.commit_count().unwrap(), 0);
        assert!(log.last_revision_number().unwrap().is_none());
        assert!(log.find_revisions("book", Uuid::new_v4()).unwrap().is_empty());
    }

    #[test]
    fn test_numbers_are_global_across_keys() {
        let (log, _temp) = create_test_log();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let r1 = commit(&log, &[(a, RevisionType::Created, Some(json!({"title": "A"})))]);
        let r2 = commit(&log, &[(b, RevisionType::Created, Some(json!({"title": "B"})))]);
        let r3 = commit(&log, &[(a, RevisionType::Modified, Some(json!({"title": "A2"})))]);

        assert_eq!(r1, RevisionNumber::FIRST);
        assert!(r1 < r2 && r2 < r3);

        let numbers: Vec<_> = log
            .find_revisions("book", a)
            .unwrap()
            .iter()
            .map(|r| r.revision_number)
            .collect();
        assert_eq!(numbers, vec![r1, r3]);
        assert_eq!(log.revision_count("book", b).unwrap(), 1);
    }

    #[test]
    fn test_find_revision_at() {
        let (log, _temp) = create_test_log();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        commit(&log, &[(b, RevisionType::Created, Some(json!({"title": "B"})))]);
        let r2 = commit(&log, &[(a, RevisionType::Created, Some(json!({"title": "A"})))]);
        commit(&log, &[(b, RevisionType::Modified, Some(json!({"title": "B2"})))]);
        let r4 = commit(&log, &[(a, RevisionType::Deleted, None)]);

        // Before the entity existed
        assert!(log
            .find_revision_at("book", a, RevisionNumber::FIRST)
            .unwrap()
            .is_none());

        // Between its revisions
        let at3 = log.find_revision_at("book", a, RevisionNumber::new(3)).unwrap().unwrap();
        assert_eq!(at3.revision_number, r2);

        // At and after deletion
        let at9 = log.find_revision_at("book", a, RevisionNumber::new(9)).unwrap().unwrap();
        assert_eq!(at9.revision_number, r4);
        assert!(at9.is_tombstone());

        assert!(log.find_revision("book", a, RevisionNumber::new(3)).unwrap().is_none());
        assert_eq!(
            log.find_last_change_revision("book", a).unwrap().unwrap().revision_number,
            r4
        );
    }

    #[test]
    fn test_one_commit_many_entities() {
        let (log, _temp) = create_test_log();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        let number = commit(
            &log,
            &[
                (a, RevisionType::Created, Some(json!({"title": "A"}))),
                (b, RevisionType::Created, Some(json!({"title": "B"}))),
            ],
        );

        assert_eq!(log.commit_count().unwrap(), 1);
        assert_eq!(log.metadata(number).unwrap().unwrap().author, "wade.wilson");
        assert_eq!(
            log.find_last_change_revision("book", b).unwrap().unwrap().revision_number,
            number
        );
    }

    #[test]
    fn test_reload_from_disk() {
        let (log, temp) = create_test_log();
        let a = Uuid::new_v4();
        commit(&log, &[(a, RevisionType::Created, Some(json!({"title": "A"})))]);
        commit(&log, &[(a, RevisionType::Modified, Some(json!({"title": "A2"})))]);

        let reopened = RevisionLog::new(temp.path().join("revisions.jsonl"), LockPolicy::default());
        reopened.load().unwrap();

        assert_eq!(reopened.revision_count("book", a).unwrap(), 2);
        assert_eq!(reopened.lock().unwrap().next_number(), RevisionNumber::new(3));
    }

    #[test]
    fn test_torn_tail_is_discarded() {
        let (log, temp) = create_test_log();
        let a = Uuid::new_v4();
        commit(&log, &[(a, RevisionType::Created, Some(json!({"title": "A"})))]);

        let path = temp.path().join("revisions.jsonl");
        let intact_len = fs::metadata(&path).unwrap().len();
        let mut file = OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"{\"metadata\":{\"revision_nu").unwrap();
        drop(file);

        let reopened = RevisionLog::new(path.clone(), LockPolicy::default());
        reopened.load().unwrap();

        assert_eq!(reopened.commit_count().unwrap(), 1);
        assert_eq!(fs::metadata(&path).unwrap().len(), intact_len);
    }

    #[test]
    fn test_corrupt_line_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("revisions.jsonl");
        fs::write(&path, "not json at all\n").unwrap();

        let log = RevisionLog::new(path, LockPolicy::default());
        assert!(matches!(log.load(), Err(HistoryError::Json(_))));
    }

    #[test]
    fn test_out_of_order_log_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("revisions.jsonl");
        let key = Uuid::new_v4();
        let later = record(RevisionNumber::new(2), &[(key, RevisionType::Created, Some(json!({})))]);
        let earlier = record(RevisionNumber::new(1), &[(key, RevisionType::Modified, Some(json!({})))]);
        let contents = format!(
            "{}\n{}\n",
            serde_json::to_string(&later).unwrap(),
            serde_json::to_string(&earlier).unwrap()
        );
        fs::write(&path, contents).unwrap();

        let log = RevisionLog::new(path, LockPolicy::default());
        assert!(matches!(log.load(), Err(HistoryError::Storage(_))));
    }

    #[test]
    fn test_discard_rolls_back_write() {
        let (log, temp) = create_test_log();
        let a = Uuid::new_v4();
        commit(&log, &[(a, RevisionType::Created, Some(json!({"title": "A"})))]);

        let path = temp.path().join("revisions.jsonl");
        let before = fs::metadata(&path).unwrap().len();

        let mut guard = log.lock().unwrap();
        let rec = record(guard.next_number(), &[(a, RevisionType::Deleted, None)]);
        let offset = guard.write(&rec).unwrap();
        assert!(fs::metadata(&path).unwrap().len() > before);

        guard.discard(offset).unwrap();
        drop(guard);

        assert_eq!(fs::metadata(&path).unwrap().len(), before);
        assert_eq!(log.revision_count("book", a).unwrap(), 1);
        assert_eq!(log.lock().unwrap().next_number(), RevisionNumber::new(2));
    }

    #[test]
    fn test_failed_discard_blocks_commits_until_reload() {
        let (log, temp) = create_test_log();
        let a = Uuid::new_v4();
        commit(&log, &[(a, RevisionType::Created, Some(json!({"title": "A"})))]);

        let path = temp.path().join("revisions.jsonl");
        let mut guard = log.lock().unwrap();
        let rec = record(guard.next_number(), &[(a, RevisionType::Modified, Some(json!({"title": "A2"})))]);
        let offset = guard.write(&rec).unwrap();
        let written = fs::read(&path).unwrap();

        // A directory in place of the file makes the truncate fail
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();
        assert!(guard.discard(offset).is_err());
        drop(guard);
        assert!(log.is_failed());

        fs::remove_dir(&path).unwrap();
        fs::write(&path, &written).unwrap();
        assert!(matches!(log.lock(), Err(HistoryError::Storage(_))));

        // The orphaned line is history now; its number is never reused
        log.load().unwrap();
        assert!(!log.is_failed());
        assert_eq!(log.commit_count().unwrap(), 2);
        assert_eq!(log.lock().unwrap().next_number(), RevisionNumber::new(3));
    }

    #[test]
    fn test_write_rejects_wrong_number() {
        let (log, _temp) = create_test_log();
        let mut guard = log.lock().unwrap();
        let rec = record(RevisionNumber::new(7), &[]);
        assert!(matches!(guard.write(&rec), Err(HistoryError::Storage(_))));
    }

    #[test]
    fn test_contention_surfaces_retryable() {
        let temp_dir = TempDir::new().unwrap();
        let log = RevisionLog::new(
            temp_dir.path().join("revisions.jsonl"),
            LockPolicy {
                timeout: Duration::from_millis(10),
                retries: 2,
            },
        );

        let held = log.lock().unwrap();
        std::thread::scope(|s| {
            let result = s.spawn(|| log.lock().map(|_| ())).join().unwrap();
            let err = result.unwrap_err();
            assert!(err.is_retryable());
            assert!(err.to_string().contains("3 attempts"));
        });
        drop(held);

        assert!(log.lock().is_ok());
    }

    #[test]
    fn test_commits_after() {
        let (log, _temp) = create_test_log();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        commit(&log, &[(a, RevisionType::Created, Some(json!({"title": "A"})))]);
        commit(
            &log,
            &[
                (a, RevisionType::Modified, Some(json!({"title": "A2"}))),
                (b, RevisionType::Created, Some(json!({"title": "B"}))),
            ],
        );
        commit(&log, &[(b, RevisionType::Deleted, None)]);

        assert_eq!(log.commits_after(None).unwrap().len(), 3);

        let tail = log.commits_after(Some(RevisionNumber::FIRST)).unwrap();
        assert_eq!(tail.len(), 2);
        assert_eq!(tail[0].revision_number(), RevisionNumber::new(2));
        assert_eq!(tail[0].revisions.len(), 2);
        assert_eq!(tail[1].revisions.len(), 1);
        assert!(tail[1].revisions[0].is_tombstone());

        assert!(log.commits_after(Some(RevisionNumber::new(3))).unwrap().is_empty());
    }
}
