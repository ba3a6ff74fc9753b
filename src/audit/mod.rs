//! Revision history for tracked entities
//!
//! Every committed create, update or delete produces a revision: an
//! immutable snapshot of the entity tagged with a store-wide revision number
//! and the identity of whoever committed it.
//!
//! # Architecture
//!
//! - `IdentitySource`: answers "who is acting" once per unit of work.
//! - `ChangeInterceptor`: stamps and snapshots every staged save/delete and
//!   seals a unit's changes into one `CommitRecord`.
//! - `RevisionLog`: append-only JSONL ledger that owns the revision counter.
//! - `summarize_changes`: human-readable diffs between two snapshots.
//!
//! # Example
//!
//! ```rust,ignore
//! use book_revisions::audit::{LockPolicy, RevisionLog};
//!
//! let log = RevisionLog::new(paths.revision_log(), LockPolicy::default());
//! log.load()?;
//!
//! let mut guard = log.lock()?;
//! let record = interceptor.seal(guard.next_number(), &author, Utc::now(), &changes);
//! let offset = guard.write(&record)?;
//! // persist rows, or `guard.discard(offset)` on failure
//! guard.publish(record)?;
//! ```

mod diff;
mod identity;
mod interceptor;
mod log;
mod revision;

pub use diff::{field_changes, summarize_changes};
pub use identity::{Anonymous, EnvIdentity, IdentitySource, StaticIdentity, DEFAULT_AUDITOR, IDENTITY_ENV};
pub use interceptor::{ChangeInterceptor, ChangeSet, PendingChange};
pub use log::{CommitGuard, LockPolicy, RevisionLog};
pub use revision::{CommitRecord, Revision, RevisionMetadata, RevisionNumber, RevisionType};
