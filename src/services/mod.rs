//! Service layer for book-revisions
//!
//! The service layer provides business logic on top of the storage layer:
//! book management, and read-only queries over revision history.

pub mod book;
pub mod history;

pub use book::BookService;
pub use history::{AuditedEntityView, HistoryService};
