//! Core data models for book-revisions
//!
//! Tracked entity types and the trait that lets the store and the revision
//! log handle them generically.

pub mod audited;
pub mod book;
pub mod ids;

pub use audited::Audited;
pub use book::{Book, BookValidationError};
pub use ids::BookId;
