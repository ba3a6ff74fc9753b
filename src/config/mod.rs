//! Configuration module for book-revisions
//!
//! - XDG-compliant path resolution
//! - Settings persistence (auditor fallback, commit-lock policy)

pub mod paths;
pub mod settings;

pub use paths::HistoryPaths;
pub use settings::Settings;
