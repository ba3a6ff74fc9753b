//! Display formatting for terminal output
//!
//! Provides utilities for formatting books and their revision history as
//! plain-text tables and detail views.

pub mod book;
pub mod history;

pub use book::{format_book_details, format_book_list};
pub use history::{format_revision_details, format_revision_list};
