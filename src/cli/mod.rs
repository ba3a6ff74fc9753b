//! CLI command handlers
//!
//! This module contains the implementation of CLI commands,
//! bridging the clap argument parsing with the service layer.

pub mod book;
pub mod history;

pub use book::{handle_book_command, BookCommands};
pub use history::{handle_history_command, HistoryCommands};
