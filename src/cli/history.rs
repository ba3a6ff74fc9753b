//! History CLI commands
//!
//! Read-only views over the revisions of a book. Deleted books can still be
//! addressed by ID.

use clap::Subcommand;

use crate::display::{format_revision_details, format_revision_list};
use crate::error::{HistoryError, HistoryResult};
use crate::models::{Book, BookId};
use crate::services::{BookService, HistoryService};
use crate::storage::Storage;

/// History subcommands
#[derive(Subcommand)]
pub enum HistoryCommands {
    /// List every revision of a book
    List {
        /// Book title or ID
        book: String,
    },
    /// Show a book as it was at a revision
    Show {
        /// Book title or ID
        book: String,
        /// Revision number
        #[arg(long)]
        at: u64,
    },
    /// Count the revisions of a book
    Count {
        /// Book title or ID
        book: String,
    },
    /// Show who last changed a book
    Author {
        /// Book title or ID
        book: String,
    },
}

/// Handle a history command
pub fn handle_history_command(storage: &Storage, cmd: HistoryCommands) -> HistoryResult<()> {
    let history = HistoryService::<Book>::new(storage);

    match cmd {
        HistoryCommands::List { book } => {
            let id = resolve_book_id(storage, &book)?;
            let views = history.get_all_revisions(id)?;
            println!("{}", format_revision_list(&views).trim_end());
        }

        HistoryCommands::Show { book, at } => {
            let id = resolve_book_id(storage, &book)?;
            match history.get_state_as_of(id, at)? {
                Some(view) => print!("{}", format_revision_details(&view)),
                None => println!("{} did not exist at revision r{}", book, at),
            }
        }

        HistoryCommands::Count { book } => {
            let id = resolve_book_id(storage, &book)?;
            println!("{}", history.get_revision_count(id)?);
        }

        HistoryCommands::Author { book } => {
            let id = resolve_book_id(storage, &book)?;
            match history.get_last_change_author(id)? {
                Some(author) => println!("{}", author),
                None => println!("No revisions found."),
            }
        }
    }

    Ok(())
}

/// Book IDs are taken as-is so that deleted books stay reachable
fn resolve_book_id(storage: &Storage, identifier: &str) -> HistoryResult<BookId> {
    if let Ok(id) = identifier.parse::<BookId>() {
        return Ok(id);
    }

    BookService::new(storage)
        .find(identifier)?
        .and_then(|book| book.id)
        .ok_or_else(|| HistoryError::book_not_found(identifier))
}
