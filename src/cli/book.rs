//! Book CLI commands
//!
//! Implements CLI commands for book management.

use clap::Subcommand;

use crate::display::{format_book_details, format_book_list};
use crate::error::{HistoryError, HistoryResult};
use crate::models::Book;
use crate::services::BookService;
use crate::storage::Storage;

/// Book subcommands
#[derive(Subcommand)]
pub enum BookCommands {
    /// Add a new book
    Add {
        /// Author name
        #[arg(short, long)]
        author: String,
        /// Book title
        #[arg(short, long)]
        title: String,
    },
    /// Update a book's author or title
    Update {
        /// Book title or ID
        book: String,
        /// New author
        #[arg(short, long)]
        author: Option<String>,
        /// New title
        #[arg(short, long)]
        title: Option<String>,
        /// Reject the update unless the book is still at this version
        #[arg(long)]
        expected_version: Option<u64>,
    },
    /// Delete a book (its history is kept)
    Delete {
        /// Book title or ID
        book: String,
    },
    /// Show book details
    Show {
        /// Book title or ID
        book: String,
    },
    /// List books
    List {
        /// Only books by this author
        #[arg(short, long)]
        author: Option<String>,
    },
}

/// Handle a book command
pub fn handle_book_command(
    storage: &Storage,
    identity: Option<&str>,
    cmd: BookCommands,
) -> HistoryResult<()> {
    let service = match identity {
        Some(identity) => BookService::new(storage).acting_as(identity),
        None => BookService::new(storage),
    };

    match cmd {
        BookCommands::Add { author, title } => {
            let book = service.create(&author, &title)?;
            println!("Added book: {}", book);
            if let Some(id) = book.id {
                println!("  ID: {}", id);
            }
        }

        BookCommands::Update {
            book,
            author,
            title,
            expected_version,
        } => {
            if author.is_none() && title.is_none() {
                return Err(HistoryError::Validation(
                    "Nothing to update: pass --author and/or --title".into(),
                ));
            }

            let existing = find_book(&service, &book)?;
            let id = existing
                .id
                .ok_or_else(|| HistoryError::book_not_found(&book))?;

            let updated =
                service.update(id, author.as_deref(), title.as_deref(), expected_version)?;
            println!("Updated book: {} (version {})", updated, updated.version);
        }

        BookCommands::Delete { book } => {
            let existing = find_book(&service, &book)?;
            let id = existing
                .id
                .ok_or_else(|| HistoryError::book_not_found(&book))?;

            service.delete(id)?;
            println!("Deleted book: {}", existing);
        }

        BookCommands::Show { book } => {
            let existing = find_book(&service, &book)?;
            print!("{}", format_book_details(&existing));
        }

        BookCommands::List { author } => {
            let books = match author {
                Some(author) => service.find_all_by_author(&author)?,
                None => service.list()?,
            };
            println!("{}", format_book_list(&books).trim_end());
        }
    }

    Ok(())
}

fn find_book(service: &BookService<'_>, identifier: &str) -> HistoryResult<Book> {
    service
        .find(identifier)?
        .ok_or_else(|| HistoryError::book_not_found(identifier))
}
