//! book-revisions - Book records with a full, attributed revision history
//!
//! This library keeps the current state of tracked entities (books, out of
//! the box) in a JSON row file and records every committed create, update
//! and delete as a numbered revision in an append-only log. Any entity can
//! be reconstructed as it was at any revision, together with who changed it
//! and when.
//!
//! # Architecture
//!
//! The crate is organized into the following modules:
//!
//! - `config`: Configuration and path management
//! - `error`: Custom error types
//! - `models`: Tracked entity models and the `Audited` contract
//! - `audit`: Revisions, the revision log, identity sources, and the change
//!   interceptor
//! - `storage`: Entity rows and units of work
//! - `services`: Book management and history queries
//! - `cli` / `display`: Command handlers and terminal formatting
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use book_revisions::audit::StaticIdentity;
//! use book_revisions::config::{HistoryPaths, Settings};
//! use book_revisions::models::Book;
//! use book_revisions::services::{BookService, HistoryService};
//! use book_revisions::storage::Storage;
//!
//! let paths = HistoryPaths::new()?;
//! let settings = Settings::load_or_create(&paths)?;
//! let storage = Storage::open(paths, &settings, Arc::new(StaticIdentity::new("vanessa")))?;
//!
//! let book = BookService::new(&storage).create("Rudyard Kipling", "Jungle Book")?;
//! let history = HistoryService::<Book>::new(&storage).get_all_revisions(book.id.unwrap())?;
//! ```

pub mod audit;
pub mod cli;
pub mod config;
pub mod display;
pub mod error;
pub mod models;
pub mod services;
pub mod storage;

pub use error::{HistoryError, HistoryResult};
