use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use book_revisions::audit::EnvIdentity;
use book_revisions::cli::{handle_book_command, handle_history_command};
use book_revisions::config::{HistoryPaths, Settings};
use book_revisions::storage::Storage;

#[derive(Parser)]
#[command(
    name = "book-revisions",
    author = "Kaylee Beyene",
    version,
    about = "Book records with a full, attributed revision history",
    long_about = "book-revisions keeps a catalogue of books and records every \
                  create, update and delete as a numbered revision, so any book \
                  can be inspected as it was at any point in time."
)]
struct Cli {
    /// Identity to record as the author of changes (overrides $BOOK_REVISIONS_USER)
    #[arg(long = "as", global = true, value_name = "IDENTITY")]
    acting_as: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Book management commands
    #[command(subcommand)]
    Book(book_revisions::cli::BookCommands),

    /// Revision history commands
    #[command(subcommand)]
    History(book_revisions::cli::HistoryCommands),

    /// Write the settings file with current values
    Init,

    /// Show current configuration and paths
    Config,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("book_revisions=warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Initialize paths and settings
    let paths = HistoryPaths::new()?;
    let settings = Settings::load_or_create(&paths)?;

    // Initialize storage
    let storage = Storage::new(paths.clone(), &settings, Arc::new(EnvIdentity::default()))?;
    storage.load_all()?;

    let identity = cli.acting_as.as_deref();

    match cli.command {
        Some(Commands::Book(cmd)) => {
            handle_book_command(&storage, identity, cmd)?;
        }
        Some(Commands::History(cmd)) => {
            handle_history_command(&storage, cmd)?;
        }
        Some(Commands::Init) => {
            settings.save(&paths)?;
            println!("Settings written to: {}", paths.settings_file().display());
        }
        Some(Commands::Config) => {
            println!("book-revisions Configuration");
            println!("============================");
            println!("Base directory:   {}", paths.base_dir().display());
            println!("Settings file:    {}", paths.settings_file().display());
            println!("Entity file:      {}", paths.entities_file().display());
            println!("Revision log:     {}", paths.revision_log().display());
            println!();
            println!("Settings:");
            println!("  Default auditor:      {}", settings.default_auditor);
            println!("  Commit lock timeout:  {} ms", settings.commit_lock_timeout_ms);
            println!("  Commit retries:       {}", settings.commit_retries);
            println!();
            println!(
                "Revisions recorded: {}",
                storage.revisions().commit_count()?
            );
        }
        None => {
            println!("book-revisions - Books with a full revision history");
            println!();
            println!("Run 'book-revisions --help' for usage information.");
        }
    }

    Ok(())
}
