//! Path management for book-revisions
//!
//! ## Path Resolution Order
//!
//! 1. `BOOK_REVISIONS_DATA_DIR` environment variable (if set)
//! 2. Unix (Linux/macOS): `$XDG_CONFIG_HOME/book-revisions` or `~/.config/book-revisions`
//! 3. Windows: `%APPDATA%\book-revisions`

use std::path::PathBuf;

use crate::error::HistoryError;

/// Environment variable that overrides the base directory
pub const DATA_DIR_ENV: &str = "BOOK_REVISIONS_DATA_DIR";

/// Manages all paths used by book-revisions
#[derive(Debug, Clone)]
pub struct HistoryPaths {
    base_dir: PathBuf,
}

impl HistoryPaths {
    /// Resolve the base directory from the environment
    ///
    /// # Errors
    ///
    /// Returns an error if neither the override nor a home directory is set.
    pub fn new() -> Result<Self, HistoryError> {
        let base_dir = if let Ok(custom) = std::env::var(DATA_DIR_ENV) {
            PathBuf::from(custom)
        } else {
            resolve_default_path()?
        };

        Ok(Self { base_dir })
    }

    /// Create HistoryPaths with a custom base directory (useful for testing)
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    /// Get the data directory (`<base>/data/`)
    pub fn data_dir(&self) -> PathBuf {
        self.base_dir.join("data")
    }

    /// Get the path to the settings file
    pub fn settings_file(&self) -> PathBuf {
        self.base_dir.join("config.json")
    }

    /// Current entity rows
    pub fn entities_file(&self) -> PathBuf {
        self.data_dir().join("entities.json")
    }

    /// Append-only revision log, one commit per line
    pub fn revision_log(&self) -> PathBuf {
        self.data_dir().join("revisions.jsonl")
    }

    /// Ensure the base and data directories exist
    pub fn ensure_directories(&self) -> Result<(), HistoryError> {
        std::fs::create_dir_all(&self.base_dir)
            .map_err(|e| HistoryError::Io(format!("Failed to create base directory: {}", e)))?;

        std::fs::create_dir_all(self.data_dir())
            .map_err(|e| HistoryError::Io(format!("Failed to create data directory: {}", e)))?;

        Ok(())
    }
}

#[cfg(not(windows))]
fn resolve_default_path() -> Result<PathBuf, HistoryError> {
    let config_base = match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) => PathBuf::from(xdg),
        Err(_) => {
            let home = std::env::var("HOME").map_err(|_| {
                HistoryError::Config("Could not determine HOME directory".into())
            })?;
            PathBuf::from(home).join(".config")
        }
    };
    Ok(config_base.join("book-revisions"))
}

#[cfg(windows)]
fn resolve_default_path() -> Result<PathBuf, HistoryError> {
    let appdata = std::env::var("APPDATA")
        .map_err(|_| HistoryError::Config("Could not determine APPDATA directory".into()))?;
    Ok(PathBuf::from(appdata).join("book-revisions"))
}
