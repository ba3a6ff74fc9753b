//! User settings for book-revisions
//!
//! Holds the fallback auditor identity and the commit-lock policy of the
//! revision log.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::paths::HistoryPaths;
use crate::audit::DEFAULT_AUDITOR;
use crate::error::HistoryError;

/// Settings for book-revisions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Schema version for migration support
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,

    /// Identity recorded when no identity source yields one
    #[serde(default = "default_auditor")]
    pub default_auditor: String,

    /// How long a single attempt waits for the revision counter
    #[serde(default = "default_commit_lock_timeout_ms")]
    pub commit_lock_timeout_ms: u64,

    /// Additional attempts before a commit gives up with a retryable error
    #[serde(default = "default_commit_retries")]
    pub commit_retries: u32,
}

fn default_schema_version() -> u32 {
    1
}

fn default_auditor() -> String {
    DEFAULT_AUDITOR.to_string()
}

fn default_commit_lock_timeout_ms() -> u64 {
    250
}

fn default_commit_retries() -> u32 {
    3
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schema_version: default_schema_version(),
            default_auditor: default_auditor(),
            commit_lock_timeout_ms: default_commit_lock_timeout_ms(),
            commit_retries: default_commit_retries(),
        }
    }
}

impl Settings {
    pub fn commit_lock_timeout(&self) -> Duration {
        Duration::from_millis(self.commit_lock_timeout_ms)
    }

    /// Load settings from disk, or fall back to defaults if the file doesn't exist
    pub fn load_or_create(paths: &HistoryPaths) -> Result<Self, HistoryError> {
        let settings_path = paths.settings_file();

        if !settings_path.exists() {
            return Ok(Settings::default());
        }

        let contents = std::fs::read_to_string(&settings_path)
            .map_err(|e| HistoryError::Io(format!("Failed to read settings file: {}", e)))?;

        let settings: Settings = serde_json::from_str(&contents)
            .map_err(|e| HistoryError::Config(format!("Failed to parse settings file: {}", e)))?;

        if settings.default_auditor.trim().is_empty() {
            return Err(HistoryError::Config(
                "default_auditor must not be blank".into(),
            ));
        }

        Ok(settings)
    }

    /// Save settings to disk
    pub fn save(&self, paths: &HistoryPaths) -> Result<(), HistoryError> {
        paths.ensure_directories()?;

        let contents = serde_json::to_string_pretty(self)
            .map_err(|e| HistoryError::Config(format!("Failed to serialize settings: {}", e)))?;

        std::fs::write(paths.settings_file(), contents)
            .map_err(|e| HistoryError::Io(format!("Failed to write settings file: {}", e)))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.schema_version, 1);
        assert_eq!(settings.default_auditor, "wade.wilson");
        assert_eq!(settings.commit_lock_timeout(), Duration::from_millis(250));
        assert_eq!(settings.commit_retries, 3);
    }

    #[test]
    fn test_load_missing_returns_default() {
        let temp_dir = TempDir::new().unwrap();
        let paths = HistoryPaths::with_base_dir(temp_dir.path().to_path_buf());

        let settings = Settings::load_or_create(&paths).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(!paths.settings_file().exists());
    }

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let paths = HistoryPaths::with_base_dir(temp_dir.path().to_path_buf());

        let settings = Settings {
            default_auditor: "librarian".into(),
            commit_retries: 7,
            ..Settings::default()
        };
        settings.save(&paths).unwrap();

        let loaded = Settings::load_or_create(&paths).unwrap();
        assert_eq!(loaded.default_auditor, "librarian");
        assert_eq!(loaded.commit_retries, 7);
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let paths = HistoryPaths::with_base_dir(temp_dir.path().to_path_buf());
        std::fs::write(paths.settings_file(), r#"{"commit_retries": 1}"#).unwrap();

        let loaded = Settings::load_or_create(&paths).unwrap();
        assert_eq!(loaded.commit_retries, 1);
        assert_eq!(loaded.default_auditor, "wade.wilson");
    }

    #[test]
    fn test_blank_auditor_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let paths = HistoryPaths::with_base_dir(temp_dir.path().to_path_buf());
        std::fs::write(paths.settings_file(), r#"{"default_auditor": "  "}"#).unwrap();

        let err = Settings::load_or_create(&paths).unwrap_err();
        assert!(matches!(err, HistoryError::Config(_)));
    }
}
