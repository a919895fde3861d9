//! Engine settings
//!
//! Loaded using the following priority:
//! 1. An explicit JSON file (`BackupSettings::from_file`)
//! 2. `backup-settings.json` in the chat-backup config directory
//! 3. Built-in defaults
//!
//! `CHAT_BACKUP_ATTACHMENTS_DIR` and `CHAT_BACKUP_DATABASE_PATH` override
//! the paths from whichever source was used.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings filename in the config directory
const SETTINGS_FILE: &str = "backup-settings.json";

pub const ATTACHMENTS_DIR_ENV: &str = "CHAT_BACKUP_ATTACHMENTS_DIR";
pub const DATABASE_PATH_ENV: &str = "CHAT_BACKUP_DATABASE_PATH";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupSettings {
    /// Root of the local attachment files
    pub attachments_dir: PathBuf,
    /// SQLite database used by `SqliteBackupStore`
    pub database_path: PathBuf,
    /// zstd level for local attachment files
    pub blob_compression_level: i32,
    /// Orphan records younger than this are never reaped
    pub orphan_grace_period_secs: u64,
    /// Whether restored pointers are queued for the downloader
    pub enqueue_backup_downloads: bool,
    /// Largest width/height a sender thumbnail may have to be used as a
    /// quoted-reply thumbnail
    pub max_quote_thumbnail_dimension: u32,
}

impl Default for BackupSettings {
    fn default() -> Self {
        let base = config::config_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            attachments_dir: base.join("attachments"),
            database_path: base.join("backup.db"),
            blob_compression_level: 3,
            orphan_grace_period_secs: 60 * 60,
            enqueue_backup_downloads: true,
            max_quote_thumbnail_dimension: 320,
        }
    }
}

impl BackupSettings {
    /// Load settings from the config directory, falling back to defaults
    pub fn load() -> Result<Self> {
        let settings: Self = config::load_json_or_default(SETTINGS_FILE)?;
        Ok(settings.with_env_overrides())
    }

    /// Load settings from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let settings: Self = config::load_json_file(path)?;
        Ok(settings.with_env_overrides())
    }

    /// Persist to the config directory
    pub fn save(&self) -> Result<PathBuf> {
        config::save_json(SETTINGS_FILE, self)
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var(ATTACHMENTS_DIR_ENV)
            && !dir.is_empty()
        {
            self.attachments_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var(DATABASE_PATH_ENV)
            && !path.is_empty()
        {
            self.database_path = PathBuf::from(path);
        }
        self
    }

    pub fn orphan_grace_period(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.orphan_grace_period_secs.min(i64::MAX as u64) as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "blob_compression_level": 9 }"#).unwrap();

        let settings = BackupSettings::from_file(&path).unwrap();
        assert_eq!(settings.blob_compression_level, 9);
        assert_eq!(settings.orphan_grace_period_secs, 3600);
        assert!(settings.enqueue_backup_downloads);
    }

    #[test]
    fn test_invalid_file_is_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();
        assert!(BackupSettings::from_file(&path).is_err());
    }

    #[test]
    fn test_grace_period() {
        let settings = BackupSettings {
            orphan_grace_period_secs: 90,
            ..BackupSettings::default()
        };
        assert_eq!(settings.orphan_grace_period(), chrono::Duration::seconds(90));
    }
}
