//! Configuration directory helpers for the chat backup engine
//!
//! Settings files live in a shared directory (`~/.config/chat-backup/` by
//! default). The `CHAT_BACKUP_CONFIG_DIR` environment variable relocates the
//! whole directory, which hosts and tests use to keep state isolated.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};

/// Name of the directory created under the platform config dir
const APP_DIR_NAME: &str = "chat-backup";

/// Environment variable that overrides the config directory
pub const CONFIG_DIR_ENV: &str = "CHAT_BACKUP_CONFIG_DIR";

/// Get the config directory
///
/// Honors `CHAT_BACKUP_CONFIG_DIR`, falling back to the platform config dir.
pub fn config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|p| p.join(APP_DIR_NAME))
}

/// Get the path to a file within the config directory
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|p| p.join(filename))
}

/// Check if a config file exists in the config directory
pub fn config_exists(filename: &str) -> bool {
    config_path(filename).is_some_and(|p| p.exists())
}

/// Load and parse a JSON config file from the config directory
pub fn load_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    let path = config_path(filename).context("Could not determine config directory")?;
    load_json_file(&path)
}

/// Load a JSON config file if present, otherwise return `T::default()`
pub fn load_json_or_default<T: DeserializeOwned + Default>(filename: &str) -> Result<T> {
    if config_exists(filename) {
        load_json(filename)
    } else {
        Ok(T::default())
    }
}

/// Load and parse a JSON file from an arbitrary path
pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Ensure the config directory exists
pub fn ensure_config_dir() -> Result<PathBuf> {
    let dir = config_dir().context("Could not determine config directory")?;
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create config directory: {}", dir.display()))?;
    Ok(dir)
}

/// Save a value as pretty JSON to a file in the config directory
pub fn save_json<T: serde::Serialize>(filename: &str, value: &T) -> Result<PathBuf> {
    let dir = ensure_config_dir()?;
    let path = dir.join(filename);
    let content = serde_json::to_string_pretty(value)?;
    std::fs::write(&path, content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        level: u32,
    }

    #[test]
    fn test_config_path_ends_with_filename() {
        let path = config_path("settings.json");
        assert!(path.is_some());
        assert!(path.unwrap().ends_with("settings.json"));
    }

    #[test]
    fn test_load_json_file_roundtrip() {
        let dir = std::env::temp_dir().join(format!("chat-backup-config-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("sample.json");
        std::fs::write(&path, r#"{ "name": "backup", "level": 3 }"#).unwrap();

        let loaded: Sample = load_json_file(&path).unwrap();
        assert_eq!(
            loaded,
            Sample {
                name: "backup".to_string(),
                level: 3
            }
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_load_json_file_invalid() {
        let dir = std::env::temp_dir().join(format!("chat-backup-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad.json");
        std::fs::write(&path, "not json").unwrap();

        let result: Result<Sample> = load_json_file(&path);
        assert!(result.is_err());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
