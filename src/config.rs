//! Application configuration and local data paths.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ingest::ImportOptions;

/// Application configuration, loadable from `config.toml` in the data dir.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Location of the SQLite database file.
    pub db_path: PathBuf,
    /// Scratch directory for archive extraction.
    pub tmp_dir: PathBuf,
    pub record_batch_size: usize,
    pub workout_batch_size: usize,
    pub summary_batch_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = get_data_dir();
        let defaults = ImportOptions::default();
        Self {
            db_path: data_dir.join("health.db"),
            tmp_dir: data_dir.join("tmp"),
            record_batch_size: defaults.record_batch_size,
            workout_batch_size: defaults.workout_batch_size,
            summary_batch_size: defaults.summary_batch_size,
        }
    }
}

impl AppConfig {
    /// Import options with this config's batch sizes.
    pub fn import_options(&self) -> ImportOptions {
        ImportOptions {
            record_batch_size: self.record_batch_size,
            workout_batch_size: self.workout_batch_size,
            summary_batch_size: self.summary_batch_size,
            ..ImportOptions::default()
        }
    }
}

/// Get the application data directory.
pub fn get_data_dir() -> PathBuf {
    directories::ProjectDirs::from("dev", "vitals", "Vitals")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Get the configuration file path.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

/// Load application configuration, falling back to defaults when no config
/// file exists.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let path = get_config_path();

    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let content =
        std::fs::read_to_string(&path).map_err(|e| ConfigError::IoError(e.to_string()))?;

    toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
}

/// Delete local data artifacts: the database (with its WAL/SHM sidecars) and
/// the scratch directory. Safe to call when none of them exist; the store can
/// always be rebuilt from the source export.
pub fn delete_local_data(config: &AppConfig) -> std::io::Result<()> {
    remove_file_if_exists(&config.db_path)?;
    remove_file_if_exists(&sidecar(&config.db_path, "-wal"))?;
    remove_file_if_exists(&sidecar(&config.db_path, "-shm"))?;

    if config.tmp_dir.exists() {
        std::fs::remove_dir_all(&config.tmp_dir)?;
    }
    Ok(())
}

fn sidecar(db_path: &Path, suffix: &str) -> PathBuf {
    let mut name = db_path.as_os_str().to_os_string();
    name.push(suffix);
    PathBuf::from(name)
}

fn remove_file_if_exists(path: &Path) -> std::io::Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_batch_sizes() {
        let config = AppConfig::default();
        assert_eq!(config.record_batch_size, 2000);
        assert_eq!(config.workout_batch_size, 300);
        assert_eq!(config.import_options().record_batch_size, 2000);
    }

    #[test]
    fn test_config_parses_partial_toml() {
        let config: AppConfig = toml::from_str("record_batch_size = 100").unwrap();
        assert_eq!(config.record_batch_size, 100);
        assert_eq!(config.workout_batch_size, 300);
    }

    #[test]
    fn test_delete_local_data_is_safe_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            db_path: dir.path().join("health.db"),
            tmp_dir: dir.path().join("tmp"),
            ..AppConfig::default()
        };
        delete_local_data(&config).unwrap();
    }

    #[test]
    fn test_delete_local_data_removes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            db_path: dir.path().join("health.db"),
            tmp_dir: dir.path().join("tmp"),
            ..AppConfig::default()
        };

        std::fs::write(&config.db_path, b"db").unwrap();
        std::fs::write(dir.path().join("health.db-wal"), b"wal").unwrap();
        std::fs::create_dir_all(&config.tmp_dir).unwrap();
        std::fs::write(config.tmp_dir.join("export.xml"), b"<x/>").unwrap();

        delete_local_data(&config).unwrap();
        assert!(!config.db_path.exists());
        assert!(!dir.path().join("health.db-wal").exists());
        assert!(!config.tmp_dir.exists());
    }
}
