//! Configuration management for the session layer.

use std::env;
use std::path::PathBuf;

/// Configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the database file.
    pub data_dir: PathBuf,
    /// Database file name inside `data_dir`.
    pub database_file: String,
}

impl Config {
    /// Load configuration, reading a `.env` file if one is present.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from environment variables only.
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir = env::var("CARESYNC_DATA_DIR").unwrap_or_else(|_| "./data".to_string());
        let database_file =
            env::var("CARESYNC_DB_FILE").unwrap_or_else(|_| "caresync.db".to_string());

        if database_file.trim().is_empty() {
            return Err(ConfigError::EmptyDatabaseFile);
        }

        Ok(Self {
            data_dir: PathBuf::from(data_dir),
            database_file,
        })
    }

    /// Full path of the database file.
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(&self.database_file)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            database_file: "caresync.db".to_string(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("CARESYNC_DB_FILE must not be empty")]
    EmptyDatabaseFile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_paths() {
        let config = Config::default();
        assert_eq!(config.database_path(), PathBuf::from("./data/caresync.db"));
    }
}
