//! Client configuration.
//!
//! Reads/writes `~/.broker/config.toml`. Every field has a default, so a
//! missing file or a partial file is valid.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config encode: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// Client configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ClientConfig {
    /// Backend base URL, e.g. `http://localhost:8002/api/v1`.
    pub server: String,

    /// Path to the session database.
    /// Defaults to `session.redb` next to the config file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,

    /// Per-request timeout handed to the HTTP client.
    pub timeout_secs: u64,

    /// Synthesize a local session when the backend is unreachable.
    pub dev_fallback: bool,

    /// Use generated development credentials instead of the identity provider.
    pub mock_credentials: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server: "http://localhost:8002/api/v1".to_string(),
            db_path: None,
            timeout_secs: 10,
            dev_fallback: true,
            mock_credentials: true,
        }
    }
}

impl ClientConfig {
    /// Default config file path: ~/.broker/config.toml.
    pub fn default_path() -> PathBuf {
        dirs_path().join("config.toml")
    }

    /// Load config from disk, or return default if file doesn't exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Save config to disk.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Resolve the session database path, falling back to
    /// `{config dir}/session.redb`.
    pub fn resolve_db_path(&self, config_path: &Path) -> PathBuf {
        self.db_path.clone().unwrap_or_else(|| {
            config_path
                .parent()
                .map(|dir| dir.join("session.redb"))
                .unwrap_or_else(|| PathBuf::from("session.redb"))
        })
    }
}

/// Return the broker config directory (~/.broker).
fn dirs_path() -> PathBuf {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".broker")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = ClientConfig::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert!(config.dev_fallback);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "server = \"https://api.example.com\"\ndev-fallback = false\n").unwrap();

        let config = ClientConfig::load(&path).unwrap();
        assert_eq!(config.server, "https://api.example.com");
        assert!(!config.dev_fallback);
        assert_eq!(config.timeout_secs, 10);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("config.toml");
        let config = ClientConfig {
            timeout_secs: 3,
            mock_credentials: false,
            ..Default::default()
        };
        config.save(&path).unwrap();

        assert_eq!(ClientConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn db_path_defaults_next_to_config() {
        let config = ClientConfig::default();
        assert_eq!(
            config.resolve_db_path(Path::new("/home/u/.broker/config.toml")),
            PathBuf::from("/home/u/.broker/session.redb")
        );

        let config = ClientConfig {
            db_path: Some(PathBuf::from("/tmp/s.redb")),
            ..Default::default()
        };
        assert_eq!(config.resolve_db_path(Path::new("config.toml")), PathBuf::from("/tmp/s.redb"));
    }

    #[test]
    fn malformed_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "server = [").unwrap();
        assert!(matches!(ClientConfig::load(&path), Err(ConfigError::Parse(_))));
    }
}
