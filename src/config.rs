use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const CONFIG_DIR_PREFIX: &str = "gsheet";

const DEFAULT_CALLBACK_PORT: u16 = 8888;
const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub google: GoogleConfig,
    pub download: DownloadConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GoogleConfig {
    /// Client secret descriptor downloaded from the Google Cloud console
    pub credentials_file: Option<PathBuf>,
    /// Directory holding one stored credential per user and scope set
    pub tokens_dir: Option<PathBuf>,
    pub user: String,
    pub application_name: String,
    pub callback_port: u16,
    pub auth_timeout_secs: u64,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            credentials_file: None,
            tokens_dir: None,
            user: "user".to_string(),
            application_name: CONFIG_DIR_PREFIX.to_string(),
            callback_port: DEFAULT_CALLBACK_PORT,
            auth_timeout_secs: DEFAULT_AUTH_TIMEOUT_SECS,
        }
    }
}

impl GoogleConfig {
    pub fn credentials_file(&self) -> Result<PathBuf> {
        match &self.credentials_file {
            Some(path) => Ok(path.clone()),
            None => Config::config_dir().map(|dir| dir.join("credentials.json")),
        }
    }

    pub fn tokens_dir(&self) -> Result<PathBuf> {
        match &self.tokens_dir {
            Some(path) => Ok(path.clone()),
            None => Config::cache_dir().map(|dir| dir.join("tokens")),
        }
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_secs)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct DownloadConfig {
    pub output_dir: PathBuf,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file()?;
        Self::load_from(&config_path)
    }

    /// Load from an explicit path, falling back to defaults when the file is absent
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            debug!(path = ?config_path, "No config file, using defaults");
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(config_path)?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.google.user.is_empty() {
            return Err(AppError::Config("google.user must not be empty".to_string()));
        }

        if self.google.callback_port == 0 {
            return Err(AppError::Config(
                "google.callback_port must be a fixed, non-zero port".to_string(),
            ));
        }

        if self.google.auth_timeout_secs == 0 {
            return Err(AppError::Config(
                "google.auth_timeout_secs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    fn xdg_dirs() -> xdg::BaseDirectories {
        xdg::BaseDirectories::with_prefix(CONFIG_DIR_PREFIX)
    }

    /// Get the config file path
    pub fn config_file() -> Result<PathBuf> {
        let xdg_dirs = Self::xdg_dirs();
        xdg_dirs
            .place_config_file("config.toml")
            .map_err(|e| AppError::Config(format!("Failed to create config directory: {}", e)))
    }

    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf> {
        let xdg = Self::xdg_dirs();
        xdg.get_config_home()
            .ok_or_else(|| AppError::Config("Failed to determine config directory".to_string()))
    }

    /// Get the cache directory path
    pub fn cache_dir() -> Result<PathBuf> {
        let xdg = Self::xdg_dirs();
        xdg.get_cache_home()
            .ok_or_else(|| AppError::Config("Failed to determine cache directory".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();

        assert_eq!(config.google.callback_port, 8888);
        assert_eq!(config.google.user, "user");
        assert_eq!(config.google.auth_timeout(), Duration::from_secs(300));
        assert_eq!(config.download.output_dir, PathBuf::from("."));
    }

    #[test]
    fn test_partial_file_keeps_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            "[google]\ncredentials_file = \"/etc/gsheet/secret.json\"\nuser = \"alice\"\n",
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();

        assert_eq!(
            config.google.credentials_file().unwrap(),
            PathBuf::from("/etc/gsheet/secret.json")
        );
        assert_eq!(config.google.user, "alice");
        assert_eq!(config.google.callback_port, 8888);
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[google]\nauth_timeout_secs = 0\n").unwrap();

        let err = Config::load_from(&path).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();

        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();

        assert_eq!(config.google.user, deserialized.google.user);
        assert_eq!(config.google.callback_port, deserialized.google.callback_port);
    }
}
