//! Configuration and credential storage

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::auth::{TokenPair, TokenStore};

/// Base URL used when neither the config file nor the environment sets one
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// Environment override for the API base URL
pub const API_URL_ENV: &str = "STOREFRONT_API_URL";

/// Application configuration
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// API base URL override
    pub api_url: Option<String>,
    /// Stored access token
    pub access_token: Option<String>,
    /// Stored refresh token
    pub refresh_token: Option<String>,
}

impl Config {
    /// Get config directory path
    fn config_dir() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "storefront", "storefront")
            .context("Could not determine config directory")?;
        Ok(proj_dirs.config_dir().to_path_buf())
    }

    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.toml"))
    }

    /// Load configuration from `path`; a missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).context("Failed to read config file")?;
        toml::from_str(&content).context("Failed to parse config file")
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;

        // Set restrictive permissions on config file (contains tokens)
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = fs::Permissions::from_mode(0o600);
            fs::set_permissions(path, perms).context("Failed to set config permissions")?;
        }

        Ok(())
    }

    /// Effective API base URL: explicit override, then environment, then file.
    pub fn api_url(&self, cli_override: Option<&str>) -> String {
        if let Some(url) = cli_override {
            return url.to_string();
        }
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.is_empty() {
                return url;
            }
        }
        self.api_url
            .clone()
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }
}

/// Durable token store backed by the config file.
///
/// Every mutation rewrites the file so tokens survive restarts.
pub struct ConfigTokenStore {
    path: PathBuf,
    config: Mutex<Config>,
}

impl ConfigTokenStore {
    pub fn open(path: PathBuf) -> Result<Self> {
        let config = Config::load_from(&path)?;
        Ok(Self {
            path,
            config: Mutex::new(config),
        })
    }

    /// Snapshot of the current configuration
    pub fn config(&self) -> Config {
        self.config
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    fn update(&self, f: impl FnOnce(&mut Config)) -> Result<()> {
        let mut config = self
            .config
            .lock()
            .map_err(|_| anyhow::anyhow!("config lock poisoned"))?;
        f(&mut config);
        config.save_to(&self.path)
    }
}

impl TokenStore for ConfigTokenStore {
    fn access_token(&self) -> Option<String> {
        self.config.lock().ok()?.access_token.clone()
    }

    fn refresh_token(&self) -> Option<String> {
        self.config.lock().ok()?.refresh_token.clone()
    }

    fn save(&self, pair: &TokenPair) -> Result<()> {
        self.update(|c| {
            c.access_token = Some(pair.access.clone());
            c.refresh_token = Some(pair.refresh.clone());
        })
    }

    fn set_access_token(&self, token: &str) -> Result<()> {
        self.update(|c| c.access_token = Some(token.to_string()))
    }

    fn clear(&self) -> Result<()> {
        self.update(|c| {
            c.access_token = None;
            c.refresh_token = None;
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_tokens_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let store = ConfigTokenStore::open(path.clone()).unwrap();
        store
            .save(&TokenPair {
                access: "acc".into(),
                refresh: "ref".into(),
            })
            .unwrap();
        store.set_access_token("acc2").unwrap();

        let reopened = ConfigTokenStore::open(path.clone()).unwrap();
        assert_eq!(
            reopened.load(),
            Some(TokenPair {
                access: "acc2".into(),
                refresh: "ref".into()
            })
        );

        reopened.clear().unwrap();
        let config = Config::load_from(&path).unwrap();
        assert!(config.access_token.is_none());
        assert!(config.refresh_token.is_none());
    }

    #[test]
    fn test_clear_keeps_api_url() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        Config {
            api_url: Some("https://shop.example".into()),
            access_token: Some("a".into()),
            refresh_token: Some("r".into()),
        }
        .save_to(&path)
        .unwrap();

        let store = ConfigTokenStore::open(path).unwrap();
        store.clear().unwrap();
        assert_eq!(
            store.config().api_url.as_deref(),
            Some("https://shop.example")
        );
    }

    #[test]
    fn test_cli_override_wins() {
        let config = Config {
            api_url: Some("https://file.example".into()),
            ..Default::default()
        };
        assert_eq!(
            config.api_url(Some("https://cli.example")),
            "https://cli.example"
        );
    }
}
