//! Client configuration management.
//!
//! This module handles loading and saving the console configuration: the API
//! base URL, request timeout, page size, read retry policy, and which roles
//! see write controls.
//!
//! Configuration is stored at `~/.config/stockroom/config.json`. The
//! `STOCKROOM_API_URL` environment variable overrides the base URL.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::api::client::DEFAULT_REQUEST_TIMEOUT_SECS;
use crate::cache::executor::{DEFAULT_READ_RETRIES, DEFAULT_RETRY_BACKOFF_MS};
use crate::cache::RetryPolicy;
use crate::pagination::{PageRequest, DEFAULT_PAGE_SIZE};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "stockroom";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding `api_base_url`
pub const API_URL_ENV: &str = "STOCKROOM_API_URL";

const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";

/// Where the bearer token is kept between sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenStoreKind {
    #[default]
    Keyring,
    Memory,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub default_page_size: u32,
    pub read_retries: u32,
    pub retry_backoff_ms: u64,
    pub write_roles: Vec<String>,
    pub token_store: TokenStoreKind,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            default_page_size: DEFAULT_PAGE_SIZE,
            read_retries: DEFAULT_READ_RETRIES,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            write_roles: vec!["Admin".to_string()],
            token_store: TokenStoreKind::Keyring,
        }
    }
}

impl ClientConfig {
    /// Load from the default location, then apply environment overrides.
    pub fn load() -> Result<Self> {
        let config = Self::load_from(&Self::config_path()?)?;
        Ok(config.with_api_url_override(std::env::var(API_URL_ENV).ok()))
    }

    /// Load from `path`; a missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Replace the base URL when an override is present and non-empty.
    pub fn with_api_url_override(mut self, url: Option<String>) -> Self {
        if let Some(url) = url.map(|u| u.trim().to_string()).filter(|u| !u.is_empty()) {
            self.api_base_url = url;
        }
        self
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.read_retries,
            initial_backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }

    pub fn first_page(&self) -> PageRequest {
        PageRequest::first(self.default_page_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("stockroom-test-{}-{}", std::process::id(), name))
            .join(CONFIG_FILE)
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = ClientConfig::load_from(&temp_config_path("missing")).unwrap();
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.first_page().page_size(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let path = temp_config_path("partial");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, r#"{"api_base_url":"https://inventory.test","token_store":"memory"}"#).unwrap();

        let config = ClientConfig::load_from(&path).unwrap();
        assert_eq!(config.api_base_url, "https://inventory.test");
        assert_eq!(config.token_store, TokenStoreKind::Memory);
        assert_eq!(config.request_timeout_secs, DEFAULT_REQUEST_TIMEOUT_SECS);

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_save_then_load() {
        let path = temp_config_path("saved");
        let config = ClientConfig {
            default_page_size: 50,
            write_roles: vec!["Admin".to_string(), "Manager".to_string()],
            ..ClientConfig::default()
        };
        config.save_to(&path).unwrap();
        assert_eq!(ClientConfig::load_from(&path).unwrap(), config);

        std::fs::remove_dir_all(path.parent().unwrap()).ok();
    }

    #[test]
    fn test_api_url_override() {
        let config = ClientConfig::default().with_api_url_override(Some("https://prod.test/api".to_string()));
        assert_eq!(config.api_base_url, "https://prod.test/api");

        let unchanged = ClientConfig::default().with_api_url_override(Some("  ".to_string()));
        assert_eq!(unchanged.api_base_url, DEFAULT_API_BASE_URL);
    }

    #[test]
    fn test_retry_policy_from_config() {
        let config = ClientConfig {
            read_retries: 0,
            ..ClientConfig::default()
        };
        assert_eq!(config.retry_policy().max_retries, 0);
    }
}
