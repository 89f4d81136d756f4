//! Lookup Configuration Module
//!
//! Engine-wide settings: where the search endpoints live, cache size,
//! timeouts and per-binding defaults. Config is stored in
//! `~/.config/lookup/config.toml`.
//!
//! ## Priority Order (highest to lowest)
//!
//! 1. Environment variables (`LOOKUP_BASE_URL`, `LOOKUP_SEARCH_TIMEOUT_MS`)
//! 2. Config file (`~/.config/lookup/config.toml`)
//! 3. Defaults (see [`crate::util::constants`])

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LookupError, Result};
use crate::util::constants::{
    CONNECT_TIMEOUT, DEFAULT_CACHE_CAPACITY, DEFAULT_DEBOUNCE, DEFAULT_LIMIT, DEFAULT_MIN_CHARS,
    SEARCH_TIMEOUT,
};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URL relative search paths are resolved against
    pub base_url: String,

    /// Maximum number of cached queries (LRU)
    pub cache_capacity: usize,

    /// Hard timeout per remote search
    pub search_timeout_ms: u64,

    /// Timeout for establishing HTTP connections
    pub connect_timeout_ms: u64,

    /// Defaults applied to bindings that don't override them
    pub defaults: BindingDefaults,

    /// Extra synonyms: alias → canonical entity
    pub aliases: BTreeMap<String, String>,

    /// Search path overrides: canonical entity → path or absolute URL
    pub entity_paths: BTreeMap<String, String>,
}

/// Per-binding defaults
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BindingDefaults {
    pub min_chars: usize,
    pub debounce_ms: u64,
    pub limit: usize,
}

impl Default for BindingDefaults {
    fn default() -> Self {
        Self {
            min_chars: DEFAULT_MIN_CHARS,
            debounce_ms: DEFAULT_DEBOUNCE.as_millis() as u64,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            search_timeout_ms: SEARCH_TIMEOUT.as_millis() as u64,
            connect_timeout_ms: CONNECT_TIMEOUT.as_millis() as u64,
            defaults: BindingDefaults::default(),
            aliases: BTreeMap::new(),
            entity_paths: BTreeMap::new(),
        }
    }
}

impl EngineConfig {
    /// Get the config directory path
    ///
    /// Returns `~/.config/lookup/` on Unix, `%APPDATA%/lookup/` on Windows
    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("lookup")
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Load configuration from the default location
    ///
    /// Returns default config if file doesn't exist.
    /// Returns error if file exists but is malformed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| LookupError::ConfigError {
            reason: format!("Failed to read config file: {}", e),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| LookupError::ConfigError {
            reason: format!("Failed to parse config file: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a path, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.exists() {
                fs::create_dir_all(dir).map_err(|e| LookupError::ConfigError {
                    reason: format!("Failed to create config directory: {}", e),
                })?;
            }
        }

        let content = toml::to_string_pretty(self).map_err(|e| LookupError::ConfigError {
            reason: format!("Failed to serialize config: {}", e),
        })?;

        fs::write(path, content).map_err(|e| LookupError::ConfigError {
            reason: format!("Failed to write config file: {}", e),
        })
    }

    /// Merge with environment variables
    ///
    /// Environment variables take precedence over config file values.
    pub fn with_env(mut self) -> Self {
        if let Ok(url) = std::env::var("LOOKUP_BASE_URL") {
            if !url.is_empty() {
                self.base_url = url;
            }
        }

        if let Ok(ms) = std::env::var("LOOKUP_SEARCH_TIMEOUT_MS") {
            match ms.parse::<u64>() {
                Ok(ms) if ms > 0 => self.search_timeout_ms = ms,
                _ => tracing::warn!(value = %ms, "Ignoring invalid LOOKUP_SEARCH_TIMEOUT_MS"),
            }
        }

        self
    }

    /// Check values that would make the engine unusable
    pub fn validate(&self) -> Result<()> {
        let parsed = url::Url::parse(&self.base_url).map_err(|e| LookupError::InvalidBaseUrl {
            url: self.base_url.clone(),
            reason: e.to_string(),
        })?;
        if parsed.cannot_be_a_base() {
            return Err(LookupError::InvalidBaseUrl {
                url: self.base_url.clone(),
                reason: "URL cannot be a base".to_string(),
            });
        }
        if self.cache_capacity == 0 {
            return Err(LookupError::ConfigError {
                reason: "cache_capacity must be at least 1".to_string(),
            });
        }
        if self.search_timeout_ms == 0 {
            return Err(LookupError::ConfigError {
                reason: "search_timeout_ms must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_millis(self.search_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn default_debounce(&self) -> Duration {
        Duration::from_millis(self.defaults.debounce_ms)
    }

    /// Builder-style base URL override
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Builder-style cache capacity override
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Builder-style search timeout override
    pub fn with_search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout_ms = timeout.as_millis() as u64;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_path_contains_lookup() {
        let path = EngineConfig::config_path();
        assert!(path.to_string_lossy().contains("lookup"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let config = EngineConfig::load_from(&dir.path().join("nope.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.defaults.debounce_ms, 160);
        assert_eq!(config.defaults.limit, 50);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
base_url = "https://erp.example.com"
cache_capacity = 10

[defaults]
min_chars = 2

[aliases]
article = "items"
"#,
        )
        .unwrap();

        let config = EngineConfig::load_from(&path).unwrap();
        assert_eq!(config.base_url, "https://erp.example.com");
        assert_eq!(config.cache_capacity, 10);
        assert_eq!(config.defaults.min_chars, 2);
        assert_eq!(config.defaults.limit, DEFAULT_LIMIT);
        assert_eq!(config.aliases.get("article").map(String::as_str), Some("items"));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "base_url = [").unwrap();

        let err = EngineConfig::load_from(&path).unwrap_err();
        assert_eq!(err.code(), "LOOKUP-001");
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let config = EngineConfig::default().with_cache_capacity(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_relative_base_url_rejected() {
        let config = EngineConfig::default().with_base_url("not a url");
        let err = config.validate().unwrap_err();
        assert_eq!(err.code(), "LOOKUP-002");
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = EngineConfig::default().with_base_url("https://pos.example.com");
        config
            .entity_paths
            .insert("items".into(), "/catalog/search".into());

        config.save_to(&path).unwrap();
        let loaded = EngineConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_durations() {
        let config = EngineConfig::default().with_search_timeout(Duration::from_millis(250));
        assert_eq!(config.search_timeout(), Duration::from_millis(250));
        assert_eq!(config.default_debounce(), Duration::from_millis(160));
    }
}
