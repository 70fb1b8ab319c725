//! # Client Configuration
//!
//! Where the backend lives, how long cache entries stay fresh, and which
//! models get a partition.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     ATRIUM_API_URL=https://api.atrium.example/v1                       │
//! │     ATRIUM_API_TOKEN=...                                               │
//! │     ATRIUM_CACHE_DURATION_MS=300000                                    │
//! │     ATRIUM_TIMEOUT_SECS=30                                             │
//! │                                                                         │
//! │  2. TOML Config File                                                   │
//! │     ~/.config/platform/client.toml (Linux)                             │
//! │     ~/Library/Application Support/com.atrium.platform/client.toml      │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! │     localhost API, 5 minute freshness, built-in models                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! # client.toml
//! [api]
//! base_url = "https://api.atrium.example/v1"
//! token = "secret"
//! timeout_secs = 30
//! connect_timeout_secs = 10
//!
//! [cache]
//! duration_ms = 300000
//!
//! [store]
//! models = ["booking", "user", "event"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use atrium_core::{ModelRegistry, CACHE_DURATION_MS, DEFAULT_MODELS};

use crate::error::{ClientError, ClientResult};

// =============================================================================
// API Settings
// =============================================================================

/// How to reach the REST backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiSettings {
    /// Base URL every request path is joined onto.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Bearer token sent with every request, if any.
    #[serde(default)]
    pub token: Option<String>,

    /// Whole-request timeout (seconds).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Connection timeout (seconds).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

impl Default for ApiSettings {
    fn default() -> Self {
        ApiSettings {
            base_url: default_base_url(),
            token: None,
            timeout_secs: default_timeout(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

impl ApiSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

// =============================================================================
// Cache Settings
// =============================================================================

/// Cache freshness settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSettings {
    /// How long a successful fetch satisfies repeat reads (milliseconds).
    #[serde(default = "default_cache_duration")]
    pub duration_ms: i64,
}

fn default_cache_duration() -> i64 {
    CACHE_DURATION_MS
}

impl Default for CacheSettings {
    fn default() -> Self {
        CacheSettings {
            duration_ms: default_cache_duration(),
        }
    }
}

// =============================================================================
// Store Settings
// =============================================================================

/// Which models the store keeps partitions for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_models")]
    pub models: Vec<String>,
}

fn default_models() -> Vec<String> {
    DEFAULT_MODELS.iter().map(|model| model.to_string()).collect()
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            models: default_models(),
        }
    }
}

// =============================================================================
// Main Client Configuration
// =============================================================================

/// Complete client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub cache: CacheSettings,

    #[serde(default)]
    pub store: StoreSettings,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from file, environment, and defaults.
    ///
    /// ## Load Order (later overrides earlier)
    /// 1. Default values
    /// 2. Config file (client.toml)
    /// 3. Environment variables
    pub fn load(config_path: Option<PathBuf>) -> ClientResult<Self> {
        let mut config = Self::default();

        if let Some(path) = config_path.or_else(Self::default_config_path) {
            if path.exists() {
                info!(?path, "Loading client config from file");
                let contents = std::fs::read_to_string(&path)?;
                config = toml::from_str(&contents)?;
            } else {
                debug!(?path, "Config file not found, using defaults");
            }
        }

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Loads config or returns default if load fails.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        Self::load(config_path).unwrap_or_else(|e| {
            warn!("Failed to load client config: {}. Using defaults.", e);
            Self::default()
        })
    }

    /// Saves configuration to file.
    pub fn save(&self, config_path: Option<PathBuf>) -> ClientResult<()> {
        let path = config_path
            .or_else(Self::default_config_path)
            .ok_or_else(|| ClientError::ConfigSaveFailed("No config path available".into()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents)?;

        info!(?path, "Client config saved");
        Ok(())
    }

    /// Validates the configuration.
    pub fn validate(&self) -> ClientResult<()> {
        let url = url::Url::parse(&self.api.base_url)?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ClientError::InvalidUrl(format!(
                "API URL must start with http:// or https://, got: {}",
                self.api.base_url
            )));
        }

        if self.api.timeout_secs == 0 {
            return Err(ClientError::InvalidConfig(
                "timeout_secs must be greater than 0".into(),
            ));
        }

        if self.cache.duration_ms < 0 {
            return Err(ClientError::InvalidConfig(
                "cache duration_ms must not be negative".into(),
            ));
        }

        if self.registry().is_empty() {
            return Err(ClientError::InvalidConfig(
                "at least one model must be configured".into(),
            ));
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("ATRIUM_API_URL") {
            debug!(url = %url, "Overriding API URL from environment");
            self.api.base_url = url;
        }

        if let Ok(token) = std::env::var("ATRIUM_API_TOKEN") {
            self.api.token = Some(token).filter(|token| !token.is_empty());
        }

        if let Ok(duration) = std::env::var("ATRIUM_CACHE_DURATION_MS") {
            match duration.parse::<i64>() {
                Ok(ms) => {
                    debug!(duration_ms = ms, "Overriding cache duration from environment");
                    self.cache.duration_ms = ms;
                }
                Err(_) => warn!(value = %duration, "Ignoring non-numeric ATRIUM_CACHE_DURATION_MS"),
            }
        }

        if let Ok(timeout) = std::env::var("ATRIUM_TIMEOUT_SECS") {
            if let Ok(secs) = timeout.parse::<u64>() {
                self.api.timeout_secs = secs;
            }
        }
    }

    fn default_config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("com", "atrium", "platform")
            .map(|dirs| dirs.config_dir().join("client.toml"))
    }

    // =========================================================================
    // Convenience Methods
    // =========================================================================

    /// Model registry built from `[store] models`.
    pub fn registry(&self) -> ModelRegistry {
        ModelRegistry::new(self.store.models.iter().cloned())
    }

    pub fn base_url(&self) -> &str {
        &self.api.base_url
    }

    pub fn cache_duration_ms(&self) -> i64 {
        self.cache.duration_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();
        assert_eq!(config.cache.duration_ms, 300_000);
        assert_eq!(config.api.timeout_secs, 30);
        assert!(config.api.token.is_none());
        assert_eq!(config.registry().len(), DEFAULT_MODELS.len());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = ClientConfig::default();

        config.api.base_url = "ftp://files.example".to_string();
        assert!(config.validate().is_err());

        config.api.base_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(ClientError::InvalidUrl(_))));

        config.api.base_url = "https://api.example/v1".to_string();
        assert!(config.validate().is_ok());

        config.store.models = vec![" ".to_string()];
        assert!(config.validate().is_err());

        config.store.models = vec!["booking".to_string()];
        config.api.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
            [api]
            base_url = "https://api.example"

            [store]
            models = ["booking", "user"]
            "#,
        )
        .unwrap();

        assert_eq!(config.base_url(), "https://api.example");
        assert_eq!(config.api.connect_timeout_secs, 10);
        assert_eq!(config.cache_duration_ms(), CACHE_DURATION_MS);
        assert_eq!(config.registry().names(), &["booking", "user"]);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let path = std::env::temp_dir()
            .join(format!("atrium-client-{}", uuid::Uuid::new_v4()))
            .join("client.toml");

        let mut config = ClientConfig::default();
        config.api.base_url = "https://saved.example".to_string();
        config.cache.duration_ms = 60_000;
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[api]"));
        assert!(contents.contains("[cache]"));

        let loaded: ClientConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.base_url(), "https://saved.example");
        assert_eq!(loaded.cache_duration_ms(), 60_000);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }
}
