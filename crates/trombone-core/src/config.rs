//! Application and client configuration.
//!
//! `ClientConfig` is what the HTTP client factory consumes. `Config` is the
//! optional on-disk configuration stored at `~/.config/trombone/config.json`;
//! the `TROMBONE_API_BASE_URL` environment variable overrides its base URL.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::context::FallbackPolicy;

/// Application name used for config directory paths
const APP_NAME: &str = "trombone";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable supplying the API base address
pub const BASE_URL_ENV: &str = "TROMBONE_API_BASE_URL";

/// Settings for a single `ApiClient`. Immutable once a client is built from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Absolute URL, or empty for same-origin
    pub base_url: String,
    pub headers: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            base_url: String::new(),
            headers,
            timeout: None,
        }
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

fn read_base_url_env() -> Option<String> {
    std::env::var(BASE_URL_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    pub api_base_url: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    pub timeout_secs: Option<u64>,
    /// Fail lookups made outside a provider instead of using the default client
    #[serde(default)]
    pub strict_provider_lookup: bool,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Client settings with the environment applied on top of the file.
    pub fn client_config(&self) -> ClientConfig {
        self.resolve(read_base_url_env())
    }

    fn resolve(&self, env_base_url: Option<String>) -> ClientConfig {
        let base_url = env_base_url
            .or_else(|| self.api_base_url.clone())
            .unwrap_or_default();

        let mut config = ClientConfig::new(base_url);
        for (name, value) in &self.headers {
            config.headers.insert(name.clone(), value.clone());
        }
        config.timeout = self.timeout_secs.map(Duration::from_secs);
        config
    }

    pub fn fallback_policy(&self) -> FallbackPolicy {
        if self.strict_provider_lookup {
            FallbackPolicy::Strict
        } else {
            FallbackPolicy::DefaultClient
        }
    }
}
