//! Client configuration.
//!
//! Resolution order, later wins:
//! 1. Built-in defaults
//! 2. `config.json` in the user's config directory (`tasknest/config.json`)
//! 3. Environment variables:
//!    - `TASKNEST_URL` - API base URL (default: `http://127.0.0.1:5000/api`)
//!    - `TASKNEST_TIMEOUT_MS` - bound on each gateway call in milliseconds
//!    - `TASKNEST_USERNAME` - default login name
//! 4. Command-line flags (applied by the binary)

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use dirs::config_dir;
use serde::{Deserialize, Serialize};

const APP_NAME: &str = "tasknest";
const CONFIG_FILE: &str = "config.json";

/// Default URL for a local backend.
pub const DEFAULT_URL: &str = "http://127.0.0.1:5000/api";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the REST API, without a trailing slash.
    pub base_url: String,
    /// Bound on a single gateway call.
    pub request_timeout_ms: u64,
    /// Login name used when none is given on the command line.
    pub username: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_URL.to_string(),
            request_timeout_ms: 10_000,
            username: None,
        }
    }
}

impl ClientConfig {
    /// Load from the user's config directory, then apply the environment.
    /// Falls back to defaults if the file is missing or fails to parse.
    pub fn load() -> Self {
        let config = match get_config_path().and_then(|path| Self::load_from(&path)) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        };
        config.with_env()
    }

    /// Load from an explicit path. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).context("Failed to read config file")?;
        let config = serde_json::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// Save the configuration to the user's config directory.
    pub fn save(&self) -> Result<()> {
        self.save_to(&get_config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, content).context("Failed to write config file")?;
        Ok(())
    }

    /// Apply `TASKNEST_*` environment overrides.
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(url) = var("TASKNEST_URL") {
            self.base_url = url;
        }
        if let Some(ms) = var("TASKNEST_TIMEOUT_MS") {
            match ms.parse() {
                Ok(ms) => self.request_timeout_ms = ms,
                Err(_) => tracing::warn!("Ignoring invalid TASKNEST_TIMEOUT_MS '{}'", ms),
            }
        }
        if let Some(username) = var("TASKNEST_USERNAME") {
            self.username = Some(username);
        }
        self
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn get_config_path() -> Result<PathBuf> {
    let mut path =
        config_dir().ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
    path.push(APP_NAME);
    path.push(CONFIG_FILE);
    Ok(path)
}
