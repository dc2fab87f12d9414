//! Device-level settings: where the store and scoring function live.
//!
//! Sources, lowest to highest priority:
//! 1. Built-in defaults
//! 2. `callgrade.toml` (explicit path, working directory, or user config dir)
//! 3. Environment variables (after `.env` is loaded by the binary)
//!
//! Env vars: CALLGRADE_STORE_URL, CALLGRADE_STORE_API_KEY, CALLGRADE_SCORING_URL,
//! CALLGRADE_REQUEST_TIMEOUT, CALLGRADE_DEV

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Config file name searched for when no explicit path is given.
pub const CONFIG_FILE_NAME: &str = "callgrade.toml";

/// Path of the scoring function relative to the store URL.
const DEFAULT_SCORING_PATH: &str = "functions/v1/analyze-call";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file '{path}': {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Connection settings for this device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of the database service.
    pub store_url: Option<String>,
    /// API key sent as `apikey` and bearer token.
    pub store_api_key: Option<String>,
    /// Scoring function URL; derived from `store_url` when unset.
    pub scoring_url: Option<String>,
    /// Store request timeout; connect timeout for scoring calls.
    pub request_timeout_secs: u64,
    /// Local development mode: force-enables the worker.
    pub dev_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            store_url: None,
            store_api_key: None,
            scoring_url: None,
            request_timeout_secs: 30,
            dev_mode: false,
        }
    }
}

impl Settings {
    /// Load settings from `path` (or the default search locations) and the environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let settings = match path {
            Some(path) => Self::from_file(path)?,
            None => match find_config_file() {
                Some(found) => Self::from_file(&found)?,
                None => Self::default(),
            },
        };
        Ok(settings.with_env_overrides())
    }

    /// Parse a TOML settings file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "loaded settings file");
        Ok(settings)
    }

    /// Apply overrides from process environment variables.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(val) = lookup("CALLGRADE_STORE_URL") {
            self.store_url = Some(val);
        }
        if let Some(val) = lookup("CALLGRADE_STORE_API_KEY") {
            self.store_api_key = Some(val);
        }
        if let Some(val) = lookup("CALLGRADE_SCORING_URL") {
            self.scoring_url = Some(val);
        }
        if let Some(val) = lookup("CALLGRADE_REQUEST_TIMEOUT") {
            if let Ok(n) = val.trim().parse() {
                self.request_timeout_secs = n;
            }
        }
        if let Some(val) = lookup("CALLGRADE_DEV") {
            let val = val.trim();
            self.dev_mode = val.eq_ignore_ascii_case("true") || val == "1";
        }
        self
    }

    /// Scoring function URL, explicit or derived from the store URL.
    pub fn scoring_endpoint(&self) -> Option<String> {
        if let Some(url) = self.scoring_url.as_deref().filter(|u| !u.is_empty()) {
            return Some(url.to_string());
        }
        self.store_url
            .as_deref()
            .filter(|u| !u.is_empty())
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), DEFAULT_SCORING_PATH))
    }
}

/// Look for `callgrade.toml` in the working directory, then the user config dir.
fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    dirs::config_dir()
        .map(|dir| dir.join("callgrade").join(CONFIG_FILE_NAME))
        .filter(|p| p.is_file())
}
