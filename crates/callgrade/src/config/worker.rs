//! Application-level worker config, stored in the external config table.
//!
//! The enabled flag lives under its own key so it can be toggled without
//! rewriting the whole config blob.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::store::{ConfigStore, StoreResult};

/// Config-table key holding the serialized [`WorkerConfig`].
pub const WORKER_CONFIG_KEY: &str = "analysis_worker_config";
/// Config-table key holding the enabled flag.
pub const WORKER_ENABLED_KEY: &str = "analysis_worker_enabled";

/// Scheduler tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub enabled: bool,
    /// Seconds between cycles.
    #[serde(alias = "interval")]
    pub interval_secs: u64,
    /// Items scored per cycle.
    #[serde(alias = "batchSize")]
    pub batch_size: usize,
    /// Calls must be strictly longer than this to be eligible.
    #[serde(alias = "minDuration")]
    pub min_duration_secs: u64,
    /// Scoring attempts per item.
    #[serde(alias = "maxRetries")]
    pub max_retries: u32,
    /// Upper bound on one scoring attempt.
    pub score_timeout_secs: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_secs: 300,
            batch_size: 5,
            min_duration_secs: 180,
            max_retries: 2,
            score_timeout_secs: 120,
        }
    }
}

impl WorkerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }

    pub fn score_timeout(&self) -> Duration {
        Duration::from_secs(self.score_timeout_secs.max(1))
    }

    /// Apply the fields present in `patch`.
    pub fn merge(&mut self, patch: &WorkerConfigPatch) {
        if let Some(v) = patch.enabled {
            self.enabled = v;
        }
        if let Some(v) = patch.interval_secs {
            self.interval_secs = v;
        }
        if let Some(v) = patch.batch_size {
            self.batch_size = v;
        }
        if let Some(v) = patch.min_duration_secs {
            self.min_duration_secs = v;
        }
        if let Some(v) = patch.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = patch.score_timeout_secs {
            self.score_timeout_secs = v;
        }
    }

    pub fn merged(mut self, patch: &WorkerConfigPatch) -> Self {
        self.merge(patch);
        self
    }
}

/// Partial update for [`WorkerConfig`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub batch_size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_duration_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_retries: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_timeout_secs: Option<u64>,
}

impl WorkerConfigPatch {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }
}

/// Interpret a boolean-like config value: `true`, `"true"` or `"1"`.
pub fn parse_enabled_flag(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::String(s) => {
            let s = s.trim();
            s.eq_ignore_ascii_case("true") || s == "1"
        }
        Value::Number(n) => n.as_u64() == Some(1),
        _ => false,
    }
}

/// Read the enabled flag. Missing values and read errors mean disabled.
pub async fn load_enabled_flag(store: &dyn ConfigStore) -> bool {
    match store.get_value(WORKER_ENABLED_KEY).await {
        Ok(Some(value)) => parse_enabled_flag(&value),
        Ok(None) => {
            debug!("no enabled flag stored, worker disabled");
            false
        }
        Err(e) => {
            warn!(error = %e, "failed to read enabled flag, worker disabled");
            false
        }
    }
}

/// Load the stored worker config, falling back to defaults on absence or error.
///
/// The separate enabled flag (and `dev_mode`) decide `enabled`.
pub async fn load_worker_config(store: &dyn ConfigStore, dev_mode: bool) -> WorkerConfig {
    let mut config = match store.get_value(WORKER_CONFIG_KEY).await {
        Ok(Some(value)) => match serde_json::from_value::<WorkerConfig>(value) {
            Ok(config) => config,
            Err(e) => {
                warn!(error = %e, "stored worker config is malformed, using defaults");
                WorkerConfig::default()
            }
        },
        Ok(None) => WorkerConfig::default(),
        Err(e) => {
            warn!(error = %e, "failed to read worker config, using defaults");
            WorkerConfig::default()
        }
    };

    config.enabled = dev_mode || load_enabled_flag(store).await;
    config
}

/// Write the config blob. The enabled flag is persisted separately.
pub async fn persist_worker_config(store: &dyn ConfigStore, config: &WorkerConfig) -> StoreResult<()> {
    store
        .set_value(WORKER_CONFIG_KEY, serde_json::to_value(config)?)
        .await
}

pub async fn persist_enabled_flag(store: &dyn ConfigStore, enabled: bool) -> StoreResult<()> {
    store.set_value(WORKER_ENABLED_KEY, Value::Bool(enabled)).await
}
