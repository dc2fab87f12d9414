//! Configuration.
//!
//! Split into two tiers:
//! - `Settings`: device-level, from `callgrade.toml` and env vars (endpoints, keys)
//! - `WorkerConfig`: application-level, stored in the external config table

mod settings;
mod worker;

pub use settings::{ConfigError, Settings, CONFIG_FILE_NAME};
pub use worker::{
    load_enabled_flag, load_worker_config, parse_enabled_flag, persist_enabled_flag,
    persist_worker_config, WorkerConfig, WorkerConfigPatch, WORKER_CONFIG_KEY, WORKER_ENABLED_KEY,
};
