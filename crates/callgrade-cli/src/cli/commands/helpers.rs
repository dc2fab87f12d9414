//! Shared helpers for command implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use console::style;

use callgrade::config::{load_worker_config, Settings};
use callgrade::scheduler::AnalysisScheduler;
use callgrade::scoring::{CallScorer, HttpCallScorer, OfflineScorer};
use callgrade::store::{CallStore, ConfigStore, InMemoryCallStore, RestCallStore};

/// Store and scorer backends selected from settings.
pub struct Backends {
    pub store: Arc<dyn CallStore>,
    pub config_store: Arc<dyn ConfigStore>,
    pub scorer: Arc<dyn CallScorer>,
    /// Human-readable description of where data comes from.
    pub source: String,
    /// Fixture file and store backing an offline run.
    fixture: Option<(PathBuf, Arc<InMemoryCallStore>)>,
}

impl Backends {
    /// Remote store and scoring function, or a local fixture when `offline` is set.
    pub fn connect(settings: &Settings, offline: Option<&Path>) -> anyhow::Result<Self> {
        if let Some(path) = offline {
            let store = Arc::new(InMemoryCallStore::load(path)?);
            return Ok(Self {
                store: store.clone(),
                config_store: store.clone(),
                scorer: Arc::new(OfflineScorer),
                source: format!("offline fixture {}", path.display()),
                fixture: Some((path.to_path_buf(), store)),
            });
        }

        let store = Arc::new(RestCallStore::from_settings(settings).map_err(|e| {
            anyhow::anyhow!("{} (set CALLGRADE_STORE_URL or use --offline)", e)
        })?);
        let scorer = HttpCallScorer::from_settings(settings)?;

        Ok(Self {
            store: store.clone(),
            config_store: store,
            scorer: Arc::new(scorer),
            source: settings.store_url.clone().unwrap_or_default(),
            fixture: None,
        })
    }

    /// Write offline changes back to the fixture file. No-op for remote stores.
    pub async fn save_fixture(&self) -> anyhow::Result<()> {
        if let Some((path, store)) = &self.fixture {
            store.save(path).await?;
        }
        Ok(())
    }

    /// Build a scheduler with the stored worker config.
    pub async fn scheduler(&self, settings: &Settings) -> AnalysisScheduler {
        let config = load_worker_config(self.config_store.as_ref(), settings.dev_mode).await;
        AnalysisScheduler::builder(
            self.store.clone(),
            self.config_store.clone(),
            self.scorer.clone(),
        )
        .config(config)
        .dev_mode(settings.dev_mode)
        .build()
    }
}

/// Print a `label: value` line with an aligned, dimmed label.
pub fn print_field(label: &str, value: impl std::fmt::Display) {
    println!("  {} {}", style(format!("{:<18}", label)).dim(), value);
}

pub fn yes_no(value: bool) -> console::StyledObject<&'static str> {
    if value {
        style("yes").green()
    } else {
        style("no").red()
    }
}
