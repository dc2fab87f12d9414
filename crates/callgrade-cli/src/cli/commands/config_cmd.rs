//! Worker configuration commands.

use std::path::Path;

use console::style;

use callgrade::config::{
    load_worker_config, persist_enabled_flag, persist_worker_config, Settings, WorkerConfig,
    WorkerConfigPatch,
};

use super::helpers::{print_field, yes_no, Backends};

fn print_config(config: &WorkerConfig) {
    print_field("Enabled", yes_no(config.enabled));
    print_field("Interval", format!("{}s", config.interval_secs));
    print_field("Batch size", config.batch_size);
    print_field("Min duration", format!("{}s", config.min_duration_secs));
    print_field("Max retries", config.max_retries);
    print_field("Score timeout", format!("{}s", config.score_timeout_secs));
}

/// Show the stored worker configuration.
pub async fn cmd_config_show(settings: &Settings, offline: Option<&Path>) -> anyhow::Result<()> {
    let backends = Backends::connect(settings, offline)?;
    let config = load_worker_config(backends.config_store.as_ref(), settings.dev_mode).await;

    println!("\n{}", style("Worker Configuration").bold());
    println!("{}", "-".repeat(40));
    print_config(&config);
    if settings.dev_mode {
        println!(
            "\n  {}",
            style("dev mode: worker is force-enabled on this device").yellow()
        );
    }
    Ok(())
}

/// Merge fields into the stored worker configuration.
pub async fn cmd_config_set(
    settings: &Settings,
    offline: Option<&Path>,
    patch: &WorkerConfigPatch,
) -> anyhow::Result<()> {
    if patch.is_empty() {
        anyhow::bail!("Nothing to update. Pass at least one field, e.g. --batch-size 10");
    }
    if patch.batch_size == Some(0) {
        anyhow::bail!("--batch-size must be at least 1");
    }
    if patch.interval_secs == Some(0) {
        anyhow::bail!("--interval must be at least 1 second");
    }

    let backends = Backends::connect(settings, offline)?;
    let store = backends.config_store.as_ref();

    let config = load_worker_config(store, false).await.merged(patch);
    persist_worker_config(store, &config).await?;
    if let Some(enabled) = patch.enabled {
        persist_enabled_flag(store, enabled).await?;
    }
    backends.save_fixture().await?;

    eprintln!("{} Worker configuration updated", style("✓").green());
    print_config(&config);
    Ok(())
}
