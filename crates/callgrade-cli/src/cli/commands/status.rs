//! Worker status overview.

use std::path::Path;

use console::style;

use callgrade::config::{load_worker_config, Settings};
use callgrade::eligibility::{EligibilityCriteria, EligibilityResolver, MAX_PAGES, PAGE_SIZE};

use super::helpers::{print_field, yes_no, Backends};

/// Print stored configuration and the current eligible backlog.
pub async fn cmd_status(settings: &Settings, offline: Option<&Path>) -> anyhow::Result<()> {
    let backends = Backends::connect(settings, offline)?;
    let config = load_worker_config(backends.config_store.as_ref(), settings.dev_mode).await;

    let resolver = EligibilityResolver::new(
        backends.store.clone(),
        EligibilityCriteria::default().with_min_duration(config.min_duration_secs),
    );
    let backlog = resolver.list_eligible(false, PAGE_SIZE * MAX_PAGES).await?;

    println!("\n{}", style("Analysis Worker").bold());
    println!("{}", "-".repeat(40));
    print_field("Source", &backends.source);
    print_field("Enabled", yes_no(config.enabled));
    print_field("Dev mode", yes_no(settings.dev_mode));
    print_field("Interval", format!("{}s", config.interval_secs));
    print_field("Batch size", config.batch_size);
    print_field("Eligible calls", style(backlog.len()).cyan());

    if !backlog.is_empty() && config.batch_size > 0 {
        let cycles = backlog.len().div_ceil(config.batch_size);
        print_field(
            "Backlog",
            format!("~{} cycles ({}s)", cycles, cycles as u64 * config.interval_secs),
        );
    }

    println!(
        "\n  {}",
        style("Run statistics are kept by the running worker (`callgrade run -v`).").dim()
    );
    Ok(())
}
