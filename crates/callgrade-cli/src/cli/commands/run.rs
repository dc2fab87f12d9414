//! Long-running worker command.

use std::path::Path;
use std::time::Duration;

use console::style;
use tracing::info;

use callgrade::config::Settings;

use super::helpers::{print_field, Backends};

/// How often the worker logs its run statistics.
const STATS_LOG_INTERVAL: Duration = Duration::from_secs(600);

/// Start the scheduler and keep it running until Ctrl-C.
pub async fn cmd_run(settings: &Settings, offline: Option<&Path>) -> anyhow::Result<()> {
    let backends = Backends::connect(settings, offline)?;
    let scheduler = backends.scheduler(settings).await;

    if !scheduler.start().await {
        eprintln!(
            "{} Analysis worker is disabled. Enable it with `callgrade config set --enabled true`.",
            style("!").yellow()
        );
        return Ok(());
    }

    let config = scheduler.config().await;
    eprintln!("{} Analysis worker running", style("✓").green());
    print_field("Source", &backends.source);
    print_field("Interval", format!("{}s", config.interval_secs));
    print_field("Batch size", config.batch_size);
    eprintln!("  {}", style("Press Ctrl-C to stop").dim());

    let mut stats_timer = tokio::time::interval(STATS_LOG_INTERVAL);
    stats_timer.tick().await;

    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                break;
            }
            _ = stats_timer.tick() => {
                let stats = scheduler.get_stats().await;
                info!(
                    total = stats.stats.total_processed,
                    successful = stats.stats.successful,
                    failed = stats.stats.failed,
                    cycles = stats.cycles_completed,
                    "worker statistics"
                );
            }
        }
    }

    eprintln!("\n{} Stopping, waiting for the current cycle...", style("→").dim());
    scheduler.shutdown().await;

    let stats = scheduler.get_stats().await;
    eprintln!("{} Analysis worker stopped", style("✓").green());
    print_field("Cycles", stats.cycles_completed);
    print_field("Processed", stats.stats.total_processed);
    print_field("Successful", style(stats.stats.successful).green());
    print_field("Failed", style(stats.stats.failed).red());

    Ok(())
}
