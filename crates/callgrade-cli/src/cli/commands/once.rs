//! Single manual cycle.

use std::path::Path;

use console::style;
use tokio::sync::mpsc;

use callgrade::config::Settings;

use super::helpers::{print_field, Backends};
use crate::cli::progress::BatchProgress;

pub async fn cmd_once(
    settings: &Settings,
    offline: Option<&Path>,
    force: bool,
    limit: Option<usize>,
) -> anyhow::Result<()> {
    let backends = Backends::connect(settings, offline)?;
    let scheduler = backends.scheduler(settings).await;

    let (tx, rx) = mpsc::channel(64);
    let display = BatchProgress::new().spawn(rx);

    let report = scheduler.run_once(force, limit, Some(tx)).await;
    display.await?;

    let Some(report) = report else {
        anyhow::bail!("another analysis cycle is already running");
    };

    if let Some(error) = &report.error {
        anyhow::bail!("analysis cycle failed: {}", error);
    }

    println!("\n{}", style("Analysis Cycle").bold());
    println!("{}", "-".repeat(40));
    print_field("Source", &backends.source);
    print_field("Candidates", report.candidates);
    print_field("Low quality", report.rejected_by_quality);

    match &report.outcome {
        Some(outcome) if outcome.processed() > 0 => {
            print_field("Scored", outcome.processed());
            print_field("Successful", style(outcome.success_count).green());
            print_field("Failed", style(outcome.failure_count).red());
        }
        _ => println!("\n{} No calls to analyze", style("○").dim()),
    }

    Ok(())
}
