//! Transcript quality check command.

use std::path::Path;

use console::style;

use callgrade::quality::{self, NoiseLevel};

use super::helpers::{print_field, yes_no};

/// Evaluate a transcript file and print the quality report.
pub fn cmd_check(file: &Path, json: bool) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(file)
        .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", file.display(), e))?;
    let report = quality::evaluate(&text);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("\n{}", style("Transcript Quality").bold());
    println!("{}", "-".repeat(40));

    let score = match report.score {
        s if s >= 80 => style(s).green(),
        s if s >= quality::MIN_VALID_SCORE => style(s).yellow(),
        s => style(s).red(),
    };
    print_field("Score", format!("{}/100", score));
    print_field("Analyzable", yes_no(report.is_valid));
    print_field("Dialog", yes_no(report.has_dialog));
    let noise = match report.noise {
        NoiseLevel::Low => style("low").green(),
        NoiseLevel::Medium => style("medium").yellow(),
        NoiseLevel::High => style("high").red(),
    };
    print_field("Noise", noise);
    print_field("Characters", report.metrics.char_count);
    print_field("Segments", report.metrics.segment_count);

    if !report.issues.is_empty() {
        println!("\n{}", style("Issues:").cyan());
        for issue in &report.issues {
            println!("  {} {}", style("✗").red(), issue);
        }
    }
    if !report.recommendations.is_empty() {
        println!("\n{}", style("Recommendations:").cyan());
        for rec in &report.recommendations {
            println!("  {} {}", style("→").dim(), rec);
        }
    }

    Ok(())
}
