//! Terminal styling utilities

use std::path::Path;
use std::time::Duration;

use console::{style, Emoji};

use crate::pipeline::EstimatorConfig;

// Emoji icons with fallbacks for terminals that don't support them
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "[*] ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", ">> ");
pub static CHART: Emoji<'_, '_> = Emoji("📊 ", "");
pub static FOLDER: Emoji<'_, '_> = Emoji("📂 ", "");
pub static GLOBE: Emoji<'_, '_> = Emoji("🌎 ", "");
pub static SAVE: Emoji<'_, '_> = Emoji("💾 ", "");
pub static GEAR: Emoji<'_, '_> = Emoji("⚙️  ", "");

/// Print the application banner
pub fn print_banner(version: &str) {
    println!();
    println!("    {}", style("poststrat").cyan().bold());
    println!(
        "    {}",
        style("Survey answers, re-weighted to the census").dim()
    );
    println!("    {}", style(format!("v{}", version)).dim());
    println!("    {}", style("━".repeat(50)).dim());
    println!();
}

/// Print the configuration card
pub fn print_config(survey: &Path, census: &Path, output: Option<&Path>, config: &EstimatorConfig) {
    let box_width = 56;
    let line = "─".repeat(box_width - 2);

    println!("    ┌{}┐", line);
    println!(
        "    │ {}{}│",
        style(format!("{}Configuration", GEAR)).cyan().bold(),
        " ".repeat(box_width - 20)
    );
    println!("    ├{}┤", line);
    println!("    │  {} Survey: {:<39}│", FOLDER, truncate_path(survey, 38));
    println!("    │  {} Census: {:<39}│", GLOBE, truncate_path(census, 38));
    let output = output
        .map(|p| truncate_path(p, 38))
        .unwrap_or_else(|| "(no export)".to_string());
    println!("    │  {} Output: {:<39}│", SAVE, output);
    println!("    ├{}┤", line);
    println!(
        "    │  {} Regularization (C):    {:<24}│",
        CHART,
        style(format!("{}", config.model.regularization)).yellow()
    );
    println!(
        "    │  {} Raw basis:             {:<24}│",
        CHART,
        style(config.raw_basis.to_string()).yellow()
    );
    println!("    └{}┘", line);
    println!();
}

/// Print a step header with styling
pub fn print_step_header(step_num: u8, title: &str) {
    println!();
    println!(
        "    {} {} {}",
        style(format!("STEP {}", step_num)).cyan().bold(),
        style("│").dim(),
        style(title).white().bold()
    );
    println!("    {}", style("─".repeat(50)).dim());
}

pub fn print_success(message: &str) {
    println!("    {} {}", style("✓").green().bold(), style(message).green());
}

pub fn print_info(message: &str) {
    println!("    {} {}", INFO, message);
}

pub fn print_warning(message: &str) {
    println!("    {} {}", style("!").yellow().bold(), style(message).yellow());
}

/// Print elapsed time of a step
pub fn print_step_time(elapsed: Duration) {
    println!("    {}", style(format!("⏱  {:.2?}", elapsed)).dim());
}

/// Print a styled count message
pub fn print_count(description: &str, count: usize, detail: Option<&str>) {
    if let Some(detail) = detail {
        println!(
            "      Found {} {} {}",
            style(count).yellow().bold(),
            description,
            style(detail).dim()
        );
    } else {
        println!(
            "      Found {} {}",
            style(count).yellow().bold(),
            description
        );
    }
}

/// Print the final completion message
pub fn print_completion() {
    println!();
    println!(
        "    {} {}",
        ROCKET,
        style("Post-stratification complete!").green().bold()
    );
    println!();
}

fn truncate_path(path: &Path, max_len: usize) -> String {
    truncate_string(&path.display().to_string(), max_len)
}

fn truncate_string(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s.to_string()
    } else {
        let tail: String = chars[chars.len() - (max_len - 3)..].iter().collect();
        format!("...{}", tail)
    }
}
