//! Terminal display utilities for the dropsync CLI

use console::style;
use dropsync_sync::{CyclePlan, CycleReport, SyncOperation};
use dropsync_types::SyncStats;
use std::time::Duration;

/// What the saved state says about the sync directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSummary {
    /// State file path
    pub state_file: String,
    /// When the state was saved, if there is one
    pub saved_at: Option<String>,
    /// Tracked files
    pub files: usize,
    /// Tracked folders
    pub folders: usize,
    /// Sum of tracked remote file sizes
    pub tracked_bytes: u64,
}

/// Print the banner shown before a cycle
pub fn display_banner(sync_dir: &str) {
    println!(
        "{} Synchronizing {} with the remote store",
        style("⟲").blue().bold(),
        style(sync_dir).cyan()
    );
}

/// Print cycle statistics
pub fn display_cycle_report(report: &CycleReport) {
    if report.bootstrap {
        display_info("No saved state found, downloaded everything from the remote store");
    }

    for warning in &report.warnings {
        display_warning(warning);
    }

    if report.is_noop() {
        display_success("Already in sync");
        return;
    }

    display_stats(&report.stats);
}

fn display_stats(stats: &SyncStats) {
    println!();
    println!("{}", style("Sync Statistics:").bold().underlined());
    println!(
        "  Downloaded: {} files ({})",
        style(stats.files_downloaded).green(),
        style(format_bytes(stats.bytes_downloaded)).green()
    );
    println!(
        "  Uploaded: {} files ({})",
        style(stats.files_uploaded).green(),
        style(format_bytes(stats.bytes_uploaded)).green()
    );
    println!(
        "  Folders created: {} local, {} remote",
        style(stats.local_folders_created).green(),
        style(stats.remote_folders_created).green()
    );
    println!(
        "  Removed locally: {} files, {} folders",
        style(stats.local_files_removed).yellow(),
        style(stats.local_folders_removed).yellow()
    );
    println!(
        "  Deleted remotely: {} files, {} folders",
        style(stats.remote_files_deleted).yellow(),
        style(stats.remote_folders_deleted).yellow()
    );
    if stats.already_absent > 0 {
        println!("  Already gone: {}", style(stats.already_absent).dim());
    }
    println!(
        "  Conflicts: {}",
        if stats.conflicts > 0 {
            style(stats.conflicts).red()
        } else {
            style(stats.conflicts).green()
        }
    );
    println!(
        "  Duration: {}",
        style(format_duration(stats.duration)).blue()
    );
}

/// Print a dry-run plan
pub fn display_plan(plan: &CyclePlan) {
    if plan.is_empty() {
        display_success("Already in sync, nothing to do");
        return;
    }

    if plan.bootstrap {
        display_info("No saved state found, everything would be downloaded");
    }
    display_phase("From remote", &plan.remote);
    display_phase("From local", &plan.local);
    println!();
    println!("{} operations planned", style(plan.len()).bold());
}

fn display_phase(title: &str, operations: &[SyncOperation]) {
    if operations.is_empty() {
        return;
    }
    println!();
    println!("{}", style(title).bold().underlined());
    for op in operations {
        let marker = if op.is_deletion() {
            style("-").red()
        } else if op.is_transfer() {
            style("→").green()
        } else {
            style("+").cyan()
        };
        println!("  {marker} {op}");
    }
}

/// Print a state summary
pub fn display_status(status: &StatusSummary) {
    println!("{}", style("Sync Status:").bold().underlined());
    println!("  State file: {}", style(&status.state_file).cyan());
    match &status.saved_at {
        Some(saved_at) => {
            println!("  Last sync: {}", style(saved_at).green());
            println!("  Tracked files: {}", style(status.files).green());
            println!("  Tracked folders: {}", style(status.folders).green());
            println!(
                "  Tracked size: {}",
                style(format_bytes(status.tracked_bytes)).green()
            );
        }
        None => println!(
            "  {}",
            style("Never synced; the next run downloads everything").yellow()
        ),
    }
}

/// Format bytes in human-readable format
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    format!("{:.2} {}", size, UNITS[unit_index])
}

/// Format duration in human-readable format
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{:.2}s", duration.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

/// Display a warning message with proper formatting
pub fn display_warning(message: &str) {
    println!("{} {}", style("⚠").yellow().bold(), style(message).yellow());
}

/// Display an error message with proper formatting
pub fn display_error(message: &str) {
    eprintln!("{} {}", style("✗").red().bold(), style(message).red());
}

/// Display a success message with proper formatting
pub fn display_success(message: &str) {
    println!("{} {}", style("✓").green().bold(), style(message).green());
}

/// Display an info message with proper formatting
pub fn display_info(message: &str) {
    println!("{} {}", style("ℹ").blue().bold(), style(message).blue());
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, "0.00 B")]
    #[case(1536, "1.50 KB")]
    #[case(5 * 1024 * 1024, "5.00 MB")]
    fn test_format_bytes(#[case] bytes: u64, #[case] expected: &str) {
        assert_eq!(format_bytes(bytes), expected);
    }

    #[rstest]
    #[case(Duration::from_millis(1500), "1.50s")]
    #[case(Duration::from_secs(125), "2m 5s")]
    #[case(Duration::from_secs(3725), "1h 2m 5s")]
    fn test_format_duration(#[case] duration: Duration, #[case] expected: &str) {
        assert_eq!(format_duration(duration), expected);
    }
}
