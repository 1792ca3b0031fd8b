//! CLI output formatting and display helpers.

use std::path::{Path, PathBuf};

use anyhow::Result;
use bulkdl_core::{FinalizeReport, RunSummary};
use serde::Serialize;

/// Message when the input file yielded no downloadable links.
pub const NO_LINKS_GUIDANCE: &str = "No links found, check the input file.";

/// Hint printed after [`NO_LINKS_GUIDANCE`].
pub const DIRECT_LINK_HINT: &str =
    "If the link works in your web browser, check that it points directly at a file.";

/// Closing line of a run that finished without interruption.
pub const FINISHED_MESSAGE: &str = "Finished downloading. Enjoy :)";

/// Warning when `.part` files remain after the run.
pub const PARTIAL_WARNING: &str =
    "There are still partial downloads in your folders, please re-run the program.";

/// Warning when the run was cancelled.
pub const INTERRUPTED_WARNING: &str = "Interrupted. Run again to resume.";

/// Returns terminal width from COLUMNS, or 80 if unset/invalid.
pub fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|width| *width >= 20)
        .unwrap_or(80)
}

/// Truncates text to at most `width` chars, appending ellipsis if truncated.
pub fn truncate_to_width(text: &str, width: usize) -> String {
    let text_len = text.chars().count();
    if text_len <= width {
        return text.to_string();
    }
    if width == 0 {
        return String::new();
    }
    if width == 1 {
        return "…".to_string();
    }

    let mut output: String = text.chars().take(width - 1).collect();
    output.push('…');
    output
}

/// Message printed after creating a missing input file.
pub fn input_file_created_message(input_file: &Path) -> String {
    format!("{} created. Populate it and retry.", input_file.display())
}

/// Prints guidance when no links were found.
pub fn print_no_links_guidance(input_file: &Path) {
    println!("{NO_LINKS_GUIDANCE} ({})", input_file.display());
    println!("{DIRECT_LINK_HINT}");
}

/// Returns the human-readable summary lines for a finished run.
pub fn summary_lines(summary: &RunSummary, report: &FinalizeReport, width: usize) -> Vec<String> {
    let mut lines = Vec::new();

    let mut downloaded = format!("Downloaded: {}", summary.succeeded());
    if summary.already_present() > 0 {
        downloaded.push_str(&format!(" ({} already on disk)", summary.already_present()));
    }
    lines.push(downloaded);

    if summary.skipped_duplicate() > 0 {
        lines.push(format!(
            "Skipped (already downloaded): {}",
            summary.skipped_duplicate()
        ));
    }
    if summary.excluded_by_filter() > 0 {
        lines.push(format!("Excluded by filter: {}", summary.excluded_by_filter()));
    }
    if summary.failed() > 0 {
        lines.push(format!("Failed: {}", summary.failed()));
        for failure in summary.failures() {
            let reason = failure
                .last_reason
                .map_or_else(|| "unknown".to_string(), |reason| reason.to_string());
            let line = format!(
                "  - {} ({reason} after {} attempts)",
                failure.source_url, failure.attempts
            );
            lines.push(truncate_to_width(&line, width));
        }
    }
    if summary.cancelled() > 0 {
        lines.push(format!("Cancelled: {}", summary.cancelled()));
    }
    if report.removed_directories > 0 {
        lines.push(format!(
            "Removed {} empty folders",
            report.removed_directories
        ));
    }

    if summary.is_interrupted() {
        lines.push(INTERRUPTED_WARNING.to_string());
    } else {
        lines.push(FINISHED_MESSAGE.to_string());
    }
    if summary.partial_files_remain() {
        lines.push(PARTIAL_WARNING.to_string());
    }
    lines
}

/// Lines for a run that stopped on a fatal error after cleanup.
pub fn aborted_run_lines(report: &FinalizeReport) -> Vec<String> {
    let mut lines = Vec::new();
    if !report.partial_files.is_empty() {
        lines.push(PARTIAL_WARNING.to_string());
    }
    lines
}

#[derive(Serialize)]
struct JsonReport<'a> {
    #[serde(flatten)]
    summary: &'a RunSummary,
    removed_directories: usize,
    partial_files: &'a [PathBuf],
}

/// Renders the run summary as pretty JSON.
pub fn summary_json(summary: &RunSummary, report: &FinalizeReport) -> Result<String> {
    let json = JsonReport {
        summary,
        removed_directories: report.removed_directories,
        partial_files: &report.partial_files,
    };
    Ok(serde_json::to_string_pretty(&json)?)
}

/// Prints the run summary to stdout, as text or JSON.
pub fn print_summary(summary: &RunSummary, report: &FinalizeReport, json: bool) -> Result<()> {
    if json {
        println!("{}", summary_json(summary, report)?);
        return Ok(());
    }
    for line in summary_lines(summary, report, terminal_width()) {
        println!("{line}");
    }
    Ok(())
}
