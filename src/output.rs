//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Crop
//!
//! ```text
//! ==> Cropping photos → photos-cropped (bottom margin 175px)
//! [  1/12]   8% 2023/a.jpg: cropped
//! [  2/12]  16% 2023/b.png: skipped (too small)
//! [  3/12]  25% broken.jpg: failed
//! ...
//! Cropped 9 of 12 images
//! Skipped 3 (2 too small, 1 failed)
//! Errors
//! 001 broken.jpg
//!     Decode failed: unexpected end of file
//! ```
//!
//! An aborted batch replaces the first summary line with
//! `Aborted after 5 of 12 images`.
//!
//! ## Check update
//!
//! ```text
//! Update available: 1.4.0 (running 1.3.2)
//!     Download: https://example.com/download
//!     Notes: Faster PNG output
//! ```
//!
//! # Architecture
//!
//! Every `format_*` function returns lines and does no I/O, so output is
//! unit testable. `print_*` wrappers and [`CliReporter`] write to stdout.

use crate::imaging::CropSpec;
use crate::process::{BatchSummary, CropResult};
use crate::progress::Reporter;
use crate::version::UpdateStatus;
use std::path::{Path, PathBuf};

/// Longest failure reason shown in the summary before truncation.
const MAX_REASON_CHARS: usize = 120;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

/// Whole-number percentage. An empty batch counts as done.
fn percent(completed: usize, total: usize) -> usize {
    if total == 0 {
        100
    } else {
        completed.min(total) * 100 / total
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "image" } else { "images" }
}

// ============================================================================
// Crop
// ============================================================================

pub fn format_batch_header(input: &Path, output: &Path, spec: &CropSpec) -> String {
    format!(
        "==> Cropping {} \u{2192} {} ({})",
        input.display(),
        output.display(),
        spec
    )
}

/// Counter and percentage prefix, padded to the width of `total`.
///
/// ```text
/// [  3/120]   2%
/// ```
pub fn format_progress(completed: usize, total: usize) -> String {
    let width = total.to_string().len();
    format!(
        "[{:>width$}/{}] {:>3}%",
        completed,
        total,
        percent(completed, total),
    )
}

pub fn format_result(result: &CropResult) -> &'static str {
    match result {
        CropResult::Cropped => "cropped",
        CropResult::SkippedTooSmall => "skipped (too small)",
        CropResult::Failed(_) => "failed",
    }
}

/// One line per finished file.
pub fn format_file_line(
    completed: usize,
    total: usize,
    relative_path: &Path,
    result: &CropResult,
) -> String {
    format!(
        "{} {}: {}",
        format_progress(completed, total),
        relative_path.display(),
        format_result(result)
    )
}

/// Final report: counts first, then the itemized failures.
pub fn format_summary(summary: &BatchSummary) -> Vec<String> {
    let mut lines = Vec::new();

    if summary.aborted {
        lines.push(format!(
            "Aborted after {} of {} {}",
            summary.completed(),
            summary.total,
            plural(summary.total)
        ));
    }
    lines.push(format!(
        "Cropped {} of {} {}",
        summary.processed,
        summary.total,
        plural(summary.total)
    ));
    if summary.skipped > 0 {
        lines.push(format!(
            "Skipped {} ({} too small, {} failed)",
            summary.skipped,
            summary.too_small(),
            summary.failed
        ));
    }

    if !summary.errors.is_empty() {
        lines.push("Errors".to_string());
        for (i, error) in summary.errors.iter().enumerate() {
            lines.push(format!("{} {}", format_index(i + 1), error.filename));
            lines.push(format!(
                "{}{}",
                indent(1),
                truncate(&error.reason, MAX_REASON_CHARS)
            ));
        }
        let more = summary.unreported_errors();
        if more > 0 {
            lines.push(format!("... and {} more", more));
        }
    }

    lines
}

pub fn print_summary(summary: &BatchSummary) {
    for line in format_summary(summary) {
        println!("{}", line);
    }
}

/// Prints batch progress to stdout.
///
/// `FileDone` is held until the matching `Progress` arrives so both print as
/// one line. Quiet mode prints only the summary; silent mode prints nothing.
pub struct CliReporter {
    quiet: bool,
    summary: bool,
    pending: Option<(PathBuf, CropResult)>,
}

impl CliReporter {
    pub fn new(quiet: bool) -> Self {
        Self {
            quiet,
            summary: true,
            pending: None,
        }
    }

    /// For callers that render the summary themselves.
    pub fn silent() -> Self {
        Self {
            quiet: true,
            summary: false,
            pending: None,
        }
    }
}

impl Reporter for CliReporter {
    fn on_file(&mut self, relative_path: &Path, result: &CropResult) {
        self.pending = Some((relative_path.to_path_buf(), result.clone()));
    }

    fn on_progress(&mut self, completed: usize, total: usize) {
        let file = self.pending.take();
        if self.quiet {
            return;
        }
        match file {
            Some((path, result)) => {
                println!("{}", format_file_line(completed, total, &path, &result))
            }
            None => println!("{}", format_progress(completed, total)),
        }
    }

    fn on_complete(&mut self, summary: &BatchSummary) {
        if self.summary {
            print_summary(summary);
        }
    }

    fn on_aborted(&mut self, summary: &BatchSummary) {
        if self.summary {
            print_summary(summary);
        }
    }
}

// ============================================================================
// Check update
// ============================================================================

pub fn format_update_status(status: &UpdateStatus, local: &str) -> Vec<String> {
    match status {
        UpdateStatus::UpToDate => vec![format!("Up to date ({})", local)],
        UpdateStatus::Available {
            version,
            url,
            notes,
        } => {
            let mut lines = vec![format!("Update available: {} (running {})", version, local)];
            if let Some(url) = url {
                lines.push(format!("{}Download: {}", indent(1), url));
            }
            if let Some(notes) = notes {
                lines.push(format!("{}Notes: {}", indent(1), truncate(notes, 200)));
            }
            lines
        }
    }
}

pub fn print_update_status(status: &UpdateStatus, local: &str) {
    for line in format_update_status(status, local) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
