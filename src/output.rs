//! CLI output formatting for every command.
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format functions
//! are pure: no I/O, no side effects. Diagnostics go through `tracing`; this
//! module only renders the final summaries.
//!
//! # Output Format
//!
//! ## Site
//!
//! ```text
//! Nodes
//! 001 /  (2 files, 1 thumbnail spec)
//! 002 gallery  (14 files)
//! ```
//!
//! ## Thumbnails
//!
//! ```text
//! Thumbnails
//!     generated: 12
//!     up to date: 30
//!     failed: 1
//! ```
//!
//! ## Build
//!
//! ```text
//! Thumbnails
//!     generated: 12
//! Deploy → deploy
//!     pages: 8 (5 images sized)
//!     copied: 61
//!     missing: gallery/thumb_broken.jpg
//! ```
//!
//! ## Check
//!
//! ```text
//! Thumbnail specs: 4
//!     gallery #2: at least one of width, height, larger, or smaller must be set
//! ```

use crate::build::BuildReport;
use crate::site::Site;
use crate::thumbnails::{CheckReport, ThumbnailReport};

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

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{} {}", n, if n == 1 { one } else { many })
}

/// `label: value` at one level of indentation, omitted when `value` is zero.
fn count_line(lines: &mut Vec<String>, label: &str, value: usize) {
    if value > 0 {
        lines.push(format!("{}{}: {}", indent(1), label, value));
    }
}

// ============================================================================
// Site
// ============================================================================

/// Format the scanned content tree: one line per node.
pub fn format_site_output(site: &Site) -> Vec<String> {
    let mut lines = vec!["Nodes".to_string()];
    for (i, node) in site.nodes().iter().enumerate() {
        let files = plural(node.resources.len(), "file", "files");
        let line = match node.meta.thumbnails.len() {
            0 => format!("{} {}  ({})", format_index(i + 1), node, files),
            n => format!(
                "{} {}  ({}, {})",
                format_index(i + 1),
                node,
                files,
                plural(n, "thumbnail spec", "thumbnail specs")
            ),
        };
        lines.push(line);
    }
    lines
}

pub fn print_site_output(site: &Site) {
    for line in format_site_output(site) {
        println!("{}", line);
    }
}

// ============================================================================
// Thumbnails
// ============================================================================

pub fn format_thumbnail_report(report: &ThumbnailReport) -> Vec<String> {
    let mut lines = vec!["Thumbnails".to_string()];
    count_line(&mut lines, "generated", report.generated);
    count_line(&mut lines, "up to date", report.fresh);
    count_line(&mut lines, "failed", report.failed);
    count_line(&mut lines, "already thumbnails", report.skipped);
    count_line(&mut lines, "rejected specs", report.rejected_specs);
    count_line(&mut lines, "overridden by a later spec", report.superseded);
    if lines.len() == 1 {
        lines.push(format!("{}nothing to do", indent(1)));
    }
    lines
}

pub fn print_thumbnail_report(report: &ThumbnailReport) {
    for line in format_thumbnail_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Build
// ============================================================================

pub fn format_build_report(report: &BuildReport) -> Vec<String> {
    let mut lines = format_thumbnail_report(&report.thumbnails);
    lines.push(format!("Deploy → {}", report.deploy_root.display()));
    lines.push(format!(
        "{}pages: {} ({} sized)",
        indent(1),
        report.pages,
        plural(report.images_sized, "image", "images")
    ));
    lines.push(format!("{}copied: {}", indent(1), report.copied));
    for missing in &report.missing {
        lines.push(format!("{}missing: {}", indent(1), missing));
    }
    lines
}

pub fn print_build_report(report: &BuildReport) {
    for line in format_build_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

pub fn format_check_report(report: &CheckReport) -> Vec<String> {
    let mut lines = vec![format!("Thumbnail specs: {}", report.specs)];
    for problem in &report.problems {
        lines.push(format!(
            "{}{} #{}: {}",
            indent(1),
            problem.node,
            problem.index,
            problem.message
        ));
    }
    lines
}

pub fn print_check_report(report: &CheckReport) {
    for line in format_check_report(report) {
        println!("{}", line);
    }
}
