//! CLI output formatting for every command.
//!
//! # Information-First Display
//!
//! Output is **information-centric, not file-centric**. Every chapter leads
//! with its positional index and title; identifiers, files and anchors are
//! secondary context on indented lines or after an arrow. This keeps the
//! output readable as a table of contents while still letting users trace
//! each entry back to its source.
//!
//! # Output Format
//!
//! ## Check / Validate
//!
//! ```text
//! Chapters
//! 001 Introduction
//!     Source: intro
//!     001 Hello World
//!     002 Compiling
//! 002 Memory
//!     Source: memory
//!     Bibliography: memory.bib
//!
//! Links: 3 cached, 1 verified, 1 in-page (5 total)
//!
//! Unlisted sources
//!     drafts/scheduling.md
//! ```
//!
//! ## Build
//!
//! ```text
//! 001 Introduction → Intro.html
//!     001 Hello World → Intro.html#hello-world
//! 002 Memory → Memory.html
//! Home → Home.html
//! Sidebar → _Sidebar.html
//!
//! Links: 3 cached, 1 verified, 1 in-page (5 total)
//! Generated 2 chapter pages (4 workers)
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::cache::LinkStats;
use crate::generate::{HOME_FILE, SIDEBAR_FILE};
use crate::pipeline::{BuildReport, CheckReport};
use crate::types::{DocumentRecord, Violation};
use std::path::Path;

// ============================================================================
// Shared display helpers
// ============================================================================

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn links_line(links: &LinkStats) -> String {
    format!("Links: {}", links)
}

/// Format one chapter record with its sections.
///
/// ```text
/// 001 Introduction
///     Source: intro
///     001 Hello World
/// ```
fn record_lines(index: usize, record: &DocumentRecord) -> Vec<String> {
    let mut lines = vec![
        format!("{} {}", format_index(index), record.title),
        format!("{}Source: {}", indent(1), record.source_id),
    ];
    if let Some(bib) = &record.bibliography_ref {
        lines.push(format!("{}Bibliography: {}", indent(1), bib));
    }
    for (i, section) in record.subsections.iter().enumerate() {
        lines.push(format!("{}{} {}", indent(1), format_index(i + 1), section));
    }
    lines
}

// ============================================================================
// Check / Validate
// ============================================================================

/// Format the result of a validation-only run.
pub fn format_check_output(report: &CheckReport, root: &Path) -> Vec<String> {
    let mut lines = vec!["Chapters".to_string()];
    for (i, record) in report.corpus.iter().enumerate() {
        lines.extend(record_lines(i + 1, record));
    }
    lines.push(String::new());
    lines.push(links_line(&report.links));

    if !report.unlisted.is_empty() {
        lines.push(String::new());
        lines.push("Unlisted sources".to_string());
        for path in &report.unlisted {
            let shown = path.strip_prefix(root).unwrap_or(path);
            lines.push(format!("{}{}", indent(1), shown.display()));
        }
    }
    lines
}

pub fn print_check_output(report: &CheckReport, root: &Path) {
    for line in format_check_output(report, root) {
        println!("{}", line);
    }
}

/// Format the result of validating a single chapter.
pub fn format_validate_output(
    record: &DocumentRecord,
    links: &LinkStats,
    sidecar: &Path,
) -> Vec<String> {
    let mut lines = record_lines(1, record);
    lines.push(links_line(links));
    lines.push(format!("Recorded in {}", sidecar.display()));
    lines
}

pub fn print_validate_output(record: &DocumentRecord, links: &LinkStats, sidecar: &Path) {
    for line in format_validate_output(record, links, sidecar) {
        println!("{}", line);
    }
}

// ============================================================================
// Build
// ============================================================================

/// Format build output: each page with its subsection anchors, then the
/// index pages and totals.
pub fn format_build_output(report: &BuildReport) -> Vec<String> {
    let mut lines = Vec::new();

    for (i, page) in report.pages.iter().enumerate() {
        lines.push(format!(
            "{} {} \u{2192} {}",
            format_index(i + 1),
            page.title,
            page.file
        ));
        let Some(record) = report.corpus.iter().find(|r| r.source_id == page.source_id) else {
            continue;
        };
        for (j, (section, anchor)) in record.sections().enumerate() {
            lines.push(format!(
                "{}{} {} \u{2192} {}#{}",
                indent(1),
                format_index(j + 1),
                section,
                page.file,
                anchor
            ));
        }
    }

    if report.index_written {
        lines.push(format!("Home \u{2192} {}", HOME_FILE));
        lines.push(format!("Sidebar \u{2192} {}", SIDEBAR_FILE));
    }

    lines.push(String::new());
    lines.push(links_line(&report.links));
    let noun = if report.pages.len() == 1 { "page" } else { "pages" };
    lines.push(format!(
        "Generated {} chapter {} ({} workers)",
        report.pages.len(),
        noun,
        report.workers
    ));
    lines
}

pub fn print_build_output(report: &BuildReport) {
    for line in format_build_output(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Format a content violation for stderr.
///
/// ```text
/// error[accessibility]: intro: image "img/duck.png" has no usable alt text
/// ```
pub fn format_violation(violation: &Violation) -> String {
    format!("error[{}]: {}", violation.kind(), violation)
}

// ============================================================================
// Tests
// ============================================================================
