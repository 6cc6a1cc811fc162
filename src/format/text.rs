//! Plain text (non-ANSI) formatting for terminal output:
//! - status icons
//! - severity/priority badges
//! - one-line entity summaries and page footers

use qatrack_core::transfer::ImportReport;
use qatrack_core::{Listed, Priority, Severity, Status};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

/// Status icon characters.
pub mod icons {
    /// Untriaged.
    pub const NEW: &str = "◇";
    /// Open or reopened.
    pub const OPEN: &str = "○";
    /// Someone is on it.
    pub const ACTIVE: &str = "◐";
    /// Waiting on verification.
    pub const REVIEW: &str = "◑";
    pub const BLOCKED: &str = "●";
    pub const DONE: &str = "✓";
    pub const REJECTED: &str = "✗";
}

/// Widest title shown on a summary line, in display columns.
pub const TITLE_WIDTH: usize = 60;

#[must_use]
pub const fn format_status_icon(status: &Status) -> &'static str {
    match status {
        Status::New => icons::NEW,
        Status::Open | Status::Reopened => icons::OPEN,
        Status::Assigned | Status::InProgress => icons::ACTIVE,
        Status::Fixed | Status::Retest => icons::REVIEW,
        Status::Blocked => icons::BLOCKED,
        Status::Verified | Status::Closed | Status::Approved | Status::Passed => icons::DONE,
        Status::Rejected | Status::Failed => icons::REJECTED,
    }
}

#[must_use]
pub fn format_severity(severity: Severity) -> String {
    format!("[{}]", severity.as_str().to_lowercase())
}

#[must_use]
pub fn format_priority(priority: Priority) -> String {
    format!("P:{}", priority.as_str().to_lowercase())
}

/// Cut `text` to at most `width` display columns, marking the cut with `…`.
#[must_use]
pub fn truncate_to_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    for c in text.chars() {
        let w = c.width().unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

/// Format a single-line entity summary.
///
/// Format: `{icon} {display_id} {status} [{severity}] [P:{priority}] {title}`
#[must_use]
pub fn format_entity_line(listed: &Listed) -> String {
    let entity = &listed.entity;
    let mut line = format!(
        "{} {} {}",
        format_status_icon(&entity.status),
        listed.display_id,
        entity.status
    );
    if let Some(severity) = entity.severity {
        line.push(' ');
        line.push_str(&format_severity(severity));
    }
    if let Some(priority) = entity.priority {
        line.push(' ');
        line.push_str(&format_priority(priority));
    }
    line.push(' ');
    line.push_str(&truncate_to_width(&entity.title, TITLE_WIDTH));
    line
}

/// `Showing 21-40 of 57`.
#[must_use]
pub fn format_page_footer(skip: i64, shown: usize, total: usize) -> String {
    if shown == 0 {
        return format!("No results (total {total})");
    }
    let first = skip + 1;
    let last = skip + i64::try_from(shown).unwrap_or(i64::MAX);
    format!("Showing {first}-{last} of {total}")
}

/// Human summary of an import batch, one line per problem.
#[must_use]
pub fn format_import_report(report: &ImportReport) -> Vec<String> {
    let mut lines = vec![format!(
        "Imported {} of {} row(s), {} failed",
        report.created,
        report.rows(),
        report.failed
    )];
    for group in &report.created_groups {
        lines.push(format!("  created group '{group}'"));
    }
    for error in &report.errors {
        lines.push(format!("  row {}: {}", error.row, error.message));
    }
    for skipped in &report.skipped_references {
        lines.push(format!(
            "  row {}: skipped reference '{}' ({})",
            skipped.row, skipped.reference, skipped.reason
        ));
    }
    lines
}
