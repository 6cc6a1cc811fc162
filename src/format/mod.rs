//! Output formatting for `qatrack`.
//!
//! Supports both human-readable text output and machine-parseable JSON.
//! JSON goes to stdout; diagnostics and errors go to stderr.
//!
//! # JSON Output Types
//!
//! - [`ListingPage`] - one page of a listing with its window (list)
//! - [`EntityDetails`] - entity with resolved reference IDs (show)
//! - [`ImportSummary`] / [`ExportSummary`] - transfer results
//! - [`ErrorOutput`] - error envelope with a stable code

mod output;
mod text;

pub use output::{Created, EntityDetails, ErrorOutput, ExportSummary, FormatEntry, ImportSummary, ListingPage};
pub use text::{
    format_entity_line, format_import_report, format_page_footer, format_priority, format_severity,
    format_status_icon, truncate_to_width,
};

/// Serialize `value` as pretty JSON on stdout.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn print_json<T: serde::Serialize>(value: &T) -> serde_json::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
