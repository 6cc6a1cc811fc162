use std::fs::File;
use std::io::BufReader;
use std::time::Duration;

use anyhow::{Context as _, Result};
use indicatif::{ProgressBar, ProgressStyle};
use qatrack_core::transfer::import_rows_with_progress;

use crate::cli::{Context, ImportArgs};
use crate::format::{self, ImportSummary, format_import_report};

/// Execute the import command.
///
/// Rows are independent: a bad row is reported and skipped while the rest
/// are created.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, the header is unusable or
/// the store is unavailable before the first row.
pub fn execute(ctx: &Context, args: &ImportArgs) -> Result<()> {
    let file = File::open(&args.file).with_context(|| format!("opening {}", args.file.display()))?;
    let store = ctx.open_store()?;

    let spinner = spinner(ctx.json || ctx.quiet);
    let report = import_rows_with_progress(
        &store,
        args.kind,
        &ctx.config.project,
        &ctx.actor,
        BufReader::new(file),
        |row, ok| {
            spinner.set_message(format!("row {row}{}", if ok { "" } else { " (failed)" }));
            spinner.tick();
        },
    );
    spinner.finish_and_clear();
    let report = report?;

    tracing::info!(
        kind = %args.kind,
        created = report.created,
        failed = report.failed,
        "Import finished"
    );

    if ctx.json {
        format::print_json(&ImportSummary {
            kind: args.kind,
            file: args.file.display().to_string(),
            report,
        })?;
    } else if !ctx.quiet {
        for line in format_import_report(&report) {
            println!("{line}");
        }
    }
    Ok(())
}

fn spinner(hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} Importing {msg}") {
        bar.set_style(style);
    }
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}
