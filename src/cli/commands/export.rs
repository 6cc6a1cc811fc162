use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use chrono::Utc;
use qatrack_core::transfer::{ExportOptions, export_csv, export_file_name};

use crate::cli::{Context, ExportArgs};
use crate::format::{self, ExportSummary};

/// Execute the export command.
///
/// The listing runs to completion before the output file is created, so a
/// failed export leaves no partial file behind.
///
/// # Errors
///
/// Returns an error if the listing fails or the output cannot be written.
pub fn execute(ctx: &Context, args: &ExportArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let request = ctx.request(&args.filters);
    let options = ExportOptions {
        wrap_width: args.wrap_width.unwrap_or(ctx.config.wrap_width),
    };

    let mut buffer = Vec::new();
    let rows = export_csv(&store, args.kind, &request, &ctx.limits(), options, &mut buffer)?;

    let target = match &args.output {
        Some(path) if path.as_os_str() == "-" => None,
        Some(path) => Some(path.clone()),
        None => Some(PathBuf::from(export_file_name(args.kind, Utc::now().date_naive()))),
    };

    match &target {
        None => {
            io::stdout().write_all(&buffer)?;
        }
        Some(path) => {
            write_file(path, &buffer)?;
            let summary = ExportSummary {
                kind: args.kind,
                rows,
                path: Some(path.display().to_string()),
            };
            if ctx.json {
                format::print_json(&summary)?;
            } else if !ctx.quiet {
                println!("Exported {rows} {} to {}", args.kind.label(), path.display());
            }
        }
    }
    Ok(())
}

fn write_file(path: &Path, contents: &[u8]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    writer.write_all(contents)?;
    writer.flush()?;
    Ok(())
}
