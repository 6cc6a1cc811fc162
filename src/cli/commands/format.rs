//! Display ID pattern commands.

use anyhow::Result;
use qatrack_core::{DisplayIdFormat, EntityKind, EntityStore, Role, TrackerError};

use crate::cli::{Context, FormatSubcommand};
use crate::format::{self, FormatEntry};

/// Custom ID used to render the example column.
const EXAMPLE_VALUE: u64 = 42;

/// Execute `format show` / `format set`.
///
/// # Errors
///
/// Returns `InvalidPattern` for a pattern without exactly one `{customId}`,
/// a validation error when a non-admin tries to change a pattern, or
/// `StoreUnavailable`.
pub fn execute(ctx: &Context, command: &FormatSubcommand) -> Result<()> {
    let store = ctx.open_store()?;
    match command {
        FormatSubcommand::Show { kind } => {
            let ids = store.display_ids()?;
            let kinds: Vec<EntityKind> = kind.map_or_else(|| EntityKind::ALL.to_vec(), |k| vec![k]);
            let entries: Vec<FormatEntry> = kinds
                .into_iter()
                .map(|kind| FormatEntry {
                    kind,
                    pattern: ids.get(kind).map(|f| f.pattern().to_string()),
                    example: ids.format(kind, EXAMPLE_VALUE),
                })
                .collect();

            if ctx.json {
                format::print_json(&entries)?;
            } else {
                for entry in &entries {
                    println!(
                        "{:<16} {:<20} {}",
                        entry.kind.as_str(),
                        entry.pattern.as_deref().unwrap_or("(none)"),
                        entry.example
                    );
                }
            }
        }
        FormatSubcommand::Set { kind, pattern } => {
            if ctx.role != Role::Admin {
                return Err(TrackerError::validation("role", "only admins can change display formats").into());
            }
            let display_format = DisplayIdFormat::new(*kind, pattern.as_str())?;
            store.set_display_format(&display_format)?;
            tracing::info!(kind = %kind, pattern = display_format.pattern(), "Display format updated");

            let entry = FormatEntry {
                kind: *kind,
                pattern: Some(display_format.pattern().to_string()),
                example: display_format.format(EXAMPLE_VALUE),
            };
            if ctx.json {
                format::print_json(&entry)?;
            } else if !ctx.quiet {
                println!("{} IDs now look like {}", kind.label(), entry.example);
            }
        }
    }
    Ok(())
}
