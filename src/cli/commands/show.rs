//! Show command implementation.

use anyhow::Result;
use qatrack_core::{EntityStore, Listed, TrackerError, base_query, build_filter};

use crate::cli::{Context, ShowArgs};
use crate::format::{self, EntityDetails, format_status_icon};

/// Execute the show command.
///
/// Entities the caller's role may not list are reported as not found.
///
/// # Errors
///
/// Returns `FormatMismatch` for a malformed display ID, `EntityNotFound` if
/// no visible entity matches, or `StoreUnavailable`.
pub fn execute(ctx: &Context, args: &ShowArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let ids = store.display_ids()?;
    let custom_id = ids.parse(args.kind, &args.id)?;

    let not_found = || TrackerError::EntityNotFound {
        kind: args.kind.label().to_string(),
        id: args.id.clone(),
    };
    let entity = store
        .find_by_custom_id(args.kind, &ctx.config.project, custom_id)?
        .ok_or_else(not_found)?;

    let visible = build_filter(base_query(args.kind, &ctx.config.project), ctx.role, &ctx.actor, &[]);
    if !visible.matches(&entity) {
        return Err(not_found().into());
    }

    let reference_ids: Vec<String> = entity
        .kind
        .reference_kind()
        .map(|kind| entity.references.iter().map(|n| ids.format(kind, *n)).collect())
        .unwrap_or_default();
    let details = EntityDetails {
        listed: Listed {
            display_id: ids.format(entity.kind, entity.custom_id),
            entity,
        },
        reference_ids,
    };

    if ctx.json {
        format::print_json(&details)?;
    } else {
        print_details(&details);
    }
    Ok(())
}

fn print_details(details: &EntityDetails) {
    let entity = &details.listed.entity;
    println!(
        "{} {} {} [{}]",
        format_status_icon(&entity.status),
        details.listed.display_id,
        entity.title,
        entity.status
    );
    if let Some(severity) = entity.severity {
        println!("Severity: {severity}");
    }
    if let Some(priority) = entity.priority {
        println!("Priority: {priority}");
    }
    println!("Reporter: {}", entity.owner_name.as_deref().unwrap_or(&entity.owner_id));
    if let Some(assignee) = entity.assignee_name.as_deref().or(entity.assignee_id.as_deref()) {
        println!("Assignee: {assignee}");
    }
    if let Some(group) = &entity.group_name {
        println!("Suite: {group}");
    }
    println!("Created: {}", entity.created_at.format("%Y-%m-%d %H:%M:%S"));
    if let Some(desc) = &entity.description {
        println!("\n{desc}");
    }
    if !entity.steps.is_empty() {
        println!("\nSteps:");
        for (i, step) in entity.steps.iter().enumerate() {
            match &step.expected {
                Some(expected) => println!("  {}. {} -> {}", i + 1, step.description, expected),
                None => println!("  {}. {}", i + 1, step.description),
            }
        }
    }
    if !entity.test_data.is_empty() {
        println!("\nTest data:");
        for item in &entity.test_data {
            println!("  {} = {}", item.name, item.value);
        }
    }
    if !details.reference_ids.is_empty() {
        println!("\nReferences: {}", details.reference_ids.join(", "));
    }
    if !entity.attachments.is_empty() {
        println!("Attachments: {}", entity.attachments.join(", "));
    }
}
