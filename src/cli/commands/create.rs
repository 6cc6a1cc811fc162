use anyhow::Result;
use qatrack_core::transfer::subrecord::{parse_data, parse_steps};
use qatrack_core::{DisplayIds, Entity, EntityDraft, EntityKind, EntityStore, TrackerError, create_entity};

use crate::cli::{Context, CreateArgs};
use crate::format::{self, Created};

/// Execute the create command.
///
/// # Errors
///
/// Returns an error if validation fails, a reference or suite cannot be
/// resolved, or the store is unavailable. Nothing is written in that case.
pub fn execute(ctx: &Context, args: &CreateArgs) -> Result<()> {
    let store = ctx.open_store()?;
    let ids = store.display_ids()?;
    let project = ctx.config.project.as_str();

    let mut draft = EntityDraft::new(args.kind, project, args.title.as_str());
    draft.description.clone_from(&args.description);
    draft.status.clone_from(&args.status);
    draft.severity = args.severity;
    draft.priority = args.priority;
    draft.owner_name = Some(ctx.actor.clone());
    draft.assignee_id.clone_from(&args.assignee);
    draft.assignee_name.clone_from(&args.assignee);
    draft.attachments.clone_from(&args.attachments);

    if let Some(steps) = &args.steps {
        draft.steps = parse_steps(steps)?;
    }
    if let Some(data) = &args.data {
        draft.test_data = parse_data(data)?;
    }
    draft.group_name.clone_from(&args.suite);
    draft.validate()?;

    if let Some(refs) = &args.refs {
        draft.references = resolve_references(&store, &ids, args.kind, project, refs)?;
    }
    // Nothing may be written before validation and reference lookups pass.
    if let Some(suite) = &args.suite {
        let group = find_or_create_group(&store, args.kind, project, suite, &ctx.actor)?;
        draft.group_id = Some(group.id);
        draft.group_name = Some(group.title);
    }

    let entity = create_entity(&store, draft, &ctx.actor)?;
    let display_id = ids.format(entity.kind, entity.custom_id);

    if ctx.json {
        format::print_json(&Created::new(entity, display_id))?;
    } else if !ctx.quiet {
        println!("Created {display_id}: {}", entity.title);
    }
    Ok(())
}

/// Resolve display IDs of referenced entities; every one must exist.
fn resolve_references<S: EntityStore>(
    store: &S,
    ids: &DisplayIds,
    kind: EntityKind,
    project: &str,
    input: &str,
) -> Result<Vec<u64>> {
    let Some(target) = kind.reference_kind() else {
        return Err(TrackerError::validation("refs", format!("{kind} cannot reference other entities")).into());
    };

    let mut resolved = Vec::new();
    for (raw, parsed) in ids.parse_list(target, input) {
        let custom_id = parsed?;
        if store.find_by_custom_id(target, project, custom_id)?.is_none() {
            return Err(TrackerError::EntityNotFound {
                kind: target.label().to_string(),
                id: raw.to_string(),
            }
            .into());
        }
        resolved.push(custom_id);
    }
    Ok(resolved)
}

fn find_or_create_group<S: EntityStore>(
    store: &S,
    kind: EntityKind,
    project: &str,
    name: &str,
    actor: &str,
) -> Result<Entity> {
    let Some(group_kind) = kind.group_kind() else {
        return Err(TrackerError::validation("suite", format!("{kind} does not belong to a group")).into());
    };
    if let Some(group) = store.find_group(project, group_kind, name)? {
        return Ok(group);
    }
    let group = create_entity(store, EntityDraft::new(group_kind, project, name), actor)?;
    tracing::info!(kind = %group_kind, name, custom_id = group.custom_id, "Created group on demand");
    Ok(group)
}
