//! Entities to CSV.

use std::io::Write;

use chrono::NaiveDate;
use csv::WriterBuilder;

use crate::display_id::DisplayIds;
use crate::error::Result;
use crate::listing::{ListingLimits, list_all};
use crate::model::{Entity, EntityKind, Priority, Severity};
use crate::query::ListingRequest;
use crate::store::EntityStore;
use crate::util::{iso_date_stamp, single_line, wrap_text};

use super::columns::{Column, columns_for, headers_for};
use super::subrecord::{render_data, render_steps};

/// Knobs for rendering cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    /// Column width descriptions are wrapped to; 0 disables wrapping.
    pub wrap_width: usize,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self { wrap_width: 80 }
    }
}

/// Render the cell for `column`. Multi-line values keep their newlines.
#[must_use]
pub fn cell(entity: &Entity, column: Column, ids: &DisplayIds, options: ExportOptions) -> String {
    match column {
        Column::Id => ids.format(entity.kind, entity.custom_id),
        Column::Title => entity.title.clone(),
        Column::Description => entity
            .description
            .as_deref()
            .map(|d| wrap_text(d, options.wrap_width))
            .unwrap_or_default(),
        Column::Status => entity.status.to_string(),
        Column::Severity => entity.severity.as_ref().map_or("", Severity::as_str).to_string(),
        Column::Priority => entity.priority.as_ref().map_or("", Priority::as_str).to_string(),
        Column::Reporter => entity
            .owner_name
            .clone()
            .unwrap_or_else(|| entity.owner_id.clone()),
        Column::Assignee => entity
            .assignee_name
            .clone()
            .or_else(|| entity.assignee_id.clone())
            .unwrap_or_default(),
        Column::Attachments => entity.attachments.join("\n"),
        Column::Suite => entity.group_name.clone().unwrap_or_default(),
        Column::Steps => render_steps(&entity.steps),
        Column::TestData => render_data(&entity.test_data),
        Column::Requirements => entity
            .kind
            .reference_kind()
            .map(|kind| {
                entity
                    .references
                    .iter()
                    .map(|n| ids.format(kind, *n))
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_default(),
        Column::Created => entity.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

/// One row per entity, in the column order of `kind`.
#[must_use]
pub fn to_rows(kind: EntityKind, entities: &[Entity], ids: &DisplayIds, options: ExportOptions) -> Vec<Vec<String>> {
    let columns = columns_for(kind);
    entities
        .iter()
        .map(|entity| {
            columns
                .iter()
                .map(|column| cell(entity, *column, ids, options))
                .collect()
        })
        .collect()
}

/// Write a header plus `rows` as CSV, one physical line per record.
///
/// # Errors
///
/// Returns `Csv` or `Io` if writing fails.
pub fn write_csv<W: Write>(writer: W, kind: EntityKind, rows: &[Vec<String>]) -> Result<()> {
    let mut wtr = WriterBuilder::new().has_headers(false).from_writer(writer);
    wtr.write_record(headers_for(kind))?;
    for row in rows {
        wtr.write_record(row.iter().map(|c| single_line(c)))?;
    }
    wtr.flush()?;
    Ok(())
}

/// `issue-export-2026-10-16.csv` and the like.
#[must_use]
pub fn export_file_name(kind: EntityKind, date: NaiveDate) -> String {
    format!("{}-export-{}.csv", kind.as_str().replace('_', "-"), iso_date_stamp(date))
}

/// Export every entity of `kind` the caller may see.
///
/// Returns the number of exported rows.
///
/// # Errors
///
/// Propagates listing failures; nothing is written in that case.
pub fn export_csv<S, W>(
    store: &S,
    kind: EntityKind,
    request: &ListingRequest,
    limits: &ListingLimits,
    options: ExportOptions,
    writer: W,
) -> Result<usize>
where
    S: EntityStore + ?Sized,
    W: Write,
{
    let ids = store.display_ids()?;
    let entities: Vec<Entity> = list_all(store, kind, request, limits)?
        .into_iter()
        .map(|listed| listed.entity)
        .collect();
    let rows = to_rows(kind, &entities, &ids, options);
    write_csv(writer, kind, &rows)?;
    tracing::debug!(kind = %kind, rows = rows.len(), "Exported entities");
    Ok(rows.len())
}
