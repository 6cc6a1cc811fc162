//! CSV to entities, one independent row at a time.

use std::collections::HashMap;
use std::io::Read;

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;

use crate::display_id::DisplayIds;
use crate::error::{Result, TrackerError};
use crate::model::{EntityKind, Priority, Severity, Status};
use crate::store::{EntityDraft, EntityStore, create_entity};
use crate::util::LINE_JOIN;

use super::columns::{Column, HeaderMap};
use super::subrecord::{parse_data, parse_steps};

/// A row that could not be imported.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// 1-based data row number (the header is not counted).
    pub row: usize,
    pub message: String,
}

/// A cross-reference dropped from an otherwise imported row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedReference {
    pub row: usize,
    pub reference: String,
    pub reason: String,
}

/// Outcome of one import batch.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub created: usize,
    pub failed: usize,
    pub errors: Vec<RowError>,
    pub skipped_references: Vec<SkippedReference>,
    /// Grouping entities created on demand, by name.
    pub created_groups: Vec<String>,
}

impl ImportReport {
    #[must_use]
    pub const fn rows(&self) -> usize {
        self.created + self.failed
    }
}

/// Shared state for the rows of one batch.
struct Batch<'a, S: EntityStore + ?Sized> {
    store: &'a S,
    kind: EntityKind,
    project_id: &'a str,
    actor: &'a str,
    ids: DisplayIds,
    header: HeaderMap,
    groups: HashMap<String, i64>,
}

/// Import every row of a CSV document.
///
/// # Errors
///
/// Fails as a whole only before the first row: `Validation` for a missing or
/// unusable header, `StoreUnavailable` if display formats cannot be loaded.
/// Row failures are collected in the report.
pub fn import_rows<S, R>(store: &S, kind: EntityKind, project_id: &str, actor: &str, reader: R) -> Result<ImportReport>
where
    S: EntityStore + ?Sized,
    R: Read,
{
    import_rows_with_progress(store, kind, project_id, actor, reader, |_, _| {})
}

/// Like [`import_rows`], calling `progress(row, ok)` after each row.
///
/// # Errors
///
/// Same as [`import_rows`].
pub fn import_rows_with_progress<S, R, F>(
    store: &S,
    kind: EntityKind,
    project_id: &str,
    actor: &str,
    reader: R,
    mut progress: F,
) -> Result<ImportReport>
where
    S: EntityStore + ?Sized,
    R: Read,
    F: FnMut(usize, bool),
{
    if project_id.trim().is_empty() {
        return Err(TrackerError::validation("projectId", "cannot be empty"));
    }

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    if headers.is_empty() {
        return Err(TrackerError::validation("header", "file is empty"));
    }
    let header = HeaderMap::from_headers(kind, headers.iter())?;
    let ids = store.display_ids()?;

    let mut batch = Batch {
        store,
        kind,
        project_id,
        actor,
        ids,
        header,
        groups: HashMap::new(),
    };
    let mut report = ImportReport::default();

    for (idx, record) in rdr.records().enumerate() {
        let row = idx + 1;
        let outcome = record
            .map_err(|e| TrackerError::RowImport {
                row,
                reason: e.to_string(),
            })
            .and_then(|record| batch.import_row(row, &record, &mut report));

        match outcome {
            Ok(()) => {
                report.created += 1;
                progress(row, true);
            }
            Err(err) => {
                let message = match err {
                    TrackerError::RowImport { reason, .. } => reason,
                    other => other.to_string(),
                };
                tracing::warn!(row, kind = %kind, error = %message, "Row import failed");
                report.failed += 1;
                report.errors.push(RowError { row, message });
                progress(row, false);
            }
        }
    }

    tracing::info!(
        kind = %kind,
        created = report.created,
        failed = report.failed,
        skipped_references = report.skipped_references.len(),
        "Import finished"
    );
    Ok(report)
}

impl<S: EntityStore + ?Sized> Batch<'_, S> {
    fn import_row(&mut self, row: usize, record: &StringRecord, report: &mut ImportReport) -> Result<()> {
        let cell = |column| self.header.get(record, column);

        let title = cell(Column::Title).ok_or_else(|| TrackerError::RowImport {
            row,
            reason: "missing required field 'Title'".to_string(),
        })?;

        let mut draft = EntityDraft::new(self.kind, self.project_id, title);
        draft.description = cell(Column::Description).map(str::to_string);
        draft.status = cell(Column::Status).map(str::parse::<Status>).transpose()?;
        draft.severity = cell(Column::Severity).map(str::parse::<Severity>).transpose()?;
        draft.priority = cell(Column::Priority).map(str::parse::<Priority>).transpose()?;
        draft.owner_name = cell(Column::Reporter).map(str::to_string);
        draft.assignee_name = cell(Column::Assignee).map(str::to_string);
        draft.attachments = cell(Column::Attachments)
            .map(|a| {
                a.split(['\n', '|'])
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        if let Some(steps) = cell(Column::Steps) {
            draft.steps = parse_steps(steps)?;
        }
        if let Some(data) = cell(Column::TestData) {
            draft.test_data = parse_data(data)?;
        }
        if let Some(references) = cell(Column::Requirements) {
            draft.references = self.resolve_references(row, references, report)?;
        }
        if let Some(group) = cell(Column::Suite) {
            let group = group.to_string();
            draft.group_id = Some(self.resolve_group(&group, report)?);
            draft.group_name = Some(group);
        }

        create_entity(self.store, draft, self.actor)?;
        Ok(())
    }

    /// Custom IDs of references that resolve to live entities; the rest are
    /// recorded as skipped.
    fn resolve_references(&self, row: usize, cell: &str, report: &mut ImportReport) -> Result<Vec<u64>> {
        let Some(kind) = self.kind.reference_kind() else {
            return Ok(Vec::new());
        };
        let mut resolved = Vec::new();
        for (reference, parsed) in self.ids.parse_list(kind, &cell.replace(LINE_JOIN, ",")) {
            let reason = match parsed {
                Ok(custom_id) => match self.store.find_by_custom_id(kind, self.project_id, custom_id)? {
                    Some(_) => {
                        if !resolved.contains(&custom_id) {
                            resolved.push(custom_id);
                        }
                        continue;
                    }
                    None => format!("no {} with this ID", kind.label().to_lowercase()),
                },
                Err(err) => err.to_string(),
            };
            tracing::debug!(row, reference, reason = %reason, "Skipped reference");
            report.skipped_references.push(SkippedReference {
                row,
                reference: reference.to_string(),
                reason,
            });
        }
        Ok(resolved)
    }

    /// Internal id of the named group, creating it on first use in this batch.
    fn resolve_group(&mut self, name: &str, report: &mut ImportReport) -> Result<i64> {
        if let Some(id) = self.groups.get(name) {
            return Ok(*id);
        }
        let Some(group_kind) = self.kind.group_kind() else {
            return Err(TrackerError::validation("group", format!("{} has no group", self.kind)));
        };
        let id = match self.store.find_group(self.project_id, group_kind, name)? {
            Some(existing) => existing.id,
            None => {
                let created = create_entity(self.store, EntityDraft::new(group_kind, self.project_id, name), self.actor)?;
                tracing::debug!(kind = %group_kind, name, id = created.id, "Created group on demand");
                report.created_groups.push(name.to_string());
                created.id
            }
        };
        self.groups.insert(name.to_string(), id);
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listing::{ListingLimits, list};
    use crate::model::Role;
    use crate::query::ListingRequest;
    use crate::store::{Fault, InMemoryStore};

    fn import(store: &InMemoryStore, kind: EntityKind, csv: &str) -> ImportReport {
        import_rows(store, kind, "P", "importer", csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_partial_failure_is_isolated() {
        let store = InMemoryStore::with_default_formats();
        let csv = "\
Title,Status,Severity
Login broken,OPEN,HIGH
,OPEN,LOW
Slow search,FIXD,LOW
Bad severity,OPEN,catastrophic
Checkout fails,in progress,CRITICAL
";
        let report = import(&store, EntityKind::Issue, csv);
        assert_eq!(report.rows(), 5);
        assert_eq!(report.failed, 3);
        assert_eq!(report.created, 2);
        let failed_rows: Vec<usize> = report.errors.iter().map(|e| e.row).collect();
        assert_eq!(failed_rows, vec![2, 3, 4]);
        assert!(report.errors[0].message.contains("Title"));
        assert!(report.errors[1].message.contains("FIXD"));

        let request = ListingRequest::new("P", Role::Admin, "admin");
        let listed = list(&store, EntityKind::Issue, &request, &ListingLimits::default()).unwrap();
        assert_eq!(listed.total, 2);
    }

    #[test]
    fn test_unresolved_references_are_skipped() {
        let store = InMemoryStore::with_default_formats();
        import(&store, EntityKind::Requirement, "Title\nMust log in\nMust log out\n");
        let csv = "Title,Suite,Requirements\nLogin works,Auth,\"REQ-1, REQ-9, nonsense\"\n";
        let report = import(&store, EntityKind::TestCase, csv);
        assert_eq!(report.created, 1);
        assert_eq!(report.failed, 0);
        let skipped: Vec<&str> = report.skipped_references.iter().map(|s| s.reference.as_str()).collect();
        assert_eq!(skipped, vec!["REQ-9", "nonsense"]);

        let request = ListingRequest::new("P", Role::Admin, "admin");
        let listed = list(&store, EntityKind::TestCase, &request, &ListingLimits::default()).unwrap();
        assert_eq!(listed.items[0].entity.references, vec![1]);
    }

    #[test]
    fn test_groups_created_once_per_name() {
        let store = InMemoryStore::with_default_formats();
        let csv = "\
Title,Suite,Steps
Case A,Auth,1. Open | Expected: Form
Case B,Auth,1. Open | 2. Submit
Case C,Billing,
";
        let report = import(&store, EntityKind::TestCase, csv);
        assert_eq!(report.created, 3);
        assert_eq!(report.created_groups, vec!["Auth".to_string(), "Billing".to_string()]);

        let request = ListingRequest::new("P", Role::Admin, "admin");
        let suites = list(&store, EntityKind::TestSuite, &request, &ListingLimits::default()).unwrap();
        assert_eq!(suites.total, 2);
        let cases = list(&store, EntityKind::TestCase, &request, &ListingLimits::default()).unwrap();
        let case_b = cases.items.iter().find(|l| l.entity.title == "Case B").unwrap();
        assert_eq!(case_b.entity.steps.len(), 2);
    }

    #[test]
    fn test_existing_group_is_reused() {
        let store = InMemoryStore::with_default_formats();
        import(&store, EntityKind::TestSuite, "Title\nAuth\n");
        let report = import(&store, EntityKind::TestCase, "Title,Suite\nCase A,Auth\n");
        assert!(report.created_groups.is_empty());
    }

    #[test]
    fn test_malformed_steps_fail_the_row() {
        let store = InMemoryStore::with_default_formats();
        let csv = "Title,Steps\nCase A,\"1. ok\nnot enumerated\"\nCase B,1. fine\n";
        let report = import(&store, EntityKind::TestCase, csv);
        assert_eq!((report.created, report.failed), (1, 1));
        assert_eq!(report.errors[0].row, 1);
    }

    #[test]
    fn test_header_problems_fail_the_batch() {
        let store = InMemoryStore::new();
        let err = import_rows(&store, EntityKind::Issue, "P", "a", "Status,Severity\nOPEN,LOW\n".as_bytes()).unwrap_err();
        assert!(matches!(err, TrackerError::Validation { .. }));
        let err = import_rows(&store, EntityKind::Issue, "P", "a", "".as_bytes()).unwrap_err();
        assert!(matches!(err, TrackerError::Validation { .. }));
    }

    #[test]
    fn test_store_down_before_rows_fails_the_batch() {
        let store = InMemoryStore::new();
        store.inject_fault(Fault::All);
        let err = import_rows(&store, EntityKind::Issue, "P", "a", "Title\nOne\n".as_bytes()).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_store_down_mid_batch_fails_rows_not_batch() {
        let store = InMemoryStore::new();
        store.inject_fault(Fault::Insert);
        let report = import(&store, EntityKind::Issue, "Title\nOne\nTwo\n");
        assert_eq!((report.created, report.failed), (0, 2));
    }
}
