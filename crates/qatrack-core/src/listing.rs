//! Paginated, role-scoped listing.
//!
//! `list` validates the request, resolves the role-scoped query once, then
//! runs a count and a windowed read against that same query. Either query
//! failing fails the whole call.

use serde::Serialize;

use crate::display_id::DisplayIds;
use crate::error::Result;
use crate::model::{Entity, EntityKind};
use crate::query::{ListingRequest, StoreQuery, Window};
use crate::scope::{base_query, build_filter_with_ids};
use crate::store::EntityStore;

/// Upper bound on page size, from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListingLimits {
    pub max_page_size: usize,
}

impl Default for ListingLimits {
    fn default() -> Self {
        Self { max_page_size: 100 }
    }
}

/// An entity plus its rendered display ID.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Listed {
    #[serde(flatten)]
    pub entity: Entity,
    pub display_id: String,
}

/// One page of results and the unpaginated total.
#[derive(Debug, Clone, Serialize)]
pub struct ListingResult {
    pub items: Vec<Listed>,
    pub total: usize,
}

/// Resolve the role-scoped query for a request without touching the store
/// beyond the already-loaded display IDs.
#[must_use]
pub fn resolve_query(kind: EntityKind, request: &ListingRequest, ids: &DisplayIds) -> StoreQuery {
    build_filter_with_ids(
        base_query(kind, &request.project_id),
        request.role,
        &request.caller_id,
        &request.filters(),
        ids,
    )
}

/// List one page of `kind` entities visible to the caller.
///
/// # Errors
///
/// Returns `Validation` before any store access if the request is malformed,
/// and `StoreUnavailable` if any store read fails. No partial page is ever
/// returned.
pub fn list<S>(store: &S, kind: EntityKind, request: &ListingRequest, limits: &ListingLimits) -> Result<ListingResult>
where
    S: EntityStore + ?Sized,
{
    let window = request.validate(limits.max_page_size)?;
    let ids = store.display_ids()?;
    let query = resolve_query(kind, request, &ids);
    list_resolved(store, &query, window, &ids)
}

fn list_resolved<S>(store: &S, query: &StoreQuery, window: Window, ids: &DisplayIds) -> Result<ListingResult>
where
    S: EntityStore + ?Sized,
{
    if query.is_empty_set() {
        return Ok(ListingResult {
            items: Vec::new(),
            total: 0,
        });
    }

    let total = store.count(query)?;
    let entities = store.find(query, window)?;
    tracing::debug!(
        kind = %query.kind,
        total,
        returned = entities.len(),
        skip = window.skip,
        "Listed entities"
    );

    Ok(ListingResult {
        items: attach_display_ids(entities, ids),
        total,
    })
}

/// Every visible entity, fetched page by page with the same query.
///
/// `request.skip` and `request.limit` are ignored; pages are sized at
/// `limits.max_page_size`.
///
/// # Errors
///
/// Same as [`list`].
pub fn list_all<S>(store: &S, kind: EntityKind, request: &ListingRequest, limits: &ListingLimits) -> Result<Vec<Listed>>
where
    S: EntityStore + ?Sized,
{
    let page_size = limits.max_page_size.max(1);
    let first_page = request
        .clone()
        .page(0, i64::try_from(page_size).unwrap_or(i64::MAX));
    first_page.validate(page_size)?;

    let ids = store.display_ids()?;
    let query = resolve_query(kind, request, &ids);

    let mut items = Vec::new();
    let mut skip = 0;
    loop {
        let page = list_resolved(store, &query, Window::new(skip, page_size), &ids)?;
        let fetched = page.items.len();
        items.extend(page.items);
        skip += fetched;
        if fetched < page_size || skip >= page.total {
            break;
        }
    }
    Ok(items)
}

/// Pair each entity with its display ID.
#[must_use]
pub fn attach_display_ids(entities: Vec<Entity>, ids: &DisplayIds) -> Vec<Listed> {
    entities
        .into_iter()
        .map(|entity| Listed {
            display_id: ids.format(entity.kind, entity.custom_id),
            entity,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackerError;
    use crate::model::{Role, Status};
    use crate::store::{EntityDraft, Fault, InMemoryStore, create_entity};
    use std::collections::HashSet;

    fn seed_scenario() -> InMemoryStore {
        let store = InMemoryStore::with_default_formats();
        let statuses = [Status::New, Status::New, Status::Fixed];
        let owners = ["admin", "tess", "admin"];
        for (i, (status, owner)) in statuses.into_iter().zip(owners).enumerate() {
            let mut draft = EntityDraft::new(EntityKind::Issue, "P", format!("Issue {}", i + 1));
            draft.status = Some(status);
            create_entity(&store, draft, owner).unwrap();
        }
        store
    }

    #[test]
    fn test_tester_scenario() {
        let store = seed_scenario();
        let request = ListingRequest::new("P", Role::Tester, "tess");
        let result = list(&store, EntityKind::Issue, &request, &ListingLimits::default()).unwrap();
        assert_eq!(result.total, 2);
        let ids: Vec<&str> = result.items.iter().map(|l| l.display_id.as_str()).collect();
        assert_eq!(ids, vec!["BUG-3", "BUG-2"]);
    }

    #[test]
    fn test_pages_concatenate_to_total() {
        let store = InMemoryStore::with_default_formats();
        for i in 0..23 {
            create_entity(&store, EntityDraft::new(EntityKind::Requirement, "P", format!("R{i}")), "a").unwrap();
        }
        let limits = ListingLimits::default();
        let mut seen = Vec::new();
        let mut skip = 0;
        loop {
            let request = ListingRequest::new("P", Role::Client, "c").page(skip, 5);
            let page = list(&store, EntityKind::Requirement, &request, &limits).unwrap();
            assert!(page.items.len() <= 5);
            assert_eq!(page.total, 23);
            if page.items.is_empty() {
                break;
            }
            seen.extend(page.items.into_iter().map(|l| l.entity.custom_id));
            skip += 5;
        }
        assert_eq!(seen.len(), 23);
        assert_eq!(seen.iter().collect::<HashSet<_>>().len(), 23);
        let mut sorted = seen.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(seen, sorted);
    }

    #[test]
    fn test_invalid_request_never_reaches_store() {
        let store = InMemoryStore::new();
        store.inject_fault(Fault::All);
        let request = ListingRequest::new("P", Role::Admin, "a").page(-1, 10);
        let err = list(&store, EntityKind::Issue, &request, &ListingLimits::default()).unwrap_err();
        assert!(matches!(err, TrackerError::Validation { .. }));

        let request = ListingRequest::new("P", Role::Admin, "a").page(0, 500);
        let err = list(&store, EntityKind::Issue, &request, &ListingLimits::default()).unwrap_err();
        assert!(matches!(err, TrackerError::Validation { ref field, .. } if field == "limit"));
    }

    #[test]
    fn test_failed_window_fails_whole_listing() {
        let store = seed_scenario();
        store.inject_fault(Fault::Find);
        let request = ListingRequest::new("P", Role::Admin, "a");
        let err = list(&store, EntityKind::Issue, &request, &ListingLimits::default()).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_missing_format_falls_back_to_integer() {
        let store = InMemoryStore::new();
        create_entity(&store, EntityDraft::new(EntityKind::Package, "P", "Gold"), "a").unwrap();
        let request = ListingRequest::new("P", Role::Admin, "a");
        let result = list(&store, EntityKind::Package, &request, &ListingLimits::default()).unwrap();
        assert_eq!(result.items[0].display_id, "1");
    }

    #[test]
    fn test_list_all_walks_every_page() {
        let store = InMemoryStore::with_default_formats();
        for i in 0..7 {
            create_entity(&store, EntityDraft::new(EntityKind::Task, "P", format!("T{i}")), "a").unwrap();
        }
        let request = ListingRequest::new("P", Role::Admin, "a");
        let all = list_all(&store, EntityKind::Task, &request, &ListingLimits { max_page_size: 3 }).unwrap();
        assert_eq!(all.len(), 7);
        assert_eq!(all[0].display_id, "TASK-7");
    }

    #[test]
    fn test_listing_serializes_display_id_inline() {
        let store = seed_scenario();
        let request = ListingRequest::new("P", Role::Admin, "a").page(0, 1);
        let result = list(&store, EntityKind::Issue, &request, &ListingLimits::default()).unwrap();
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["total"], 3);
        assert_eq!(json["items"][0]["displayId"], "BUG-3");
        assert_eq!(json["items"][0]["customId"], 3);
    }
}
