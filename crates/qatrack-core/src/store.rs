//! Entity storage trait and the in-memory implementation.
//!
//! [`EntityStore`] is what the listing service and the import adapter talk
//! to. [`InMemoryStore`] keeps everything behind one mutex and doubles as the
//! test store; the SQLite store lives in the `qatrack` binary crate.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::counter::{CounterTable, SequenceCounter, SequenceKey};
use crate::display_id::{DisplayIdFormat, DisplayIds};
use crate::error::{Result, TrackerError, ValidationError};
use crate::model::{DataItem, Entity, EntityKind, Priority, Severity, Status, Step};
use crate::query::{StoreQuery, Window};

/// Persistence operations shared by every backend.
///
/// All methods take `&self`; implementations synchronise internally so one
/// store can serve concurrent callers.
pub trait EntityStore: SequenceCounter + Send + Sync {
    /// Persist a fully-formed entity and return it with its internal id set.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateCustomId` if `(kind, project, custom_id)` is taken,
    /// or `StoreUnavailable` on backend failure.
    fn insert(&self, entity: Entity) -> Result<Entity>;

    /// # Errors
    ///
    /// Returns `EntityNotFound` if no entity has this internal id.
    fn get(&self, id: i64) -> Result<Entity>;

    /// Look up a live entity by its custom ID.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` on backend failure.
    fn find_by_custom_id(&self, kind: EntityKind, project_id: &str, custom_id: u64) -> Result<Option<Entity>>;

    /// Look up a live grouping entity (e.g. a test suite) by exact title.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` on backend failure.
    fn find_group(&self, project_id: &str, kind: EntityKind, name: &str) -> Result<Option<Entity>>;

    /// Number of entities matching `query`.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` on backend failure.
    fn count(&self, query: &StoreQuery) -> Result<usize>;

    /// Matching entities, newest-created first (ties by descending internal
    /// id), windowed by `window`.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` on backend failure.
    fn find(&self, query: &StoreQuery, window: Window) -> Result<Vec<Entity>>;

    /// # Errors
    ///
    /// Returns `StoreUnavailable` on backend failure.
    fn display_format(&self, kind: EntityKind) -> Result<Option<DisplayIdFormat>>;

    /// Create or replace the format for `format.kind`.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` on backend failure.
    fn set_display_format(&self, format: &DisplayIdFormat) -> Result<()>;

    /// Every stored format.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` on backend failure.
    fn display_formats(&self) -> Result<Vec<DisplayIdFormat>>;

    /// Mark an entity deleted. Its custom ID stays consumed.
    ///
    /// # Errors
    ///
    /// Returns `EntityNotFound` if no entity has this internal id.
    fn soft_delete(&self, id: i64, actor: &str) -> Result<()>;

    /// All formats resolved into one lookup table.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` on backend failure.
    fn display_ids(&self) -> Result<DisplayIds> {
        Ok(DisplayIds::new(self.display_formats()?))
    }
}

/// Caller-supplied fields of a new entity.
#[derive(Debug, Clone, Default)]
pub struct EntityDraft {
    pub kind: Option<EntityKind>,
    pub project_id: String,
    pub title: String,
    pub description: Option<String>,
    /// Defaults to [`EntityKind::initial_status`].
    pub status: Option<Status>,
    pub severity: Option<Severity>,
    pub priority: Option<Priority>,
    pub owner_name: Option<String>,
    pub assignee_id: Option<String>,
    pub assignee_name: Option<String>,
    pub group_id: Option<i64>,
    pub group_name: Option<String>,
    pub steps: Vec<Step>,
    pub test_data: Vec<DataItem>,
    pub references: Vec<u64>,
    pub attachments: Vec<String>,
}

impl EntityDraft {
    #[must_use]
    pub fn new(kind: EntityKind, project_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            project_id: project_id.into(),
            title: title.into(),
            ..Self::default()
        }
    }

    /// Check the draft without touching a store; returns its kind.
    ///
    /// # Errors
    ///
    /// Returns `Validation` naming every offending field.
    pub fn validate(&self) -> Result<EntityKind> {
        let mut errors = Vec::new();
        if self.kind.is_none() {
            errors.push(ValidationError::new("kind", "is required"));
        }
        if self.project_id.trim().is_empty() {
            errors.push(ValidationError::new("projectId", "cannot be empty"));
        }
        if self.title.trim().is_empty() {
            errors.push(ValidationError::new("title", "cannot be empty"));
        }
        if let Some(kind) = self.kind {
            if self.severity.is_some() && kind != EntityKind::Issue {
                errors.push(ValidationError::new("severity", format!("not supported for {kind}")));
            }
            if (self.group_id.is_some() || self.group_name.is_some()) && kind.group_kind().is_none() {
                errors.push(ValidationError::new("group", format!("{kind} does not belong to a group")));
            }
        }
        match self.kind {
            Some(kind) if errors.is_empty() => Ok(kind),
            _ => Err(TrackerError::from_validation_errors(errors)),
        }
    }
}

/// Validate a draft, issue its custom ID and persist it.
///
/// The counter is consulted before anything is written; if it fails the
/// store is left untouched.
///
/// # Errors
///
/// Returns `Validation` for a bad draft, `SequenceExhausted` or
/// `StoreUnavailable` from the counter, or any error from `insert`.
pub fn create_entity<S>(store: &S, draft: EntityDraft, actor: &str) -> Result<Entity>
where
    S: EntityStore + ?Sized,
{
    let kind = draft.validate()?;
    if actor.trim().is_empty() {
        return Err(TrackerError::validation("actor", "cannot be empty"));
    }

    let key = SequenceKey::for_project(kind, &draft.project_id);
    let custom_id = store.next_value(key.kind, key.scope())?;
    tracing::debug!(%key, custom_id, "Issued custom id");

    let now = Utc::now();
    let entity = Entity {
        id: 0,
        kind,
        project_id: draft.project_id,
        custom_id,
        title: draft.title.trim().to_string(),
        description: draft.description.filter(|d| !d.trim().is_empty()),
        status: draft.status.unwrap_or_else(|| kind.initial_status()),
        severity: draft.severity,
        priority: draft.priority,
        owner_id: actor.to_string(),
        owner_name: draft.owner_name,
        assignee_id: draft.assignee_id,
        assignee_name: draft.assignee_name,
        group_id: draft.group_id,
        group_name: draft.group_name,
        steps: draft.steps,
        test_data: draft.test_data,
        references: draft.references,
        attachments: draft.attachments,
        created_at: now,
        updated_at: now,
        deleted_at: None,
    };

    store.insert(entity)
}

/// Sort newest-created first, ties broken by descending internal id.
pub fn sort_newest_first(entities: &mut [Entity]) {
    entities.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
}

/// Which operations an [`InMemoryStore`] should fail, for exercising error paths.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Fault {
    #[default]
    None,
    /// Every operation fails.
    All,
    /// Only the sequence counter fails.
    Counter,
    /// Only windowed reads fail; counts still succeed.
    Find,
    /// Only inserts fail.
    Insert,
}

#[derive(Debug, Default)]
struct Inner {
    entities: BTreeMap<i64, Entity>,
    next_id: i64,
    counters: CounterTable,
    formats: HashMap<EntityKind, DisplayIdFormat>,
    fault: Fault,
}

impl Inner {
    fn check(&self, op: Fault) -> Result<()> {
        if self.fault == Fault::All || (self.fault != Fault::None && self.fault == op) {
            return Err(TrackerError::unavailable(format!("injected {op:?} fault")));
        }
        Ok(())
    }

    fn matching<'a>(&'a self, query: &'a StoreQuery) -> impl Iterator<Item = &'a Entity> + 'a {
        self.entities.values().filter(move |e| query.matches(e))
    }
}

/// Store that keeps all state in process memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    // ========================================================================
    // Lifecycle
    // ========================================================================

    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-seeded with the default display format of every kind.
    #[must_use]
    pub fn with_default_formats() -> Self {
        let store = Self::new();
        if let Ok(mut inner) = store.inner.lock() {
            for kind in EntityKind::ALL {
                inner.formats.insert(kind, DisplayIdFormat::default_for(kind));
            }
        }
        store
    }

    /// Make subsequent operations fail with `StoreUnavailable`.
    pub fn inject_fault(&self, fault: Fault) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.fault = fault;
        }
    }

    /// Number of stored entities, deleted ones included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().map_or(0, |inner| inner.entities.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| TrackerError::unavailable("in-memory store lock poisoned"))
    }
}

impl SequenceCounter for InMemoryStore {
    fn next_value(&self, kind: EntityKind, scope: Option<&str>) -> Result<u64> {
        let mut inner = self.lock()?;
        inner.check(Fault::Counter)?;
        inner.counters.advance(SequenceKey::new(kind, scope))
    }
}

impl EntityStore for InMemoryStore {
    // ========================================================================
    // CRUD
    // ========================================================================

    fn insert(&self, mut entity: Entity) -> Result<Entity> {
        let mut inner = self.lock()?;
        inner.check(Fault::Insert)?;

        let taken = inner.entities.values().any(|e| {
            e.kind == entity.kind && e.project_id == entity.project_id && e.custom_id == entity.custom_id
        });
        if taken {
            return Err(TrackerError::DuplicateCustomId {
                kind: entity.kind.to_string(),
                project_id: entity.project_id,
                custom_id: entity.custom_id,
            });
        }

        inner.next_id += 1;
        entity.id = inner.next_id;
        inner.entities.insert(entity.id, entity.clone());
        Ok(entity)
    }

    fn get(&self, id: i64) -> Result<Entity> {
        let inner = self.lock()?;
        inner.check(Fault::None)?;
        inner
            .entities
            .get(&id)
            .cloned()
            .ok_or_else(|| TrackerError::EntityNotFound {
                kind: "entity".to_string(),
                id: id.to_string(),
            })
    }

    fn find_by_custom_id(&self, kind: EntityKind, project_id: &str, custom_id: u64) -> Result<Option<Entity>> {
        let inner = self.lock()?;
        inner.check(Fault::None)?;
        Ok(inner
            .entities
            .values()
            .find(|e| e.kind == kind && e.project_id == project_id && e.custom_id == custom_id && !e.is_deleted())
            .cloned())
    }

    fn find_group(&self, project_id: &str, kind: EntityKind, name: &str) -> Result<Option<Entity>> {
        let inner = self.lock()?;
        inner.check(Fault::None)?;
        Ok(inner
            .entities
            .values()
            .find(|e| e.kind == kind && e.project_id == project_id && e.title == name && !e.is_deleted())
            .cloned())
    }

    fn soft_delete(&self, id: i64, actor: &str) -> Result<()> {
        let mut inner = self.lock()?;
        inner.check(Fault::None)?;
        let entity = inner
            .entities
            .get_mut(&id)
            .ok_or_else(|| TrackerError::EntityNotFound {
                kind: "entity".to_string(),
                id: id.to_string(),
            })?;
        let now = Utc::now();
        entity.deleted_at = Some(now);
        entity.updated_at = now;
        tracing::debug!(id, actor, "Soft-deleted entity");
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    fn count(&self, query: &StoreQuery) -> Result<usize> {
        let inner = self.lock()?;
        inner.check(Fault::None)?;
        Ok(inner.matching(query).count())
    }

    fn find(&self, query: &StoreQuery, window: Window) -> Result<Vec<Entity>> {
        let mut hits: Vec<Entity> = {
            let inner = self.lock()?;
            inner.check(Fault::Find)?;
            inner.matching(query).cloned().collect()
        };
        sort_newest_first(&mut hits);
        Ok(hits.into_iter().skip(window.skip).take(window.limit).collect())
    }

    // ========================================================================
    // Display formats
    // ========================================================================

    fn display_format(&self, kind: EntityKind) -> Result<Option<DisplayIdFormat>> {
        let inner = self.lock()?;
        inner.check(Fault::None)?;
        Ok(inner.formats.get(&kind).cloned())
    }

    fn set_display_format(&self, format: &DisplayIdFormat) -> Result<()> {
        let mut inner = self.lock()?;
        inner.check(Fault::None)?;
        inner.formats.insert(format.kind, format.clone());
        Ok(())
    }

    fn display_formats(&self) -> Result<Vec<DisplayIdFormat>> {
        let inner = self.lock()?;
        inner.check(Fault::None)?;
        let mut formats: Vec<DisplayIdFormat> = inner.formats.values().cloned().collect();
        formats.sort_by_key(|f| f.kind);
        Ok(formats)
    }
}
