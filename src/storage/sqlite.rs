//! `SQLite` store implementation.

use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, TimeZone, Utc};
use qatrack_core::counter::SequenceKey;
use qatrack_core::model::SearchField;
use qatrack_core::{
    DisplayIdFormat, Entity, EntityKind, EntityStore, Predicate, Result, SequenceCounter, StoreQuery,
    TrackerError, Window,
};
use rusqlite::types::Type;
use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, ErrorCode, OptionalExtension, Row, ToSql, params};
use serde::de::DeserializeOwned;

use super::schema::apply_schema;

const ENTITY_COLUMNS: &str = "id, kind, project_id, custom_id, title, description, status, severity, priority,
     owner_id, owner_name, assignee_id, assignee_name, group_id, group_name,
     steps, test_data, refs, attachments, created_at, updated_at, deleted_at";

/// Unicode-aware replacement for `LOWER()`, which only folds ASCII.
const LOWER_FN: &str = "qt_lower";

/// Largest value a counter may hold; custom IDs are stored as signed 64-bit integers.
const MAX_SEQUENCE_VALUE: i64 = i64::MAX;

/// SQLite-based entity store.
///
/// The connection sits behind a mutex so one store can be shared across
/// threads; separate processes coordinate through SQLite's own locking.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (and create if needed) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the file cannot be opened or the schema
    /// cannot be applied.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open with an optional busy timeout (ms).
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the file cannot be opened or the schema
    /// cannot be applied.
    pub fn open_with_timeout(path: &Path, lock_timeout_ms: Option<u64>) -> Result<Self> {
        let conn = Connection::open(path).map_err(db_error)?;
        if let Some(timeout) = lock_timeout_ms {
            conn.busy_timeout(Duration::from_millis(timeout)).map_err(db_error)?;
        }
        conn.execute_batch("PRAGMA journal_mode = WAL;").map_err(db_error)?;
        register_functions(&conn).map_err(db_error)?;
        apply_schema(&conn).map_err(db_error)?;
        tracing::debug!(path = %path.display(), "Opened SQLite store");
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_error)?;
        register_functions(&conn).map_err(db_error)?;
        apply_schema(&conn).map_err(db_error)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Store the default pattern for every kind that has none yet.
    ///
    /// Returns how many formats were added.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` on database failure.
    pub fn seed_default_formats(&self) -> Result<usize> {
        let conn = self.lock()?;
        let now = format_datetime(&Utc::now());
        let mut added = 0;
        for kind in EntityKind::ALL {
            added += conn
                .execute(
                    "INSERT OR IGNORE INTO display_formats (kind, pattern, updated_at) VALUES (?1, ?2, ?3)",
                    params![kind.as_str(), kind.default_pattern(), now],
                )
                .map_err(db_error)?;
        }
        Ok(added)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| TrackerError::unavailable("connection lock poisoned"))
    }

    #[cfg(test)]
    fn execute_raw(&self, sql: &str) -> Result<()> {
        self.lock()?.execute_batch(sql).map_err(db_error)
    }
}

// ============================================================================
// SEQUENCES
// ============================================================================

impl SequenceCounter for SqliteStore {
    fn next_value(&self, kind: EntityKind, scope: Option<&str>) -> Result<u64> {
        let key = SequenceKey::new(kind, scope);
        let conn = self.lock()?;
        // One statement: the row is created at 1 or bumped in place, never read first.
        let issued: Option<i64> = conn
            .query_row(
                "INSERT INTO sequences (kind, scope, value) VALUES (?1, ?2, 1)
                 ON CONFLICT (kind, scope) DO UPDATE SET value = value + 1 WHERE value < ?3
                 RETURNING value",
                params![kind.as_str(), key.scope, MAX_SEQUENCE_VALUE],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_error)?;

        let value = issued.ok_or_else(|| key.exhausted())?;
        u64::try_from(value).map_err(|_| key.exhausted())
    }
}

// ============================================================================
// ENTITIES
// ============================================================================

impl EntityStore for SqliteStore {
    fn insert(&self, mut entity: Entity) -> Result<Entity> {
        let custom_id = to_sql_int(entity.custom_id, "customId")?;
        let steps = serde_json::to_string(&entity.steps)?;
        let test_data = serde_json::to_string(&entity.test_data)?;
        let references = serde_json::to_string(&entity.references)?;
        let attachments = serde_json::to_string(&entity.attachments)?;

        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT INTO entities (kind, project_id, custom_id, title, description, status, severity,
                 priority, owner_id, owner_name, assignee_id, assignee_name, group_id, group_name,
                 steps, test_data, refs, attachments, created_at, updated_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17,
                 ?18, ?19, ?20, ?21)",
            params![
                entity.kind.as_str(),
                entity.project_id,
                custom_id,
                entity.title,
                entity.description,
                entity.status.as_str(),
                entity.severity.map(|s| s.as_str()),
                entity.priority.map(|p| p.as_str()),
                entity.owner_id,
                entity.owner_name,
                entity.assignee_id,
                entity.assignee_name,
                entity.group_id,
                entity.group_name,
                steps,
                test_data,
                references,
                attachments,
                format_datetime(&entity.created_at),
                format_datetime(&entity.updated_at),
                entity.deleted_at.as_ref().map(format_datetime),
            ],
        );

        match inserted {
            Ok(_) => {
                entity.id = conn.last_insert_rowid();
                Ok(entity)
            }
            Err(rusqlite::Error::SqliteFailure(err, _)) if err.code == ErrorCode::ConstraintViolation => {
                Err(TrackerError::DuplicateCustomId {
                    kind: entity.kind.to_string(),
                    project_id: entity.project_id,
                    custom_id: entity.custom_id,
                })
            }
            Err(err) => Err(db_error(err)),
        }
    }

    fn get(&self, id: i64) -> Result<Entity> {
        let conn = self.lock()?;
        conn.query_row(
            &format!("SELECT {ENTITY_COLUMNS} FROM entities WHERE id = ?1"),
            [id],
            entity_from_row,
        )
        .optional()
        .map_err(db_error)?
        .ok_or_else(|| TrackerError::EntityNotFound {
            kind: "entity".to_string(),
            id: id.to_string(),
        })
    }

    fn find_by_custom_id(&self, kind: EntityKind, project_id: &str, custom_id: u64) -> Result<Option<Entity>> {
        let Ok(custom_id) = i64::try_from(custom_id) else {
            return Ok(None);
        };
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {ENTITY_COLUMNS} FROM entities
                 WHERE kind = ?1 AND project_id = ?2 AND custom_id = ?3 AND deleted_at IS NULL"
            ),
            params![kind.as_str(), project_id, custom_id],
            entity_from_row,
        )
        .optional()
        .map_err(db_error)
    }

    fn find_group(&self, project_id: &str, kind: EntityKind, name: &str) -> Result<Option<Entity>> {
        let conn = self.lock()?;
        conn.query_row(
            &format!(
                "SELECT {ENTITY_COLUMNS} FROM entities
                 WHERE kind = ?1 AND project_id = ?2 AND title = ?3 AND deleted_at IS NULL
                 ORDER BY id LIMIT 1"
            ),
            params![kind.as_str(), project_id, name],
            entity_from_row,
        )
        .optional()
        .map_err(db_error)
    }

    fn count(&self, query: &StoreQuery) -> Result<usize> {
        let (clause, params) = compile_query(query);
        let sql = format!("SELECT COUNT(*) FROM entities WHERE {clause}");
        let params_refs: Vec<&dyn ToSql> = params.iter().map(AsRef::as_ref).collect();

        let conn = self.lock()?;
        let count: i64 = conn
            .query_row(&sql, params_refs.as_slice(), |row| row.get(0))
            .map_err(db_error)?;
        usize::try_from(count).map_err(|e| TrackerError::Storage(e.to_string()))
    }

    fn find(&self, query: &StoreQuery, window: Window) -> Result<Vec<Entity>> {
        let (clause, mut params) = compile_query(query);
        let sql = format!(
            "SELECT {ENTITY_COLUMNS} FROM entities WHERE {clause}
             ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
        );
        params.push(Box::new(i64::try_from(window.limit).unwrap_or(i64::MAX)));
        params.push(Box::new(i64::try_from(window.skip).unwrap_or(i64::MAX)));
        let params_refs: Vec<&dyn ToSql> = params.iter().map(AsRef::as_ref).collect();

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&sql).map_err(db_error)?;
        let entities = stmt
            .query_map(params_refs.as_slice(), entity_from_row)
            .map_err(db_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_error)?;
        Ok(entities)
    }

    fn soft_delete(&self, id: i64, actor: &str) -> Result<()> {
        let now = format_datetime(&Utc::now());
        let conn = self.lock()?;
        let updated = conn
            .execute(
                "UPDATE entities SET deleted_at = ?1, updated_at = ?1 WHERE id = ?2 AND deleted_at IS NULL",
                params![now, id],
            )
            .map_err(db_error)?;
        if updated == 0 {
            return Err(TrackerError::EntityNotFound {
                kind: "entity".to_string(),
                id: id.to_string(),
            });
        }
        tracing::debug!(id, actor, "Soft-deleted entity");
        Ok(())
    }

    // ========================================================================
    // DISPLAY FORMATS
    // ========================================================================

    fn display_format(&self, kind: EntityKind) -> Result<Option<DisplayIdFormat>> {
        let conn = self.lock()?;
        let pattern: Option<String> = conn
            .query_row(
                "SELECT pattern FROM display_formats WHERE kind = ?1",
                [kind.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_error)?;
        pattern.map(|p| DisplayIdFormat::new(kind, p)).transpose()
    }

    fn set_display_format(&self, format: &DisplayIdFormat) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO display_formats (kind, pattern, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (kind) DO UPDATE SET pattern = excluded.pattern, updated_at = excluded.updated_at",
            params![format.kind.as_str(), format.pattern(), format_datetime(&Utc::now())],
        )
        .map_err(db_error)?;
        Ok(())
    }

    fn display_formats(&self) -> Result<Vec<DisplayIdFormat>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT kind, pattern FROM display_formats ORDER BY kind")
            .map_err(db_error)?;
        let rows = stmt
            .query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))
            .map_err(db_error)?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(db_error)?;

        rows.into_iter()
            .map(|(kind, pattern)| DisplayIdFormat::new(EntityKind::from_str(&kind)?, pattern))
            .collect()
    }
}

// ============================================================================
// QUERY COMPILATION
// ============================================================================

/// Compile a store query into a `WHERE` clause plus its positional parameters.
fn compile_query(query: &StoreQuery) -> (String, Vec<Box<dyn ToSql>>) {
    let mut params: Vec<Box<dyn ToSql>> = vec![Box::new(query.kind.as_str())];
    let mut sql = String::from("kind = ?");
    for predicate in &query.predicates {
        let clause = compile_predicate(predicate, &mut params);
        let _ = write!(sql, " AND {clause}");
    }
    (sql, params)
}

fn compile_predicate(predicate: &Predicate, params: &mut Vec<Box<dyn ToSql>>) -> String {
    match predicate {
        Predicate::Project(project) => {
            params.push(Box::new(project.clone()));
            "project_id = ?".to_string()
        }
        Predicate::NotDeleted => "deleted_at IS NULL".to_string(),
        Predicate::StatusIn(statuses) => {
            if statuses.is_empty() {
                return "0".to_string();
            }
            let placeholders: Vec<&str> = statuses.iter().map(|_| "?").collect();
            for status in statuses {
                params.push(Box::new(status.as_str().to_string()));
            }
            format!("status IN ({})", placeholders.join(","))
        }
        Predicate::StatusIs(status) => {
            params.push(Box::new(status.as_str().to_string()));
            "status = ?".to_string()
        }
        Predicate::StatusNot(status) => {
            params.push(Box::new(status.as_str().to_string()));
            "status <> ?".to_string()
        }
        Predicate::SeverityIs(severity) => {
            params.push(Box::new(severity.as_str()));
            "severity = ?".to_string()
        }
        Predicate::PriorityIs(priority) => {
            params.push(Box::new(priority.as_str()));
            "priority = ?".to_string()
        }
        Predicate::CreatedFrom(from) => {
            params.push(Box::new(format_datetime(from)));
            "created_at >= ?".to_string()
        }
        Predicate::CreatedTo(to) => {
            params.push(Box::new(format_datetime(to)));
            "created_at <= ?".to_string()
        }
        Predicate::OwnedBy(owner) => {
            params.push(Box::new(owner.clone()));
            "owner_id = ?".to_string()
        }
        Predicate::AssignedTo(assignee) => {
            params.push(Box::new(assignee.clone()));
            "assignee_id = ?".to_string()
        }
        Predicate::Search {
            needle,
            fields,
            custom_id,
        } => {
            let pattern = format!("%{}%", escape_like(&needle.to_lowercase()));
            let mut options = Vec::new();
            for field in fields {
                params.push(Box::new(pattern.clone()));
                options.push(format!("{LOWER_FN}({}) LIKE ? ESCAPE '\\'", search_column(*field)));
            }
            if let Some(id) = custom_id.and_then(|id| i64::try_from(id).ok()) {
                params.push(Box::new(id));
                options.push("custom_id = ?".to_string());
            }
            any_of(&options)
        }
        Predicate::Any(alternatives) => {
            let options: Vec<String> = alternatives
                .iter()
                .map(|p| compile_predicate(p, params))
                .collect();
            any_of(&options)
        }
        Predicate::Nothing => "0".to_string(),
    }
}

fn any_of(options: &[String]) -> String {
    if options.is_empty() {
        "0".to_string()
    } else {
        format!("({})", options.join(" OR "))
    }
}

fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        LOWER_FN,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let value: Option<String> = ctx.get(0)?;
            Ok(value.map(|s| s.to_lowercase()))
        },
    )
}

const fn search_column(field: SearchField) -> &'static str {
    match field {
        SearchField::Title => "title",
        SearchField::Description => "description",
        SearchField::OwnerName => "owner_name",
        SearchField::AssigneeName => "assignee_name",
        SearchField::GroupName => "group_name",
    }
}

fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

// ============================================================================
// ROW MAPPING
// ============================================================================

fn entity_from_row(row: &Row<'_>) -> rusqlite::Result<Entity> {
    let custom_id: i64 = row.get(3)?;
    Ok(Entity {
        id: row.get(0)?,
        kind: parsed_column(row, 1)?,
        project_id: row.get(2)?,
        custom_id: u64::try_from(custom_id).map_err(|e| conversion_error(3, Type::Integer, e))?,
        title: row.get(4)?,
        description: row.get(5)?,
        status: parsed_column(row, 6)?,
        severity: optional_parsed_column(row, 7)?,
        priority: optional_parsed_column(row, 8)?,
        owner_id: row.get(9)?,
        owner_name: row.get(10)?,
        assignee_id: row.get(11)?,
        assignee_name: row.get(12)?,
        group_id: row.get(13)?,
        group_name: row.get(14)?,
        steps: json_column(row, 15)?,
        test_data: json_column(row, 16)?,
        references: json_column(row, 17)?,
        attachments: json_column(row, 18)?,
        created_at: datetime_column(row, 19)?,
        updated_at: datetime_column(row, 20)?,
        deleted_at: match row.get::<_, Option<String>>(21)? {
            Some(raw) => Some(parse_datetime(&raw).map_err(|e| conversion_error(21, Type::Text, e))?),
            None => None,
        },
    })
}

fn conversion_error<E>(idx: usize, ty: Type, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, ty, Box::new(err))
}

fn parsed_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, Type::Text, e))
}

fn optional_parsed_column<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) if !raw.is_empty() => raw
            .parse()
            .map(Some)
            .map_err(|e| conversion_error(idx, Type::Text, e)),
        _ => Ok(None),
    }
}

fn json_column<T: DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, Type::Text, e))
}

fn datetime_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_datetime(&raw).map_err(|e| conversion_error(idx, Type::Text, e))
}

/// Fixed-width RFC 3339 so that text comparison orders chronologically.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_datetime(s: &str) -> std::result::Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|naive| Utc.from_utc_datetime(&naive)))
}

fn to_sql_int(value: u64, field: &str) -> Result<i64> {
    i64::try_from(value).map_err(|_| TrackerError::validation(field, "exceeds the storable range"))
}

/// Busy, locked and I/O failures are transient; anything else is a storage fault.
fn db_error(err: rusqlite::Error) -> TrackerError {
    let transient = matches!(
        &err,
        rusqlite::Error::SqliteFailure(e, _)
            if matches!(
                e.code,
                ErrorCode::DatabaseBusy
                    | ErrorCode::DatabaseLocked
                    | ErrorCode::CannotOpen
                    | ErrorCode::SystemIoFailure
                    | ErrorCode::DiskFull
                    | ErrorCode::ReadOnly
                    | ErrorCode::PermissionDenied
            )
    );
    tracing::debug!(error = %err, transient, "SQLite operation failed");
    if transient {
        TrackerError::unavailable(err)
    } else {
        TrackerError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qatrack_core::model::{DataItem, Role, Severity, Status, Step};
    use qatrack_core::{EntityDraft, ListingLimits, ListingRequest, create_entity, list};
    use std::collections::HashSet;
    use std::thread;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, SqliteStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::open_with_timeout(&dir.path().join("qatrack.db"), Some(5000)).unwrap();
        store.seed_default_formats().unwrap();
        (dir, store)
    }

    fn issue(store: &SqliteStore, title: &str, status: Status, actor: &str) -> Entity {
        let mut draft = EntityDraft::new(EntityKind::Issue, "p1", title);
        draft.status = Some(status);
        create_entity(store, draft, actor).unwrap()
    }

    #[test]
    fn test_counter_starts_at_one_and_increments() {
        let (_dir, store) = temp_store();
        assert_eq!(store.next_value(EntityKind::Issue, Some("p1")).unwrap(), 1);
        assert_eq!(store.next_value(EntityKind::Issue, Some("p1")).unwrap(), 2);
        assert_eq!(store.next_value(EntityKind::Issue, Some("p2")).unwrap(), 1);
        assert_eq!(store.next_value(EntityKind::Task, Some("p1")).unwrap(), 1);
        assert_eq!(store.next_value(EntityKind::Issue, None).unwrap(), 1);
    }

    #[test]
    fn test_counter_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("qatrack.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.next_value(EntityKind::Requirement, Some("p1")).unwrap();
            store.next_value(EntityKind::Requirement, Some("p1")).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.next_value(EntityKind::Requirement, Some("p1")).unwrap(), 3);
    }

    #[test]
    fn test_counter_exhaustion_is_distinct() {
        let (_dir, store) = temp_store();
        store
            .execute_raw(&format!(
                "INSERT INTO sequences (kind, scope, value) VALUES ('issue', 'p1', {MAX_SEQUENCE_VALUE})"
            ))
            .unwrap();
        let err = store.next_value(EntityKind::Issue, Some("p1")).unwrap_err();
        assert!(matches!(err, TrackerError::SequenceExhausted { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_concurrent_handles_never_share_a_value() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("qatrack.db");
        SqliteStore::open(&path).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let path = path.clone();
                thread::spawn(move || {
                    let store = SqliteStore::open_with_timeout(&path, Some(10_000)).unwrap();
                    (0..25)
                        .map(|_| store.next_value(EntityKind::Issue, Some("p1")).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for value in handle.join().unwrap() {
                assert!(seen.insert(value), "value {value} issued twice");
            }
        }
        assert_eq!(seen.len(), 100);
        assert_eq!(seen.iter().max(), Some(&100));
    }

    #[test]
    fn test_locked_database_is_unavailable_and_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("qatrack.db");
        let store = SqliteStore::open_with_timeout(&path, Some(0)).unwrap();

        let blocker = Connection::open(&path).unwrap();
        blocker.execute_batch("BEGIN IMMEDIATE;").unwrap();

        let err = create_entity(&store, EntityDraft::new(EntityKind::Issue, "p1", "Crash"), "u1").unwrap_err();
        assert!(matches!(err, TrackerError::StoreUnavailable(_)));
        assert!(err.is_retryable());

        blocker.execute_batch("ROLLBACK;").unwrap();
        let query = StoreQuery::new(EntityKind::Issue);
        assert_eq!(store.count(&query).unwrap(), 0);
    }

    #[test]
    fn test_entity_round_trips_through_row() {
        let (_dir, store) = temp_store();
        let mut draft = EntityDraft::new(EntityKind::TestCase, "p1", "Login works");
        draft.description = Some("Happy path".to_string());
        draft.steps = vec![Step {
            description: "Open".to_string(),
            expected: Some("Form".to_string()),
        }];
        draft.test_data = vec![DataItem {
            name: "user".to_string(),
            data_type: Some("string".to_string()),
            value: "alice".to_string(),
        }];
        draft.references = vec![3, 9];
        draft.group_name = Some("Auth".to_string());
        let created = create_entity(&store, draft, "u1").unwrap();

        let loaded = store.get(created.id).unwrap();
        assert_eq!(loaded, created);
        assert_eq!(
            store.find_by_custom_id(EntityKind::TestCase, "p1", 1).unwrap().map(|e| e.id),
            Some(created.id)
        );
    }

    #[test]
    fn test_duplicate_custom_id_is_rejected() {
        let (_dir, store) = temp_store();
        let first = issue(&store, "One", Status::Open, "u1");
        let mut copy = first.clone();
        copy.id = 0;
        let err = store.insert(copy).unwrap_err();
        assert!(matches!(err, TrackerError::DuplicateCustomId { custom_id: 1, .. }));
    }

    #[test]
    fn test_tester_listing_scenario() {
        let (_dir, store) = temp_store();
        issue(&store, "Visible open", Status::Open, "u2");
        issue(&store, "Own untriaged", Status::New, "u1");
        issue(&store, "Foreign untriaged", Status::New, "u2");

        let request = ListingRequest::new("p1", Role::Tester, "u1").page(0, 20);
        let page = list(&store, EntityKind::Issue, &request, &ListingLimits::default()).unwrap();
        assert_eq!(page.total, 2);
        let ids: Vec<&str> = page.items.iter().map(|l| l.display_id.as_str()).collect();
        assert_eq!(ids, vec!["BUG-2", "BUG-1"]);

        let request = ListingRequest::new("p1", Role::Client, "u9");
        let page = list(&store, EntityKind::Issue, &request, &ListingLimits::default()).unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0].entity.title, "Visible open");
    }

    #[test]
    fn test_pagination_window_and_total() {
        let (_dir, store) = temp_store();
        for n in 0..5 {
            issue(&store, &format!("Issue {n}"), Status::Open, "u1");
        }
        let request = ListingRequest::new("p1", Role::Admin, "u1").page(3, 2);
        let page = list(&store, EntityKind::Issue, &request, &ListingLimits::default()).unwrap();
        assert_eq!(page.total, 5);
        let titles: Vec<&str> = page.items.iter().map(|l| l.entity.title.as_str()).collect();
        assert_eq!(titles, vec!["Issue 1", "Issue 0"]);
    }

    #[test]
    fn test_search_compiles_like_memory_filter() {
        let (_dir, store) = temp_store();
        issue(&store, "Checkout 100% broken", Status::Open, "u1");
        issue(&store, "Login timeout", Status::Open, "u1");
        issue(&store, "Checkout 1000 items", Status::Open, "u1");

        let search = |needle: &str| {
            let mut request = ListingRequest::new("p1", Role::Admin, "u1");
            request.search = Some(needle.to_string());
            list(&store, EntityKind::Issue, &request, &ListingLimits::default()).unwrap()
        };
        assert_eq!(search("LOGIN").total, 1);
        assert_eq!(search("100%").total, 1);
        assert_eq!(search("checkout").total, 2);
        let by_id = search("bug-2");
        assert_eq!(by_id.total, 1);
        assert_eq!(by_id.items[0].entity.title, "Login timeout");
    }

    #[test]
    fn test_search_folds_non_ascii_case() {
        let (_dir, store) = temp_store();
        issue(&store, "ÉCHEC du paiement", Status::Open, "u1");
        issue(&store, "Straße gesperrt", Status::Open, "u1");

        let search = |needle: &str| {
            let mut request = ListingRequest::new("p1", Role::Admin, "u1");
            request.search = Some(needle.to_string());
            list(&store, EntityKind::Issue, &request, &ListingLimits::default()).unwrap().total
        };
        assert_eq!(search("ÉCHEC"), 1);
        assert_eq!(search("échec"), 1);
        assert_eq!(search("Échec DU"), 1);
        assert_eq!(search("STRASSE"), 0);
        assert_eq!(search("STRAßE"), 1);
    }

    #[test]
    fn test_structured_filters() {
        let (_dir, store) = temp_store();
        let mut draft = EntityDraft::new(EntityKind::Issue, "p1", "Severe");
        draft.severity = Some(Severity::Critical);
        draft.status = Some(Status::Open);
        create_entity(&store, draft, "u1").unwrap();
        issue(&store, "Mild", Status::Closed, "u1");

        let mut request = ListingRequest::new("p1", Role::Admin, "u1");
        request.severity = Some(Severity::Critical);
        assert_eq!(list(&store, EntityKind::Issue, &request, &ListingLimits::default()).unwrap().total, 1);

        let mut request = ListingRequest::new("p1", Role::Admin, "u1");
        request.status = vec![Status::Closed, Status::Verified];
        let page = list(&store, EntityKind::Issue, &request, &ListingLimits::default()).unwrap();
        assert_eq!(page.items[0].entity.title, "Mild");

        let mut request = ListingRequest::new("p1", Role::Admin, "u1");
        request.date_from = Some(Utc::now() + chrono::Duration::days(1));
        assert_eq!(list(&store, EntityKind::Issue, &request, &ListingLimits::default()).unwrap().total, 0);
    }

    #[test]
    fn test_soft_delete_hides_but_keeps_custom_id() {
        let (_dir, store) = temp_store();
        let first = issue(&store, "Gone", Status::Open, "u1");
        store.soft_delete(first.id, "u1").unwrap();
        let second = issue(&store, "Next", Status::Open, "u1");
        assert_eq!(second.custom_id, 2);

        let request = ListingRequest::new("p1", Role::Admin, "u1");
        let page = list(&store, EntityKind::Issue, &request, &ListingLimits::default()).unwrap();
        assert_eq!(page.total, 1);
        assert!(store.find_by_custom_id(EntityKind::Issue, "p1", 1).unwrap().is_none());
        assert!(matches!(
            store.soft_delete(first.id, "u1"),
            Err(TrackerError::EntityNotFound { .. })
        ));
    }

    #[test]
    fn test_display_formats_persist() {
        let (_dir, store) = temp_store();
        assert_eq!(store.seed_default_formats().unwrap(), 0);
        assert_eq!(store.display_formats().unwrap().len(), EntityKind::ALL.len());

        let custom = DisplayIdFormat::new(EntityKind::Requirement, "RQ-{customId}-R").unwrap();
        store.set_display_format(&custom).unwrap();
        assert_eq!(store.display_format(EntityKind::Requirement).unwrap(), Some(custom));
        assert_eq!(store.display_ids().unwrap().format(EntityKind::Requirement, 4), "RQ-4-R");
    }

    #[test]
    fn test_find_group_by_title() {
        let (_dir, store) = temp_store();
        let suite = create_entity(&store, EntityDraft::new(EntityKind::TestSuite, "p1", "Auth"), "u1").unwrap();
        assert_eq!(
            store.find_group("p1", EntityKind::TestSuite, "Auth").unwrap().map(|e| e.id),
            Some(suite.id)
        );
        assert!(store.find_group("p2", EntityKind::TestSuite, "Auth").unwrap().is_none());
    }

    #[test]
    fn test_like_escape() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }
}
