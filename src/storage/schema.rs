//! Database schema for the SQLite store.

use rusqlite::Connection;

/// Canonical schema. Every statement is idempotent.
pub const SCHEMA: &str = r"
-- Tracked entities of every kind
CREATE TABLE IF NOT EXISTS entities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    project_id TEXT NOT NULL,
    custom_id INTEGER NOT NULL CHECK (custom_id >= 1),
    title TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL,
    severity TEXT,
    priority TEXT,
    owner_id TEXT NOT NULL,
    owner_name TEXT,
    assignee_id TEXT,
    assignee_name TEXT,
    group_id INTEGER,
    group_name TEXT,
    steps TEXT NOT NULL DEFAULT '[]',
    test_data TEXT NOT NULL DEFAULT '[]',
    refs TEXT NOT NULL DEFAULT '[]',
    attachments TEXT NOT NULL DEFAULT '[]',
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT,
    UNIQUE (kind, project_id, custom_id)
);

CREATE INDEX IF NOT EXISTS idx_entities_listing
    ON entities (kind, project_id, created_at DESC, id DESC);

-- One counter per (kind, scope); '' is the global scope
CREATE TABLE IF NOT EXISTS sequences (
    kind TEXT NOT NULL,
    scope TEXT NOT NULL DEFAULT '',
    value INTEGER NOT NULL CHECK (value >= 1),
    PRIMARY KEY (kind, scope)
);

-- Display ID pattern per kind
CREATE TABLE IF NOT EXISTS display_formats (
    kind TEXT PRIMARY KEY,
    pattern TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// Apply the schema to `conn`.
///
/// # Errors
///
/// Returns an error if any statement fails.
pub fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();
        apply_schema(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table'
                 AND name IN ('entities', 'sequences', 'display_formats')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }
}
