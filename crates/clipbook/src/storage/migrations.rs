//! Database migration system for clipbook.
//!
//! This module handles database schema versioning and migrations,
//! ensuring the database schema stays up-to-date as the application evolves.

use chrono::{NaiveDateTime, TimeZone, Utc};
use rusqlite::{params, Connection};
use tracing::{info, warn};

use crate::entry::{compute_hash, format_timestamp, EntryKind};
use crate::error::{Error, Result};

use super::schema::SCHEMA_STATEMENTS;

/// The current schema version.
pub const CURRENT_VERSION: i32 = 2;

/// Key used to store the schema version in the metadata table.
const VERSION_KEY: &str = "schema_version";

/// Table written by earlier releases: `clipboard(id, type, content, timestamp)`.
const LEGACY_TABLE: &str = "clipboard";

/// Initialize the database schema.
///
/// Creates all tables and indexes if they don't exist, then runs any
/// pending migrations to bring the schema up to the current version.
///
/// # Errors
///
/// Returns an error if schema creation or migration fails.
pub fn initialize_schema(conn: &Connection) -> Result<()> {
    for statement in SCHEMA_STATEMENTS {
        conn.execute(statement, [])?;
    }

    let version = get_schema_version(conn)?;
    if version > CURRENT_VERSION {
        return Err(Error::DatabaseMigration {
            message: format!(
                "database schema version {version} is newer than supported version {CURRENT_VERSION}"
            ),
        });
    }
    if version < CURRENT_VERSION {
        run_migrations(conn, version)?;
    }

    Ok(())
}

/// Get the current schema version from the database.
///
/// Returns 0 if no version is set (fresh database).
fn get_schema_version(conn: &Connection) -> Result<i32> {
    let result: std::result::Result<String, rusqlite::Error> = conn.query_row(
        "SELECT value FROM metadata WHERE key = ?1",
        [VERSION_KEY],
        |row| row.get(0),
    );

    match result {
        Ok(value) => value.parse().map_err(|_| Error::DatabaseMigration {
            message: format!("invalid schema version: {value}"),
        }),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(0),
        Err(e) => Err(e.into()),
    }
}

/// Set the schema version in the database.
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
        (VERSION_KEY, version.to_string()),
    )?;
    Ok(())
}

/// Run migrations from the given version to the current version.
fn run_migrations(conn: &Connection, from_version: i32) -> Result<()> {
    let mut current = from_version;

    while current < CURRENT_VERSION {
        current += 1;
        run_migration(conn, current)?;
    }

    set_schema_version(conn, CURRENT_VERSION)?;
    Ok(())
}

/// Run a specific migration version.
fn run_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        2 => migrate_v2(conn),
        _ => Err(Error::DatabaseMigration {
            message: format!("unknown migration version: {version}"),
        }),
    }
}

/// Migration to version 1 (initial schema).
///
/// Version 1 is the base schema created by `SCHEMA_STATEMENTS`.
fn migrate_v1(conn: &Connection) -> Result<()> {
    set_schema_version(conn, 1)?;
    Ok(())
}

/// Migration to version 2: import rows from the legacy `clipboard` table.
///
/// The legacy table is left in place. Rows with an unknown type are skipped.
fn migrate_v2(conn: &Connection) -> Result<()> {
    let legacy_exists: i32 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [LEGACY_TABLE],
        |row| row.get(0),
    )?;

    if legacy_exists > 0 {
        let tx = conn.unchecked_transaction()?;
        let rows: Vec<(String, String, Option<String>)> = {
            let mut stmt =
                tx.prepare("SELECT type, content, timestamp FROM clipboard ORDER BY id ASC")?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows
        };

        let mut imported = 0usize;
        for (kind, content, timestamp) in rows {
            let Some(kind) = EntryKind::parse(&kind) else {
                warn!(kind = %kind, "Skipping legacy row with unknown type");
                continue;
            };
            let hash = match kind {
                EntryKind::Text => compute_hash(content.as_bytes()),
                // Legacy image rows only carry a path; hash the file if it is still there
                EntryKind::Image => std::fs::read(&content)
                    .map_or_else(|_| compute_hash(content.as_bytes()), |bytes| compute_hash(&bytes)),
            };
            let timestamp = timestamp
                .as_deref()
                .and_then(parse_legacy_timestamp)
                .unwrap_or_else(Utc::now);
            tx.execute(
                "INSERT INTO entries (kind, content, content_hash, timestamp) VALUES (?1, ?2, ?3, ?4)",
                params![kind.as_str(), content, hash, format_timestamp(&timestamp)],
            )?;
            imported += 1;
        }
        tx.commit()?;
        info!(imported, "Imported legacy clipboard history");
    }

    set_schema_version(conn, 2)?;
    Ok(())
}

/// Parse SQLite's `CURRENT_TIMESTAMP` format (UTC, no zone).
fn parse_legacy_timestamp(value: &str) -> Option<chrono::DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .map(|dt| Utc.from_utc_datetime(&dt))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_db() -> Connection {
        Connection::open_in_memory().expect("failed to create in-memory database")
    }

    fn create_legacy_table(conn: &Connection) {
        conn.execute_batch(
            r"
            CREATE TABLE clipboard (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                type TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
            );
            INSERT INTO clipboard (type, content, timestamp) VALUES ('text', 'first', '2024-03-01 08:30:00');
            INSERT INTO clipboard (type, content, timestamp) VALUES ('image', '/gone/1_abc.png', '2024-03-02 09:00:00');
            INSERT INTO clipboard (type, content, timestamp) VALUES ('audio', 'x', '2024-03-03 10:00:00');
            ",
        )
        .unwrap();
    }

    #[test]
    fn test_initialize_schema_creates_tables() {
        let conn = create_test_db();
        initialize_schema(&conn).expect("failed to initialize schema");

        for table in ["entries", "metadata"] {
            let count: i32 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name=?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(count, 1, "missing table {table}");
        }
    }

    #[test]
    fn test_initialize_schema_sets_version() {
        let conn = create_test_db();
        initialize_schema(&conn).expect("failed to initialize schema");
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_initialize_schema_idempotent() {
        let conn = create_test_db();
        initialize_schema(&conn).expect("first init failed");
        initialize_schema(&conn).expect("second init failed");
        assert_eq!(get_schema_version(&conn).unwrap(), CURRENT_VERSION);
    }

    #[test]
    fn test_get_schema_version_fresh_db() {
        let conn = create_test_db();
        conn.execute(
            "CREATE TABLE metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )
        .unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 0);
    }

    #[test]
    fn test_set_and_get_schema_version() {
        let conn = create_test_db();
        conn.execute(
            "CREATE TABLE metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )
        .unwrap();

        set_schema_version(&conn, 42).unwrap();
        assert_eq!(get_schema_version(&conn).unwrap(), 42);
    }

    #[test]
    fn test_newer_schema_rejected() {
        let conn = create_test_db();
        initialize_schema(&conn).unwrap();
        set_schema_version(&conn, CURRENT_VERSION + 1).unwrap();

        let err = initialize_schema(&conn).unwrap_err();
        assert!(err.to_string().contains("newer than supported"));
    }

    #[test]
    fn test_run_migration_unknown_version() {
        let conn = create_test_db();
        initialize_schema(&conn).unwrap();

        let err = run_migration(&conn, 999).unwrap_err();
        assert!(err.to_string().contains("unknown migration version"));
    }

    #[test]
    fn test_indexes_created() {
        let conn = create_test_db();
        initialize_schema(&conn).expect("failed to initialize schema");

        let indexes: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index' AND tbl_name='entries'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(std::result::Result::ok)
            .collect();

        assert!(indexes.iter().any(|n| n.contains("timestamp")));
        assert!(indexes.iter().any(|n| n.contains("hash")));
        assert!(indexes.iter().any(|n| n.contains("kind")));
    }

    #[test]
    fn test_legacy_history_imported() {
        let conn = create_test_db();
        create_legacy_table(&conn);
        initialize_schema(&conn).unwrap();

        let rows: Vec<(String, String, String, String)> = conn
            .prepare("SELECT kind, content, content_hash, timestamp FROM entries ORDER BY id")
            .unwrap()
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, "text");
        assert_eq!(rows[0].1, "first");
        assert_eq!(rows[0].2, compute_hash(b"first"));
        assert_eq!(rows[0].3, "2024-03-01T08:30:00.000000Z");
        assert_eq!(rows[1].0, "image");
        assert_eq!(rows[1].1, "/gone/1_abc.png");

        // The legacy table is untouched
        let legacy: i32 = conn
            .query_row("SELECT COUNT(*) FROM clipboard", [], |row| row.get(0))
            .unwrap();
        assert_eq!(legacy, 3);
    }

    #[test]
    fn test_legacy_import_runs_once() {
        let conn = create_test_db();
        create_legacy_table(&conn);
        initialize_schema(&conn).unwrap();
        initialize_schema(&conn).unwrap();

        let count: i32 = conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_parse_legacy_timestamp() {
        let ts = parse_legacy_timestamp("2024-03-01 08:30:00").unwrap();
        assert_eq!(format_timestamp(&ts), "2024-03-01T08:30:00.000000Z");
        assert!(parse_legacy_timestamp("2024-03-01 08:30:00.250").is_some());
        assert!(parse_legacy_timestamp("yesterday").is_none());
    }
}
