//! `SQLite` schema definitions for clipbook.
//!
//! This module contains the SQL statements for creating and managing
//! the database schema.

/// SQL statement to create the history table.
pub const CREATE_ENTRIES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS entries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    kind TEXT NOT NULL,
    content TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
)
";

/// Index on timestamp for newest-first listing and age-based cleanup.
pub const CREATE_TIMESTAMP_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_entries_timestamp ON entries(timestamp DESC)
";

/// Index on `content_hash` for merging repeated copies.
pub const CREATE_HASH_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_entries_hash ON entries(content_hash)
";

/// Index on `kind` for filtering.
pub const CREATE_KIND_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_entries_kind ON entries(kind)
";

/// SQL statement to create the metadata table for storing key-value pairs.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

/// All schema creation statements in order.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    CREATE_ENTRIES_TABLE,
    CREATE_TIMESTAMP_INDEX,
    CREATE_HASH_INDEX,
    CREATE_KIND_INDEX,
    CREATE_METADATA_TABLE,
];
