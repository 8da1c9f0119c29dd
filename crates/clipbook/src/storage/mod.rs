//! Storage layer for clipbook.
//!
//! This module provides `SQLite`-based persistent storage for the clipboard
//! history: insertion, newest-first listing, in-place text edits, merging of
//! repeated text, and age-based cleanup.

pub mod migrations;
pub mod schema;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

use crate::entry::{compute_hash, format_timestamp, parse_timestamp, Entry, EntryKind};
use crate::error::{Error, Result};

/// Columns selected for every entry query, in `row_to_entry` order.
const ENTRY_COLUMNS: &str = "id, kind, content, content_hash, timestamp";

/// Storage engine for the clipboard history.
#[derive(Debug)]
pub struct Storage {
    /// Path to the database file.
    path: PathBuf,
    /// Database connection.
    conn: Connection,
}

impl Storage {
    /// Open or create a storage database at the given path.
    ///
    /// Creates the parent directories and database file if they don't exist.
    /// Initializes the schema if this is a new database.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or schema initialization fails.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        debug!("Opening database at {}", path.display());
        let conn = Connection::open(&path).map_err(|source| Error::DatabaseOpen {
            path: path.clone(),
            source,
        })?;

        // WAL lets CLI readers run while the recorder writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        migrations::initialize_schema(&conn)?;

        info!("Database opened successfully at {}", path.display());
        Ok(Self { path, conn })
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|source| Error::DatabaseOpen {
            path: PathBuf::from(":memory:"),
            source,
        })?;

        migrations::initialize_schema(&conn)?;

        Ok(Self {
            path: PathBuf::from(":memory:"),
            conn,
        })
    }

    /// Get the path to the database file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert an entry and return its assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn insert(&self, entry: &Entry) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO entries (kind, content, content_hash, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.kind.as_str(),
                entry.content,
                entry.content_hash,
                format_timestamp(&entry.timestamp),
            ],
        )?;

        let id = self.conn.last_insert_rowid();
        debug!(id, kind = %entry.kind, "Inserted entry");
        Ok(id)
    }

    /// Get an entry by its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn get(&self, id: i64) -> Result<Option<Entry>> {
        let entry = self
            .conn
            .query_row(
                &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE id = ?1"),
                [id],
                Self::row_to_entry,
            )
            .optional()?;
        Ok(entry)
    }

    /// Get the most recent entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list(&self, limit: usize) -> Result<Vec<Entry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries ORDER BY timestamp DESC, id DESC LIMIT ?1"
        ))?;

        let entries = stmt
            .query_map([to_sql_limit(limit)], Self::row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Get the most recent entries of one kind, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn list_by_kind(&self, kind: EntryKind, limit: usize) -> Result<Vec<Entry>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ENTRY_COLUMNS} FROM entries WHERE kind = ?1 \
             ORDER BY timestamp DESC, id DESC LIMIT ?2"
        ))?;

        let entries = stmt
            .query_map(params![kind.as_str(), to_sql_limit(limit)], Self::row_to_entry)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Get the newest entry, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn latest(&self) -> Result<Option<Entry>> {
        Ok(self.list(1)?.into_iter().next())
    }

    /// Replace the text of a text entry.
    ///
    /// The content hash is recomputed; the timestamp is left alone so the
    /// entry keeps its place in the history.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntryNotFound`] for an unknown id and
    /// [`Error::InvalidEdit`] for image entries.
    pub fn update_text(&self, id: i64, content: &str) -> Result<()> {
        let entry = self.get(id)?.ok_or(Error::EntryNotFound { id })?;
        if !entry.is_text() {
            return Err(Error::InvalidEdit {
                id,
                message: "image entries cannot be edited as text".to_string(),
            });
        }

        self.conn.execute(
            "UPDATE entries SET content = ?1, content_hash = ?2 WHERE id = ?3",
            params![content, compute_hash(content.as_bytes()), id],
        )?;
        debug!(id, "Updated entry text");
        Ok(())
    }

    /// Delete an entry by id, returning it if it existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete(&self, id: i64) -> Result<Option<Entry>> {
        let Some(entry) = self.get(id)? else {
            return Ok(None);
        };
        self.conn.execute("DELETE FROM entries WHERE id = ?1", [id])?;
        debug!(id, "Deleted entry");
        Ok(Some(entry))
    }

    /// Insert a text entry in place of every stored copy of its text.
    ///
    /// Both steps run in one transaction, so a failed insert keeps the old
    /// copies. Returns the new id and the number of copies replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry is not text or the database operation
    /// fails.
    pub fn replace_text(&self, entry: &Entry) -> Result<(i64, usize)> {
        if !entry.is_text() {
            return Err(Error::internal("replace_text called with an image entry"));
        }

        let tx = self.conn.unchecked_transaction()?;
        // The hash narrows the search through its index; content equality guards collisions
        let replaced = tx.execute(
            "DELETE FROM entries WHERE kind = 'text' AND content_hash = ?1 AND content = ?2",
            params![entry.content_hash, entry.content],
        )?;
        tx.execute(
            "INSERT INTO entries (kind, content, content_hash, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![
                entry.kind.as_str(),
                entry.content,
                entry.content_hash,
                format_timestamp(&entry.timestamp),
            ],
        )?;
        let id = tx.last_insert_rowid();
        tx.commit()?;

        debug!(id, replaced, "Replaced text entry");
        Ok((id, replaced))
    }

    /// Delete every entry recorded strictly before `cutoff`.
    ///
    /// Returns the removed entries so callers can release image files.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<Vec<Entry>> {
        let cutoff_str = format_timestamp(&cutoff);
        let tx = self.conn.unchecked_transaction()?;

        let removed = {
            let mut stmt = tx.prepare(&format!(
                "SELECT {ENTRY_COLUMNS} FROM entries WHERE timestamp < ?1"
            ))?;
            let removed = stmt
                .query_map([&cutoff_str], Self::row_to_entry)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            removed
        };
        tx.execute("DELETE FROM entries WHERE timestamp < ?1", [&cutoff_str])?;
        tx.commit()?;

        if !removed.is_empty() {
            info!(count = removed.len(), cutoff = %cutoff_str, "Deleted old entries");
        }
        Ok(removed)
    }

    /// Delete every entry, returning what was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn clear(&self) -> Result<Vec<Entry>> {
        let tx = self.conn.unchecked_transaction()?;
        let removed = {
            let mut stmt = tx.prepare(&format!("SELECT {ENTRY_COLUMNS} FROM entries"))?;
            let removed = stmt
                .query_map([], Self::row_to_entry)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            removed
        };
        tx.execute("DELETE FROM entries", [])?;
        tx.commit()?;

        info!(count = removed.len(), "Cleared history");
        Ok(removed)
    }

    /// Count all entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count(&self) -> Result<i64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Count entries of one kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_by_kind(&self, kind: EntryKind) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE kind = ?1",
            [kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Count image entries whose file path is `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn count_image_references(&self, path: &str) -> Result<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE kind = 'image' AND content = ?1",
            [path],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Get database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn stats(&self) -> Result<StorageStats> {
        let (oldest, newest): (Option<String>, Option<String>) = self.conn.query_row(
            "SELECT MIN(timestamp), MAX(timestamp) FROM entries",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        let db_size_bytes = if self.path.to_string_lossy() == ":memory:" {
            0
        } else {
            std::fs::metadata(&self.path).map(|m| m.len()).unwrap_or(0)
        };

        Ok(StorageStats {
            total_entries: self.count()?,
            text_entries: self.count_by_kind(EntryKind::Text)?,
            image_entries: self.count_by_kind(EntryKind::Image)?,
            oldest_entry: oldest.as_deref().and_then(parse_timestamp),
            newest_entry: newest.as_deref().and_then(parse_timestamp),
            db_size_bytes,
        })
    }

    /// Convert a database row to an Entry.
    fn row_to_entry(row: &rusqlite::Row) -> rusqlite::Result<Entry> {
        let id: i64 = row.get(0)?;
        let kind_str: String = row.get(1)?;
        let content: String = row.get(2)?;
        let content_hash: String = row.get(3)?;
        let timestamp_str: String = row.get(4)?;

        let timestamp = parse_timestamp(&timestamp_str).unwrap_or_else(|| {
            warn!(id, timestamp = %timestamp_str, "Unparseable timestamp, using now");
            Utc::now()
        });

        let kind = EntryKind::parse(&kind_str).unwrap_or_else(|| {
            warn!(id, kind = %kind_str, "Unknown entry kind, treating as text");
            EntryKind::Text
        });

        Ok(Entry {
            id: Some(id),
            kind,
            content,
            content_hash,
            timestamp,
        })
    }
}

fn to_sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

/// Statistics about the storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageStats {
    /// Total number of entries.
    pub total_entries: i64,
    /// Number of text entries.
    pub text_entries: i64,
    /// Number of image entries.
    pub image_entries: i64,
    /// Timestamp of the oldest entry.
    pub oldest_entry: Option<DateTime<Utc>>,
    /// Timestamp of the newest entry.
    pub newest_entry: Option<DateTime<Utc>>,
    /// Size of the database file in bytes.
    pub db_size_bytes: u64,
}
