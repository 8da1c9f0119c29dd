//! The clipboard history service.
//!
//! [`History`] ties the database to the image directory and implements the
//! user-facing rules: repeated text moves to the top instead of piling up,
//! images are kept as files, and deleting an entry releases its file.

use std::path::Path;

use chrono::{DateTime, Days, Local, NaiveTime, Utc};
use tracing::{debug, info};

use crate::config::Config;
use crate::entry::{ClipboardContent, Entry, EntryKind};
use crate::error::{Error, Result};
use crate::images::ImageStore;
use crate::monitor::ClipboardSource;
use crate::storage::{Storage, StorageStats};

/// Clipboard history backed by `SQLite` and an image directory.
#[derive(Debug)]
pub struct History {
    storage: Storage,
    images: ImageStore,
}

impl History {
    /// Combine an open database and image store.
    #[must_use]
    pub fn new(storage: Storage, images: ImageStore) -> Self {
        Self { storage, images }
    }

    /// Open the history at the locations named by `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database or image directory cannot be opened.
    pub fn open(config: &Config) -> Result<Self> {
        let storage = Storage::open(config.database_path())?;
        let images = ImageStore::new(config.images_dir())?;
        Ok(Self::new(storage, images))
    }

    /// The underlying database.
    #[must_use]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// The image store.
    #[must_use]
    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    /// Record new clipboard content.
    ///
    /// Text replaces every stored copy of the same text, so it reappears
    /// at the top with a fresh timestamp. Images are always added as new
    /// files, unless the newest entry is already the same image.
    ///
    /// Returns the stored entry, or `None` when the content was skipped.
    ///
    /// # Errors
    ///
    /// Returns an error if the database or image file cannot be written.
    pub fn record(&self, content: &ClipboardContent) -> Result<Option<Entry>> {
        let mut entry = match content {
            ClipboardContent::Text(text) => {
                let mut entry = Entry::text(text.clone());
                let (id, merged) = self.storage.replace_text(&entry)?;
                if merged > 0 {
                    debug!(merged, "Merged repeated text");
                }
                entry.id = Some(id);
                info!(id, kind = %entry.kind, "Recorded clipboard entry");
                return Ok(Some(entry));
            }
            ClipboardContent::Image(image) => {
                let hash = content.hash();
                if let Some(latest) = self.storage.latest()? {
                    if latest.is_image() && latest.content_hash == hash {
                        debug!(hash = %hash, "Image matches newest entry, skipping");
                        return Ok(None);
                    }
                }
                let timestamp = Utc::now();
                let path = self.images.save(&image.png, &hash, &timestamp)?;
                let mut entry = Entry::image(&path, hash);
                entry.timestamp = timestamp;
                entry
            }
        };

        let id = self.storage.insert(&entry)?;
        entry.id = Some(id);
        info!(id, kind = %entry.kind, "Recorded clipboard entry");
        Ok(Some(entry))
    }

    /// List entries newest first, optionally of one kind.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn list(&self, limit: usize, kind: Option<EntryKind>) -> Result<Vec<Entry>> {
        match kind {
            Some(kind) => self.storage.list_by_kind(kind, limit),
            None => self.storage.list(limit),
        }
    }

    /// Case-insensitive substring search over text entries.
    ///
    /// A non-empty query never matches images, even one of only spaces,
    /// which matches text containing a space. An empty query lists
    /// everything.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<Entry>> {
        if query.is_empty() {
            return self.storage.list(limit);
        }

        let needle = query.to_lowercase();
        let matches = self
            .storage
            .list_by_kind(EntryKind::Text, usize::MAX)?
            .into_iter()
            .filter(|entry| entry.content.to_lowercase().contains(&needle))
            .take(limit)
            .collect();
        Ok(matches)
    }

    /// Get an entry by id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntryNotFound`] for an unknown id.
    pub fn get(&self, id: i64) -> Result<Entry> {
        self.storage.get(id)?.ok_or(Error::EntryNotFound { id })
    }

    /// Replace the text of a text entry.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown ids and image entries.
    pub fn update_text(&self, id: i64, content: &str) -> Result<Entry> {
        self.storage.update_text(id, content)?;
        self.get(id)
    }

    /// Delete an entry and, for images, its file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::EntryNotFound`] for an unknown id.
    pub fn delete(&self, id: i64) -> Result<Entry> {
        let entry = self.storage.delete(id)?.ok_or(Error::EntryNotFound { id })?;
        self.release_image(&entry)?;
        Ok(entry)
    }

    /// Delete every entry and image file. Returns the number of entries.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn clear(&self) -> Result<usize> {
        let removed = self.storage.clear()?;
        for entry in &removed {
            self.release_image(entry)?;
        }
        Ok(removed.len())
    }

    /// Delete entries recorded before local midnight `days` days ago.
    ///
    /// Returns the number of entries removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub fn clean_older_than_days(&self, days: u32) -> Result<usize> {
        let cutoff = cleanup_cutoff(days, Local::now());
        let removed = self.storage.delete_before(cutoff)?;
        for entry in &removed {
            self.release_image(entry)?;
        }
        info!(days, count = removed.len(), "Cleaned old history");
        Ok(removed.len())
    }

    /// Read the PNG bytes behind an image entry.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown ids, text entries and missing files.
    pub fn image_bytes(&self, id: i64) -> Result<Vec<u8>> {
        let entry = self.get(id)?;
        let path = entry.image_path().ok_or_else(|| Error::InvalidEdit {
            id,
            message: "entry is text, not an image".to_string(),
        })?;
        ImageStore::load(&path)
    }

    /// Put an entry back on the clipboard.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown ids, missing image files, or clipboard
    /// failures.
    pub fn copy_to_clipboard(&self, id: i64, clipboard: &impl ClipboardSource) -> Result<Entry> {
        let entry = self.get(id)?;
        match entry.kind {
            EntryKind::Text => clipboard.write_text(&entry.content)?,
            EntryKind::Image => {
                let png = ImageStore::load(Path::new(&entry.content))?;
                clipboard.write_image(&png)?;
            }
        }
        debug!(id, kind = %entry.kind, "Copied entry to clipboard");
        Ok(entry)
    }

    /// Remove the file behind a deleted image entry.
    ///
    /// Two captures of the same image within one second share a file name,
    /// so the file stays while another entry still points at it.
    fn release_image(&self, entry: &Entry) -> Result<()> {
        if let Some(path) = entry.image_path() {
            if self.storage.count_image_references(&entry.content)? == 0 {
                ImageStore::remove(&path);
            }
        }
        Ok(())
    }

    /// Database statistics.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub fn stats(&self) -> Result<StorageStats> {
        self.storage.stats()
    }
}

/// Local midnight `days` days before `now`, in UTC.
#[must_use]
pub fn cleanup_cutoff(days: u32, now: DateTime<Local>) -> DateTime<Utc> {
    let date = now
        .date_naive()
        .checked_sub_days(Days::new(u64::from(days)))
        .unwrap_or(chrono::NaiveDate::MIN);
    let midnight = date.and_time(NaiveTime::MIN);
    midnight
        .and_local_timezone(Local)
        .earliest()
        // A DST gap at midnight; fall back to reading the wall time as UTC
        .map_or_else(|| midnight.and_utc(), |dt| dt.with_timezone(&Utc))
}
