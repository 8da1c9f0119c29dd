//! Core history types for clipbook.
//!
//! This module defines the records kept in the clipboard history and the
//! raw content the monitor pulls off the system clipboard.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// What kind of content a history entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Plain text copied to the clipboard.
    Text,
    /// A bitmap copied to the clipboard, stored as a PNG file.
    Image,
}

impl EntryKind {
    /// The name stored in the database.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
        }
    }

    /// Parse a stored kind name.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "image" => Some(Self::Image),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One record of the clipboard history.
///
/// For text entries `content` is the text itself. For image entries it is
/// the path of the PNG file in the image store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Unique identifier (assigned by storage layer).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,

    /// Content kind.
    pub kind: EntryKind,

    /// Text content, or image file path.
    pub content: String,

    /// BLAKE3 hash of the text or of the PNG bytes.
    pub content_hash: String,

    /// When the entry was recorded.
    pub timestamp: DateTime<Utc>,
}

impl Entry {
    /// Create a text entry stamped now.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        let content = content.into();
        let content_hash = compute_hash(content.as_bytes());
        Self {
            id: None,
            kind: EntryKind::Text,
            content,
            content_hash,
            timestamp: Utc::now(),
        }
    }

    /// Create an image entry for a stored PNG file.
    #[must_use]
    pub fn image(path: &Path, content_hash: impl Into<String>) -> Self {
        Self {
            id: None,
            kind: EntryKind::Image,
            content: path.to_string_lossy().into_owned(),
            content_hash: content_hash.into(),
            timestamp: Utc::now(),
        }
    }

    /// Check if this is a text entry.
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.kind == EntryKind::Text
    }

    /// Check if this is an image entry.
    #[must_use]
    pub fn is_image(&self) -> bool {
        self.kind == EntryKind::Image
    }

    /// Path of the image file, for image entries.
    #[must_use]
    pub fn image_path(&self) -> Option<PathBuf> {
        self.is_image().then(|| PathBuf::from(&self.content))
    }

    /// A single-line summary of at most `max_chars` characters.
    ///
    /// Whitespace runs (including newlines) collapse to one space. Images
    /// show their file name.
    #[must_use]
    pub fn preview(&self, max_chars: usize) -> String {
        let source = match self.kind {
            EntryKind::Text => self.content.clone(),
            EntryKind::Image => {
                let name = Path::new(&self.content)
                    .file_name()
                    .map_or_else(|| self.content.clone(), |n| n.to_string_lossy().into_owned());
                format!("[image] {name}")
            }
        };
        let collapsed = source.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.chars().count() <= max_chars {
            collapsed
        } else {
            let mut short: String = collapsed.chars().take(max_chars.saturating_sub(1)).collect();
            short.push('…');
            short
        }
    }
}

/// A PNG image pulled off the clipboard.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageData {
    /// PNG-encoded bytes.
    pub png: Vec<u8>,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl std::fmt::Debug for ImageData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageData")
            .field("png_len", &self.png.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// Content read from the system clipboard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardContent {
    /// Text content.
    Text(String),
    /// Image content.
    Image(ImageData),
}

impl ClipboardContent {
    /// The BLAKE3 hash used for change detection.
    #[must_use]
    pub fn hash(&self) -> String {
        match self {
            Self::Text(text) => compute_hash(text.as_bytes()),
            Self::Image(image) => compute_hash(&image.png),
        }
    }

    /// The kind of entry this content becomes.
    #[must_use]
    pub fn kind(&self) -> EntryKind {
        match self {
            Self::Text(_) => EntryKind::Text,
            Self::Image(_) => EntryKind::Image,
        }
    }
}

/// Compute the BLAKE3 hex digest of `bytes`.
#[must_use]
pub fn compute_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// Format a timestamp for storage.
///
/// Fixed precision keeps lexical and chronological order identical.
#[must_use]
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp.
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_kind_display() {
        assert_eq!(EntryKind::Text.to_string(), "text");
        assert_eq!(EntryKind::Image.to_string(), "image");
    }

    #[test]
    fn test_entry_kind_parse() {
        assert_eq!(EntryKind::parse("text"), Some(EntryKind::Text));
        assert_eq!(EntryKind::parse("image"), Some(EntryKind::Image));
        assert_eq!(EntryKind::parse("bitmap"), None);
    }

    #[test]
    fn test_text_entry() {
        let entry = Entry::text("Hello, world!");
        assert!(entry.id.is_none());
        assert!(entry.is_text());
        assert_eq!(entry.content, "Hello, world!");
        assert_eq!(entry.content_hash, compute_hash(b"Hello, world!"));
        assert!(entry.image_path().is_none());
    }

    #[test]
    fn test_image_entry() {
        let entry = Entry::image(Path::new("/data/images/1_abc.png"), "abc");
        assert!(entry.is_image());
        assert_eq!(entry.content_hash, "abc");
        assert_eq!(
            entry.image_path(),
            Some(PathBuf::from("/data/images/1_abc.png"))
        );
    }

    #[test]
    fn test_hash_consistency() {
        assert_eq!(compute_hash(b"same"), compute_hash(b"same"));
        assert_ne!(compute_hash(b"one"), compute_hash(b"two"));
    }

    #[test]
    fn test_preview_collapses_whitespace() {
        let entry = Entry::text("line one\n\n  line   two");
        assert_eq!(entry.preview(80), "line one line two");
    }

    #[test]
    fn test_preview_truncates_on_char_boundary() {
        let entry = Entry::text("剪贴板历史记录工具");
        let preview = entry.preview(4);
        assert_eq!(preview.chars().count(), 4);
        assert!(preview.ends_with('…'));
        assert!(preview.starts_with("剪贴板"));
    }

    #[test]
    fn test_preview_image_shows_file_name() {
        let entry = Entry::image(Path::new("/data/images/1700000000_0123456789.png"), "h");
        assert_eq!(entry.preview(80), "[image] 1700000000_0123456789.png");
    }

    #[test]
    fn test_clipboard_content_hash_and_kind() {
        let text = ClipboardContent::Text("abc".to_string());
        assert_eq!(text.hash(), compute_hash(b"abc"));
        assert_eq!(text.kind(), EntryKind::Text);

        let image = ClipboardContent::Image(ImageData {
            png: vec![1, 2, 3],
            width: 1,
            height: 1,
        });
        assert_eq!(image.hash(), compute_hash(&[1, 2, 3]));
        assert_eq!(image.kind(), EntryKind::Image);
    }

    #[test]
    fn test_image_data_debug_omits_bytes() {
        let image = ImageData {
            png: vec![0; 1024],
            width: 16,
            height: 16,
        };
        let debug = format!("{image:?}");
        assert!(debug.contains("png_len: 1024"));
        assert!(!debug.contains("[0, 0"));
    }

    #[test]
    fn test_timestamp_roundtrip_and_order() {
        let earlier = Utc::now();
        let later = earlier + chrono::Duration::milliseconds(5);
        let a = format_timestamp(&earlier);
        let b = format_timestamp(&later);
        assert!(a < b);
        assert!(a.ends_with('Z'));
        let parsed = parse_timestamp(&a).unwrap();
        assert_eq!(format_timestamp(&parsed), a);
    }

    #[test]
    fn test_entry_serialization() {
        let entry = Entry::text("Test content");
        let json = serde_json::to_string(&entry).unwrap();
        assert!(json.contains("\"kind\":\"text\""));
        assert!(!json.contains("\"id\""));
        let back: Entry = serde_json::from_str(&json).unwrap();
        assert_eq!(back, entry);
    }
}
