//! Error types for clipbook.
//!
//! This module defines all error types used throughout the clipbook crate,
//! providing detailed context for debugging and user-friendly error messages.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for clipbook operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// No history entry has the given id.
    #[error("no history entry with id {id}")]
    EntryNotFound {
        /// The requested id.
        id: i64,
    },

    /// The requested change does not apply to this entry.
    #[error("cannot edit entry {id}: {message}")]
    InvalidEdit {
        /// The entry id.
        id: i64,
        /// Why the edit was rejected.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// Failed to serialize configuration for saving.
    #[error("failed to save configuration: {0}")]
    ConfigSave(#[from] toml::ser::Error),

    // === Clipboard Errors ===
    /// Reading or writing the system clipboard failed.
    #[error("clipboard access failed: {0}")]
    Clipboard(String),

    // === Image Errors ===
    /// Decoding or encoding an image failed.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// A stored image file is missing from disk.
    #[error("image file missing: {path}")]
    ImageMissing {
        /// Path the entry points to.
        path: PathBuf,
    },

    /// A color string could not be parsed.
    #[error("invalid color '{value}'")]
    InvalidColor {
        /// The rejected input.
        value: String,
    },

    // === Platform Errors ===
    /// Registering or removing login autostart failed.
    #[error("autostart error: {0}")]
    Autostart(String),

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for clipbook operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new clipboard error.
    #[must_use]
    pub fn clipboard(message: impl Into<String>) -> Self {
        Self::Clipboard(message.into())
    }

    /// Create a new autostart error.
    #[must_use]
    pub fn autostart(message: impl Into<String>) -> Self {
        Self::Autostart(message.into())
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error means the entry does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::EntryNotFound { .. })
    }
}
