//! `clipbook` - a clipboard history recorder
//!
//! This library provides the core functionality for recording clipboard
//! text and images into a local history, browsing and editing that history,
//! and annotating recorded images.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod autostart;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod editor;
pub mod entry;
pub mod error;
pub mod history;
pub mod images;
pub mod logging;
pub mod monitor;
pub mod platform;
pub mod storage;

pub use config::Config;
pub use entry::{ClipboardContent, Entry, EntryKind};
pub use error::{Error, Result};
pub use history::History;
pub use logging::init_logging;
pub use storage::{Storage, StorageStats};
