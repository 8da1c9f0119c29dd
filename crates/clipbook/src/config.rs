//! Configuration management for clipbook.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults. Settings
//! changed from the command line are written back with [`Config::save_to`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "ClipboardHistory";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "clipboard_history.db";

/// Default image directory name inside the data directory.
const IMAGE_DIR_NAME: &str = "images";

/// Allowed range for the retention period in days.
pub const AUTO_CLEAN_DAYS_RANGE: std::ops::RangeInclusive<u32> = 1..=30;

/// Allowed range for the annotation pen width.
pub const PEN_WIDTH_RANGE: std::ops::RangeInclusive<u32> = 1..=20;

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `CLIPBOOK_`)
/// 2. TOML config file at `~/.config/ClipboardHistory/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Capture configuration.
    pub capture: CaptureConfig,
    /// History cleanup configuration.
    pub cleanup: CleanupConfig,
    /// Image annotation defaults.
    pub editor: EditorConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `<local data dir>/ClipboardHistory/clipboard_history.db`
    pub database_path: Option<PathBuf>,
    /// Directory holding captured images.
    /// Defaults to `<local data dir>/ClipboardHistory/images`
    pub images_dir: Option<PathBuf>,
}

/// Capture-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Interval between clipboard polls in milliseconds.
    pub poll_interval_ms: u64,
    /// Record text copied to the clipboard.
    pub text_enabled: bool,
    /// Record images copied to the clipboard.
    pub images_enabled: bool,
    /// Minimum text length to capture.
    pub min_content_length: usize,
    /// Maximum text length to capture; longer text is truncated.
    pub max_content_length: usize,
}

/// Cleanup-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupConfig {
    /// Delete old entries automatically while the recorder runs.
    pub auto_clean_enabled: bool,
    /// Entries recorded before local midnight this many days ago are removed.
    pub auto_clean_days: u32,
    /// How often the recorder re-applies automatic cleanup, in hours.
    pub clean_interval_hours: u32,
}

/// Image annotation defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Default pen color (any CSS color).
    pub color: String,
    /// Default pen width in pixels.
    pub width: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1000,
            text_enabled: true,
            images_enabled: true,
            min_content_length: 1,
            max_content_length: 1_000_000,
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            auto_clean_enabled: false,
            auto_clean_days: 10,
            clean_interval_hours: 24,
        }
    }
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            color: "#FF0000".to_string(),
            width: 3,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment =
            Self::file_figment(&config_file).merge(Env::prefixed("CLIPBOOK_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Load only the defaults and the file at `path`, ignoring the
    /// environment. This is the configuration that gets written back.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be parsed or is invalid.
    pub fn load_persisted(path: &Path) -> Result<Self> {
        let config: Config = Self::file_figment(path).extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `change` to the file at `path` and save it.
    ///
    /// Environment overrides are not written into the file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the result is invalid,
    /// or writing fails.
    pub fn update_file(path: &Path, change: impl FnOnce(&mut Self)) -> Result<Self> {
        let mut config = Self::load_persisted(path)?;
        change(&mut config);
        config.save_to(path)?;
        Ok(config)
    }

    fn file_figment(path: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(path))
    }

    /// Write the configuration as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if validation, serialization or writing fails.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!(path = %path.display(), "Configuration saved");
        Ok(())
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.capture.poll_interval_ms == 0 {
            return Err(invalid("poll_interval_ms must be greater than 0"));
        }

        if self.capture.min_content_length > self.capture.max_content_length {
            return Err(invalid(format!(
                "min_content_length ({}) cannot be greater than max_content_length ({})",
                self.capture.min_content_length, self.capture.max_content_length
            )));
        }

        if !AUTO_CLEAN_DAYS_RANGE.contains(&self.cleanup.auto_clean_days) {
            return Err(invalid(format!(
                "auto_clean_days must be between {} and {}, got {}",
                AUTO_CLEAN_DAYS_RANGE.start(),
                AUTO_CLEAN_DAYS_RANGE.end(),
                self.cleanup.auto_clean_days
            )));
        }

        if self.cleanup.clean_interval_hours == 0 {
            return Err(invalid("clean_interval_hours must be greater than 0"));
        }

        if csscolorparser::parse(&self.editor.color).is_err() {
            return Err(invalid(format!("invalid editor color: {}", self.editor.color)));
        }

        if !PEN_WIDTH_RANGE.contains(&self.editor.width) {
            return Err(invalid(format!(
                "editor width must be between {} and {}, got {}",
                PEN_WIDTH_RANGE.start(),
                PEN_WIDTH_RANGE.end(),
                self.editor.width
            )));
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the image directory, resolving defaults if not set.
    #[must_use]
    pub fn images_dir(&self) -> PathBuf {
        self.storage
            .images_dir
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(IMAGE_DIR_NAME))
    }

    /// Get the poll interval as a Duration.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.capture.poll_interval_ms)
    }

    /// Get the cleanup interval as a Duration.
    #[must_use]
    pub fn clean_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.cleanup.clean_interval_hours) * 60 * 60)
    }

    /// The retention period in days, when automatic cleanup is on.
    #[must_use]
    pub fn auto_clean_days(&self) -> Option<u32> {
        self.cleanup
            .auto_clean_enabled
            .then_some(self.cleanup.auto_clean_days)
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::ConfigValidation {
        message: message.into(),
    }
}
