//! Login autostart through an XDG autostart desktop entry.
//!
//! The entry lives at `$XDG_CONFIG_HOME/autostart/<name>.desktop`.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

/// Errors that can occur while managing the autostart entry.
#[derive(Debug, Error)]
pub enum AutostartError {
    /// The user configuration directory could not be determined.
    #[error("could not determine the user configuration directory")]
    NoConfigDir,

    /// Reading or writing the desktop entry failed.
    #[error("autostart entry {path}: {source}")]
    Io {
        /// Path of the desktop entry.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

/// Result type for autostart operations.
pub type Result<T> = std::result::Result<T, AutostartError>;

/// Default XDG autostart directory.
///
/// # Errors
///
/// Returns an error if the configuration directory is unknown.
pub fn autostart_dir() -> Result<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("autostart"))
        .ok_or(AutostartError::NoConfigDir)
}

/// Register `command` to run at login under `name`.
///
/// # Errors
///
/// Returns an error if the desktop entry cannot be written.
pub fn enable(name: &str, command: &str) -> Result<()> {
    enable_in(&autostart_dir()?, name, command)
}

/// Remove the login registration for `name`.
///
/// # Errors
///
/// Returns an error if the desktop entry exists but cannot be removed.
pub fn disable(name: &str) -> Result<()> {
    disable_in(&autostart_dir()?, name)
}

/// Read the command registered under `name`.
///
/// # Errors
///
/// Returns an error if the desktop entry exists but cannot be read.
pub fn registered_command(name: &str) -> Result<Option<String>> {
    registered_command_in(&autostart_dir()?, name)
}

/// Write the desktop entry for `name` into `dir`.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn enable_in(dir: &Path, name: &str, command: &str) -> Result<()> {
    let path = entry_path(dir, name);
    fs::create_dir_all(dir).map_err(|source| AutostartError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    fs::write(&path, desktop_entry(name, command))
        .map_err(|source| AutostartError::Io { path: path.clone(), source })?;
    info!(path = %path.display(), "Registered login autostart");
    Ok(())
}

/// Remove the desktop entry for `name` from `dir`.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be removed.
pub fn disable_in(dir: &Path, name: &str) -> Result<()> {
    let path = entry_path(dir, name);
    match fs::remove_file(&path) {
        Ok(()) => {
            info!(path = %path.display(), "Removed login autostart");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Autostart entry not present, nothing to remove");
            Ok(())
        }
        Err(source) => Err(AutostartError::Io { path, source }),
    }
}

/// Read the `Exec` line of the desktop entry for `name` in `dir`.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn registered_command_in(dir: &Path, name: &str) -> Result<Option<String>> {
    let path = entry_path(dir, name);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(AutostartError::Io { path, source }),
    };
    Ok(contents
        .lines()
        .find_map(|line| line.strip_prefix("Exec="))
        .map(str::to_string))
}

fn entry_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{name}.desktop"))
}

fn desktop_entry(name: &str, command: &str) -> String {
    format!(
        "[Desktop Entry]\n\
         Type=Application\n\
         Name={name}\n\
         Comment=Clipboard history recorder\n\
         Exec={command}\n\
         Terminal=false\n\
         X-GNOME-Autostart-enabled=true\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAME: &str = "ClipboardHistory";
    const COMMAND: &str = "\"/opt/clip book/clipbook\"";

    #[test]
    fn test_enable_writes_entry() {
        let dir = tempfile::tempdir().unwrap();
        enable_in(dir.path(), NAME, COMMAND).unwrap();

        let path = dir.path().join("ClipboardHistory.desktop");
        let contents = fs::read_to_string(path).unwrap();
        assert!(contents.starts_with("[Desktop Entry]"));
        assert!(contents.contains("Name=ClipboardHistory"));
        assert!(contents.contains(&format!("Exec={COMMAND}")));
    }

    #[test]
    fn test_registered_command_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(registered_command_in(dir.path(), NAME).unwrap(), None);

        enable_in(dir.path(), NAME, COMMAND).unwrap();
        assert_eq!(
            registered_command_in(dir.path(), NAME).unwrap(),
            Some(COMMAND.to_string())
        );

        disable_in(dir.path(), NAME).unwrap();
        assert_eq!(registered_command_in(dir.path(), NAME).unwrap(), None);
    }

    #[test]
    fn test_disable_absent_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        assert!(disable_in(dir.path(), NAME).is_ok());
    }

    #[test]
    fn test_enable_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("config").join("autostart");
        enable_in(&nested, NAME, COMMAND).unwrap();
        assert!(nested.join("ClipboardHistory.desktop").exists());
    }

    #[test]
    fn test_enable_overwrites_previous_command() {
        let dir = tempfile::tempdir().unwrap();
        enable_in(dir.path(), NAME, "\"/old/clipbook\"").unwrap();
        enable_in(dir.path(), NAME, COMMAND).unwrap();
        assert_eq!(
            registered_command_in(dir.path(), NAME).unwrap(),
            Some(COMMAND.to_string())
        );
    }
}
