//! Login autostart through a per-user LaunchAgent.
//!
//! The agent is written to `~/Library/LaunchAgents/<label>.plist` and runs
//! the registered command through `/bin/sh -c` so a quoted executable path
//! is honored exactly as stored.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

/// Prefix for LaunchAgent labels.
pub const LABEL_PREFIX: &str = "com.clipbook";

/// Errors that can occur while managing the LaunchAgent.
#[derive(Debug, Error)]
pub enum AutostartError {
    /// The home directory could not be determined.
    #[error("could not determine the home directory")]
    NoHomeDir,

    /// Reading or writing the property list failed.
    #[error("launch agent {path}: {source}")]
    Io {
        /// Path of the property list.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

/// Result type for autostart operations.
pub type Result<T> = std::result::Result<T, AutostartError>;

/// Default LaunchAgents directory.
///
/// # Errors
///
/// Returns an error if the home directory is unknown.
pub fn launch_agents_dir() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join("Library").join("LaunchAgents"))
        .ok_or(AutostartError::NoHomeDir)
}

/// Register `command` to run at login under `name`.
///
/// # Errors
///
/// Returns an error if the property list cannot be written.
pub fn enable(name: &str, command: &str) -> Result<()> {
    enable_in(&launch_agents_dir()?, name, command)
}

/// Remove the login registration for `name`.
///
/// # Errors
///
/// Returns an error if the property list exists but cannot be removed.
pub fn disable(name: &str) -> Result<()> {
    disable_in(&launch_agents_dir()?, name)
}

/// Read the command registered under `name`.
///
/// # Errors
///
/// Returns an error if the property list exists but cannot be read.
pub fn registered_command(name: &str) -> Result<Option<String>> {
    registered_command_in(&launch_agents_dir()?, name)
}

/// Write the LaunchAgent for `name` into `dir`.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn enable_in(dir: &Path, name: &str, command: &str) -> Result<()> {
    let path = plist_path(dir, name);
    fs::create_dir_all(dir).map_err(|source| AutostartError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    fs::write(&path, property_list(&label(name), command))
        .map_err(|source| AutostartError::Io { path: path.clone(), source })?;
    info!(path = %path.display(), "Registered login autostart");
    Ok(())
}

/// Remove the LaunchAgent for `name` from `dir`.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be removed.
pub fn disable_in(dir: &Path, name: &str) -> Result<()> {
    let path = plist_path(dir, name);
    match fs::remove_file(&path) {
        Ok(()) => {
            info!(path = %path.display(), "Removed login autostart");
            Ok(())
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "Launch agent not present, nothing to remove");
            Ok(())
        }
        Err(source) => Err(AutostartError::Io { path, source }),
    }
}

/// Read the command stored in the LaunchAgent for `name` in `dir`.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn registered_command_in(dir: &Path, name: &str) -> Result<Option<String>> {
    let path = plist_path(dir, name);
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(AutostartError::Io { path, source }),
    };
    Ok(parse_command(&contents))
}

fn label(name: &str) -> String {
    format!("{LABEL_PREFIX}.{name}")
}

fn plist_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(format!("{}.plist", label(name)))
}

fn property_list(label: &str, command: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE plist PUBLIC "-//Apple//DTD PLIST 1.0//EN" "http://www.apple.com/DTDs/PropertyList-1.0.dtd">
<plist version="1.0">
<dict>
    <key>Label</key>
    <string>{}</string>
    <key>ProgramArguments</key>
    <array>
        <string>/bin/sh</string>
        <string>-c</string>
        <string>{}</string>
    </array>
    <key>RunAtLoad</key>
    <true/>
</dict>
</plist>
"#,
        xml_escape(label),
        xml_escape(command)
    )
}

/// The command is the last `<string>` of the `ProgramArguments` array.
fn parse_command(plist: &str) -> Option<String> {
    let (_, args) = plist.split_once("<key>ProgramArguments</key>")?;
    let (array, _) = args.split_once("</array>")?;
    array
        .rsplit("<string>")
        .next()
        .and_then(|tail| tail.split_once("</string>"))
        .map(|(value, _)| xml_unescape(value))
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn xml_unescape(value: &str) -> String {
    value
        .replace("&quot;", "\"")
        .replace("&gt;", ">")
        .replace("&lt;", "<")
        .replace("&amp;", "&")
}
