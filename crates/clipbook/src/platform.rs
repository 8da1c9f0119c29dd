//! Dispatch to the per-OS crate for the current target.

use crate::error::{Error, Result};

#[cfg(target_os = "linux")]
use clipbook_linux as os;

#[cfg(target_os = "macos")]
use clipbook_mac as os;

#[cfg(target_os = "windows")]
use clipbook_windows as os;

/// Human-readable name of the current platform.
#[must_use]
pub fn name() -> &'static str {
    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
    {
        os::platform_name()
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        std::env::consts::OS
    }
}

/// Initialize platform components.
///
/// # Errors
///
/// Returns an error if the platform crate fails to initialize.
pub fn init() -> Result<()> {
    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
    {
        os::init().map_err(|e| Error::internal(format!("platform init failed: {e}")))
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        Ok(())
    }
}

/// Register `command` to run at login under `name`.
pub(crate) fn enable_autostart(name: &str, command: &str) -> Result<()> {
    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
    {
        os::autostart::enable(name, command).map_err(|e| Error::autostart(e.to_string()))
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        let _ = (name, command);
        Err(unsupported())
    }
}

/// Remove the login registration `name`. Absent registrations are fine.
pub(crate) fn disable_autostart(name: &str) -> Result<()> {
    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
    {
        os::autostart::disable(name).map_err(|e| Error::autostart(e.to_string()))
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        let _ = name;
        Err(unsupported())
    }
}

/// The command registered under `name`, if any.
pub(crate) fn autostart_command(name: &str) -> Result<Option<String>> {
    #[cfg(any(target_os = "linux", target_os = "macos", target_os = "windows"))]
    {
        os::autostart::registered_command(name).map_err(|e| Error::autostart(e.to_string()))
    }
    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        let _ = name;
        Err(unsupported())
    }
}

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
fn unsupported() -> Error {
    Error::autostart(format!(
        "login autostart is not supported on {}",
        std::env::consts::OS
    ))
}
