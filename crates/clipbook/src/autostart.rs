//! Start clipbook at login.
//!
//! The registration is named [`RUN_VALUE_NAME`] and holds the quoted path
//! of the running executable. Where it lives depends on the platform: the
//! `Run` registry key on Windows, an XDG autostart entry on Linux, and a
//! LaunchAgent on macOS.

use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::error::{Error, Result};
use crate::platform;

/// Name of the login registration.
pub const RUN_VALUE_NAME: &str = "ClipboardHistory";

/// The launch command for `exe`: its full path in double quotes.
#[must_use]
pub fn launch_command(exe: &Path) -> String {
    format!("\"{}\"", exe.display())
}

/// Whether login autostart is on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AutostartStatus {
    /// Nothing is registered.
    Disabled,
    /// The registration launches this executable.
    Enabled,
    /// Something is registered, but it launches a different command.
    Stale {
        /// The command currently registered.
        registered: String,
    },
}

impl std::fmt::Display for AutostartStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disabled => f.write_str("disabled"),
            Self::Enabled => f.write_str("enabled"),
            Self::Stale { registered } => write!(f, "enabled for another executable ({registered})"),
        }
    }
}

/// Login registration for one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Autostart {
    name: String,
    command: String,
}

impl Autostart {
    /// Manage the registration `name` launching `command`.
    #[must_use]
    pub fn new(name: impl Into<String>, command: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: command.into(),
        }
    }

    /// Manage the standard registration for the running executable.
    ///
    /// # Errors
    ///
    /// Returns an error if the executable path cannot be determined.
    pub fn for_current_exe() -> Result<Self> {
        let exe = std::env::current_exe()
            .map_err(|e| Error::autostart(format!("cannot locate the running executable: {e}")))?;
        Ok(Self::new(RUN_VALUE_NAME, launch_command(&exe)))
    }

    /// The registration name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The command that would be registered.
    #[must_use]
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Register the command to run at login, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform registration fails.
    pub fn enable(&self) -> Result<()> {
        platform::enable_autostart(&self.name, &self.command)?;
        info!(name = %self.name, command = %self.command, "Autostart enabled");
        Ok(())
    }

    /// Remove the registration. Succeeds if nothing was registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the registration exists but cannot be removed.
    pub fn disable(&self) -> Result<()> {
        platform::disable_autostart(&self.name)?;
        info!(name = %self.name, "Autostart disabled");
        Ok(())
    }

    /// Check whether anything is registered under the name.
    ///
    /// # Errors
    ///
    /// Returns an error if the registration cannot be read.
    pub fn is_enabled(&self) -> Result<bool> {
        Ok(platform::autostart_command(&self.name)?.is_some())
    }

    /// Compare the registration with this command.
    ///
    /// # Errors
    ///
    /// Returns an error if the registration cannot be read.
    pub fn status(&self) -> Result<AutostartStatus> {
        Ok(self.classify(platform::autostart_command(&self.name)?))
    }

    fn classify(&self, registered: Option<String>) -> AutostartStatus {
        match registered {
            None => AutostartStatus::Disabled,
            Some(cmd) if cmd.trim() == self.command => AutostartStatus::Enabled,
            Some(registered) => AutostartStatus::Stale { registered },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_launch_command_is_quoted() {
        let exe = Path::new("/opt/clip book/clipbook");
        assert_eq!(launch_command(exe), "\"/opt/clip book/clipbook\"");
    }

    #[test]
    fn test_for_current_exe() {
        let autostart = Autostart::for_current_exe().unwrap();
        assert_eq!(autostart.name(), "ClipboardHistory");
        assert!(autostart.command().starts_with('"'));
        assert!(autostart.command().ends_with('"'));
    }

    #[test]
    fn test_classify() {
        let autostart = Autostart::new(RUN_VALUE_NAME, "\"/usr/bin/clipbook\"");
        assert_eq!(autostart.classify(None), AutostartStatus::Disabled);
        assert_eq!(
            autostart.classify(Some("\"/usr/bin/clipbook\"".to_string())),
            AutostartStatus::Enabled
        );
        assert_eq!(
            autostart.classify(Some("\"/old/clipbook\"".to_string())),
            AutostartStatus::Stale {
                registered: "\"/old/clipbook\"".to_string()
            }
        );
    }

    #[test]
    fn test_status_display_and_json() {
        assert_eq!(AutostartStatus::Enabled.to_string(), "enabled");
        assert_eq!(AutostartStatus::Disabled.to_string(), "disabled");

        let json = serde_json::to_string(&AutostartStatus::Stale {
            registered: "x".to_string(),
        })
        .unwrap();
        assert_eq!(json, r#"{"state":"stale","registered":"x"}"#);
    }
}
