//! Login autostart through the `HKCU\...\Run` registry key.
//!
//! The value is managed with the stock `reg.exe` tool so no registry
//! bindings are needed.

use std::process::{Command, Output};

use thiserror::Error;
use tracing::{debug, info};

/// Registry key holding per-user login commands.
pub const RUN_KEY_PATH: &str = r"HKCU\Software\Microsoft\Windows\CurrentVersion\Run";

/// Registry value type used for the launch command.
const VALUE_TYPE: &str = "REG_SZ";

/// Errors that can occur while managing the run-key value.
#[derive(Debug, Error)]
pub enum AutostartError {
    /// `reg.exe` could not be spawned.
    #[error("failed to run reg.exe: {0}")]
    Spawn(#[from] std::io::Error),

    /// `reg.exe` exited with a failure status.
    #[error("reg.exe {operation} failed: {stderr}")]
    Command {
        /// The `reg` sub-command that failed.
        operation: &'static str,
        /// Captured standard error.
        stderr: String,
    },
}

/// Result type for autostart operations.
pub type Result<T> = std::result::Result<T, AutostartError>;

/// Write the run-key value `name` with `command` as its data.
///
/// # Errors
///
/// Returns an error if `reg.exe` fails.
pub fn enable(name: &str, command: &str) -> Result<()> {
    let output = reg(&add_args(name, command))?;
    check("add", &output)?;
    info!(name, command, "Registered login autostart");
    Ok(())
}

/// Remove the run-key value `name`.
///
/// A value that is already absent is not an error.
///
/// # Errors
///
/// Returns an error if `reg.exe` fails for another reason.
pub fn disable(name: &str) -> Result<()> {
    if registered_command(name)?.is_none() {
        debug!(name, "Autostart value not present, nothing to remove");
        return Ok(());
    }
    let output = reg(&delete_args(name))?;
    check("delete", &output)?;
    info!(name, "Removed login autostart");
    Ok(())
}

/// Read the data stored under the run-key value `name`.
///
/// # Errors
///
/// Returns an error if `reg.exe` cannot be spawned.
pub fn registered_command(name: &str) -> Result<Option<String>> {
    let output = reg(&query_args(name))?;
    if !output.status.success() {
        // reg query exits non-zero when the value does not exist
        return Ok(None);
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_query_output(&stdout, name))
}

fn reg(args: &[String]) -> Result<Output> {
    debug!(?args, "Running reg.exe");
    Ok(Command::new("reg").args(args).output()?)
}

fn check(operation: &'static str, output: &Output) -> Result<()> {
    if output.status.success() {
        Ok(())
    } else {
        Err(AutostartError::Command {
            operation,
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

fn add_args(name: &str, command: &str) -> Vec<String> {
    vec![
        "add".to_string(),
        RUN_KEY_PATH.to_string(),
        "/v".to_string(),
        name.to_string(),
        "/t".to_string(),
        VALUE_TYPE.to_string(),
        "/d".to_string(),
        command.to_string(),
        "/f".to_string(),
    ]
}

fn delete_args(name: &str) -> Vec<String> {
    vec![
        "delete".to_string(),
        RUN_KEY_PATH.to_string(),
        "/v".to_string(),
        name.to_string(),
        "/f".to_string(),
    ]
}

fn query_args(name: &str) -> Vec<String> {
    vec![
        "query".to_string(),
        RUN_KEY_PATH.to_string(),
        "/v".to_string(),
        name.to_string(),
    ]
}

/// Extract the value data from `reg query` output.
///
/// Lines look like `    ClipboardHistory    REG_SZ    "C:\app\clipbook.exe"`.
fn parse_query_output(stdout: &str, name: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let rest = line.trim_start().strip_prefix(name)?;
        let (_, data) = rest.split_once(VALUE_TYPE)?;
        Some(data.trim().to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_args() {
        let args = add_args("ClipboardHistory", r#""C:\Apps\clipbook.exe""#);
        assert_eq!(args[0], "add");
        assert_eq!(args[1], RUN_KEY_PATH);
        assert_eq!(args[3], "ClipboardHistory");
        assert_eq!(args[5], "REG_SZ");
        assert_eq!(args[7], r#""C:\Apps\clipbook.exe""#);
        assert_eq!(args.last().map(String::as_str), Some("/f"));
    }

    #[test]
    fn test_delete_args() {
        let args = delete_args("ClipboardHistory");
        assert_eq!(args, ["delete", RUN_KEY_PATH, "/v", "ClipboardHistory", "/f"]);
    }

    #[test]
    fn test_parse_query_output() {
        let stdout = "\r\nHKEY_CURRENT_USER\\Software\\Microsoft\\Windows\\CurrentVersion\\Run\r\n    ClipboardHistory    REG_SZ    \"C:\\Apps\\clipbook.exe\"\r\n\r\n";
        assert_eq!(
            parse_query_output(stdout, "ClipboardHistory"),
            Some(r#""C:\Apps\clipbook.exe""#.to_string())
        );
    }

    #[test]
    fn test_parse_query_output_missing() {
        assert_eq!(parse_query_output("", "ClipboardHistory"), None);
        assert_eq!(
            parse_query_output("    Other    REG_SZ    x", "ClipboardHistory"),
            None
        );
    }

    #[test]
    fn test_error_display() {
        let err = AutostartError::Command {
            operation: "add",
            stderr: "Access is denied.".to_string(),
        };
        assert_eq!(err.to_string(), "reg.exe add failed: Access is denied.");
    }
}
