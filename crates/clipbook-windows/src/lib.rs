//! Windows-specific implementation for clipbook.
//!
//! This crate registers clipbook under the current user's `Run` registry key
//! so the capture loop starts at login.

#![cfg(target_os = "windows")]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod autostart;

pub use autostart::{AutostartError, RUN_KEY_PATH};

/// Initialize Windows-specific components.
///
/// # Errors
///
/// Returns an error if initialization fails.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Initializing Windows platform components");
    Ok(())
}

/// Get the platform name.
#[must_use]
pub fn platform_name() -> &'static str {
    "Windows"
}
