//! macOS-specific implementation for clipbook.
//!
//! This crate provides macOS-specific functionality for the clipbook project,
//! currently login autostart through a per-user LaunchAgent.

#![cfg(target_os = "macos")]
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod autostart;

pub use autostart::{AutostartError, LABEL_PREFIX};

/// Initialize macOS-specific components.
///
/// # Errors
///
/// Returns an error if initialization fails.
pub fn init() -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("Initializing macOS platform components");
    Ok(())
}

/// Get the platform name.
#[must_use]
pub fn platform_name() -> &'static str {
    "macOS"
}
