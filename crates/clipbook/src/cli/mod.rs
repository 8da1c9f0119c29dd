//! Command-line interface for clipbook.
//!
//! This module provides the CLI structure for the `clipbook` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    AnnotateCommand, ArrowSpec, CleanCommand, ClearCommand, ConfigCommand, EditCommand, EntryArgs,
    KindArg, ListCommand, OutputFormat, SearchCommand, StartupCommand, StatusCommand, StrokeSpec,
};

/// clipbook - Clipboard history recorder
///
/// Records everything you copy, text and images, so you can find it,
/// copy it again, tidy it up, or annotate screenshots later.
#[derive(Debug, Parser)]
#[command(name = "clipbook")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute; `run` when omitted
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Record clipboard changes until interrupted
    Run,

    /// List recent entries, newest first
    List(ListCommand),

    /// Search text entries
    Search(SearchCommand),

    /// Print one entry in full
    Show(EntryArgs),

    /// Put an entry back on the clipboard
    Copy(EntryArgs),

    /// Replace the text of a text entry
    Edit(EditCommand),

    /// Delete one entry
    Delete(EntryArgs),

    /// Delete the whole history
    Clear(ClearCommand),

    /// Delete old entries
    Clean(CleanCommand),

    /// Show history statistics
    Status(StatusCommand),

    /// Manage starting at login
    #[command(subcommand)]
    Startup(StartupCommand),

    /// Draw pen strokes and arrows on an image entry
    Annotate(AnnotateCommand),

    /// View or modify configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        if self.quiet {
            crate::logging::Verbosity::Quiet
        } else {
            match self.verbose {
                0 => crate::logging::Verbosity::Normal,
                1 => crate::logging::Verbosity::Verbose,
                _ => crate::logging::Verbosity::Trace,
            }
        }
    }
}
