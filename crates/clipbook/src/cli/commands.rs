//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;
use std::str::FromStr;

use clap::{Args, Subcommand, ValueEnum};

use crate::editor::Point;
use crate::entry::EntryKind;

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Maximum number of entries
    #[arg(short, long, default_value = "20")]
    pub limit: usize,

    /// Only show entries of this kind
    #[arg(short, long, value_enum)]
    pub kind: Option<KindArg>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Search command arguments.
#[derive(Debug, Args)]
pub struct SearchCommand {
    /// Text to look for (case-insensitive)
    pub query: String,

    /// Maximum number of results
    #[arg(short, long, default_value = "20")]
    pub limit: usize,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,
}

/// Arguments naming a single entry.
#[derive(Debug, Args)]
pub struct EntryArgs {
    /// Entry id (see `clipbook list`)
    pub id: i64,
}

/// Edit command arguments.
#[derive(Debug, Args)]
pub struct EditCommand {
    /// Entry id
    pub id: i64,

    /// Replacement text
    pub text: String,
}

/// Clear command arguments.
#[derive(Debug, Args)]
pub struct ClearCommand {
    /// Confirm deleting the whole history
    #[arg(long)]
    pub yes: bool,
}

/// Clean command arguments.
#[derive(Debug, Args)]
pub struct CleanCommand {
    /// Delete entries from before local midnight this many days ago
    /// (defaults to the configured retention)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=30))]
    pub days: Option<u32>,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Login autostart commands.
#[derive(Debug, Subcommand)]
pub enum StartupCommand {
    /// Start clipbook recording at login
    Enable,

    /// Stop starting clipbook at login
    Disable,

    /// Show whether clipbook starts at login
    Status {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },
}

/// Annotate command arguments.
#[derive(Debug, Args)]
pub struct AnnotateCommand {
    /// Id of an image entry
    pub id: i64,

    /// Pen color (any CSS color; defaults to the configured color)
    #[arg(long)]
    pub color: Option<String>,

    /// Pen width in pixels (defaults to the configured width)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=20))]
    pub width: Option<u32>,

    /// Pen stroke through the given points, e.g. "10,10 20,15 30,10"
    #[arg(long = "stroke", value_name = "POINTS")]
    pub strokes: Vec<StrokeSpec>,

    /// Arrow from X1,Y1 to X2,Y2
    #[arg(long = "arrow", value_name = "X1,Y1,X2,Y2")]
    pub arrows: Vec<ArrowSpec>,

    /// Write the annotated PNG to this file
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Copy the annotated image to the clipboard (implied without --output)
    #[arg(long)]
    pub copy: bool,
}

impl AnnotateCommand {
    /// Whether the result goes to the clipboard.
    #[must_use]
    pub fn copies_to_clipboard(&self) -> bool {
        self.copy || self.output.is_none()
    }
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show configuration file path
    Path,

    /// Validate configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Reset configuration to defaults
    Reset {
        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Show or change automatic cleanup
    AutoClean {
        /// Turn automatic cleanup on
        #[arg(long, conflicts_with = "disable")]
        enable: bool,

        /// Turn automatic cleanup off
        #[arg(long)]
        disable: bool,

        /// Retention period in days
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..=30))]
        days: Option<u32>,
    },
}

/// Entry kind filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    /// Text entries
    Text,
    /// Image entries
    Image,
}

impl From<KindArg> for EntryKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Text => Self::Text,
            KindArg::Image => Self::Image,
        }
    }
}

/// Output format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text, one entry per block
    Plain,
    /// Table format
    #[default]
    Table,
    /// JSON format
    Json,
}

/// A pen stroke given on the command line.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeSpec(pub Vec<Point>);

impl FromStr for StrokeSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let points = s
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<Vec<Point>, _>>()?;
        if points.is_empty() {
            return Err("a stroke needs at least one X,Y point".to_string());
        }
        Ok(Self(points))
    }
}

/// An arrow given on the command line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArrowSpec {
    /// Tail of the arrow.
    pub start: Point,
    /// Tip of the arrow.
    pub end: Point,
}

impl FromStr for ArrowSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let values = s
            .split(',')
            .map(|v| {
                v.trim()
                    .parse::<f32>()
                    .map_err(|_| format!("invalid coordinate '{v}' in '{s}'"))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let [x1, y1, x2, y2] = values[..] else {
            return Err(format!("expected X1,Y1,X2,Y2 but got '{s}'"));
        };
        Ok(Self {
            start: Point::new(x1, y1),
            end: Point::new(x2, y2),
        })
    }
}
