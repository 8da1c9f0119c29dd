//! `clipbook` - clipboard history recorder
//!
//! This binary runs the recorder and provides the commands for browsing,
//! editing and annotating the recorded history.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::Local;
use clap::Parser;

use clipbook::autostart::Autostart;
use clipbook::cli::{
    AnnotateCommand, CleanCommand, Cli, Command, ConfigCommand, OutputFormat, StartupCommand,
};
use clipbook::editor::{parse_color, Canvas};
use clipbook::images::decode_png;
use clipbook::monitor::{ClipboardSource, SystemClipboard};
use clipbook::{daemon, init_logging, platform, Config, Entry, History};

/// Characters of content shown per entry in listings.
const PREVIEW_CHARS: usize = 60;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    let config_path = cli.config.clone();

    // Bare `clipbook` is what login autostart launches
    let command = cli.command.unwrap_or(Command::Run);

    // These must work even when the current file does not load
    let command = match command {
        Command::Config(ConfigCommand::Path) => {
            println!("{}", resolved_config_path(config_path).display());
            return Ok(());
        }
        Command::Config(ConfigCommand::Validate { file }) => {
            return handle_validate(file.or(config_path));
        }
        Command::Config(ConfigCommand::Reset { yes }) => {
            return handle_reset(resolved_config_path(config_path), yes);
        }
        command => command,
    };

    let config = Config::load_from(config_path.clone())?;

    match command {
        Command::Run => {
            let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
            runtime.block_on(daemon::run(config))?;
        }
        Command::List(cmd) => {
            let history = History::open(&config)?;
            let entries = history.list(cmd.limit, cmd.kind.map(Into::into))?;
            print_entries(&entries, cmd.format)?;
        }
        Command::Search(cmd) => {
            let history = History::open(&config)?;
            let entries = history.search(&cmd.query, cmd.limit)?;
            print_entries(&entries, cmd.format)?;
        }
        Command::Show(args) => {
            let entry = History::open(&config)?.get(args.id)?;
            if entry.is_text() {
                println!("{}", entry.content);
            } else {
                println!("Image: {}", entry.content);
                println!("Recorded: {}", local_time(&entry));
            }
        }
        Command::Copy(args) => {
            let entry = History::open(&config)?.copy_to_clipboard(args.id, &SystemClipboard)?;
            println!("Copied entry {} to the clipboard", args.id);
            tracing::debug!(preview = %entry.preview(PREVIEW_CHARS), "Copied");
        }
        Command::Edit(cmd) => {
            let entry = History::open(&config)?.update_text(cmd.id, &cmd.text)?;
            println!("Updated entry {}: {}", cmd.id, entry.preview(PREVIEW_CHARS));
        }
        Command::Delete(args) => {
            History::open(&config)?.delete(args.id)?;
            println!("Deleted entry {}", args.id);
        }
        Command::Clear(cmd) => {
            if !cmd.yes {
                println!("This will delete the whole clipboard history.");
                println!("Use --yes to confirm.");
                return Ok(());
            }
            let removed = History::open(&config)?.clear()?;
            println!("Deleted {removed} entries");
        }
        Command::Clean(cmd) => handle_clean(&config, &cmd)?,
        Command::Status(cmd) => handle_status(&config, cmd.json)?,
        Command::Startup(cmd) => handle_startup(cmd)?,
        Command::Annotate(cmd) => handle_annotate(&config, &cmd)?,
        Command::Config(cmd) => handle_config(&config, &resolved_config_path(config_path), cmd)?,
    }
    Ok(())
}

fn resolved_config_path(path: Option<PathBuf>) -> PathBuf {
    path.unwrap_or_else(Config::default_config_path)
}

fn local_time(entry: &Entry) -> String {
    entry
        .timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn print_entries(entries: &[Entry], format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(entries)?),
        OutputFormat::Plain => {
            for entry in entries {
                println!(
                    "#{} {} ({})",
                    entry.id.unwrap_or_default(),
                    local_time(entry),
                    entry.kind
                );
                match entry.kind {
                    clipbook::EntryKind::Text => println!("{}", entry.content),
                    clipbook::EntryKind::Image => println!("[image] {}", entry.content),
                }
                println!();
            }
        }
        OutputFormat::Table => {
            if entries.is_empty() {
                println!("No entries.");
                return Ok(());
            }
            println!("{:>6}  {:<5}  {:<19}  CONTENT", "ID", "KIND", "RECORDED");
            for entry in entries {
                println!(
                    "{:>6}  {:<5}  {:<19}  {}",
                    entry.id.unwrap_or_default(),
                    entry.kind,
                    local_time(entry),
                    entry.preview(PREVIEW_CHARS)
                );
            }
        }
    }
    Ok(())
}

fn handle_clean(config: &Config, cmd: &CleanCommand) -> anyhow::Result<()> {
    let days = cmd
        .days
        .or_else(|| config.auto_clean_days())
        .unwrap_or(config.cleanup.auto_clean_days);
    let removed = History::open(config)?.clean_older_than_days(days)?;
    println!("Deleted {removed} entries older than {days} days");
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let history = History::open(config)?;
    let stats = history.stats()?;
    // Unsupported platforms report an error here; status should still print
    let autostart = Autostart::for_current_exe()
        .and_then(|a| a.status())
        .map_or_else(|e| format!("unknown ({e})"), |s| s.to_string());

    if json {
        let status = serde_json::json!({
            "platform": platform::name(),
            "database_path": config.database_path(),
            "images_dir": config.images_dir(),
            "total_entries": stats.total_entries,
            "text_entries": stats.text_entries,
            "image_entries": stats.image_entries,
            "oldest_entry": stats.oldest_entry,
            "newest_entry": stats.newest_entry,
            "db_size_bytes": stats.db_size_bytes,
            "auto_clean_days": config.auto_clean_days(),
            "autostart": autostart,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("clipbook status");
        println!("---------------");
        println!("Platform:      {}", platform::name());
        println!("Database:      {}", config.database_path().display());
        println!("Images:        {}", config.images_dir().display());
        println!(
            "Entries:       {} ({} text, {} image)",
            stats.total_entries, stats.text_entries, stats.image_entries
        );
        if let (Some(oldest), Some(newest)) = (stats.oldest_entry, stats.newest_entry) {
            println!(
                "Range:         {} .. {}",
                oldest.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                newest.with_timezone(&Local).format("%Y-%m-%d %H:%M")
            );
        }
        println!("Database size: {} bytes", stats.db_size_bytes);
        match config.auto_clean_days() {
            Some(days) => println!("Auto-clean:    older than {days} days"),
            None => println!("Auto-clean:    off"),
        }
        println!("Autostart:     {autostart}");
    }
    Ok(())
}

fn handle_startup(cmd: StartupCommand) -> anyhow::Result<()> {
    let autostart = Autostart::for_current_exe()?;
    match cmd {
        StartupCommand::Enable => {
            autostart.enable()?;
            println!("clipbook will start at login");
        }
        StartupCommand::Disable => {
            autostart.disable()?;
            println!("clipbook will no longer start at login");
        }
        StartupCommand::Status { json } => {
            let status = autostart.status()?;
            if json {
                println!("{}", serde_json::to_string_pretty(&status)?);
            } else {
                println!("Autostart: {status}");
            }
        }
    }
    Ok(())
}

fn handle_annotate(config: &Config, cmd: &AnnotateCommand) -> anyhow::Result<()> {
    let history = History::open(config)?;
    let png = history.image_bytes(cmd.id)?;

    let mut canvas = Canvas::new(decode_png(&png)?);
    canvas.set_color(parse_color(
        cmd.color.as_deref().unwrap_or(&config.editor.color),
    )?);
    canvas.set_width(cmd.width.unwrap_or(config.editor.width));
    for stroke in &cmd.strokes {
        canvas.draw_stroke(&stroke.0);
    }
    for arrow in &cmd.arrows {
        canvas.draw_arrow(arrow.start, arrow.end);
    }
    let annotated = canvas.to_png()?;

    if let Some(path) = &cmd.output {
        std::fs::write(path, &annotated)
            .with_context(|| format!("failed to write {}", path.display()))?;
        println!("Wrote {}", path.display());
    }
    if cmd.copies_to_clipboard() {
        SystemClipboard.write_image(&annotated)?;
        println!("Copied annotated image to the clipboard");
    }
    Ok(())
}

fn handle_validate(file: Option<PathBuf>) -> anyhow::Result<()> {
    let path = resolved_config_path(file);
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path)) {
        Ok(_) => println!("Configuration is valid."),
        Err(e) => bail!("Configuration error: {e}"),
    }
    Ok(())
}

fn handle_reset(path: PathBuf, yes: bool) -> anyhow::Result<()> {
    if !yes {
        println!("This will reset all configuration to defaults.");
        println!("Use --yes to confirm.");
        return Ok(());
    }
    Config::default().save_to(&path)?;
    println!("Configuration reset: {}", path.display());
    Ok(())
}

fn handle_config(config: &Config, path: &Path, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!("  Images directory:   {}", config.images_dir().display());
                println!();
                println!("[Capture]");
                println!("  Poll interval (ms): {}", config.capture.poll_interval_ms);
                println!("  Text:               {}", config.capture.text_enabled);
                println!("  Images:             {}", config.capture.images_enabled);
                println!(
                    "  Text length:        {}..={}",
                    config.capture.min_content_length, config.capture.max_content_length
                );
                println!();
                println!("[Cleanup]");
                println!("  Auto-clean:         {}", config.cleanup.auto_clean_enabled);
                println!("  Retention (days):   {}", config.cleanup.auto_clean_days);
                println!(
                    "  Interval (hours):   {}",
                    config.cleanup.clean_interval_hours
                );
                println!();
                println!("[Editor]");
                println!("  Pen color:          {}", config.editor.color);
                println!("  Pen width:          {}", config.editor.width);
            }
        }
        ConfigCommand::AutoClean {
            enable,
            disable,
            days,
        } => {
            if !enable && !disable && days.is_none() {
                match config.auto_clean_days() {
                    Some(days) => println!("Auto-clean is on: older than {days} days"),
                    None => println!(
                        "Auto-clean is off (retention {} days)",
                        config.cleanup.auto_clean_days
                    ),
                }
                return Ok(());
            }
            let saved = Config::update_file(path, |config| {
                if enable {
                    config.cleanup.auto_clean_enabled = true;
                }
                if disable {
                    config.cleanup.auto_clean_enabled = false;
                }
                if let Some(days) = days {
                    config.cleanup.auto_clean_days = days;
                }
            })?;
            match saved.auto_clean_days() {
                Some(days) => println!("Auto-clean on: older than {days} days"),
                None => println!("Auto-clean off"),
            }
            println!("Restart the recorder to apply.");
        }
        // Handled before the configuration is loaded
        ConfigCommand::Path | ConfigCommand::Validate { .. } | ConfigCommand::Reset { .. } => {}
    }
    Ok(())
}
