//! Rendering for `--output`.
//!
//! Every printable type implements [`Render`] for the human view; JSON and
//! YAML come from its `Serialize` impl.

use std::io::{self, IsTerminal, Write};

use owo_colors::OwoColorize;
use serde::Serialize;

use sengled_core::{AttributeUpdate, UpdateKind};

use crate::cli::{ColorMode, OutputFormat};

/// A value the CLI can print.
pub trait Render: Serialize {
    /// The `table` view: a table for collections, a detail block for one item.
    fn human(&self, color: bool) -> String;
}

pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none(),
    }
}

/// Render `data` as a whole document.
pub fn render<T: Render + ?Sized>(format: OutputFormat, data: &T, color: bool) -> String {
    match format {
        OutputFormat::Table => data.human(color),
        OutputFormat::Json => serde_json::to_string_pretty(data).unwrap_or_else(unserializable),
        OutputFormat::Yaml => serde_yaml::to_string(data).unwrap_or_else(unserializable),
    }
}

/// Render one record of a stream: JSON lines, YAML documents, or the
/// human view.
pub fn render_line<T: Render + ?Sized>(format: OutputFormat, data: &T, color: bool) -> String {
    match format {
        OutputFormat::Table => data.human(color),
        OutputFormat::Json => serde_json::to_string(data).unwrap_or_else(unserializable),
        OutputFormat::Yaml => {
            let doc = serde_yaml::to_string(data).unwrap_or_else(unserializable);
            format!("---\n{}", doc.trim_end())
        }
    }
}

fn unserializable(e: impl std::fmt::Display) -> String {
    format!("<unserializable: {e}>")
}

/// Write to stdout unless `quiet`.
pub fn emit(text: &str, quiet: bool) {
    if quiet || text.is_empty() {
        return;
    }
    let _ = writeln!(io::stdout().lock(), "{text}");
}

// ── Broker updates ───────────────────────────────────────────────────

impl Render for AttributeUpdate {
    fn human(&self, color: bool) -> String {
        let stamp = chrono::Local::now().format("%H:%M:%S");
        let kind = match self.kind {
            UpdateKind::Status => "status",
            UpdateKind::Ack => "ack",
        };
        if color {
            format!(
                "{} {} {:<6} {}={}",
                stamp.dimmed(),
                self.device_id.cyan(),
                kind.dimmed(),
                self.attribute.bold(),
                self.value.green()
            )
        } else {
            format!(
                "{stamp} {} {kind:<6} {}={}",
                self.device_id, self.attribute, self.value
            )
        }
    }
}
