//! Rendering contract and the default crossterm renderer.
//!
//! `RenderSink` is the UI contract consumed by command handlers. Status text
//! goes to stderr; `output` lines (forwarding results, summaries) go to
//! stdout so they can be piped.

use crate::ui::progress::{start_progress, ProgressHandle};
use crate::ui::settings::{
    GLYPH_SECTION_BULLET, INDENT_1, LABEL_ERROR, LABEL_FORWARD, LABEL_WARNING, PALETTE,
};
use crossterm::style::{Color, Stylize};

/// Injectable rendering interface used by command handlers.
///
/// `Renderer` is the terminal implementation; tests substitute a recording
/// sink without coupling to stderr output.
pub trait RenderSink: Send + Sync {
    /// Start a progress indicator for a long wait.
    fn progress(&self, label: &str) -> ProgressHandle;
    fn warn(&self, msg: &str);
    /// Titled section header; fields and details follow indented.
    fn section(&self, title: &str);
    /// Lifecycle text such as "Listening for events".
    fn activity(&self, text: &str);
    /// One `key: value` row.
    fn field(&self, key: &str, value: &str);
    fn detail(&self, text: &str);
    fn error(&self, msg: &str);
    /// Plain result line on stdout.
    fn output(&self, line: &str);
    /// Outcome of one forwarded webhook, on stdout.
    fn forward_result(&self, text: &str, ok: bool);
}

/// Terminal renderer writing styled text via crossterm.
#[derive(Debug, Clone, Copy)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(color: bool) -> Self {
        Self { color }
    }

    fn paint(&self, text: &str, tint: Color) -> String {
        if self.color {
            text.with(tint).to_string()
        } else {
            text.to_string()
        }
    }

    fn paint_bold(&self, text: &str, tint: Color) -> String {
        if self.color {
            text.with(tint).bold().to_string()
        } else {
            text.to_string()
        }
    }

    fn section_line(&self, title: &str) -> String {
        if self.color {
            format!(
                "{} {}",
                self.paint(GLYPH_SECTION_BULLET, PALETTE.bullet),
                self.paint_bold(title, PALETTE.title)
            )
        } else {
            format!("{title}:")
        }
    }

    fn field_line(&self, key: &str, value: &str) -> String {
        format!(
            "{INDENT_1}{} {}",
            self.paint(&format!("{key}:"), PALETTE.key),
            self.paint(value, PALETTE.value)
        )
    }

    fn forward_line(&self, text: &str, ok: bool) -> String {
        let tint = if ok {
            PALETTE.forward_ok
        } else {
            PALETTE.forward_failed
        };
        format!("{} {text}", self.paint_bold(LABEL_FORWARD, tint))
    }
}

impl RenderSink for Renderer {
    fn progress(&self, label: &str) -> ProgressHandle {
        start_progress(label, self.color)
    }

    fn warn(&self, msg: &str) {
        eprintln!("\r{} {msg}", self.paint_bold(LABEL_WARNING, PALETTE.warning));
    }

    fn section(&self, title: &str) {
        eprintln!("\r{}", self.section_line(title));
    }

    fn activity(&self, text: &str) {
        if self.color {
            eprintln!(
                "\r{} {}",
                self.paint(GLYPH_SECTION_BULLET, PALETTE.bullet),
                self.paint_bold(text, PALETTE.activity)
            );
        } else {
            eprintln!("\r{text}");
        }
    }

    fn field(&self, key: &str, value: &str) {
        eprintln!("\r{}", self.field_line(key, value));
    }

    fn detail(&self, text: &str) {
        eprintln!("\r{INDENT_1}{}", self.paint(text, PALETTE.value));
    }

    fn error(&self, msg: &str) {
        eprintln!("\r{} {msg}", self.paint_bold(LABEL_ERROR, PALETTE.error));
    }

    fn output(&self, line: &str) {
        println!("{line}");
    }

    fn forward_result(&self, text: &str, ok: bool) {
        println!("{}", self.forward_line(text, ok));
    }
}
