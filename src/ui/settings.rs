//! Labels, glyphs and colors for terminal output.

use crossterm::style::Color;

pub const INDENT_1: &str = "  ";

pub const LABEL_WARNING: &str = "warning:";
pub const LABEL_ERROR: &str = "error:";
/// Prefix of each forwarded-webhook result line.
pub const LABEL_FORWARD: &str = ">>";
pub const GLYPH_SECTION_BULLET: &str = "•";

pub const PROMPT_CHOICE: &str = "> ";
pub const MARKER_DISABLED: &str = "(unavailable)";

/// Carriage return plus "erase line", so a spinner redraws in place.
pub const ERASE_LINE: &str = "\r\x1b[2K";
pub const SPINNER_FRAMES: [char; 8] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧'];
pub const SPINNER_TICK_MS: u64 = 80;

/// Color assignments for every styled element.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub warning: Color,
    pub error: Color,
    pub bullet: Color,
    pub title: Color,
    pub activity: Color,
    pub key: Color,
    pub value: Color,
    pub forward_ok: Color,
    pub forward_failed: Color,
    pub spinner: Color,
    pub spinner_text: Color,
}

pub const PALETTE: Palette = Palette {
    warning: Color::Yellow,
    error: Color::Red,
    bullet: Color::DarkGrey,
    title: Color::Cyan,
    activity: Color::DarkGrey,
    key: Color::DarkGrey,
    value: Color::White,
    forward_ok: Color::Green,
    forward_failed: Color::Red,
    spinner: Color::Magenta,
    spinner_text: Color::DarkGrey,
};
