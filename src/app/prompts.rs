//! Interactive prompts behind a trait so handlers can be driven by scripts
//! in tests.
//!
//! The terminal implementation prints a numbered list to stderr and reads
//! the answer from stdin; secrets are read without echo via `rpassword`.

use polar::ui::settings::{GLYPH_SECTION_BULLET, INDENT_1, MARKER_DISABLED, PROMPT_CHOICE};
use std::io::{self, BufRead, Write};

/// One entry of a select / multi-select prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Choice {
    pub(crate) title: String,
    pub(crate) disabled: bool,
}

impl Choice {
    pub(crate) fn enabled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            disabled: false,
        }
    }

    pub(crate) fn disabled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            disabled: true,
        }
    }
}

/// Prompt surface used by `login` and `migrate`.
///
/// Errors are user-facing messages (closed stdin, unusable answers).
pub(crate) trait Prompter: Send + Sync {
    /// Pick exactly one enabled choice; returns its index.
    fn select(&self, message: &str, choices: &[Choice]) -> Result<usize, String>;
    /// Pick one or more enabled choices; returns indices in list order.
    fn multi_select(&self, message: &str, choices: &[Choice]) -> Result<Vec<usize>, String>;
    /// Read a value without echoing it.
    fn secret(&self, message: &str) -> Result<String, String>;
}

/// Numbered-list prompts on stdin/stderr.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TerminalPrompter;

impl TerminalPrompter {
    fn ask(&self, message: &str, choices: &[Choice], hint: &str) -> Result<String, String> {
        eprintln!("{GLYPH_SECTION_BULLET} {message}");
        for (idx, choice) in choices.iter().enumerate() {
            if choice.disabled {
                eprintln!("{INDENT_1}{}. {} {MARKER_DISABLED}", idx + 1, choice.title);
            } else {
                eprintln!("{INDENT_1}{}. {}", idx + 1, choice.title);
            }
        }
        eprint!("{INDENT_1}{hint} {PROMPT_CHOICE}");
        io::stderr()
            .flush()
            .map_err(|err| format!("failed to write prompt: {err}"))?;
        read_answer()
    }
}

impl Prompter for TerminalPrompter {
    fn select(&self, message: &str, choices: &[Choice]) -> Result<usize, String> {
        loop {
            let answer = self.ask(message, choices, "pick one")?;
            match parse_selection(&answer, choices) {
                Ok(index) => return Ok(index),
                Err(msg) => eprintln!("{INDENT_1}{msg}"),
            }
        }
    }

    fn multi_select(&self, message: &str, choices: &[Choice]) -> Result<Vec<usize>, String> {
        loop {
            let answer = self.ask(message, choices, "pick one or more, e.g. 1,2")?;
            match parse_multi_selection(&answer, choices) {
                Ok(indices) => return Ok(indices),
                Err(msg) => eprintln!("{INDENT_1}{msg}"),
            }
        }
    }

    fn secret(&self, message: &str) -> Result<String, String> {
        rpassword::prompt_password(format!("{GLYPH_SECTION_BULLET} {message}: "))
            .map_err(|err| format!("failed to read input: {err}"))
    }
}

fn read_answer() -> Result<String, String> {
    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|err| format!("failed to read input: {err}"))?;
    if read == 0 {
        eprintln!();
        return Err("input closed before a choice was made".to_string());
    }
    Ok(line.trim().to_string())
}

/// Parse a 1-based choice number.
pub(crate) fn parse_selection(input: &str, choices: &[Choice]) -> Result<usize, String> {
    let trimmed = input.trim();
    let number: usize = trimmed
        .parse()
        .map_err(|_| format!("`{trimmed}` is not a choice number"))?;
    let Some(choice) = number.checked_sub(1).and_then(|idx| choices.get(idx)) else {
        return Err(format!("choose a number between 1 and {}", choices.len()));
    };
    if choice.disabled {
        return Err(format!("{} is not available yet", choice.title));
    }
    Ok(number - 1)
}

/// Parse a comma- or space-separated list of choice numbers. Duplicates
/// collapse; the result is sorted.
pub(crate) fn parse_multi_selection(input: &str, choices: &[Choice]) -> Result<Vec<usize>, String> {
    let mut picked = Vec::new();
    for part in input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
    {
        let index = parse_selection(part, choices)?;
        if !picked.contains(&index) {
            picked.push(index);
        }
    }
    if picked.is_empty() {
        return Err("select at least one entry".to_string());
    }
    picked.sort_unstable();
    Ok(picked)
}
