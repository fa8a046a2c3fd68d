//! Stderr spinner shown while waiting on the browser redirect, token
//! refresh or a migration batch.

use crate::ui::settings::{ERASE_LINE, PALETTE, SPINNER_FRAMES, SPINNER_TICK_MS};
use crossterm::style::Stylize;
use std::io::{self, IsTerminal, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

static SPINNERS_ALLOWED: AtomicBool = AtomicBool::new(true);

/// Live spinner; stops and erases its line when finished or dropped.
pub struct ProgressHandle {
    active: Option<(Arc<AtomicBool>, JoinHandle<()>)>,
}

impl ProgressHandle {
    /// A handle that draws nothing.
    pub fn disabled() -> Self {
        Self { active: None }
    }

    pub fn finish(&mut self) {
        if let Some((running, worker)) = self.active.take() {
            running.store(false, Ordering::Relaxed);
            let _ = worker.join();
        }
    }
}

impl Drop for ProgressHandle {
    fn drop(&mut self) {
        self.finish();
    }
}

/// Turn spinners off process-wide (`--no-color`, `NO_COLOR`).
pub fn set_progress_enabled(enabled: bool) {
    SPINNERS_ALLOWED.store(enabled, Ordering::Relaxed);
}

/// Start a spinner on stderr. Redirected stderr gets a no-op handle.
pub fn start_progress(label: impl Into<String>, color: bool) -> ProgressHandle {
    if !SPINNERS_ALLOWED.load(Ordering::Relaxed) || !io::stderr().is_terminal() {
        return ProgressHandle::disabled();
    }

    let label = label.into();
    let running = Arc::new(AtomicBool::new(true));
    let keep_going = Arc::clone(&running);
    let worker = thread::spawn(move || {
        let started = Instant::now();
        let mut tick = 0usize;
        let mut stderr = io::stderr();
        while keep_going.load(Ordering::Relaxed) {
            let _ = write!(stderr, "{}", progress_line(tick, &label, started.elapsed(), color));
            let _ = stderr.flush();
            tick = tick.wrapping_add(1);
            thread::sleep(Duration::from_millis(SPINNER_TICK_MS));
        }
        let _ = write!(stderr, "{ERASE_LINE}");
        let _ = stderr.flush();
    });

    ProgressHandle {
        active: Some((running, worker)),
    }
}

/// One redraw of the spinner line for `tick`.
fn progress_line(tick: usize, label: &str, elapsed: Duration, color: bool) -> String {
    let frame = SPINNER_FRAMES[tick % SPINNER_FRAMES.len()];
    let seconds = elapsed.as_secs();
    if !color {
        return format!("{ERASE_LINE}{frame} {label} {seconds}s");
    }
    format!(
        "{ERASE_LINE}{} {} {}",
        frame.to_string().with(PALETTE.spinner),
        label.with(PALETTE.spinner_text),
        format!("{seconds}s").with(PALETTE.spinner_text),
    )
}
