//! Browser launching for the login flow.

use std::process::{Command, Stdio};
use tracing::debug;

/// Capability to open an external URL. The login flow only depends on this
/// trait so tests can substitute a spy for the OS browser. Showing the URL
/// when nothing could be launched is up to the implementation.
pub trait UrlOpener: Send + Sync {
    /// Try to open `url`; returns whether a launcher accepted it.
    fn open(&self, url: &str) -> bool;
}

/// Opens URLs in the user's default desktop browser.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemBrowser;

impl UrlOpener for SystemBrowser {
    fn open(&self, url: &str) -> bool {
        try_open_browser(url)
    }
}

/// Platform launcher command and the arguments preceding the URL.
fn launcher() -> Option<(&'static str, &'static [&'static str])> {
    if cfg!(target_os = "macos") {
        Some(("open", &[]))
    } else if cfg!(target_os = "windows") {
        Some(("cmd", &["/C", "start", ""]))
    } else if cfg!(unix) {
        Some(("xdg-open", &[]))
    } else {
        None
    }
}

/// Best-effort launch; `false` means the caller should print the URL.
pub fn try_open_browser(url: &str) -> bool {
    let Some((program, leading)) = launcher() else {
        return false;
    };
    let launched = Command::new(program)
        .args(leading)
        .arg(url)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok_and(|status| status.success());
    debug!(program, launched, "browser launch attempted");
    launched
}
