//! Injects `POLAR_BUILD_GIT_HASH` and `POLAR_BUILD_TIMESTAMP` for
//! `polar --version`. Either value can be pinned from the environment
//! (reproducible release builds); otherwise it is detected, falling back to
//! `unknown` when git or date are missing.

use std::env;
use std::fs;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

/// Compile-time variables and the detector used when the caller did not pin them.
const METADATA: [(&str, fn() -> String); 2] = [
    ("POLAR_BUILD_GIT_HASH", detect_commit),
    ("POLAR_BUILD_TIMESTAMP", detect_timestamp),
];

fn main() {
    watch_git_head();
    for (name, detect) in METADATA {
        println!("cargo:rerun-if-env-changed={name}");
        let value = env::var(name)
            .ok()
            .filter(|value| !value.trim().is_empty())
            .unwrap_or_else(detect);
        println!("cargo:rustc-env={name}={value}");
    }
}

/// Rebuild when HEAD moves, including commits on the checked-out branch.
fn watch_git_head() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    let Ok(head) = fs::read_to_string(".git/HEAD") else {
        return;
    };
    if let Some(branch_ref) = head.trim().strip_prefix("ref: ") {
        println!("cargo:rerun-if-changed=.git/{branch_ref}");
    }
}

/// Short commit hash, suffixed with `-dirty` for uncommitted changes.
fn detect_commit() -> String {
    let Some(hash) = command_stdout("git", &["rev-parse", "--short=12", "HEAD"]) else {
        return "unknown".to_string();
    };
    match command_stdout("git", &["status", "--porcelain", "--untracked-files=no"]) {
        Some(_) => format!("{hash}-dirty"),
        None => hash,
    }
}

fn detect_timestamp() -> String {
    command_stdout("date", &["-u", "+%Y-%m-%dT%H:%M:%SZ"]).unwrap_or_else(|| {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or(0);
        format!("unix:{secs}")
    })
}

/// Trimmed stdout of a successful command; `None` on failure or empty output.
fn command_stdout(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}
