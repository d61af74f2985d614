//! Shared terminal output helpers.
//!
//! Global flags (`--json`, `--quiet`, `--no-color`) are stashed in
//! environment variables by `main` so any module can check them without
//! threading a context struct through every call.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// True when `--json` was passed.
pub fn is_json() -> bool {
    std::env::var("PORTICO_JSON").is_ok()
}

/// True when `--quiet` was passed.
pub fn is_quiet() -> bool {
    std::env::var("PORTICO_QUIET").is_ok()
}

/// True when color output is disabled (`--no-color` or the NO_COLOR
/// convention).
pub fn no_color() -> bool {
    std::env::var("PORTICO_NO_COLOR").is_ok() || std::env::var("NO_COLOR").is_ok()
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(_) => println!("{value}"),
    }
}

/// Status symbols, colored unless color is disabled.
pub struct Styled {
    color: bool,
}

impl Styled {
    pub fn new() -> Self {
        Self { color: !no_color() }
    }

    pub fn ok_sym(&self) -> &'static str {
        if self.color {
            "\x1b[32m✓\x1b[0m"
        } else {
            "OK"
        }
    }

    pub fn warn_sym(&self) -> &'static str {
        if self.color {
            "\x1b[33m!\x1b[0m"
        } else {
            "!"
        }
    }
}

impl Default for Styled {
    fn default() -> Self {
        Self::new()
    }
}

/// Start a steady-tick spinner with the given message.
///
/// Returns `None` in quiet or JSON mode so call sites can skip it with a
/// plain `if let`.
pub fn spinner(message: &str) -> Option<ProgressBar> {
    if is_quiet() || is_json() {
        return None;
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(ProgressStyle::with_template("  {spinner} {msg}").unwrap());
    bar.set_message(message.to_string());
    bar.enable_steady_tick(Duration::from_millis(120));
    Some(bar)
}
