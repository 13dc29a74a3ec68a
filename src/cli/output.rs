//! Shared CLI output helpers for consistent terminal output.
//!
//! Color scheme (respects NO_COLOR):
//! - Green: success, granted
//! - Red: errors, blocked
//! - Yellow: warnings, locked
//! - Cyan: paths, commands, slugs, hints
//! - Bold: headers, important values
//! - Dimmed: secondary info
//!
//! Data meant for other programs (secrets, JSON) goes to stdout; everything
//! else goes to stderr so that `$(keyrack get ...)` captures only the value.

use std::fmt::Display;

use console::{style, StyledObject};

const RULE_WIDTH: usize = 56;

/// Check if color output is disabled via NO_COLOR env var.
fn colors_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

fn paint<D: Display>(styled: StyledObject<D>) -> String {
    if colors_enabled() {
        styled.to_string()
    } else {
        styled.force_styling(false).to_string()
    }
}

/// Print a success message with checkmark (green).
///
/// Example: `✓ initialized`
pub fn success(msg: &str) {
    eprintln!("{} {}", paint(style("✓").green()), msg);
}

/// Print an error message (red).
///
/// Example: `✗ host manifest not found`
pub fn error(msg: &str) {
    eprintln!("{} {}", paint(style("✗").red()), msg);
}

/// Print a warning message (yellow).
pub fn warn(msg: &str) {
    eprintln!("{} {}", paint(style("⚠").yellow()), msg);
}

/// Print a hint message (cyan).
///
/// Example: `→ run: keyrack init`
pub fn hint(msg: &str) {
    eprintln!("{} {}", paint(style("→").cyan()), paint(style(msg).cyan()));
}

/// Print a bold section header.
pub fn header(title: &str) {
    eprintln!("{}", paint(style(title).bold()));
}

/// Print a key-value pair (label dimmed, value bold).
///
/// Example: `  owner  default`
pub fn kv(label: &str, value: impl Display) {
    eprintln!(
        "  {}  {}",
        paint(style(label).dim()),
        paint(style(value.to_string()).bold())
    );
}

/// Print a list item with bullet.
pub fn list_item(item: &str) {
    eprintln!("  • {}", item);
}

/// Print a horizontal rule separator.
pub fn rule() {
    eprintln!("{}", paint(style("─".repeat(RULE_WIDTH)).dim()));
}

/// Print a dimmed/secondary message.
pub fn dimmed(msg: &str) {
    eprintln!("{}", paint(style(msg).dim()));
}

/// Print a section header with a separator line.
pub fn section(title: &str) {
    eprintln!();
    header(title);
    rule();
}

/// Format a path string in cyan.
pub fn path(p: impl Display) -> String {
    paint(style(p.to_string()).cyan())
}

/// Format a command string in green.
pub fn cmd(c: &str) -> String {
    paint(style(c).green())
}

/// Format a slug in cyan.
pub fn slug(s: &str) -> String {
    paint(style(s).cyan())
}

/// Format an attempt status with its color.
pub fn status(status: &str) -> String {
    let styled = style(status);
    paint(match status {
        "granted" => styled.green(),
        "locked" => styled.yellow(),
        "blocked" | "invalid" => styled.red(),
        _ => styled.dim(),
    })
}

/// Print machine-readable data to stdout.
pub fn data(text: &str) {
    println!("{}", text);
}
