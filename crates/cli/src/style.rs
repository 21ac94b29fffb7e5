//! Shared styling utilities for the CLI.

use console::Style;

/// Create a success-styled string (green with checkmark).
pub fn success(msg: &str) -> String {
    let style = Style::new().green();
    format!("{} {}", style.apply_to("✓"), msg)
}

/// Create an error-styled string (red with cross).
pub fn error(msg: &str) -> String {
    let style = Style::new().red();
    format!("{} {}", style.apply_to("✗"), msg)
}

/// Create a warning-styled string (yellow).
pub fn warn(msg: &str) -> String {
    let style = Style::new().yellow();
    format!("{} {}", style.apply_to("⚠"), msg)
}

/// Create a header-styled string (bold, white).
pub fn header(msg: &str) -> String {
    let style = Style::new().bold();
    style.apply_to(msg).to_string()
}

/// Create a dim-styled string.
pub fn dim(msg: &str) -> String {
    let style = Style::new().dim();
    style.apply_to(msg).to_string()
}

/// Abbreviated commit id (yellow).
pub fn commit_id(id: &str) -> String {
    let style = Style::new().yellow();
    style.apply_to(id.get(..8).unwrap_or(id)).to_string()
}

/// Two-letter status code, red for conflicts.
pub fn status_code(code: &str, conflicted: bool) -> String {
    let style = if conflicted {
        Style::new().red().bold()
    } else {
        Style::new().green()
    };
    style.apply_to(code).to_string()
}

/// Lines of the current side (green) or the incoming side (blue).
pub fn side(text: &str, ours: bool) -> String {
    let style = if ours {
        Style::new().green()
    } else {
        Style::new().blue()
    };
    style.apply_to(text).to_string()
}
