/*!
 * Chute CLI Style System
 *
 * Styling and rendering of upload events for the command line.
 */

use crate::upload::UploadEvent;
use console::{style, StyledObject};
use std::time::Duration;

/// Column at which error messages are wrapped
pub const WRAP_AT: usize = 78;

/// Indentation of wrapped error messages
pub const ERROR_INDENT: usize = 4;

// ============================================================================
// THEME COLORS
// ============================================================================

/// Colors for consistent styling
pub struct Theme;

impl Theme {
    /// Success color (green)
    pub fn success<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).green()
    }

    /// Warning color (yellow)
    pub fn warning<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).yellow()
    }

    /// Error color (red)
    pub fn error<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).red()
    }

    /// Muted/secondary text (dim)
    pub fn muted<D: std::fmt::Display>(text: D) -> StyledObject<D> {
        style(text).dim()
    }
}

// ============================================================================
// ICONS
// ============================================================================

/// Unicode icons for visual feedback
pub struct Icons;

impl Icons {
    pub const SUCCESS: &'static str = "✔";
    pub const ERROR: &'static str = "✘";
    pub const ARROW: &'static str = ">";
}

// ============================================================================
// EVENT RENDERING
// ============================================================================

/// Line printed before the first event
pub fn starting_line() -> String {
    format!("{} Starting upload...", Theme::muted(Icons::ARROW))
}

/// Render one event for the terminal
///
/// Returns `None` for events that are hidden in silent mode. Errors are
/// always rendered.
pub fn render_event(event: &UploadEvent, silent: bool, elapsed: Duration) -> Option<String> {
    match event {
        UploadEvent::Error(e) => Some(render_error(&e.to_string())),
        _ if silent => None,
        UploadEvent::Progress { part_number, bytes } => Some(format!(
            "{} Uploaded part #{} {}",
            Theme::muted(Icons::ARROW),
            part_number,
            Theme::muted(format_bytes(*bytes as u64))
        )),
        UploadEvent::Retry {
            part_number,
            retry_number,
            max_retries,
        } => Some(format!(
            "{} part #{} {}",
            Theme::warning("Retrying"),
            part_number,
            Theme::muted(format!("try {} of {}", retry_number, max_retries))
        )),
        UploadEvent::Complete { total_bytes, .. } => Some(format!(
            "{} Done. Sent {} in {}.",
            Theme::success(Icons::SUCCESS),
            format_bytes(*total_bytes),
            format_duration(elapsed.as_secs_f64())
        )),
    }
}

/// Failure banner followed by the message wrapped and indented
pub fn render_error(message: &str) -> String {
    let flat = message.replace('\n', "").replace('\t', " ");
    let indent = " ".repeat(ERROR_INDENT);
    let options = textwrap::Options::new(WRAP_AT)
        .initial_indent(&indent)
        .subsequent_indent(&indent);

    format!(
        "{} Upload failed:\n\n{}\n",
        Theme::error(Icons::ERROR),
        textwrap::fill(&flat, options)
    )
}

// ============================================================================
// FORMATTING
// ============================================================================

/// Format bytes into human-readable string
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let bytes_f = bytes as f64;
    let base = 1024.0_f64;
    let exp = (bytes_f.ln() / base.ln()).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);

    let value = bytes_f / base.powi(exp as i32);

    if exp == 0 {
        format!("{} {}", bytes, UNITS[exp])
    } else {
        format!("{:.2} {}", value, UNITS[exp])
    }
}

/// Format duration into human-readable string
pub fn format_duration(secs: f64) -> String {
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else if secs < 3600.0 {
        let mins = (secs / 60.0).floor();
        let remaining = secs % 60.0;
        format!("{}m {:.0}s", mins, remaining)
    } else {
        let hours = (secs / 3600.0).floor();
        let mins = ((secs % 3600.0) / 60.0).floor();
        format!("{}h {}m", hours, mins)
    }
}

/// Print a styled usage or setup error to stderr
pub fn print_error(message: &str) {
    eprintln!("{} {}", Theme::error(Icons::ERROR), message);
}

// ============================================================================
// TESTS
// ============================================================================
