//! Output renderers: plain text context blocks, terminal, JSON.

pub mod json;
pub mod terminal;
pub mod text;

use crate::models::ContextBundle;

pub use text::format_context;

/// Trait for rendering a context bundle to an output format.
pub trait ContextRenderer {
    /// Render the bundle to a string.
    fn render(&self, bundle: &ContextBundle) -> String;
}

/// Return the 1-based inclusive line range `[start, end]` of `content`,
/// clamped to the lines that exist. Out-of-range requests yield `""`.
pub fn slice_lines(content: &str, start: u32, end: u32) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let first = start.max(1) as usize;
    let last = (end as usize).min(lines.len());
    if first > last {
        return String::new();
    }
    lines[first - 1..last].join("\n")
}
