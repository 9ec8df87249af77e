//! Plain-text context renderer.
//!
//! One block per match, in bundle order, separated by a blank line:
//!
//! ```text
//! File: src/auth.py
//! Lines: 8-22
//! Function: check_token
//! Importance: 2.00
//! Code:
//! def check_token(...):
//!     ...
//! ```

use crate::models::{ContextBundle, ScoredMatch};
use crate::output::{ContextRenderer, slice_lines};

/// Marker used when a chunk has no function name.
pub const UNKNOWN_FUNCTION: &str = "unknown";

/// Render a bundle as text blocks for a downstream reviewer.
///
/// An empty bundle renders as an empty string.
pub fn format_context(bundle: &ContextBundle) -> String {
    bundle
        .matches()
        .iter()
        .map(format_block)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn format_block(m: &ScoredMatch) -> String {
    format!(
        "File: {}\nLines: {}-{}\nFunction: {}\nImportance: {:.2}\nCode:\n{}",
        m.filepath,
        m.start_line,
        m.end_line,
        m.function_name.as_deref().unwrap_or(UNKNOWN_FUNCTION),
        m.importance,
        slice_lines(&m.content, m.start_line, m.end_line),
    )
}

/// Text output renderer.
pub struct TextRenderer;

impl ContextRenderer for TextRenderer {
    fn render(&self, bundle: &ContextBundle) -> String {
        let mut output = format_context(bundle);
        if !output.is_empty() {
            output.push('\n');
        }
        output
    }
}
