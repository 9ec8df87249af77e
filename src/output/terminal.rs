//! Terminal renderer: styled match list with code excerpts.

use colored::Colorize;

use crate::models::ContextBundle;
use crate::output::json::Summary;
use crate::output::text::UNKNOWN_FUNCTION;
use crate::output::{ContextRenderer, slice_lines};

/// Terminal output renderer with colored, flowing text.
pub struct TerminalRenderer;

impl ContextRenderer for TerminalRenderer {
    fn render(&self, bundle: &ContextBundle) -> String {
        if bundle.is_empty() {
            return format!("{}", "  ✔ No relevant context found.\n".green());
        }

        let mut output = String::new();

        for (rank, m) in bundle.matches().iter().enumerate() {
            let location = format!("{}:{}-{}", m.filepath, m.start_line, m.end_line);
            output.push_str(&format!(
                " {} {} in {}\n",
                format!("#{}", rank + 1).cyan().bold(),
                m.function_name
                    .as_deref()
                    .unwrap_or(UNKNOWN_FUNCTION)
                    .bold(),
                location.bold()
            ));
            output.push_str(&format!(
                "   {} {:.3}  {} {:.2}\n",
                "score".dimmed(),
                m.score,
                "importance".dimmed(),
                m.importance
            ));

            for line in slice_lines(&m.content, m.start_line, m.end_line).lines() {
                output.push_str(&format!("   {} {line}\n", "│".dimmed()));
            }
            output.push('\n');
        }

        let summary = Summary::from_bundle(bundle);
        output.push_str(&format!("{}\n", "───────────────────────────────────".dimmed()));
        output.push_str(&format!(
            " {} {} from {} {}\n",
            summary.total.to_string().bold(),
            if summary.total == 1 { "match" } else { "matches" },
            summary.files.to_string().bold(),
            if summary.files == 1 { "file" } else { "files" },
        ));

        output
    }
}
