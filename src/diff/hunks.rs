//! Changed-range extraction: turns parsed file diffs into per-file
//! line ranges in the new version of each file.

use crate::models::diff::{DiffHunk, FileDiff, FileHunks};

use super::parser::parse_unified_diff;

/// Parse `diff_text` and return the changed ranges per file, in diff order.
///
/// Never fails: unparseable hunks and path-less file sections are skipped,
/// so a diff with nothing usable yields an empty list.
pub fn extract_hunks(diff_text: &str) -> Vec<FileHunks> {
    hunks_from_diffs(&parse_unified_diff(diff_text))
}

/// Convert already-parsed file diffs into changed ranges.
///
/// Binary files keep their entry but contribute no ranges.
pub fn hunks_from_diffs(diffs: &[FileDiff]) -> Vec<FileHunks> {
    diffs
        .iter()
        .filter_map(|diff| {
            let Some(filepath) = diff.path() else {
                tracing::debug!("skipping diff entry without a file path");
                return None;
            };

            let hunks = if diff.is_binary {
                Vec::new()
            } else {
                diff.hunks
                    .iter()
                    .map(|hunk| {
                        let (start_line, end_line) = hunk.new_range();
                        DiffHunk {
                            filepath: filepath.to_string(),
                            start_line,
                            end_line,
                        }
                    })
                    .collect()
            };

            Some(FileHunks {
                filepath: filepath.to_string(),
                hunks,
            })
        })
        .collect()
}

/// Total number of ranges across all files.
pub fn total_hunks(files: &[FileHunks]) -> usize {
    files.iter().map(|f| f.hunks.len()).sum()
}
