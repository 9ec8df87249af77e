//! Diff-related types: parsed file diffs and the changed line ranges
//! extracted from them.

use serde::{Deserialize, Serialize};

/// A contiguous hunk within a file diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hunk {
    /// Starting line in the old file.
    pub old_start: u32,
    /// Number of lines in the old file.
    pub old_count: u32,
    /// Starting line in the new file.
    pub new_start: u32,
    /// Number of lines in the new file.
    pub new_count: u32,
    /// Optional hunk header text (e.g., function name).
    pub header: Option<String>,
}

impl Hunk {
    /// The changed range in the new file as 1-based inclusive `(start, end)`.
    ///
    /// `end = new_start + new_count - 1`. A pure deletion (`new_count == 0`)
    /// collapses to the single line at `new_start`, and `new_start == 0`
    /// (deleted or emptied file) is clamped to line 1, so the result always
    /// satisfies `start <= end`.
    pub fn new_range(&self) -> (u32, u32) {
        let start = self.new_start.max(1);
        let end = (self.new_start + self.new_count).saturating_sub(1).max(start);
        (start, end)
    }
}

/// A diff for a single file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileDiff {
    /// Pre-change path (`None` for `/dev/null`, i.e. new files).
    pub old_path: Option<String>,
    /// Post-change path (`None` for `/dev/null`, i.e. deleted files).
    pub new_path: Option<String>,
    /// Whether this is a new file.
    pub is_new: bool,
    /// Whether this file was deleted.
    pub is_deleted: bool,
    /// Whether this is a rename.
    pub is_rename: bool,
    /// Whether this is a binary file.
    pub is_binary: bool,
    /// The hunks in this diff.
    pub hunks: Vec<Hunk>,
}

impl FileDiff {
    /// Returns the path to query the index with: the post-change path,
    /// falling back to the pre-change path for deletions.
    pub fn path(&self) -> Option<&str> {
        self.new_path.as_deref().or(self.old_path.as_deref())
    }
}

/// A changed line range in the new version of a file.
///
/// Invariant: `start_line <= end_line`, both 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffHunk {
    pub filepath: String,
    pub start_line: u32,
    pub end_line: u32,
}

/// All changed ranges for one file, in diff order.
///
/// An empty `hunks` list (binary files, mode-only changes) means the file
/// takes no part in hunk-scoped retrieval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileHunks {
    pub filepath: String,
    pub hunks: Vec<DiffHunk>,
}
