//! Diff engine: diff acquisition (file, stdin, git), unified diff parsing,
//! and changed-range extraction.

pub mod file;
pub mod git;
pub mod hunks;
pub mod parser;

use std::path::Path;
use thiserror::Error;

use crate::models::InputMode;

pub use hunks::{extract_hunks, hunks_from_diffs};
pub use parser::parse_unified_diff;

/// Errors from the diff engine.
#[derive(Error, Debug)]
pub enum DiffError {
    #[error("git command failed: {0}")]
    GitError(String),

    #[error("failed to read diff: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("path not found: {0}")]
    PathNotFound(String),
}

/// Read a unified diff from stdin.
pub async fn read_diff_stdin() -> Result<String, DiffError> {
    use tokio::io::AsyncReadExt;
    let mut buf = String::new();
    tokio::io::stdin().read_to_string(&mut buf).await?;
    Ok(buf)
}

/// Fetch the raw unified diff text for the given input mode.
///
/// The raw text is returned so it can be embedded as part of the query.
pub async fn read_diff(input: &InputMode, repo_root: &Path) -> Result<String, DiffError> {
    match input {
        InputMode::DiffFile(path) => file::read_diff_file(path).await,
        InputMode::Stdin => read_diff_stdin().await,
        InputMode::GitBase(base_ref) => git::git_diff(repo_root, base_ref).await,
    }
}
