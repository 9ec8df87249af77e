//! Git CLI wrapper for producing diffs.
//!
//! Shells out to `git` via `tokio::process::Command`.

use std::path::{Path, PathBuf};

use super::DiffError;

/// Run `git diff <base_ref>` and return the unified diff output.
///
/// Prefixes are pinned to `a/`/`b/` so user `diff.noprefix` or
/// `diff.mnemonicPrefix` settings cannot change the header shape.
pub async fn git_diff(repo_root: &Path, base_ref: &str) -> Result<String, DiffError> {
    run_git(
        repo_root,
        &["diff", "--no-color", "--src-prefix=a/", "--dst-prefix=b/", base_ref],
    )
    .await
    .map_err(|stderr| DiffError::GitError(format!("git diff {base_ref} failed: {stderr}")))
}

/// Find the root of the git repository containing `start_dir`.
pub async fn find_repo_root(start_dir: &Path) -> Result<PathBuf, DiffError> {
    let stdout = run_git(start_dir, &["rev-parse", "--show-toplevel"])
        .await
        .map_err(|stderr| DiffError::GitError(format!("not a git repository: {stderr}")))?;
    Ok(PathBuf::from(stdout.trim()))
}

/// Run git in `dir`, returning stdout on success and a message otherwise.
async fn run_git(dir: &Path, args: &[&str]) -> Result<String, String> {
    let output = tokio::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .await
        .map_err(|e| format!("failed to run git: {e}"))?;

    if !output.status.success() {
        return Err(format!(
            "{} ({})",
            String::from_utf8_lossy(&output.stderr).trim(),
            output.status
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
