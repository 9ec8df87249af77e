//! Unified diff format parser.
//!
//! Parses `git diff` output as well as plain unified diffs (`diff -u`,
//! `svn diff`, `hg diff`) into `Vec<FileDiff>`. Hunk bodies are consumed
//! by their line counts, so removed lines that happen to start with `--`
//! are never mistaken for file headers.

use crate::models::diff::{FileDiff, Hunk};

/// Parse a unified diff string into a list of file diffs.
pub fn parse_unified_diff(input: &str) -> Vec<FileDiff> {
    let lines: Vec<&str> = input.lines().collect();
    let mut files: Vec<FileDiff> = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i];
        i += 1;

        let mut file = if let Some(rest) = line.strip_prefix("diff --git ") {
            let (old_path, new_path) = parse_diff_header(rest);
            FileDiff {
                old_path: Some(old_path),
                new_path: Some(new_path),
                ..FileDiff::default()
            }
        } else if is_marker_pair(&lines, i - 1) {
            // Plain unified diff: the section starts at the `---`/`+++` pair,
            // which the body loop below consumes.
            i -= 1;
            FileDiff::default()
        } else {
            continue;
        };

        parse_file_body(&mut file, &lines, &mut i);
        finalize(&mut file);
        files.push(file);
    }

    files
}

/// Consume extended headers, path markers, and hunks for one file section.
fn parse_file_body(file: &mut FileDiff, lines: &[&str], i: &mut usize) {
    let mut markers_seen = false;

    while *i < lines.len() {
        let next = lines[*i];

        if next.starts_with("diff --git ") {
            break;
        }

        if is_marker_pair(lines, *i) {
            if markers_seen || !file.hunks.is_empty() {
                // Start of the next plain-diff file section
                break;
            }
            file.old_path = parse_marker_path(&lines[*i][4..]);
            file.new_path = parse_marker_path(&lines[*i + 1][4..]);
            markers_seen = true;
            *i += 2;
            continue;
        }

        if next.starts_with("@@") {
            *i += 1;
            match parse_hunk_header(next) {
                Some(hunk) => {
                    skip_hunk_body(&hunk, lines, i);
                    file.hunks.push(hunk);
                }
                None => {
                    tracing::debug!(header = next, "skipping malformed hunk");
                    skip_unsized_body(lines, i);
                }
            }
            continue;
        }

        if next.starts_with("new file mode") {
            file.is_new = true;
        } else if next.starts_with("deleted file mode") {
            file.is_deleted = true;
        } else if let Some(from) = next.strip_prefix("rename from ") {
            file.is_rename = true;
            file.old_path = Some(from.to_string());
        } else if let Some(to) = next.strip_prefix("rename to ") {
            file.is_rename = true;
            file.new_path = Some(to.to_string());
        } else if next.starts_with("GIT binary patch")
            || (next.starts_with("Binary files") && next.ends_with("differ"))
        {
            file.is_binary = true;
        }
        *i += 1;
    }
}

/// Normalise path presence and new/deleted flags once a section is parsed.
fn finalize(file: &mut FileDiff) {
    if file.is_deleted {
        file.new_path = None;
    }
    if file.is_new {
        file.old_path = None;
    }
    if file.old_path.is_none() && file.new_path.is_some() {
        file.is_new = true;
    }
    if file.new_path.is_none() && file.old_path.is_some() {
        file.is_deleted = true;
    }
}

/// Whether `lines[at]` is a `--- ` line directly followed by a `+++ ` line.
fn is_marker_pair(lines: &[&str], at: usize) -> bool {
    lines.get(at).is_some_and(|l| l.starts_with("--- "))
        && lines.get(at + 1).is_some_and(|l| l.starts_with("+++ "))
}

/// Parse the path from a `--- ` / `+++ ` marker line (without the marker).
///
/// Strips trailing timestamps/revisions after a tab, surrounding quotes,
/// and the single-letter diff prefix. `/dev/null` maps to `None`.
fn parse_marker_path(raw: &str) -> Option<String> {
    let path = raw.split('\t').next().unwrap_or(raw).trim_end();
    let path = path
        .strip_prefix('"')
        .and_then(|p| p.strip_suffix('"'))
        .unwrap_or(path);
    if path.is_empty() || path == "/dev/null" {
        return None;
    }
    Some(strip_diff_prefix(path).to_string())
}

/// Parse the "a/path b/path" remainder of a "diff --git" header line.
fn parse_diff_header(rest: &str) -> (String, String) {
    // Handle paths with spaces by finding the second prefix separator
    // Paths are prefixed with a/ and b/ (default), or c/w/i/o/ when
    // git's diff.mnemonicPrefix is enabled.
    if let Some(b_idx) = find_second_prefix(rest) {
        let old_path = strip_diff_prefix(&rest[..b_idx]).to_string();
        let new_path = strip_diff_prefix(&rest[b_idx + 1..]).to_string();
        (old_path, new_path)
    } else {
        let mut parts = rest.splitn(2, ' ');
        let old_path = strip_diff_prefix(parts.next().unwrap_or("")).to_string();
        let new_path = strip_diff_prefix(parts.next().unwrap_or("")).to_string();
        (old_path, new_path)
    }
}

/// Strip a single-character git diff prefix (`a/`, `b/`, `c/`, `w/`, `i/`, `o/`).
///
/// - `a/` and `b/` are the defaults.
/// - `c/` (commit), `w/` (working tree), `i/` (index), `o/` (object)
///   are used when `diff.mnemonicPrefix` is enabled.
fn strip_diff_prefix(path: &str) -> &str {
    let bytes = path.as_bytes();
    if bytes.len() >= 2
        && bytes[1] == b'/'
        && matches!(bytes[0], b'a' | b'b' | b'c' | b'w' | b'i' | b'o')
    {
        return &path[2..];
    }
    path
}

/// Find the position of the second path prefix separator in a diff header.
///
/// Looks for ` X/` where X is any known single-letter prefix.
fn find_second_prefix(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    (1..bytes.len().saturating_sub(1)).find(|&i| {
        bytes[i] == b' '
            && bytes.get(i + 2) == Some(&b'/')
            && matches!(bytes.get(i + 1), Some(b'a' | b'b' | b'c' | b'w' | b'i' | b'o'))
    })
}

/// Advance past the body of `hunk`, using its old/new line counts.
///
/// Stops early at the first line that cannot belong to a hunk body
/// (truncated or hand-edited diffs).
fn skip_hunk_body(hunk: &Hunk, lines: &[&str], i: &mut usize) {
    let mut old_left = hunk.old_count;
    let mut new_left = hunk.new_count;

    while *i < lines.len() {
        let line = lines[*i];
        if line.starts_with('\\') {
            // "\ No newline at end of file"
            *i += 1;
            continue;
        }
        if old_left == 0 && new_left == 0 {
            break;
        }
        match line.as_bytes().first() {
            Some(b'+') => new_left = new_left.saturating_sub(1),
            Some(b'-') => old_left = old_left.saturating_sub(1),
            Some(b' ') | None => {
                old_left = old_left.saturating_sub(1);
                new_left = new_left.saturating_sub(1);
            }
            Some(_) => break,
        }
        *i += 1;
    }
}

/// Skip the body of a hunk whose header could not be parsed.
///
/// Without line counts, `---`/`+++` body lines are indistinguishable from a
/// plain-diff file header, so everything up to the next hunk or
/// `diff --git` line is consumed.
fn skip_unsized_body(lines: &[&str], i: &mut usize) {
    while let Some(line) = lines.get(*i) {
        if line.starts_with("@@") || line.starts_with("diff --git ") {
            break;
        }
        *i += 1;
    }
}

/// Parse a `@@ -old_start,old_count +new_start,new_count @@ header` line.
fn parse_hunk_header(line: &str) -> Option<Hunk> {
    let line = line.strip_prefix("@@ ")?;
    let end = line.find(" @@")?;
    let range_part = &line[..end];
    let rest = line[end + 3..].trim();
    let header = (!rest.is_empty()).then(|| rest.to_string());

    let mut parts = range_part.split(' ');
    let old = parts.next()?.strip_prefix('-')?;
    let new = parts.next()?.strip_prefix('+')?;
    if parts.next().is_some() {
        return None;
    }

    let (old_start, old_count) = parse_range(old)?;
    let (new_start, new_count) = parse_range(new)?;

    Some(Hunk {
        old_start,
        old_count,
        new_start,
        new_count,
        header,
    })
}

/// Parse "start,count" or "start".
///
/// An omitted count means one line, as defined by the unified format.
fn parse_range(s: &str) -> Option<(u32, u32)> {
    if let Some((start, count)) = s.split_once(',') {
        Some((start.parse().ok()?, count.parse().ok()?))
    } else {
        Some((s.parse().ok()?, 1))
    }
}
