//! Match aggregation: rank by score, keep the best match per location,
//! and truncate to the bundle size.
//!
//! Two matches refer to the same location when they share file path,
//! start line, and end line. Because the input is sorted by descending
//! score first, the first match seen for a location is its highest-scoring
//! occurrence.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::models::{ContextBundle, ScoredMatch};

/// Build the final [`ContextBundle`] from an unordered collection of matches.
///
/// Ties on score are broken by path and line range so the result does not
/// depend on the order in which concurrent queries completed. Matches with
/// a NaN score are discarded.
pub fn aggregate(mut matches: Vec<ScoredMatch>, max_results: usize) -> ContextBundle {
    matches.retain(|m| !m.score.is_nan());
    matches.sort_by(rank_order);

    let mut seen: HashSet<String> = HashSet::new();
    let mut kept: Vec<ScoredMatch> = Vec::with_capacity(max_results.min(matches.len()));

    for m in matches {
        if kept.len() >= max_results {
            break;
        }
        if seen.insert(m.location_key()) {
            kept.push(m);
        }
    }

    ContextBundle::from_ranked(kept)
}

/// Descending score, then ascending path and line range.
fn rank_order(a: &ScoredMatch, b: &ScoredMatch) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.filepath.cmp(&b.filepath))
        .then_with(|| a.start_line.cmp(&b.start_line))
        .then_with(|| a.end_line.cmp(&b.end_line))
}
