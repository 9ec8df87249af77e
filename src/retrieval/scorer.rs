//! Similarity scoring: cosine similarity weighted by chunk importance.

use rayon::prelude::*;

use crate::models::{IndexedChunk, QueryVectorSet, ScoredMatch};

/// Cosine similarity of two vectors.
///
/// Returns `0.0` when either vector has zero norm or the lengths differ.
/// Accumulates in `f64` so long vectors do not lose precision.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_a, mut norm_b) = (0.0f64, 0.0f64, 0.0f64);
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }
    (dot / denom) as f32
}

/// Score one candidate against every query vector.
///
/// Yields one match per query vector, or nothing when the candidate's
/// embedding is missing or has a different dimension.
pub fn score_candidate(query: &QueryVectorSet, chunk: &IndexedChunk) -> Vec<ScoredMatch> {
    if chunk.embedding.len() != query.dimension() {
        tracing::debug!(
            filepath = %chunk.filepath,
            start_line = chunk.start_line,
            dimension = chunk.embedding.len(),
            expected = query.dimension(),
            "skipping candidate without a usable embedding"
        );
        return Vec::new();
    }

    query
        .iter()
        .map(|vector| {
            let similarity = cosine_similarity(vector, &chunk.embedding);
            ScoredMatch::from_chunk(chunk, similarity * chunk.importance)
        })
        .collect()
}

/// Score all candidates in parallel. Output order is unspecified.
///
/// Warns once when no candidate has the query's dimension, which points at
/// an embedding model that does not match the index.
pub fn score_candidates(query: &QueryVectorSet, chunks: &[IndexedChunk]) -> Vec<ScoredMatch> {
    let mismatched = mismatched_dimensions(query, chunks);
    if mismatched > 0 && mismatched == chunks.len() {
        tracing::warn!(
            candidates = chunks.len(),
            query_dimension = query.dimension(),
            "no candidate embedding matches the query dimension; check the embedding model against the index"
        );
    }

    chunks
        .par_iter()
        .flat_map_iter(|chunk| score_candidate(query, chunk))
        .collect()
}

/// Number of candidates whose embedding cannot be compared with `query`.
pub fn mismatched_dimensions(query: &QueryVectorSet, chunks: &[IndexedChunk]) -> usize {
    chunks
        .iter()
        .filter(|chunk| chunk.embedding.len() != query.dimension())
        .count()
}
