//! In-memory chunk store backed by a JSON index file.
//!
//! Serves both queries by brute force: an exact scan for filtered search
//! and a full cosine ranking for nearest-neighbour search. Intended for
//! offline runs against an exported index and for tests.

use std::path::Path;

use async_trait::async_trait;

use crate::models::IndexedChunk;
use crate::retrieval::scorer::cosine_similarity;

use super::{ChunkStore, OverlapFilter, StoreError};

/// Chunk store holding every chunk in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    chunks: Vec<IndexedChunk>,
}

impl MemoryStore {
    pub fn from_chunks(chunks: Vec<IndexedChunk>) -> Self {
        Self { chunks }
    }

    /// Load chunks from a JSON array or a JSON-lines file.
    pub async fn load(path: &Path) -> Result<Self, StoreError> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| StoreError::ReadIndex {
                path: path.to_path_buf(),
                source,
            })?;
        let chunks = parse_index(&content).map_err(|message| StoreError::ParseIndex {
            path: path.to_path_buf(),
            message,
        })?;
        let chunks = drop_inverted(chunks);
        tracing::debug!(path = %path.display(), chunks = chunks.len(), "loaded index file");
        Ok(Self::from_chunks(chunks))
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Remove records whose line range is inverted (`start_line > end_line`).
fn drop_inverted(chunks: Vec<IndexedChunk>) -> Vec<IndexedChunk> {
    chunks
        .into_iter()
        .filter(|chunk| {
            let valid = chunk.start_line <= chunk.end_line;
            if !valid {
                tracing::debug!(
                    id = %chunk.id,
                    filepath = %chunk.filepath,
                    start_line = chunk.start_line,
                    end_line = chunk.end_line,
                    "skipping chunk with inverted line range"
                );
            }
            valid
        })
        .collect()
}

/// Parse index content as a JSON array, falling back to JSON lines.
fn parse_index(content: &str) -> Result<Vec<IndexedChunk>, String> {
    let trimmed = content.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }
    if trimmed.starts_with('[') {
        return serde_json::from_str(trimmed).map_err(|e| e.to_string());
    }

    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| {
            serde_json::from_str::<IndexedChunk>(line).map_err(|e| format!("line {}: {e}", n + 1))
        })
        .collect()
}

#[async_trait]
impl ChunkStore for MemoryStore {
    async fn filtered_search(
        &self,
        filter: &OverlapFilter,
        limit: usize,
    ) -> Result<Vec<IndexedChunk>, StoreError> {
        Ok(self
            .chunks
            .iter()
            .filter(|chunk| filter.accepts(chunk))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<IndexedChunk>, StoreError> {
        let mut ranked: Vec<(f32, &IndexedChunk)> = self
            .chunks
            .iter()
            .filter(|chunk| chunk.embedding.len() == vector.len())
            .map(|chunk| (cosine_similarity(vector, &chunk.embedding), chunk))
            .collect();
        ranked.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(_, chunk)| chunk.clone())
            .collect())
    }
}
