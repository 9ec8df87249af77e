//! ChunkStore trait and vector store backends.
//!
//! Provides an abstraction layer over the vector+attribute store so the
//! retrieval engine can be exercised against Qdrant, a local JSON index,
//! or a test double.

pub mod memory;
pub mod qdrant;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{DiffHunk, IndexedChunk};

/// Errors from a chunk store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("vector store request failed: {0}")]
    Backend(String),

    #[error("failed to read index file {path}: {source}")]
    ReadIndex {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse index file {path}: {message}")]
    ParseIndex {
        path: std::path::PathBuf,
        message: String,
    },
}

/// Exact file-path match plus line-range overlap condition.
///
/// A chunk overlaps when `chunk.start_line <= end_line` AND
/// `chunk.end_line >= start_line`. Both bounds must hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlapFilter {
    pub filepath: String,
    pub start_line: u32,
    pub end_line: u32,
}

impl OverlapFilter {
    pub fn for_hunk(hunk: &DiffHunk) -> Self {
        Self {
            filepath: hunk.filepath.clone(),
            start_line: hunk.start_line,
            end_line: hunk.end_line,
        }
    }

    /// Interval intersection between `[chunk_start, chunk_end]` and the filter range.
    pub fn overlaps(&self, chunk_start: u32, chunk_end: u32) -> bool {
        chunk_start <= self.end_line && chunk_end >= self.start_line
    }

    /// Whether `chunk` satisfies both the path and the overlap condition.
    pub fn accepts(&self, chunk: &IndexedChunk) -> bool {
        chunk.filepath == self.filepath && self.overlaps(chunk.start_line, chunk.end_line)
    }
}

/// Read-only access to indexed code chunks.
///
/// Implementations return chunks with their stored attributes and embeddings.
/// Ordering of `filtered_search` results is unspecified; `nearest` returns
/// closest first.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    /// Return up to `limit` chunks matching `filter`.
    async fn filtered_search(
        &self,
        filter: &OverlapFilter,
        limit: usize,
    ) -> Result<Vec<IndexedChunk>, StoreError>;

    /// Return the `k` chunks nearest to `vector` across the whole index.
    async fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<IndexedChunk>, StoreError>;
}
