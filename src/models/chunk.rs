//! Index and retrieval types: stored chunks, query vectors, scored matches,
//! and the final context bundle.

use serde::{Deserialize, Serialize};
use thiserror::Error;

fn default_importance() -> f32 {
    1.0
}

/// A pre-embedded segment of repository code, as written by the indexer.
///
/// Field names match the index attribute names (`filepath`, `start_line`,
/// `end_line`, `function_name`, `content`, `embedding`, `importance`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    #[serde(default)]
    pub id: String,
    pub filepath: String,
    #[serde(default)]
    pub function_name: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub embedding: Vec<f32>,
    #[serde(default = "default_importance")]
    pub importance: f32,
}

/// Errors when assembling a [`QueryVectorSet`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VectorSetError {
    #[error("query produced no embedding vectors")]
    Empty,

    #[error("embedding vector {index} is empty")]
    EmptyVector { index: usize },

    #[error("embedding vector {index} has dimension {found}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        found: usize,
    },
}

/// The ordered embedding vectors representing one query text.
///
/// Always non-empty, and every vector has the same non-zero dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f32>>", into = "Vec<Vec<f32>>")]
pub struct QueryVectorSet {
    vectors: Vec<Vec<f32>>,
}

impl QueryVectorSet {
    /// Validate and wrap a list of vectors.
    pub fn new(vectors: Vec<Vec<f32>>) -> Result<Self, VectorSetError> {
        let expected = vectors.first().ok_or(VectorSetError::Empty)?.len();
        for (index, v) in vectors.iter().enumerate() {
            if v.is_empty() {
                return Err(VectorSetError::EmptyVector { index });
            }
            if v.len() != expected {
                return Err(VectorSetError::DimensionMismatch {
                    index,
                    expected,
                    found: v.len(),
                });
            }
        }
        Ok(Self { vectors })
    }

    /// The first vector, used for the global fallback query.
    pub fn first(&self) -> &[f32] {
        &self.vectors[0]
    }

    /// Dimensionality shared by all vectors.
    pub fn dimension(&self) -> usize {
        self.vectors[0].len()
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f32]> {
        self.vectors.iter().map(Vec::as_slice)
    }
}

impl TryFrom<Vec<Vec<f32>>> for QueryVectorSet {
    type Error = VectorSetError;

    fn try_from(vectors: Vec<Vec<f32>>) -> Result<Self, Self::Error> {
        Self::new(vectors)
    }
}

impl From<QueryVectorSet> for Vec<Vec<f32>> {
    fn from(set: QueryVectorSet) -> Self {
        set.vectors
    }
}

/// One (query vector, candidate chunk) scoring result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredMatch {
    pub filepath: String,
    pub function_name: Option<String>,
    pub start_line: u32,
    pub end_line: u32,
    pub content: String,
    pub importance: f32,
    pub score: f32,
}

impl ScoredMatch {
    /// Build a match for `chunk` with the given weighted score.
    pub fn from_chunk(chunk: &IndexedChunk, score: f32) -> Self {
        Self {
            filepath: chunk.filepath.clone(),
            function_name: chunk.function_name.clone(),
            start_line: chunk.start_line,
            end_line: chunk.end_line,
            content: chunk.content.clone(),
            importance: chunk.importance,
            score,
        }
    }

    /// Location key used for deduplication: `filepath:start-end`.
    pub fn location_key(&self) -> String {
        format!("{}:{}-{}", self.filepath, self.start_line, self.end_line)
    }
}

/// The final ranked, deduplicated context handed to the reviewer.
///
/// Built by [`crate::retrieval::aggregate`]; entries are unique by location
/// and sorted by non-increasing score.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContextBundle {
    matches: Vec<ScoredMatch>,
}

impl ContextBundle {
    /// An explicitly empty bundle ("no relevant code found").
    pub fn empty() -> Self {
        Self::default()
    }

    pub(crate) fn from_ranked(matches: Vec<ScoredMatch>) -> Self {
        Self { matches }
    }

    pub fn matches(&self) -> &[ScoredMatch] {
        &self.matches
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn into_matches(self) -> Vec<ScoredMatch> {
        self.matches
    }
}
