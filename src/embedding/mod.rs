//! QueryEmbedder trait and embedding backends.
//!
//! Provides an abstraction layer over the embedding provider so the
//! retrieval engine only ever sees a validated [`QueryVectorSet`].

pub mod cache;
pub mod rig;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::QueryVectorSet;
use crate::models::chunk::VectorSetError;

/// Errors from the embedding provider.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("embedding API error: {0}")]
    ApiError(String),

    #[error("embedding provider not configured: {0}")]
    NotConfigured(String),

    #[error("nothing to embed: query text is empty")]
    EmptyInput,

    #[error("invalid embedding response: {0}")]
    InvalidVectors(#[from] VectorSetError),
}

/// Turns query text into one or more embedding vectors.
///
/// Long input may yield several vectors; the set is ordered and never empty.
#[async_trait]
pub trait QueryEmbedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<QueryVectorSet, EmbeddingError>;
}

/// Split `text` into pieces of at most `max_chars` characters.
///
/// Pieces break on line boundaries; a single line longer than `max_chars`
/// is split on character boundaries. Whitespace-only input yields no pieces.
pub fn split_for_embedding(text: &str, max_chars: usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    let max_chars = max_chars.max(1);

    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;

    for line in text.split_inclusive('\n') {
        let line_chars = line.chars().count();

        if current_chars + line_chars > max_chars && !current.is_empty() {
            pieces.push(std::mem::take(&mut current));
            current_chars = 0;
        }

        if line_chars > max_chars {
            let chars: Vec<char> = line.chars().collect();
            for part in chars.chunks(max_chars) {
                pieces.push(part.iter().collect());
            }
            continue;
        }

        current.push_str(line);
        current_chars += line_chars;
    }
    if !current.is_empty() {
        pieces.push(current);
    }

    pieces.retain(|p| !p.trim().is_empty());
    pieces
}
