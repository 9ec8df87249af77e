//! Caching decorator for any [`QueryEmbedder`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::cache::{self, CacheEngine};
use crate::models::QueryVectorSet;

use super::{EmbeddingError, QueryEmbedder};

/// Serves repeated query texts from the on-disk cache.
///
/// Entries are keyed by the embedder label and the text; the label must
/// change whenever the vectors for a text could. Failed embeddings are not
/// cached.
pub struct CachedEmbedder {
    inner: Arc<dyn QueryEmbedder>,
    cache: CacheEngine,
    model: String,
}

impl CachedEmbedder {
    pub fn new(inner: Arc<dyn QueryEmbedder>, cache: CacheEngine, model: impl Into<String>) -> Self {
        Self {
            inner,
            cache,
            model: model.into(),
        }
    }
}

#[async_trait]
impl QueryEmbedder for CachedEmbedder {
    async fn embed(&self, text: &str) -> Result<QueryVectorSet, EmbeddingError> {
        let key = cache::cache_key(&self.model, text);
        if let Some(cached) = self.cache.get(&key) {
            tracing::debug!(model = %self.model, vectors = cached.len(), "embedding cache hit");
            return Ok(cached);
        }

        let vectors = self.inner.embed(text).await?;
        self.cache.put(&key, &vectors);
        Ok(vectors)
    }
}
