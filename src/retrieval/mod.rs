//! Retrieval engine: concurrent hunk-scoped search, global fallback,
//! scoring, and aggregation into a [`ContextBundle`].

pub mod aggregate;
pub mod scorer;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::RetrievalConfig;
use crate::embedding::{EmbeddingError, QueryEmbedder};
use crate::models::{ContextBundle, DiffHunk, FileHunks, IndexedChunk, QueryVectorSet, ScoredMatch};
use crate::store::{ChunkStore, OverlapFilter, StoreError};

pub use aggregate::aggregate;

/// Errors from a retrieval request.
///
/// Partial results are never returned alongside an error.
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("failed to embed query: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("fallback search failed: {0}")]
    Fallback(#[source] StoreError),

    #[error("retrieval cancelled")]
    Cancelled,

    #[error("retrieval did not finish within {}s", .0.as_secs())]
    DeadlineExceeded(Duration),
}

/// Build the text embedded for a request: the description, then the raw diff.
pub fn compose_query(description: &str, diff_text: &str) -> String {
    let description = description.trim();
    if description.is_empty() {
        diff_text.to_string()
    } else {
        format!("{description}\n\n{diff_text}")
    }
}

/// Diff-aware context retrieval over an injected store and embedder.
pub struct ContextEngine {
    store: Arc<dyn ChunkStore>,
    embedder: Arc<dyn QueryEmbedder>,
    settings: RetrievalConfig,
}

impl ContextEngine {
    pub fn new(
        store: Arc<dyn ChunkStore>,
        embedder: Arc<dyn QueryEmbedder>,
        settings: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            settings,
        }
    }

    pub fn settings(&self) -> &RetrievalConfig {
        &self.settings
    }

    /// Retrieve the most relevant indexed code for a change.
    ///
    /// The query text is embedded once. Each hunk in `parsed_diff` is searched
    /// for overlapping chunks; when those yield fewer than `min_matches`
    /// scored matches, a global nearest-neighbour query with the first query
    /// vector is added. An absent or empty diff therefore runs the fallback
    /// alone.
    pub async fn search_context(
        &self,
        query_text: &str,
        parsed_diff: Option<&[FileHunks]>,
        cancel: &CancellationToken,
    ) -> Result<ContextBundle, RetrievalError> {
        match self.settings.timeout_secs {
            Some(secs) => {
                let deadline = Duration::from_secs(secs);
                tokio::time::timeout(deadline, self.run(query_text, parsed_diff, cancel))
                    .await
                    .map_err(|_| RetrievalError::DeadlineExceeded(deadline))?
            }
            None => self.run(query_text, parsed_diff, cancel).await,
        }
    }

    async fn run(
        &self,
        query_text: &str,
        parsed_diff: Option<&[FileHunks]>,
        cancel: &CancellationToken,
    ) -> Result<ContextBundle, RetrievalError> {
        let query = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(RetrievalError::Cancelled),
            result = self.embedder.embed(query_text) => Arc::new(result?),
        };

        let hunks: Vec<DiffHunk> = parsed_diff
            .unwrap_or(&[])
            .iter()
            .flat_map(|file| file.hunks.iter().cloned())
            .collect();
        tracing::debug!(
            hunks = hunks.len(),
            query_vectors = query.len(),
            "starting context retrieval"
        );

        let candidates = self.hunk_candidates(hunks, cancel).await?;
        let mut matches = score(Arc::clone(&query), candidates).await?;

        if matches.len() < self.settings.min_matches {
            tracing::info!(
                hunk_matches = matches.len(),
                threshold = self.settings.min_matches,
                "too few hunk-scoped matches, running global fallback"
            );
            let fallback = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(RetrievalError::Cancelled),
                result = self.store.nearest(query.first(), self.settings.fallback_top_k) => {
                    result.map_err(RetrievalError::Fallback)?
                }
            };
            matches.extend(score(Arc::clone(&query), fallback).await?);
        }

        if cancel.is_cancelled() {
            return Err(RetrievalError::Cancelled);
        }

        let bundle = aggregate(matches, self.settings.max_results);
        tracing::debug!(results = bundle.len(), "context retrieval finished");
        Ok(bundle)
    }

    /// Run every hunk-scoped query and merge the candidates once all finish.
    ///
    /// A failed query is logged and contributes nothing.
    async fn hunk_candidates(
        &self,
        hunks: Vec<DiffHunk>,
        cancel: &CancellationToken,
    ) -> Result<Vec<IndexedChunk>, RetrievalError> {
        if hunks.is_empty() {
            return Ok(Vec::new());
        }

        let semaphore = Arc::new(Semaphore::new(self.settings.max_concurrent.max(1)));
        let mut join_set = JoinSet::new();

        for hunk in hunks {
            let store = Arc::clone(&self.store);
            let sem = Arc::clone(&semaphore);
            let cancel = cancel.clone();
            let limit = self.settings.hunk_candidate_limit;

            join_set.spawn(async move {
                let Ok(_permit) = sem.acquire_owned().await else {
                    return Vec::new();
                };
                let filter = OverlapFilter::for_hunk(&hunk);

                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Vec::new(),
                    result = store.filtered_search(&filter, limit) => result,
                };

                match result {
                    Ok(chunks) => {
                        let returned = chunks.len();
                        let kept: Vec<IndexedChunk> =
                            chunks.into_iter().filter(|c| filter.accepts(c)).collect();
                        if kept.len() < returned {
                            tracing::debug!(
                                filepath = %hunk.filepath,
                                dropped = returned - kept.len(),
                                "store returned chunks outside the hunk range"
                            );
                        }
                        kept
                    }
                    Err(e) => {
                        tracing::warn!(
                            filepath = %hunk.filepath,
                            start_line = hunk.start_line,
                            end_line = hunk.end_line,
                            error = %e,
                            "hunk query failed, skipping"
                        );
                        Vec::new()
                    }
                }
            });
        }

        let mut candidates = Vec::new();
        loop {
            let joined = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    join_set.abort_all();
                    return Err(RetrievalError::Cancelled);
                }
                next = join_set.join_next() => next,
            };
            match joined {
                Some(Ok(chunks)) => candidates.extend(chunks),
                Some(Err(e)) => tracing::warn!("hunk query task failed: {e}"),
                None => break,
            }
        }

        Ok(candidates)
    }
}

/// Score candidates on the blocking pool.
async fn score(
    query: Arc<QueryVectorSet>,
    candidates: Vec<IndexedChunk>,
) -> Result<Vec<ScoredMatch>, RetrievalError> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }
    match tokio::task::spawn_blocking(move || scorer::score_candidates(&query, &candidates)).await {
        Ok(matches) => Ok(matches),
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(RetrievalError::Cancelled),
    }
}
