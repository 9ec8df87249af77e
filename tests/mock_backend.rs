//! Integration tests using mock store and embedder backends.
//!
//! Validates the retrieval pipeline end-to-end without a vector database
//! or embedding API: a counting decorator over `MemoryStore` records how
//! often each query path runs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use diffscope::config::RetrievalConfig;
use diffscope::embedding::{EmbeddingError, QueryEmbedder};
use diffscope::models::{FileHunks, IndexedChunk, QueryVectorSet};
use diffscope::store::memory::MemoryStore;
use diffscope::store::{ChunkStore, OverlapFilter, StoreError};
use diffscope::{ContextEngine, RetrievalError, extract_hunks, format_context};

/// An embedder that returns fixed vectors and counts calls.
struct MockEmbedder {
    vectors: Vec<Vec<f32>>,
    fail: bool,
    calls: AtomicUsize,
}

impl MockEmbedder {
    fn new(vectors: Vec<Vec<f32>>) -> Self {
        Self {
            vectors,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(vec![])
        }
    }
}

#[async_trait]
impl QueryEmbedder for MockEmbedder {
    async fn embed(&self, _text: &str) -> Result<QueryVectorSet, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(EmbeddingError::ApiError("401 Unauthorized".into()));
        }
        Ok(QueryVectorSet::new(self.vectors.clone())?)
    }
}

/// A store wrapper that counts calls and can fail or stall on demand.
#[derive(Default)]
struct MockStore {
    inner: MemoryStore,
    fail_filtered: bool,
    fail_nearest: bool,
    delay: Option<Duration>,
    filtered_calls: AtomicUsize,
    nearest_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    filtered_ids: Mutex<Vec<String>>,
}

impl MockStore {
    fn new(chunks: Vec<IndexedChunk>) -> Self {
        Self {
            inner: MemoryStore::from_chunks(chunks),
            ..Self::default()
        }
    }

    fn filtered(&self) -> usize {
        self.filtered_calls.load(Ordering::SeqCst)
    }

    fn nearest(&self) -> usize {
        self.nearest_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChunkStore for MockStore {
    async fn filtered_search(
        &self,
        filter: &OverlapFilter,
        limit: usize,
    ) -> Result<Vec<IndexedChunk>, StoreError> {
        self.filtered_calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let result = if self.fail_filtered {
            Err(StoreError::Backend("connection reset".into()))
        } else {
            self.inner.filtered_search(filter, limit).await
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if let Ok(ref chunks) = result {
            self.filtered_ids
                .lock()
                .unwrap()
                .extend(chunks.iter().map(|c| c.id.clone()));
        }
        result
    }

    async fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<IndexedChunk>, StoreError> {
        self.nearest_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_nearest {
            return Err(StoreError::Backend("collection not found".into()));
        }
        self.inner.nearest(vector, k).await
    }
}

fn chunk(id: &str, path: &str, start: u32, end: u32, embedding: Vec<f32>, importance: f32) -> IndexedChunk {
    IndexedChunk {
        id: id.into(),
        filepath: path.into(),
        function_name: None,
        start_line: start,
        end_line: end,
        content: String::new(),
        embedding,
        importance,
    }
}

/// Unit vector whose cosine with `[1, 0]` is `cos`.
fn at_cosine(cos: f32) -> Vec<f32> {
    vec![cos, (1.0 - cos * cos).sqrt()]
}

fn engine(store: Arc<MockStore>, embedder: Arc<MockEmbedder>, settings: RetrievalConfig) -> ContextEngine {
    ContextEngine::new(store, embedder, settings)
}

fn one_hunk(path: &str, start: u32, end: u32) -> Vec<FileHunks> {
    extract_hunks(&format!(
        "--- a/{path}\n+++ b/{path}\n@@ -{start},{n} +{start},{n} @@\n",
        n = end - start + 1
    ))
}

const A_PY_DIFF: &str = "\
diff --git a/a.py b/a.py
index 1111111..2222222 100644
--- a/a.py
+++ b/a.py
@@ -10,11 +10,11 @@ def handler():
     x = 1
-    for i in range(len(items) + 1):
+    for i in range(len(items)):
         total += items[i]
     y = 2
     z = 3
     a = 4
     b = 5
     c = 6
     d = 7
     e = 8
     f = 9
";

#[tokio::test]
async fn end_to_end_hunk_scoped_retrieval() {
    let store = Arc::new(MockStore::new(vec![
        chunk("c1", "a.py", 8, 22, at_cosine(0.9), 2.0),
        chunk("c2", "a.py", 100, 110, at_cosine(0.95), 1.0),
    ]));
    let embedder = Arc::new(MockEmbedder::new(vec![vec![1.0, 0.0]]));
    let files = extract_hunks(A_PY_DIFF);
    assert_eq!(files[0].hunks[0].start_line, 10);
    assert_eq!(files[0].hunks[0].end_line, 20);

    let bundle = engine(store.clone(), embedder.clone(), RetrievalConfig::default())
        .search_context("fix off-by-one", Some(&files), &CancellationToken::new())
        .await
        .unwrap();

    // Hunk-scoped search only ever saw the overlapping chunk
    assert_eq!(*store.filtered_ids.lock().unwrap(), vec!["c1".to_string()]);
    assert_eq!(store.filtered(), 1);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);

    let top = &bundle.matches()[0];
    assert_eq!((top.filepath.as_str(), top.start_line, top.end_line), ("a.py", 8, 22));
    assert!((top.score - 1.8).abs() < 1e-4, "score {}", top.score);

    // One hunk match is below the threshold, so the fallback adds c2
    assert_eq!(store.nearest(), 1);
    assert_eq!(bundle.len(), 2);
    assert_eq!(bundle.matches()[1].start_line, 100);
}

#[tokio::test]
async fn zero_hunks_invokes_only_the_fallback() {
    let store = Arc::new(MockStore::new(vec![chunk("c1", "a.py", 1, 5, vec![1.0, 0.0], 1.0)]));
    let embedder = Arc::new(MockEmbedder::new(vec![vec![1.0, 0.0]]));

    let bundle = engine(store.clone(), embedder, RetrievalConfig::default())
        .search_context("describe", None, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(store.filtered(), 0);
    assert_eq!(store.nearest(), 1);
    assert_eq!(bundle.len(), 1);
}

#[tokio::test]
async fn diff_without_hunks_invokes_only_the_fallback() {
    let store = Arc::new(MockStore::new(vec![chunk("c1", "a.py", 1, 5, vec![1.0, 0.0], 1.0)]));
    let embedder = Arc::new(MockEmbedder::new(vec![vec![1.0, 0.0]]));
    let files = extract_hunks(
        "diff --git a/img.png b/img.png\nindex 1..2 100644\nBinary files a/img.png and b/img.png differ\n",
    );
    assert_eq!(files.len(), 1);
    assert!(files[0].hunks.is_empty());

    engine(store.clone(), embedder, RetrievalConfig::default())
        .search_context("q", Some(&files), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(store.filtered(), 0);
    assert_eq!(store.nearest(), 1);
}

#[tokio::test]
async fn four_hunk_matches_trigger_fallback_and_merge() {
    let mut chunks: Vec<IndexedChunk> = (0..4)
        .map(|i| chunk(&format!("a{i}"), "a.py", 10 * i + 1, 10 * i + 5, at_cosine(0.5), 1.0))
        .collect();
    chunks.push(chunk("b0", "b.py", 1, 9, vec![1.0, 0.0], 1.0));
    let store = Arc::new(MockStore::new(chunks));
    let embedder = Arc::new(MockEmbedder::new(vec![vec![1.0, 0.0]]));

    let bundle = engine(store.clone(), embedder, RetrievalConfig::default())
        .search_context("q", Some(&one_hunk("a.py", 1, 40)), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(store.filtered(), 1);
    assert_eq!(store.nearest(), 1);
    // Fallback results are merged before dedup: 4 a.py chunks appear once each
    assert_eq!(bundle.len(), 5);
    assert_eq!(bundle.matches()[0].filepath, "b.py");
    assert!(bundle.matches()[1..].iter().all(|m| m.filepath == "a.py"));
}

#[tokio::test]
async fn five_hunk_matches_skip_fallback() {
    let chunks: Vec<IndexedChunk> = (0..5)
        .map(|i| chunk(&format!("a{i}"), "a.py", 10 * i + 1, 10 * i + 5, vec![1.0, 0.0], 1.0))
        .collect();
    let store = Arc::new(MockStore::new(chunks));
    let embedder = Arc::new(MockEmbedder::new(vec![vec![1.0, 0.0]]));

    let bundle = engine(store.clone(), embedder, RetrievalConfig::default())
        .search_context("q", Some(&one_hunk("a.py", 1, 50)), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(store.nearest(), 0);
    assert_eq!(bundle.len(), 5);
}

#[tokio::test]
async fn fallback_threshold_counts_matches_across_files() {
    // Three matches in one file and two in another: five in total
    let store = Arc::new(MockStore::new(vec![
        chunk("a1", "a.py", 1, 2, vec![1.0, 0.0], 1.0),
        chunk("a2", "a.py", 3, 4, vec![1.0, 0.0], 1.0),
        chunk("a3", "a.py", 5, 6, vec![1.0, 0.0], 1.0),
        chunk("b1", "b.py", 1, 2, vec![1.0, 0.0], 1.0),
        chunk("b2", "b.py", 3, 4, vec![1.0, 0.0], 1.0),
    ]));
    let embedder = Arc::new(MockEmbedder::new(vec![vec![1.0, 0.0]]));
    let mut files = one_hunk("a.py", 1, 6);
    files.extend(one_hunk("b.py", 1, 4));

    engine(store.clone(), embedder, RetrievalConfig::default())
        .search_context("q", Some(&files), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(store.filtered(), 2);
    assert_eq!(store.nearest(), 0);
}

#[tokio::test]
async fn every_query_vector_scores_independently() {
    let store = Arc::new(MockStore::new(vec![chunk("c", "a.py", 1, 5, vec![0.0, 1.0], 1.0)]));
    // The first vector is orthogonal to the chunk, the second identical
    let embedder = Arc::new(MockEmbedder::new(vec![vec![1.0, 0.0], vec![0.0, 1.0]]));
    let settings = RetrievalConfig {
        min_matches: 0,
        ..RetrievalConfig::default()
    };

    let bundle = engine(store, embedder, settings)
        .search_context("q", Some(&one_hunk("a.py", 1, 5)), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(bundle.len(), 1);
    assert!((bundle.matches()[0].score - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn bundle_is_bounded_and_sorted() {
    let chunks: Vec<IndexedChunk> = (0..30)
        .map(|i| chunk(&format!("c{i}"), "a.py", i + 1, i + 1, at_cosine(i as f32 / 30.0), 1.0))
        .collect();
    let store = Arc::new(MockStore::new(chunks));
    let embedder = Arc::new(MockEmbedder::new(vec![vec![1.0, 0.0]]));

    let bundle = engine(store, embedder, RetrievalConfig::default())
        .search_context("q", Some(&one_hunk("a.py", 1, 30)), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(bundle.len(), 10);
    assert!(bundle.matches().windows(2).all(|w| w[0].score >= w[1].score));
    assert_eq!(bundle.matches()[0].start_line, 30);
}

#[tokio::test]
async fn failed_hunk_query_is_skipped() {
    let store = Arc::new(MockStore {
        fail_filtered: true,
        ..MockStore::new(vec![chunk("c1", "a.py", 1, 5, vec![1.0, 0.0], 1.0)])
    });
    let embedder = Arc::new(MockEmbedder::new(vec![vec![1.0, 0.0]]));

    let bundle = engine(store.clone(), embedder, RetrievalConfig::default())
        .search_context("q", Some(&one_hunk("a.py", 1, 5)), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(store.filtered(), 1);
    assert_eq!(store.nearest(), 1);
    assert_eq!(bundle.len(), 1);
}

#[tokio::test]
async fn failed_fallback_is_fatal() {
    let store = Arc::new(MockStore {
        fail_nearest: true,
        ..MockStore::new(vec![])
    });
    let embedder = Arc::new(MockEmbedder::new(vec![vec![1.0, 0.0]]));

    let err = engine(store, embedder, RetrievalConfig::default())
        .search_context("q", None, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, RetrievalError::Fallback(_)), "got {err}");
}

#[tokio::test]
async fn embedding_failure_is_fatal_and_skips_the_store() {
    let store = Arc::new(MockStore::new(vec![chunk("c1", "a.py", 1, 5, vec![1.0, 0.0], 1.0)]));
    let embedder = Arc::new(MockEmbedder::failing());

    let err = engine(store.clone(), embedder, RetrievalConfig::default())
        .search_context("q", Some(&one_hunk("a.py", 1, 5)), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, RetrievalError::Embedding(_)), "got {err}");
    assert_eq!(store.filtered(), 0);
    assert_eq!(store.nearest(), 0);
}

#[tokio::test]
async fn concurrent_hunk_queries_respect_the_cap() {
    let store = Arc::new(MockStore {
        delay: Some(Duration::from_millis(20)),
        ..MockStore::new(vec![])
    });
    let embedder = Arc::new(MockEmbedder::new(vec![vec![1.0, 0.0]]));
    let files: Vec<FileHunks> = (0..10)
        .flat_map(|i| one_hunk(&format!("f{i}.rs"), 1, 3))
        .collect();
    let settings = RetrievalConfig {
        max_concurrent: 2,
        ..RetrievalConfig::default()
    };

    engine(store.clone(), embedder, settings)
        .search_context("q", Some(&files), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(store.filtered(), 10);
    assert!(store.max_in_flight.load(Ordering::SeqCst) <= 2);
}

#[tokio::test]
async fn cancellation_discards_partial_results() {
    let store = Arc::new(MockStore {
        delay: Some(Duration::from_secs(60)),
        ..MockStore::new(vec![chunk("c1", "a.py", 1, 5, vec![1.0, 0.0], 1.0)])
    });
    let embedder = Arc::new(MockEmbedder::new(vec![vec![1.0, 0.0]]));
    let cancel = CancellationToken::new();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    let err = engine(store.clone(), embedder, RetrievalConfig::default())
        .search_context("q", Some(&one_hunk("a.py", 1, 5)), &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, RetrievalError::Cancelled), "got {err}");
    assert_eq!(store.nearest(), 0);
}

#[tokio::test]
async fn deadline_is_a_typed_error() {
    let store = Arc::new(MockStore {
        delay: Some(Duration::from_secs(60)),
        ..MockStore::new(vec![])
    });
    let embedder = Arc::new(MockEmbedder::new(vec![vec![1.0, 0.0]]));
    let settings = RetrievalConfig {
        timeout_secs: Some(1),
        ..RetrievalConfig::default()
    };

    let err = engine(store, embedder, settings)
        .search_context("q", Some(&one_hunk("a.py", 1, 5)), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, RetrievalError::DeadlineExceeded(_)), "got {err}");
}

#[tokio::test]
async fn retrieved_bundle_formats_as_context_blocks() {
    let mut c = chunk("c1", "a.py", 2, 3, vec![1.0, 0.0], 2.0);
    c.function_name = Some("handler".into());
    c.content = "def handler():\n    x = 1\n    return x\n".into();
    let store = Arc::new(MockStore::new(vec![c]));
    let embedder = Arc::new(MockEmbedder::new(vec![vec![1.0, 0.0]]));

    let bundle = engine(store, embedder, RetrievalConfig::default())
        .search_context("q", Some(&one_hunk("a.py", 1, 5)), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        format_context(&bundle),
        "File: a.py\nLines: 2-3\nFunction: handler\nImportance: 2.00\nCode:\n    x = 1\n    return x"
    );
}
