//! Content-hash based embedding cache.
//!
//! Caches query vector sets so re-running retrieval for the same
//! description and diff does not call the embedding provider again.

pub mod store;

use sha2::{Digest, Sha256};

use crate::models::QueryVectorSet;

/// Compute a cache key from the embedding model and the query text.
///
/// The model name is length-prefixed so `("ab", "c")` and `("a", "bc")`
/// never collide.
pub fn cache_key(model: &str, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update((model.len() as u64).to_le_bytes());
    hasher.update(model.as_bytes());
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// The cache engine for query embeddings.
pub struct CacheEngine {
    enabled: bool,
    store: store::FileStore,
}

impl CacheEngine {
    /// Create a cache engine over the default cache directory.
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            store: store::FileStore::new(),
        }
    }

    /// Create a cache engine over a specific directory.
    pub fn with_dir(enabled: bool, dir: std::path::PathBuf) -> Self {
        Self {
            enabled,
            store: store::FileStore::new_with_dir(dir),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Look up a cached vector set.
    pub fn get(&self, key: &str) -> Option<QueryVectorSet> {
        if !self.enabled {
            return None;
        }
        self.store.get(key)
    }

    /// Store a vector set in the cache.
    pub fn put(&self, key: &str, vectors: &QueryVectorSet) {
        if !self.enabled {
            return;
        }
        self.store.put(key, vectors);
    }

    /// Remove all cached entries.
    pub fn clear(&self) -> Result<store::CacheStats, std::io::Error> {
        self.store.clear()
    }

    /// Compute statistics about the cache.
    pub fn stats(&self) -> Result<store::CacheStats, std::io::Error> {
        self.store.stats()
    }

    /// Return the cache directory path.
    pub fn path(&self) -> Option<&std::path::PathBuf> {
        self.store.path()
    }
}
