//! App-wide constants.
//!
//! Centralises the tool name, config paths, environment variable names,
//! and retrieval limits so a rename only requires changing this file.

/// Display name of the tool (lowercase).
pub const APP_NAME: &str = "diffscope";

/// Crate version, baked in at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Local config filename (e.g. `.diffscope.toml` in repo root).
pub const CONFIG_FILENAME: &str = ".diffscope.toml";

/// Directory name under `~/.config/` and `~/.cache/` for global config and cache.
pub const CONFIG_DIR: &str = "diffscope";

// ── Retrieval limits ────────────────────────────────────────────────

/// Maximum candidates fetched per hunk-scoped query.
pub const HUNK_CANDIDATE_LIMIT: usize = 200;

/// Number of nearest neighbours fetched by the global fallback query.
pub const FALLBACK_TOP_K: usize = 50;

/// Hunk-scoped matches below this count trigger the fallback query.
pub const MIN_MATCHES: usize = 5;

/// Maximum number of entries in a context bundle.
pub const MAX_RESULTS: usize = 10;

/// Default cap on concurrently running hunk queries.
pub const DEFAULT_MAX_CONCURRENT: usize = 8;

// ── Environment variable names ──────────────────────────────────────

pub const ENV_EMBED_PROVIDER: &str = "DIFFSCOPE_EMBED_PROVIDER";
pub const ENV_EMBED_MODEL: &str = "DIFFSCOPE_EMBED_MODEL";
pub const ENV_EMBED_BASE_URL: &str = "DIFFSCOPE_EMBED_BASE_URL";
pub const ENV_API_KEY: &str = "DIFFSCOPE_API_KEY";
pub const ENV_QDRANT_URL: &str = "DIFFSCOPE_QDRANT_URL";
pub const ENV_QDRANT_API_KEY: &str = "DIFFSCOPE_QDRANT_API_KEY";
pub const ENV_COLLECTION: &str = "DIFFSCOPE_COLLECTION";
pub const ENV_MAX_CONCURRENT: &str = "DIFFSCOPE_MAX_CONCURRENT";
