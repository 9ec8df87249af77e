//! Config struct and loading logic.
//!
//! Priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables
//! 3. `.diffscope.toml` in repo root
//! 4. `~/.config/diffscope/config.toml` (global defaults)
//! 5. Built-in defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::constants;
use crate::env::Env;
use crate::models::ProviderName;

/// Errors during config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub store: StoreConfig,
    pub cache: CacheConfig,
}

/// Retrieval limits and concurrency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Candidates fetched per hunk-scoped query.
    pub hunk_candidate_limit: usize,
    /// Nearest neighbours fetched by the fallback query.
    pub fallback_top_k: usize,
    /// Hunk-scoped match count below which the fallback runs.
    pub min_matches: usize,
    /// Maximum entries in the context bundle.
    pub max_results: usize,
    /// Concurrent hunk queries.
    pub max_concurrent: usize,
    /// Whole-request deadline in seconds.
    pub timeout_secs: Option<u64>,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            hunk_candidate_limit: constants::HUNK_CANDIDATE_LIMIT,
            fallback_top_k: constants::FALLBACK_TOP_K,
            min_matches: constants::MIN_MATCHES,
            max_results: constants::MAX_RESULTS,
            max_concurrent: constants::DEFAULT_MAX_CONCURRENT,
            timeout_secs: None,
        }
    }
}

/// Embedding provider configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: ProviderName,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Longest piece of query text sent in one embedding input.
    pub max_input_chars: usize,
}

impl EmbeddingConfig {
    /// Cache namespace for the vectors this configuration produces.
    ///
    /// Includes the endpoint and split size as well as the model name.
    pub fn cache_label(&self) -> String {
        format!(
            "{}/{}@{}#{}",
            self.provider,
            self.model,
            self.base_url.as_deref().unwrap_or("-"),
            self.max_input_chars
        )
    }
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("max_input_chars", &self.max_input_chars)
            .finish()
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: ProviderName::OpenAI,
            model: "text-embedding-3-small".to_string(),
            base_url: None,
            api_key: None,
            max_input_chars: 8000,
        }
    }
}

/// Vector store connection.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub url: String,
    pub collection: String,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("url", &self.url)
            .field("collection", &self.collection)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:6334".to_string(),
            collection: "code_chunks".to_string(),
            api_key: None,
        }
    }
}

/// Embedding cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Load configuration with proper layering.
    ///
    /// Reads from global config, repo-local config, then applies
    /// environment variable overrides. CLI flags are applied by the caller.
    pub fn load(repo_root: Option<&Path>, env: &Env) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // Layer 4: global config
        if let Some(global_path) = Self::global_config_path() {
            if global_path.exists() {
                let global = Self::load_file(&global_path)?;
                config.merge(global);
            }
        }

        // Layer 3: repo-local config
        if let Some(root) = repo_root {
            let local_path = root.join(constants::CONFIG_FILENAME);
            if local_path.exists() {
                let local = Self::load_file(&local_path)?;
                config.merge(local);
            }
        }

        // Layer 2: environment variables
        config.apply_env_vars(env);

        Ok(config)
    }

    /// Load a config from a specific file.
    fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the global config file path.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(constants::CONFIG_DIR).join("config.toml"))
    }

    /// Merge another config into this one (other takes precedence for non-default values).
    fn merge(&mut self, other: Config) {
        let default_retrieval = RetrievalConfig::default();
        if other.retrieval.hunk_candidate_limit != default_retrieval.hunk_candidate_limit {
            self.retrieval.hunk_candidate_limit = other.retrieval.hunk_candidate_limit;
        }
        if other.retrieval.fallback_top_k != default_retrieval.fallback_top_k {
            self.retrieval.fallback_top_k = other.retrieval.fallback_top_k;
        }
        if other.retrieval.min_matches != default_retrieval.min_matches {
            self.retrieval.min_matches = other.retrieval.min_matches;
        }
        if other.retrieval.max_results != default_retrieval.max_results {
            self.retrieval.max_results = other.retrieval.max_results;
        }
        if other.retrieval.max_concurrent != default_retrieval.max_concurrent {
            self.retrieval.max_concurrent = other.retrieval.max_concurrent;
        }
        if other.retrieval.timeout_secs.is_some() {
            self.retrieval.timeout_secs = other.retrieval.timeout_secs;
        }

        let default_embedding = EmbeddingConfig::default();
        if other.embedding.provider != default_embedding.provider {
            self.embedding.provider = other.embedding.provider;
        }
        if other.embedding.model != default_embedding.model {
            self.embedding.model = other.embedding.model;
        }
        if other.embedding.base_url.is_some() {
            self.embedding.base_url = other.embedding.base_url;
        }
        if other.embedding.api_key.is_some() {
            self.embedding.api_key = other.embedding.api_key;
        }
        if other.embedding.max_input_chars != default_embedding.max_input_chars {
            self.embedding.max_input_chars = other.embedding.max_input_chars;
        }

        let default_store = StoreConfig::default();
        if other.store.url != default_store.url {
            self.store.url = other.store.url;
        }
        if other.store.collection != default_store.collection {
            self.store.collection = other.store.collection;
        }
        if other.store.api_key.is_some() {
            self.store.api_key = other.store.api_key;
        }

        // Disabled overrides enabled
        if !other.cache.enabled {
            self.cache.enabled = false;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_vars(&mut self, env: &Env) {
        match env.parsed::<ProviderName>(constants::ENV_EMBED_PROVIDER) {
            Some(Ok(name)) => self.embedding.provider = name,
            Some(Err(val)) => tracing::warn!(
                "ignoring invalid {} value: {val}",
                constants::ENV_EMBED_PROVIDER
            ),
            None => {}
        }
        if let Some(val) = env.var(constants::ENV_EMBED_MODEL) {
            self.embedding.model = val;
        }
        if let Some(val) = env.var(constants::ENV_EMBED_BASE_URL) {
            self.embedding.base_url = Some(val);
        }

        // Provider-specific API key resolution
        let api_key = env
            .var(constants::ENV_API_KEY)
            .or_else(|| env.var(self.embedding.provider.api_key_env_var()));
        if api_key.is_some() {
            self.embedding.api_key = api_key;
        }

        if let Some(val) = env.var(constants::ENV_QDRANT_URL) {
            self.store.url = val;
        }
        if let Some(val) = env.var(constants::ENV_QDRANT_API_KEY) {
            self.store.api_key = Some(val);
        }
        if let Some(val) = env.var(constants::ENV_COLLECTION) {
            self.store.collection = val;
        }

        match env.parsed::<usize>(constants::ENV_MAX_CONCURRENT) {
            Some(Ok(n)) if n > 0 => self.retrieval.max_concurrent = n,
            Some(Ok(_)) | Some(Err(_)) => tracing::warn!(
                "ignoring invalid {} value: expected a positive integer",
                constants::ENV_MAX_CONCURRENT
            ),
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env() -> Env {
        Env::mock(Vec::<(&str, &str)>::new())
    }

    #[test]
    fn cache_label_covers_endpoint_and_splitting() {
        let base = EmbeddingConfig {
            provider: ProviderName::OpenAICompatible,
            model: "m".into(),
            base_url: Some("http://a:8080/v1".into()),
            ..EmbeddingConfig::default()
        };
        assert_eq!(base.cache_label(), "openai-compatible/m@http://a:8080/v1#8000");

        let other_url = EmbeddingConfig {
            base_url: Some("http://b:8080/v1".into()),
            ..base.clone()
        };
        let other_split = EmbeddingConfig {
            max_input_chars: 4000,
            ..base.clone()
        };
        assert_ne!(base.cache_label(), other_url.cache_label());
        assert_ne!(base.cache_label(), other_split.cache_label());
        assert_eq!(
            EmbeddingConfig::default().cache_label(),
            "openai/text-embedding-3-small@-#8000"
        );
    }

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.embedding.provider, ProviderName::OpenAI);
        assert_eq!(config.embedding.model, "text-embedding-3-small");
        assert_eq!(config.embedding.max_input_chars, 8000);
        assert_eq!(config.retrieval.hunk_candidate_limit, 200);
        assert_eq!(config.retrieval.fallback_top_k, 50);
        assert_eq!(config.retrieval.min_matches, 5);
        assert_eq!(config.retrieval.max_results, 10);
        assert_eq!(config.retrieval.max_concurrent, 8);
        assert!(config.retrieval.timeout_secs.is_none());
        assert_eq!(config.store.url, "http://localhost:6334");
        assert_eq!(config.store.collection, "code_chunks");
        assert!(config.cache.enabled);
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[retrieval]
max_concurrent = 4
timeout_secs = 30

[embedding]
provider = "gemini"
model = "text-embedding-004"

[store]
collection = "repo_chunks"

[cache]
enabled = false
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.retrieval.max_concurrent, 4);
        assert_eq!(config.retrieval.timeout_secs, Some(30));
        assert_eq!(config.retrieval.max_results, 10);
        assert_eq!(config.embedding.provider, ProviderName::Gemini);
        assert_eq!(config.embedding.model, "text-embedding-004");
        assert_eq!(config.store.collection, "repo_chunks");
        assert_eq!(config.store.url, "http://localhost:6334");
        assert!(!config.cache.enabled);
    }

    #[test]
    fn parse_openai_compatible_provider() {
        let config: Config = toml::from_str(
            r#"
[embedding]
provider = "openai-compatible"
base_url = "http://localhost:11434/v1"
"#,
        )
        .unwrap();
        assert_eq!(config.embedding.provider, ProviderName::OpenAICompatible);
        assert_eq!(
            config.embedding.base_url.as_deref(),
            Some("http://localhost:11434/v1")
        );
    }

    #[test]
    fn merge_overrides_non_default_values() {
        let mut base = Config::default();
        let mut other = Config::default();

        other.retrieval.hunk_candidate_limit = 100;
        other.retrieval.fallback_top_k = 20;
        other.retrieval.min_matches = 3;
        other.retrieval.max_results = 15;
        other.retrieval.max_concurrent = 2;
        other.retrieval.timeout_secs = Some(10);
        other.embedding.provider = ProviderName::Gemini;
        other.embedding.model = "text-embedding-004".to_string();
        other.embedding.base_url = Some("https://custom.api".to_string());
        other.embedding.api_key = Some("sk-test".to_string());
        other.embedding.max_input_chars = 2000;
        other.store.url = "http://qdrant:6334".to_string();
        other.store.collection = "other".to_string();
        other.store.api_key = Some("qd-key".to_string());
        other.cache.enabled = false;

        base.merge(other);

        assert_eq!(base.retrieval.hunk_candidate_limit, 100);
        assert_eq!(base.retrieval.fallback_top_k, 20);
        assert_eq!(base.retrieval.min_matches, 3);
        assert_eq!(base.retrieval.max_results, 15);
        assert_eq!(base.retrieval.max_concurrent, 2);
        assert_eq!(base.retrieval.timeout_secs, Some(10));
        assert_eq!(base.embedding.provider, ProviderName::Gemini);
        assert_eq!(base.embedding.model, "text-embedding-004");
        assert_eq!(base.embedding.base_url.as_deref(), Some("https://custom.api"));
        assert_eq!(base.embedding.api_key.as_deref(), Some("sk-test"));
        assert_eq!(base.embedding.max_input_chars, 2000);
        assert_eq!(base.store.url, "http://qdrant:6334");
        assert_eq!(base.store.collection, "other");
        assert_eq!(base.store.api_key.as_deref(), Some("qd-key"));
        assert!(!base.cache.enabled);
    }

    #[test]
    fn merge_keeps_base_when_other_is_default() {
        let mut base = Config::default();
        base.embedding.provider = ProviderName::Gemini;
        base.store.collection = "mine".to_string();
        base.retrieval.timeout_secs = Some(5);

        base.merge(Config::default());

        assert_eq!(base.embedding.provider, ProviderName::Gemini);
        assert_eq!(base.store.collection, "mine");
        assert_eq!(base.retrieval.timeout_secs, Some(5));
        assert!(base.cache.enabled);
    }

    #[test]
    fn load_file_invalid_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "not valid {{ toml").unwrap();

        let err = Config::load_file(&path).unwrap_err();
        assert!(err.to_string().contains("parse"));
    }

    #[test]
    fn load_file_not_found() {
        let err = Config::load_file(Path::new("/tmp/diffscope_not_exist_config.toml")).unwrap_err();
        assert!(err.to_string().contains("read"));
    }

    #[test]
    fn load_from_repo_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".diffscope.toml"),
            r#"
[store]
collection = "from_repo"
"#,
        )
        .unwrap();

        let config = Config::load(Some(dir.path()), &no_env()).unwrap();
        assert_eq!(config.store.collection, "from_repo");
    }

    #[test]
    fn env_overrides_repo_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(".diffscope.toml"),
            "[store]\ncollection = \"from_repo\"\n",
        )
        .unwrap();

        let env = Env::mock([("DIFFSCOPE_COLLECTION", "from_env")]);
        let config = Config::load(Some(dir.path()), &env).unwrap();
        assert_eq!(config.store.collection, "from_env");
    }

    #[test]
    fn global_config_path_mentions_app_dir() {
        if let Some(p) = Config::global_config_path() {
            assert!(p.to_string_lossy().contains("diffscope"));
        }
    }

    #[test]
    fn apply_env_vars_embedding() {
        let env = Env::mock([
            ("DIFFSCOPE_EMBED_PROVIDER", "openai-compatible"),
            ("DIFFSCOPE_EMBED_MODEL", "nomic-embed-text"),
            ("DIFFSCOPE_EMBED_BASE_URL", "http://localhost:11434/v1"),
            ("DIFFSCOPE_API_KEY", "sk-env-test"),
        ]);
        let mut config = Config::default();
        config.apply_env_vars(&env);
        assert_eq!(config.embedding.provider, ProviderName::OpenAICompatible);
        assert_eq!(config.embedding.model, "nomic-embed-text");
        assert_eq!(
            config.embedding.base_url.as_deref(),
            Some("http://localhost:11434/v1")
        );
        assert_eq!(config.embedding.api_key.as_deref(), Some("sk-env-test"));
    }

    #[test]
    fn apply_env_vars_store_and_concurrency() {
        let env = Env::mock([
            ("DIFFSCOPE_QDRANT_URL", "http://qdrant:6334"),
            ("DIFFSCOPE_QDRANT_API_KEY", "qd"),
            ("DIFFSCOPE_MAX_CONCURRENT", "3"),
        ]);
        let mut config = Config::default();
        config.apply_env_vars(&env);
        assert_eq!(config.store.url, "http://qdrant:6334");
        assert_eq!(config.store.api_key.as_deref(), Some("qd"));
        assert_eq!(config.retrieval.max_concurrent, 3);
    }

    #[test]
    fn apply_env_vars_invalid_values_are_ignored() {
        let env = Env::mock([
            ("DIFFSCOPE_EMBED_PROVIDER", "not-a-provider"),
            ("DIFFSCOPE_MAX_CONCURRENT", "0"),
        ]);
        let mut config = Config::default();
        config.apply_env_vars(&env);
        assert_eq!(config.embedding.provider, ProviderName::OpenAI);
        assert_eq!(config.retrieval.max_concurrent, 8);
    }

    #[test]
    fn apply_env_vars_provider_specific_api_key_fallback() {
        let env = Env::mock([
            ("DIFFSCOPE_EMBED_PROVIDER", "gemini"),
            ("GEMINI_API_KEY", "gm-test"),
        ]);
        let mut config = Config::default();
        config.apply_env_vars(&env);
        assert_eq!(config.embedding.api_key.as_deref(), Some("gm-test"));
    }

    #[test]
    fn debug_redacts_api_keys() {
        let mut config = Config::default();
        config.embedding.api_key = Some("sk-secret".to_string());
        config.store.api_key = Some("qd-secret".to_string());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(!debug.contains("qd-secret"));
        assert!(debug.contains("[REDACTED]"));
    }
}
