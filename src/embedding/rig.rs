//! rig-core integration for query embedding.
//!
//! Uses rig-core's provider clients and `EmbeddingModel` abstraction.
//! Currently supports: OpenAI, Gemini, and any OpenAI-compatible API
//! (Ollama, vLLM, LiteLLM, ...).

use std::time::Duration;

use async_trait::async_trait;
use rig::client::EmbeddingsClient;
use rig::embeddings::EmbeddingModel;
use rig::providers;

use crate::config::EmbeddingConfig;
use crate::models::{ProviderName, QueryVectorSet};

use super::{EmbeddingError, QueryEmbedder, split_for_embedding};

/// Maximum number of retry attempts for transient API errors.
pub const MAX_RETRIES: u32 = 3;

/// Initial backoff delay between retries.
pub const INITIAL_BACKOFF: Duration = Duration::from_secs(2);

/// Maximum backoff delay between retries.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Embed a batch of texts with a rig-core client and convert to `f32`.
macro_rules! embed_with {
    ($client:expr, $model:expr, $texts:expr, $label:expr) => {{
        let model = $client.embedding_model($model);
        model
            .embed_texts($texts)
            .await
            .map(|embeddings| {
                embeddings
                    .into_iter()
                    .map(|e| e.vec.into_iter().map(|x| x as f32).collect::<Vec<f32>>())
                    .collect::<Vec<_>>()
            })
            .map_err(|e| EmbeddingError::ApiError(format!("{} embedding error: {e}", $label)))
    }};
}

/// rig-core based query embedder.
///
/// The provider name in config selects which rig-core client to use.
pub struct RigEmbedder {
    config: EmbeddingConfig,
}

impl RigEmbedder {
    /// Create a new RigEmbedder with the given configuration.
    ///
    /// OpenAI-compatible servers may run without a key; every other
    /// provider requires one.
    pub fn new(config: EmbeddingConfig) -> Result<Self, EmbeddingError> {
        if config.api_key.is_none() && config.provider != ProviderName::OpenAICompatible {
            return Err(EmbeddingError::NotConfigured(format!(
                "no API key found for provider '{}'. Set {} or {}.",
                config.provider,
                crate::constants::ENV_API_KEY,
                config.provider.api_key_env_var()
            )));
        }
        if config.provider == ProviderName::OpenAICompatible && config.base_url.is_none() {
            return Err(EmbeddingError::NotConfigured(
                "openai-compatible provider requires base_url to be set".to_string(),
            ));
        }
        Ok(Self { config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// Build an OpenAI-style client, optionally with a custom base URL.
    fn build_openai_client(&self, api_key: &str) -> Result<providers::openai::Client, EmbeddingError> {
        let mut builder = providers::openai::Client::builder().api_key(api_key);
        if let Some(ref base_url) = self.config.base_url {
            builder = builder.base_url(base_url);
        }
        builder
            .build()
            .map_err(|e| EmbeddingError::ApiError(format!("failed to create OpenAI client: {e}")))
    }

    /// Make one embedding call through rig-core.
    async fn call_rig(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let api_key = self.config.api_key.as_deref().unwrap_or_default();
        let model = self.config.model.as_str();

        match self.config.provider {
            ProviderName::OpenAI => {
                let client = self.build_openai_client(api_key)?;
                embed_with!(client, model, texts, "OpenAI")
            }
            ProviderName::OpenAICompatible => {
                let client = self.build_openai_client(api_key)?;
                embed_with!(client, model, texts, "OpenAI-compatible")
            }
            ProviderName::Gemini => {
                let client = providers::gemini::Client::new(api_key).map_err(|e| {
                    EmbeddingError::ApiError(format!("failed to create Gemini client: {e}"))
                })?;
                embed_with!(client, model, texts, "Gemini")
            }
        }
    }
}

#[async_trait]
impl QueryEmbedder for RigEmbedder {
    async fn embed(&self, text: &str) -> Result<QueryVectorSet, EmbeddingError> {
        let pieces = split_for_embedding(text, self.config.max_input_chars);
        if pieces.is_empty() {
            return Err(EmbeddingError::EmptyInput);
        }
        tracing::debug!(
            provider = %self.config.provider,
            model = %self.config.model,
            pieces = pieces.len(),
            "embedding query text"
        );

        let mut attempt = 0;
        loop {
            match self.call_rig(pieces.clone()).await {
                Ok(vectors) => return Ok(QueryVectorSet::new(vectors)?),
                Err(e) if is_retryable(&e) && attempt < MAX_RETRIES => {
                    let backoff = retry_backoff(attempt);
                    tracing::warn!(
                        attempt = attempt + 1,
                        max = MAX_RETRIES + 1,
                        backoff_secs = backoff.as_secs(),
                        "{}, retrying",
                        classify_error(&e).unwrap_or("Transient error")
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Check whether an embedding error is transient and worth retrying.
pub fn is_retryable(err: &EmbeddingError) -> bool {
    classify_error(err).is_some()
}

/// Classifies an embedding error into a short, user-friendly message.
///
/// Returns `Some(message)` for transient errors, `None` otherwise.
pub fn classify_error(err: &EmbeddingError) -> Option<&'static str> {
    let EmbeddingError::ApiError(msg) = err else {
        return None;
    };
    let msg_lower = msg.to_lowercase();
    if msg_lower.contains("429")
        || msg_lower.contains("rate limit")
        || msg_lower.contains("too many requests")
    {
        Some("Rate limited by API")
    } else if msg_lower.contains("503") || msg_lower.contains("service unavailable") {
        Some("Service unavailable")
    } else if msg_lower.contains("529") || msg_lower.contains("overloaded") {
        Some("API overloaded")
    } else if msg_lower.contains("502") {
        Some("API gateway error")
    } else if msg_lower.contains("timeout") || msg_lower.contains("timed out") {
        Some("Request timed out")
    } else if msg_lower.contains("connection") {
        Some("Connection error")
    } else if msg_lower.contains("temporarily") || msg_lower.contains("try again") {
        Some("Temporary API error")
    } else {
        None
    }
}

/// Compute the backoff duration for a retry attempt using exponential backoff.
pub fn retry_backoff(attempt: u32) -> Duration {
    let backoff = INITIAL_BACKOFF.saturating_mul(2u32.saturating_pow(attempt));
    backoff.min(MAX_BACKOFF)
}
