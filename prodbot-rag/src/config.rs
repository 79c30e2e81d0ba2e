//! Configuration for the RAG pipeline and its model providers.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Collection used when none is configured.
pub const DEFAULT_COLLECTION: &str = "product_reviews";

/// Configuration parameters for the RAG pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RagConfig {
    /// Name of the collection holding product review documents.
    pub collection: String,
    /// Number of candidates requested from similarity search.
    pub top_k: usize,
    /// Maximum number of relevance judgments in flight at once.
    pub filter_concurrency: usize,
    /// Upper bound on every call to an external collaborator.
    pub call_timeout: Duration,
    /// Number of questions generated when scoring response relevancy.
    pub relevancy_strictness: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            collection: DEFAULT_COLLECTION.to_string(),
            top_k: 10,
            filter_concurrency: 4,
            call_timeout: Duration::from_secs(60),
            relevancy_strictness: 3,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Build a configuration from `PRODBOT_*` environment variables.
    ///
    /// Unset variables fall back to the defaults.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if a variable is set but cannot be
    /// parsed, or if the resulting configuration is invalid.
    pub fn from_env() -> Result<Self> {
        let mut builder = Self::builder();
        if let Some(collection) = env_var("PRODBOT_COLLECTION") {
            builder = builder.collection(collection);
        }
        if let Some(top_k) = parse_env("PRODBOT_TOP_K")? {
            builder = builder.top_k(top_k);
        }
        if let Some(concurrency) = parse_env("PRODBOT_FILTER_CONCURRENCY")? {
            builder = builder.filter_concurrency(concurrency);
        }
        if let Some(secs) = parse_env::<u64>("PRODBOT_CALL_TIMEOUT_SECS")? {
            builder = builder.call_timeout(Duration::from_secs(secs));
        }
        if let Some(strictness) = parse_env("PRODBOT_RELEVANCY_STRICTNESS")? {
            builder = builder.relevancy_strictness(strictness);
        }
        builder.build()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the collection name.
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.config.collection = collection.into();
        self
    }

    /// Set the number of candidates requested from similarity search.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set how many relevance judgments may run concurrently.
    pub fn filter_concurrency(mut self, concurrency: usize) -> Self {
        self.config.filter_concurrency = concurrency;
        self
    }

    /// Set the per-call timeout for external collaborators.
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout = timeout;
        self
    }

    /// Set the number of questions generated for response relevancy.
    pub fn relevancy_strictness(mut self, strictness: usize) -> Self {
        self.config.relevancy_strictness = strictness;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if:
    /// - `collection` is empty
    /// - `top_k`, `filter_concurrency` or `relevancy_strictness` is zero
    /// - `call_timeout` is zero
    pub fn build(self) -> Result<RagConfig> {
        let config = self.config;
        if config.collection.trim().is_empty() {
            return Err(RagError::Configuration("collection must not be empty".to_string()));
        }
        if config.top_k == 0 {
            return Err(RagError::Configuration("top_k must be greater than zero".to_string()));
        }
        if config.filter_concurrency == 0 {
            return Err(RagError::Configuration(
                "filter_concurrency must be greater than zero".to_string(),
            ));
        }
        if config.relevancy_strictness == 0 {
            return Err(RagError::Configuration(
                "relevancy_strictness must be greater than zero".to_string(),
            ));
        }
        if config.call_timeout.is_zero() {
            return Err(RagError::Configuration("call_timeout must be non-zero".to_string()));
        }
        Ok(config)
    }
}

/// Which vector store backend the application talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Process-local store, populated from the product CSV at startup.
    #[default]
    Memory,
    /// Astra DB Data API.
    Astra,
}

impl FromStr for StoreBackend {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "inmemory" => Ok(Self::Memory),
            "astra" | "astradb" => Ok(Self::Astra),
            other => Err(RagError::Configuration(format!("unknown store backend '{other}'"))),
        }
    }
}

/// Credentials and model names for the embedding and generation providers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderConfig {
    /// API key for the OpenAI-compatible endpoint.
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Override for the API base URL (OpenAI-compatible servers).
    pub base_url: Option<String>,
    pub embedding_model: String,
    /// Matryoshka dimension override for the embedding model.
    pub embedding_dimensions: Option<usize>,
    pub generation_model: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            embedding_model: "text-embedding-3-small".to_string(),
            embedding_dimensions: None,
            generation_model: "gpt-4o-mini".to_string(),
        }
    }
}

impl ProviderConfig {
    /// Read provider settings from the environment.
    ///
    /// A missing API key is not an error here; it is reported by the
    /// [`ModelLoader`](crate::loader::ModelLoader) when a model is loaded.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            api_key: env_var("OPENAI_API_KEY"),
            base_url: env_var("OPENAI_BASE_URL"),
            embedding_model: env_var("PRODBOT_EMBEDDING_MODEL")
                .unwrap_or(defaults.embedding_model),
            embedding_dimensions: parse_env("PRODBOT_EMBEDDING_DIMENSIONS")?,
            generation_model: env_var("PRODBOT_GENERATION_MODEL")
                .unwrap_or(defaults.generation_model),
        })
    }
}

/// Connection settings for the Astra DB Data API.
#[derive(Debug, Clone, PartialEq)]
pub struct AstraConfig {
    pub api_endpoint: String,
    pub token: String,
    pub keyspace: String,
}

impl AstraConfig {
    /// Read `ASTRA_DB_API_ENDPOINT`, `ASTRA_DB_APPLICATION_TOKEN` and
    /// `ASTRA_DB_KEYSPACE` (defaults to `default_keyspace`).
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] naming the first missing variable.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_endpoint: require_env("ASTRA_DB_API_ENDPOINT")?,
            token: require_env("ASTRA_DB_APPLICATION_TOKEN")?,
            keyspace: env_var("ASTRA_DB_KEYSPACE")
                .unwrap_or_else(|| "default_keyspace".to_string()),
        })
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn require_env(key: &str) -> Result<String> {
    env_var(key)
        .ok_or_else(|| RagError::Configuration(format!("{key} environment variable not set")))
}

fn parse_env<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_var(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| RagError::Configuration(format!("invalid value for {key}: {e}")))
        })
        .transpose()
}
