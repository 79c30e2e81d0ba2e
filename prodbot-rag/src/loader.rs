//! Provider loader for embedding and generation model handles.
//!
//! Handles are created once at startup and shared read-only by every
//! component that needs them.

use std::sync::Arc;

use tracing::info;

use crate::config::ProviderConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::model::GenerationModel;

/// Builds model handles from a [`ProviderConfig`].
#[derive(Debug, Clone)]
pub struct ModelLoader {
    config: ProviderConfig,
}

impl ModelLoader {
    pub fn new(config: ProviderConfig) -> Self {
        Self { config }
    }

    /// Read the provider configuration from the environment.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(ProviderConfig::from_env()?))
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .ok_or_else(|| {
                RagError::Configuration("OPENAI_API_KEY environment variable not set".into())
            })
    }

    /// Load the embedding model used by the document store.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if the API key is missing or no
    /// provider was compiled in. No network call is made.
    pub fn load_embedding_model(&self) -> Result<Arc<dyn EmbeddingProvider>> {
        let api_key = self.api_key()?;
        info!(model = %self.config.embedding_model, "loading embedding model");
        self.build_embedding_model(api_key)
    }

    /// Load the generation model used for answers and judging.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if the API key is missing or no
    /// provider was compiled in. No network call is made.
    pub fn load_generation_model(&self) -> Result<Arc<dyn GenerationModel>> {
        let api_key = self.api_key()?;
        info!(model = %self.config.generation_model, "loading generation model");
        self.build_generation_model(api_key)
    }

    #[cfg(feature = "openai")]
    fn build_embedding_model(&self, api_key: &str) -> Result<Arc<dyn EmbeddingProvider>> {
        let mut provider = crate::openai::OpenAIEmbeddingProvider::new(api_key)?
            .with_model(&self.config.embedding_model);
        if let Some(base_url) = &self.config.base_url {
            provider = provider.with_base_url(base_url);
        }
        if let Some(dims) = self.config.embedding_dimensions {
            provider = provider.with_dimensions(dims);
        }
        Ok(Arc::new(provider))
    }

    #[cfg(not(feature = "openai"))]
    fn build_embedding_model(&self, _api_key: &str) -> Result<Arc<dyn EmbeddingProvider>> {
        Err(RagError::Configuration(
            "no embedding provider available; enable the `openai` feature".into(),
        ))
    }

    #[cfg(feature = "openai")]
    fn build_generation_model(&self, api_key: &str) -> Result<Arc<dyn GenerationModel>> {
        let mut model = crate::openai::OpenAIChatModel::new(api_key)?
            .with_model(&self.config.generation_model);
        if let Some(base_url) = &self.config.base_url {
            model = model.with_base_url(base_url);
        }
        Ok(Arc::new(model))
    }

    #[cfg(not(feature = "openai"))]
    fn build_generation_model(&self, _api_key: &str) -> Result<Arc<dyn GenerationModel>> {
        Err(RagError::Configuration(
            "no generation provider available; enable the `openai` feature".into(),
        ))
    }
}
