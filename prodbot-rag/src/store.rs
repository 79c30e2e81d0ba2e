//! Document-level store adapter.
//!
//! [`DocumentStore`] is the contract the pipeline consumes: upsert whole
//! documents and search by query text. [`EmbeddingDocumentStore`] implements
//! it on top of an [`EmbeddingProvider`] and a [`VectorStore`].

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info};

use crate::document::{Candidate, Document, IndexedDocument};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

/// Number of documents embedded per provider call during upsert.
const UPSERT_BATCH_SIZE: usize = 64;

/// A searchable store of product documents.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert or replace documents.
    async fn upsert(&self, documents: &[Document]) -> Result<()>;

    /// Return up to `top_k` candidates ordered by descending similarity to `query`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Retrieval`] when the store cannot answer. An
    /// unreachable store never yields an empty result.
    async fn similarity_search(&self, query: &str, top_k: usize) -> Result<Vec<Candidate>>;

    /// The `top_k` used when callers do not choose one.
    fn default_top_k(&self) -> usize;
}

/// A [`DocumentStore`] that embeds text and delegates to a [`VectorStore`].
///
/// # Example
///
/// ```rust,ignore
/// let vectors = Arc::new(InMemoryVectorStore::new());
/// let store = EmbeddingDocumentStore::new(embedder, vectors, "product_reviews", 10);
/// store.ensure_collection().await?;
/// store.upsert(&documents).await?;
/// let candidates = store.similarity_search("budget laptops", store.default_top_k()).await?;
/// ```
pub struct EmbeddingDocumentStore {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    collection: String,
    default_top_k: usize,
    backend: String,
}

impl EmbeddingDocumentStore {
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
        collection: impl Into<String>,
        default_top_k: usize,
    ) -> Self {
        Self {
            embedding_provider,
            vector_store,
            collection: collection.into(),
            default_top_k,
            backend: "vector".to_string(),
        }
    }

    /// Name the backend in retrieval errors (e.g. `memory`, `astra`).
    pub fn with_backend_name(mut self, backend: impl Into<String>) -> Self {
        self.backend = backend.into();
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Create the collection with the embedding provider's dimensionality.
    pub async fn ensure_collection(&self) -> Result<()> {
        let dimensions = self.embedding_provider.dimensions();
        self.vector_store.create_collection(&self.collection, dimensions).await.map_err(|e| {
            error!(collection = %self.collection, error = %e, "failed to create collection");
            self.retrieval_error(format!("failed to create collection '{}': {e}", self.collection))
        })
    }

    fn retrieval_error(&self, message: String) -> RagError {
        RagError::Retrieval { backend: self.backend.clone(), message }
    }
}

#[async_trait]
impl DocumentStore for EmbeddingDocumentStore {
    async fn upsert(&self, documents: &[Document]) -> Result<()> {
        for batch in documents.chunks(UPSERT_BATCH_SIZE) {
            let texts: Vec<&str> = batch.iter().map(|d| d.content.as_str()).collect();
            let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
                error!(error = %e, "embedding failed during upsert");
                self.retrieval_error(format!("embedding failed during upsert: {e}"))
            })?;
            if embeddings.len() != batch.len() {
                return Err(self.retrieval_error(format!(
                    "embedding provider returned {} vectors for {} documents",
                    embeddings.len(),
                    batch.len()
                )));
            }

            let indexed: Vec<IndexedDocument> = batch
                .iter()
                .cloned()
                .zip(embeddings)
                .map(|(document, embedding)| IndexedDocument { document, embedding })
                .collect();

            self.vector_store.upsert(&self.collection, &indexed).await.map_err(|e| {
                error!(collection = %self.collection, error = %e, "upsert failed");
                self.retrieval_error(format!("upsert failed: {e}"))
            })?;
            debug!(collection = %self.collection, count = indexed.len(), "upserted batch");
        }

        info!(collection = %self.collection, document_count = documents.len(), "upsert completed");
        Ok(())
    }

    async fn similarity_search(&self, query: &str, top_k: usize) -> Result<Vec<Candidate>> {
        let query_embedding = self.embedding_provider.embed(query).await.map_err(|e| {
            error!(error = %e, "embedding failed during query");
            self.retrieval_error(format!("query embedding failed: {e}"))
        })?;

        let candidates = self
            .vector_store
            .search(&self.collection, &query_embedding, top_k)
            .await
            .map_err(|e| {
                error!(collection = %self.collection, error = %e, "vector store search failed");
                match e {
                    RagError::Retrieval { .. } => e,
                    other => self.retrieval_error(format!(
                        "search failed in collection '{}': {other}",
                        self.collection
                    )),
                }
            })?;

        debug!(result_count = candidates.len(), top_k, "similarity search completed");
        Ok(candidates)
    }

    fn default_top_k(&self) -> usize {
        self.default_top_k
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inmemory::InMemoryVectorStore;

    /// Embeds text as counts of a few product words.
    struct KeywordEmbedder;

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let lower = text.to_lowercase();
            Ok(["laptop", "phone", "battery"]
                .iter()
                .map(|w| lower.matches(w).count() as f32)
                .collect())
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    struct FailingEmbedder;

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(RagError::Embedding { provider: "test".into(), message: "offline".into() })
        }

        fn dimensions(&self) -> usize {
            3
        }
    }

    #[tokio::test]
    async fn upsert_then_search_returns_closest_first() {
        let store = EmbeddingDocumentStore::new(
            Arc::new(KeywordEmbedder),
            Arc::new(InMemoryVectorStore::new()),
            "reviews",
            2,
        );
        store.ensure_collection().await.unwrap();
        store
            .upsert(&[
                Document::new("p1", "Great phone, the phone camera is sharp"),
                Document::new("l1", "This laptop is a solid budget laptop"),
            ])
            .await
            .unwrap();

        let top_k = store.default_top_k();
        let results = store.similarity_search("budget laptop", top_k).await.unwrap();
        assert_eq!(results[0].document.id, "l1");
    }

    #[tokio::test]
    async fn embedding_failure_is_a_retrieval_error() {
        let store = EmbeddingDocumentStore::new(
            Arc::new(FailingEmbedder),
            Arc::new(InMemoryVectorStore::new()),
            "reviews",
            2,
        )
        .with_backend_name("memory");

        let err = store.similarity_search("anything", 2).await.unwrap_err();
        assert!(matches!(err, RagError::Retrieval { ref backend, .. } if backend == "memory"));
    }

    #[tokio::test]
    async fn search_without_collection_is_a_retrieval_error() {
        let store = EmbeddingDocumentStore::new(
            Arc::new(KeywordEmbedder),
            Arc::new(InMemoryVectorStore::new()),
            "missing",
            2,
        );

        let err = store.similarity_search("laptop", 2).await.unwrap_err();
        assert!(matches!(err, RagError::Retrieval { .. }));
    }
}
