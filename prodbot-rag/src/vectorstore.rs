//! Embedding-level storage contract behind [`DocumentStore`](crate::store::DocumentStore).

use async_trait::async_trait;

use crate::document::{Candidate, IndexedDocument};
use crate::error::Result;

/// Named collections of pre-embedded product documents.
///
/// Callers embed text themselves; a backend only stores vectors and ranks
/// them against a query vector. Every failure is reported as
/// [`RagError::Retrieval`](crate::error::RagError::Retrieval) naming the
/// backend.
///
/// ```rust,ignore
/// let store = InMemoryVectorStore::new();
/// store.create_collection("product_reviews", 1536).await?;
/// store.upsert("product_reviews", &indexed).await?;
/// let hits = store.search("product_reviews", &query_vector, 10).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Idempotent: creating an existing collection succeeds.
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()>;

    /// Drop a collection with everything in it. Dropping a missing one succeeds.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Insert or replace by document id.
    async fn upsert(&self, collection: &str, documents: &[IndexedDocument]) -> Result<()>;

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()>;

    /// At most `top_k` hits, best first, with `rank` counting from zero.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<Candidate>>;
}
