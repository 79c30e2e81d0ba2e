//! Astra DB vector store backend.
//!
//! Provides [`AstraVectorStore`] which implements [`VectorStore`] over the
//! Astra DB JSON Data API using `reqwest`.
//!
//! This module is only available when the `astra` feature is enabled.
//!
//! # Example
//!
//! ```rust,ignore
//! use prodbot_rag::astra::AstraVectorStore;
//! use prodbot_rag::config::AstraConfig;
//!
//! let store = AstraVectorStore::new(AstraConfig::from_env()?)?;
//! store.create_collection("product_reviews", 1536).await?;
//! let results = store.search("product_reviews", &query_embedding, 5).await?;
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, error};

use crate::config::AstraConfig;
use crate::document::{Candidate, Document, IndexedDocument};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

const BACKEND: &str = "astra";

/// A [`VectorStore`] backed by [Astra DB](https://www.datastax.com/products/datastax-astra).
///
/// Collections map to Astra vector collections with cosine similarity.
/// Document metadata is stored as a nested `metadata` object.
pub struct AstraVectorStore {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl AstraVectorStore {
    /// Create a store for the endpoint and keyspace in `config`.
    pub fn new(config: AstraConfig) -> Result<Self> {
        if config.token.is_empty() {
            return Err(RagError::Configuration("Astra DB token must not be empty".into()));
        }
        let endpoint = config.api_endpoint.trim_end_matches('/');
        Ok(Self {
            client: reqwest::Client::new(),
            base_url: format!("{endpoint}/api/json/v1/{}", config.keyspace),
            token: config.token,
        })
    }

    fn map_err(message: impl Into<String>) -> RagError {
        RagError::Retrieval { backend: BACKEND.to_string(), message: message.into() }
    }

    /// POST a single Data API command and return its `data`/`status` payload.
    async fn command(&self, path: Option<&str>, body: Value) -> Result<ApiResponse> {
        let url = match path {
            Some(collection) => format!("{}/{collection}", self.base_url),
            None => self.base_url.clone(),
        };

        let response = self
            .client
            .post(&url)
            .header("Token", &self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(backend = BACKEND, error = %e, "request failed");
                Self::map_err(format!("request failed: {e}"))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(backend = BACKEND, %status, "API error");
            return Err(Self::map_err(format!("API returned {status}: {body}")));
        }

        let parsed: ApiResponse = response.json().await.map_err(|e| {
            error!(backend = BACKEND, error = %e, "failed to parse response");
            Self::map_err(format!("failed to parse response: {e}"))
        })?;

        if let Some(first) = parsed.errors.first() {
            return Err(Self::map_err(first.message.clone()));
        }
        Ok(parsed)
    }

    fn to_candidate(rank: usize, raw: Value) -> Candidate {
        let score = raw.get("$similarity").and_then(Value::as_f64).unwrap_or_default() as f32;
        let id = match raw.get("_id") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let content = raw.get("content").and_then(Value::as_str).unwrap_or_default().to_string();
        let metadata: HashMap<String, String> = raw
            .get("metadata")
            .and_then(Value::as_object)
            .map(|obj| {
                obj.iter()
                    .map(|(k, v)| {
                        let text = match v {
                            Value::String(s) => s.clone(),
                            other => other.to_string(),
                        };
                        (k.clone(), text)
                    })
                    .collect()
            })
            .unwrap_or_default();

        Candidate { document: Document { id, content, metadata }, score, rank }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    data: Option<ApiData>,
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiData {
    #[serde(default)]
    documents: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Data API command bodies.
mod command {
    use serde_json::{Value, json};

    use crate::document::IndexedDocument;

    pub(super) fn create_collection(name: &str, dimensions: usize) -> Value {
        json!({
            "createCollection": {
                "name": name,
                "options": { "vector": { "dimension": dimensions, "metric": "cosine" } }
            }
        })
    }

    pub(super) fn delete_collection(name: &str) -> Value {
        json!({ "deleteCollection": { "name": name } })
    }

    /// Replace-or-insert keyed by document id, so re-ingestion is idempotent.
    pub(super) fn upsert(doc: &IndexedDocument) -> Value {
        json!({
            "findOneAndReplace": {
                "filter": { "_id": doc.document.id },
                "replacement": {
                    "_id": doc.document.id,
                    "content": doc.document.content,
                    "metadata": doc.document.metadata,
                    "$vector": doc.embedding,
                },
                "options": { "upsert": true }
            }
        })
    }

    pub(super) fn delete(ids: &[&str]) -> Value {
        json!({ "deleteMany": { "filter": { "_id": { "$in": ids } } } })
    }

    pub(super) fn search(embedding: &[f32], top_k: usize) -> Value {
        json!({
            "find": {
                "sort": { "$vector": embedding },
                "projection": { "$vector": 0 },
                "options": { "limit": top_k, "includeSimilarity": true }
            }
        })
    }
}

#[async_trait]
impl VectorStore for AstraVectorStore {
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<()> {
        self.command(None, command::create_collection(name, dimensions)).await?;
        debug!(collection = name, dimensions, "created astra collection");
        Ok(())
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.command(None, command::delete_collection(name)).await?;
        debug!(collection = name, "deleted astra collection");
        Ok(())
    }

    async fn upsert(&self, collection: &str, documents: &[IndexedDocument]) -> Result<()> {
        for doc in documents {
            self.command(Some(collection), command::upsert(doc)).await?;
        }
        debug!(collection, count = documents.len(), "upserted documents to astra");
        Ok(())
    }

    async fn delete(&self, collection: &str, ids: &[&str]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.command(Some(collection), command::delete(ids)).await?;
        debug!(collection, count = ids.len(), "deleted documents from astra");
        Ok(())
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<Candidate>> {
        let response = self.command(Some(collection), command::search(embedding, top_k)).await?;
        let documents = response.data.map(|d| d.documents).unwrap_or_default();

        Ok(documents
            .into_iter()
            .enumerate()
            .map(|(rank, raw)| Self::to_candidate(rank, raw))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn candidate_parses_similarity_and_metadata() {
        let raw = json!({
            "_id": "B0X",
            "content": "Fast and light",
            "metadata": { "product_title": "Laptop X", "price": 45000 },
            "$similarity": 0.87
        });
        let candidate = AstraVectorStore::to_candidate(2, raw);

        assert_eq!(candidate.rank, 2);
        assert_eq!(candidate.document.id, "B0X");
        assert_eq!(candidate.document.meta("product_title"), Some("Laptop X"));
        assert_eq!(candidate.document.meta("price"), Some("45000"));
        assert!((candidate.score - 0.87).abs() < 1e-6);
    }

    #[test]
    fn rejects_empty_token() {
        let config = AstraConfig {
            api_endpoint: "https://db.example.com".into(),
            token: String::new(),
            keyspace: "default_keyspace".into(),
        };
        assert!(matches!(AstraVectorStore::new(config), Err(RagError::Configuration(_))));
    }

    #[test]
    fn delete_commands_target_ids_and_collections() {
        assert_eq!(
            command::delete(&["B01", "B02"]),
            json!({ "deleteMany": { "filter": { "_id": { "$in": ["B01", "B02"] } } } })
        );
        assert_eq!(
            command::delete_collection("product_reviews"),
            json!({ "deleteCollection": { "name": "product_reviews" } })
        );
    }

    #[test]
    fn upsert_replaces_by_document_id() {
        let doc = IndexedDocument {
            document: Document::new("B01", "Great battery").with_metadata("price", "45000"),
            embedding: vec![0.5, 0.5],
        };
        let body = command::upsert(&doc);
        let op = &body["findOneAndReplace"];

        assert_eq!(op["filter"]["_id"], "B01");
        assert_eq!(op["options"]["upsert"], true);
        assert_eq!(op["replacement"]["metadata"]["price"], "45000");
        assert_eq!(op["replacement"]["$vector"], json!([0.5, 0.5]));
    }

    #[test]
    fn search_asks_for_similarity_without_vectors() {
        let body = command::search(&[1.0, 0.0], 7);
        assert_eq!(body["find"]["options"]["limit"], 7);
        assert_eq!(body["find"]["options"]["includeSimilarity"], true);
        assert_eq!(body["find"]["projection"]["$vector"], 0);
        let create = command::create_collection("c", 3);
        assert_eq!(create["createCollection"]["options"]["vector"]["dimension"], 3);
    }
}
