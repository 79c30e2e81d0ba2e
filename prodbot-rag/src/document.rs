//! Data types for product documents and retrieval candidates.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A product review document with its catalogue metadata.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Document {
    /// Unique identifier for the document.
    pub id: String,
    /// The review text.
    pub content: String,
    /// Catalogue fields such as `product_title`, `price` and `rating`.
    pub metadata: HashMap<String, String>,
}

impl Document {
    /// Create a document with no metadata.
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self { id: id.into(), content: content.into(), metadata: HashMap::new() }
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Look up a metadata value.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }
}

/// A [`Document`] stored alongside its vector embedding.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedDocument {
    pub document: Document,
    /// The vector embedding of the document content.
    pub embedding: Vec<f32>,
}

/// A retrieved [`Document`] with its similarity score and search rank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candidate {
    pub document: Document,
    /// The similarity score (higher is more relevant).
    pub score: f32,
    /// Zero-based position in the similarity search results.
    pub rank: usize,
}

impl Candidate {
    /// Assign ranks to documents in the order given.
    pub fn ranked(scored: impl IntoIterator<Item = (Document, f32)>) -> Vec<Candidate> {
        scored
            .into_iter()
            .enumerate()
            .map(|(rank, (document, score))| Candidate { document, score, rank })
            .collect()
    }
}
