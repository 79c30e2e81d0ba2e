//! # prodbot-rag
//!
//! Retrieval-augmented product question answering.
//!
//! A question flows through four stages:
//!
//! 1. **Retrieve** candidates from a [`DocumentStore`] by similarity search.
//! 2. **Filter** them with a [`RelevanceJudge`], keeping search order.
//! 3. **Format** the survivors into one context block ([`format_documents`]).
//! 4. **Generate** an answer from the [`PromptType::ProductBot`] template.
//!
//! [`RagPipeline::evaluate`] then scores context precision and response
//! relevancy on request.
//!
//! ## Features
//!
//! - `openai` – OpenAI-compatible embedding and chat clients.
//! - `astra` – Astra DB vector store.
//! - `full` – both.

#[cfg(feature = "astra")]
pub mod astra;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod eval;
pub mod filter;
pub mod format;
pub mod generation;
pub mod ingest;
pub mod inmemory;
pub mod loader;
pub mod model;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod prompt;
pub mod store;
pub mod vectorstore;

#[cfg(feature = "astra")]
pub use astra::AstraVectorStore;
pub use config::{AstraConfig, ProviderConfig, RagConfig, RagConfigBuilder, StoreBackend};
pub use document::{Candidate, Document, IndexedDocument};
pub use embedding::EmbeddingProvider;
pub use error::{PipelineStage, RagError, Result};
pub use eval::{
    EvaluationResult, EvaluationScorer, GeneratedQuestion, LlmPrecisionJudge, LlmRelevancyJudge,
    PrecisionJudge, RelevancyJudge,
};
pub use filter::{ContextFilter, LlmRelevanceJudge, Relevance, RelevanceJudge};
pub use format::{NO_DOCUMENTS, format_documents};
pub use generation::GenerationInvoker;
pub use ingest::DataIngestion;
pub use inmemory::InMemoryVectorStore;
pub use loader::ModelLoader;
pub use model::GenerationModel;
#[cfg(feature = "openai")]
pub use openai::{OpenAIChatModel, OpenAIEmbeddingProvider};
pub use pipeline::{Answer, RagPipeline, RagPipelineBuilder};
pub use prompt::{PromptRegistry, PromptTemplate, PromptType};
pub use store::{DocumentStore, EmbeddingDocumentStore};
pub use vectorstore::VectorStore;
