//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] answers a product question in named stages:
//! retrieve candidates from a [`DocumentStore`], drop irrelevant ones with a
//! [`ContextFilter`], render the survivors with [`format_documents`] and
//! generate an answer with a [`GenerationInvoker`]. Evaluation is a
//! separate call so its cost is only paid on request.
//!
//! # Example
//!
//! ```rust,ignore
//! use prodbot_rag::{RagPipeline, RagConfig, PromptRegistry};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .document_store(store)
//!     .relevance_judge(judge)
//!     .generation_model(llm)
//!     .prompts(Arc::new(PromptRegistry::default()))
//!     .build()?;
//!
//! let question = "Can you suggest good budget laptops?";
//! let answer = pipeline.answer(question, false).await?;
//! let scores = pipeline.evaluate(question, &answer.text, &answer.contexts).await;
//! ```

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::RagConfig;
use crate::document::Candidate;
use crate::error::{PipelineStage, RagError, Result};
use crate::eval::{EvaluationResult, EvaluationScorer};
use crate::filter::{ContextFilter, RelevanceJudge};
use crate::format::format_documents;
use crate::generation::GenerationInvoker;
use crate::model::{GenerationModel, with_timeout};
use crate::prompt::PromptRegistry;
use crate::store::DocumentStore;

/// Tracing target for the unfiltered-candidate debug trace.
pub const TRACE_TARGET: &str = "prodbot_rag::trace";

/// The result of a successful [`RagPipeline::answer`] call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    /// The formatted context the model saw, as a single element.
    pub contexts: Vec<String>,
    /// The model output, unmodified.
    pub text: String,
    /// Formatted unfiltered candidates, present only in debug mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_trace: Option<String>,
}

/// Tracks the current stage of one request and logs transitions.
#[derive(Debug)]
struct StageTracker {
    stage: PipelineStage,
}

impl StageTracker {
    fn new() -> Self {
        Self { stage: PipelineStage::Idle }
    }

    fn enter(&mut self, next: PipelineStage) {
        debug!(from = %self.stage, to = %next, "pipeline stage transition");
        self.stage = next;
    }

    /// Move to `Failed`, attributing `err` to the stage that was active.
    fn fail(&mut self, err: RagError) -> RagError {
        let failed_in = self.stage;
        error!(stage = %failed_in, error = %err, "pipeline stage failed");
        self.enter(PipelineStage::Failed);
        err.at_stage(failed_in)
    }
}

/// The RAG pipeline orchestrator.
///
/// Holds only read-only shared handles, so one instance can serve
/// concurrent requests. Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    store: Arc<dyn DocumentStore>,
    filter: ContextFilter,
    invoker: GenerationInvoker,
    scorer: Option<EvaluationScorer>,
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the document store.
    pub fn document_store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    async fn search(&self, query: &str) -> Result<Vec<Candidate>> {
        let backend = "store";
        with_timeout(
            self.config.call_timeout,
            self.store.similarity_search(query, self.config.top_k),
            |after| RagError::Retrieval {
                backend: backend.to_string(),
                message: format!("similarity search timed out after {after:?}"),
            },
        )
        .await
    }

    /// Retrieve and filter candidates without generating an answer.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Pipeline`] at stage `Retrieving` if the store fails.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<Candidate>> {
        let mut tracker = StageTracker::new();
        tracker.enter(PipelineStage::Retrieving);
        let candidates = self.search(query).await.map_err(|e| tracker.fail(e))?;

        tracker.enter(PipelineStage::Filtering);
        let kept = self.filter.filter(query, candidates).await;

        tracker.enter(PipelineStage::Done);
        Ok(kept)
    }

    /// Answer `query` from retrieved, filtered product reviews.
    ///
    /// With `debug` set, the unfiltered candidates are formatted, logged on
    /// [`TRACE_TARGET`] and returned in [`Answer::debug_trace`]; the answer
    /// itself is always built from the filtered candidates.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Pipeline`] naming the stage that failed. No
    /// answer text is produced on failure.
    pub async fn answer(&self, query: &str, debug: bool) -> Result<Answer> {
        let mut tracker = StageTracker::new();

        tracker.enter(PipelineStage::Retrieving);
        let candidates = self.search(query).await.map_err(|e| tracker.fail(e))?;
        let retrieved = candidates.len();

        let debug_trace = debug.then(|| {
            let trace = format_documents(&candidates);
            info!(
                target: TRACE_TARGET,
                candidate_count = retrieved,
                trace = %trace,
                "retrieved documents before filtering"
            );
            trace
        });

        tracker.enter(PipelineStage::Filtering);
        let kept = self.filter.filter(query, candidates).await;

        tracker.enter(PipelineStage::Formatting);
        let context = format_documents(&kept);

        tracker.enter(PipelineStage::Generating);
        let text = self.invoker.invoke(query, &context).await.map_err(|e| tracker.fail(e))?;

        tracker.enter(PipelineStage::Done);
        info!(retrieved, kept = kept.len(), answer_len = text.len(), "query answered");

        Ok(Answer { contexts: vec![context], text, debug_trace })
    }

    /// Score an answer produced by [`answer`](Self::answer).
    ///
    /// Never fails; metrics that cannot be computed are `None`.
    pub async fn evaluate(
        &self,
        query: &str,
        answer: &str,
        contexts: &[String],
    ) -> EvaluationResult {
        match &self.scorer {
            Some(scorer) => scorer.evaluate(query, answer, contexts).await,
            None => {
                warn!("no evaluation scorer configured, metrics unavailable");
                EvaluationResult::default()
            }
        }
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// The document store, relevance judge, generation model and prompt
/// registry are required; the evaluation scorer is optional.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    store: Option<Arc<dyn DocumentStore>>,
    relevance_judge: Option<Arc<dyn RelevanceJudge>>,
    generation_model: Option<Arc<dyn GenerationModel>>,
    prompts: Option<Arc<PromptRegistry>>,
    scorer: Option<EvaluationScorer>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    ///
    /// Without one, [`RagConfig::default`] is used with `top_k` taken from
    /// the document store's [`default_top_k`](DocumentStore::default_top_k).
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn document_store(mut self, store: Arc<dyn DocumentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn relevance_judge(mut self, judge: Arc<dyn RelevanceJudge>) -> Self {
        self.relevance_judge = Some(judge);
        self
    }

    pub fn generation_model(mut self, model: Arc<dyn GenerationModel>) -> Self {
        self.generation_model = Some(model);
        self
    }

    pub fn prompts(mut self, prompts: Arc<PromptRegistry>) -> Self {
        self.prompts = Some(prompts);
        self
    }

    /// Set an optional scorer used by [`RagPipeline::evaluate`].
    pub fn evaluation_scorer(mut self, scorer: EvaluationScorer) -> Self {
        self.scorer = Some(scorer);
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if a required field is missing
    /// or the registry has no product prompt.
    pub fn build(self) -> Result<RagPipeline> {
        let store = self
            .store
            .ok_or_else(|| RagError::Configuration("document_store is required".to_string()))?;
        let config = self.config.unwrap_or_else(|| RagConfig {
            top_k: store.default_top_k().max(1),
            ..RagConfig::default()
        });
        let judge = self
            .relevance_judge
            .ok_or_else(|| RagError::Configuration("relevance_judge is required".to_string()))?;
        let model = self
            .generation_model
            .ok_or_else(|| RagError::Configuration("generation_model is required".to_string()))?;
        let prompts =
            self.prompts.ok_or_else(|| RagError::Configuration("prompts is required".to_string()))?;

        let invoker = GenerationInvoker::new(model, prompts).with_call_timeout(config.call_timeout);
        // Fail at startup rather than on the first request.
        invoker.build_prompt("", "")?;

        let filter = ContextFilter::new(judge)
            .with_concurrency(config.filter_concurrency)
            .with_call_timeout(config.call_timeout);

        Ok(RagPipeline { config, store, filter, invoker, scorer: self.scorer })
    }
}
