//! Post-hoc quality metrics for a (query, answer, contexts) triple.
//!
//! Two metrics are computed independently:
//!
//! - **context precision**: how many of the supplied contexts were useful in
//!   producing the answer, weighted towards the top of the list;
//! - **response relevancy**: how well the answer addresses the query, measured
//!   by regenerating questions from the answer and comparing them with the
//!   original query in embedding space.
//!
//! A metric that cannot be computed is `None`, never `0.0`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::embedding::{EmbeddingProvider, cosine_similarity};
use crate::error::{RagError, Result};
use crate::model::{GenerationModel, with_timeout};
use crate::prompt::fill_template;

pub const CONTEXT_PRECISION: &str = "context_precision";
pub const RESPONSE_RELEVANCY: &str = "response_relevancy";

/// Scores for one answered query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// In `[0, 1]`, or `None` when not computable.
    pub context_precision: Option<f64>,
    /// In `[0, 1]`, or `None` when not computable.
    pub response_relevancy: Option<f64>,
}

/// Judges whether one context was useful for producing an answer.
#[async_trait]
pub trait PrecisionJudge: Send + Sync {
    fn name(&self) -> &str;

    async fn was_useful(&self, query: &str, answer: &str, context: &str) -> Result<bool>;
}

/// A question reconstructed from an answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedQuestion {
    pub question: String,
    /// The answer was evasive or vague ("I don't know").
    pub noncommittal: bool,
}

/// Reconstructs the questions an answer responds to.
#[async_trait]
pub trait RelevancyJudge: Send + Sync {
    fn name(&self) -> &str;

    /// Produce up to `count` differently phrased questions for `answer` in one call.
    async fn generate_questions(
        &self,
        answer: &str,
        count: usize,
    ) -> Result<Vec<GeneratedQuestion>>;
}

/// Average precision over usefulness verdicts in context order.
///
/// `sum_k(precision@k * v_k) / (sum(v) + 1e-10)`; zero when nothing was useful.
pub fn average_precision(verdicts: &[bool]) -> f64 {
    let mut useful_so_far = 0usize;
    let mut numerator = 0.0;
    for (i, useful) in verdicts.iter().enumerate() {
        if *useful {
            useful_so_far += 1;
            numerator += useful_so_far as f64 / (i + 1) as f64;
        }
    }
    numerator / (useful_so_far as f64 + 1e-10)
}

/// Mean similarity of the generated questions to the query, zeroed when
/// every generated question was noncommittal. Clamped to `[0, 1]`.
pub fn relevancy_score(similarities: &[f64], noncommittal: &[bool]) -> Option<f64> {
    if similarities.is_empty() {
        return None;
    }
    let mean = similarities.iter().sum::<f64>() / similarities.len() as f64;
    let all_noncommittal = !noncommittal.is_empty() && noncommittal.iter().all(|n| *n);
    let score = if all_noncommittal { 0.0 } else { mean };
    score.is_finite().then(|| score.clamp(0.0, 1.0))
}

/// Computes [`EvaluationResult`]s with injected judges.
pub struct EvaluationScorer {
    precision_judge: Arc<dyn PrecisionJudge>,
    relevancy_judge: Arc<dyn RelevancyJudge>,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    strictness: usize,
    call_timeout: Duration,
}

impl EvaluationScorer {
    pub fn new(
        precision_judge: Arc<dyn PrecisionJudge>,
        relevancy_judge: Arc<dyn RelevancyJudge>,
        embedding_provider: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            precision_judge,
            relevancy_judge,
            embedding_provider,
            strictness: 3,
            call_timeout: Duration::from_secs(60),
        }
    }

    /// Number of question phrasings averaged for response relevancy.
    pub fn with_strictness(mut self, strictness: usize) -> Self {
        self.strictness = strictness.max(1);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Compute both metrics concurrently.
    pub async fn evaluate(
        &self,
        query: &str,
        answer: &str,
        contexts: &[String],
    ) -> EvaluationResult {
        let (context_precision, response_relevancy) = futures::join!(
            self.context_precision(query, answer, contexts),
            self.response_relevancy(query, answer, contexts),
        );
        EvaluationResult { context_precision, response_relevancy }
    }

    /// Context precision, or `None` if it cannot be computed.
    pub async fn context_precision(
        &self,
        query: &str,
        answer: &str,
        contexts: &[String],
    ) -> Option<f64> {
        let outcome = self.try_context_precision(query, answer, contexts).await;
        Self::settle(CONTEXT_PRECISION, outcome)
    }

    /// Response relevancy, or `None` if it cannot be computed.
    pub async fn response_relevancy(
        &self,
        query: &str,
        answer: &str,
        contexts: &[String],
    ) -> Option<f64> {
        let outcome = self.try_response_relevancy(query, answer, contexts).await;
        Self::settle(RESPONSE_RELEVANCY, outcome)
    }

    fn settle(metric: &str, outcome: Result<f64>) -> Option<f64> {
        match outcome {
            Ok(score) if score.is_finite() => {
                debug!(metric, score, "metric computed");
                Some(score.clamp(0.0, 1.0))
            }
            Ok(score) => {
                warn!(metric, score, "metric produced a non-finite value");
                None
            }
            Err(e) => {
                warn!(metric, error = %e, "metric unavailable");
                None
            }
        }
    }

    fn unavailable(metric: &str, reason: impl Into<String>) -> RagError {
        RagError::EvaluationUnavailable { metric: metric.to_string(), reason: reason.into() }
    }

    async fn try_context_precision(
        &self,
        query: &str,
        answer: &str,
        contexts: &[String],
    ) -> Result<f64> {
        if contexts.is_empty() {
            return Err(Self::unavailable(CONTEXT_PRECISION, "no contexts supplied"));
        }

        let mut verdicts = Vec::with_capacity(contexts.len());
        for context in contexts {
            let useful = with_timeout(
                self.call_timeout,
                self.precision_judge.was_useful(query, answer, context),
                |after| {
                    Self::unavailable(CONTEXT_PRECISION, format!("judge timed out after {after:?}"))
                },
            )
            .await?;
            verdicts.push(useful);
        }
        Ok(average_precision(&verdicts))
    }

    async fn try_response_relevancy(
        &self,
        query: &str,
        answer: &str,
        contexts: &[String],
    ) -> Result<f64> {
        if contexts.is_empty() {
            return Err(Self::unavailable(RESPONSE_RELEVANCY, "no contexts supplied"));
        }

        let mut generated = with_timeout(
            self.call_timeout,
            self.relevancy_judge.generate_questions(answer, self.strictness),
            |after| {
                Self::unavailable(RESPONSE_RELEVANCY, format!("judge timed out after {after:?}"))
            },
        )
        .await?;
        if generated.is_empty() {
            return Err(Self::unavailable(RESPONSE_RELEVANCY, "judge generated no questions"));
        }
        if generated.len() < self.strictness {
            warn!(
                requested = self.strictness,
                generated = generated.len(),
                "relevancy judge returned fewer questions than requested"
            );
        }
        generated.truncate(self.strictness);

        let mut texts: Vec<&str> = vec![query];
        texts.extend(generated.iter().map(|g| g.question.as_str()));
        let embeddings = with_timeout(
            self.call_timeout,
            self.embedding_provider.embed_batch(&texts),
            |after| {
                Self::unavailable(
                    RESPONSE_RELEVANCY,
                    format!("embedding timed out after {after:?}"),
                )
            },
        )
        .await?;

        let (query_embedding, question_embeddings) = embeddings
            .split_first()
            .ok_or_else(|| Self::unavailable(RESPONSE_RELEVANCY, "no embeddings returned"))?;
        if question_embeddings.len() != generated.len() {
            return Err(Self::unavailable(RESPONSE_RELEVANCY, "embedding count mismatch"));
        }

        let similarities: Vec<f64> = question_embeddings
            .iter()
            .map(|e| f64::from(cosine_similarity(query_embedding, e)))
            .collect();
        let noncommittal: Vec<bool> = generated.iter().map(|g| g.noncommittal).collect();

        relevancy_score(&similarities, &noncommittal)
            .ok_or_else(|| Self::unavailable(RESPONSE_RELEVANCY, "score is not a finite number"))
    }
}

const PRECISION_PROMPT: &str = "\
Given question, answer and context verify if the context was useful \
in arriving at the given answer. Give verdict as \"1\" if useful and \"0\" if not. \
Respond only with a JSON object of the form {{\"reason\": \"...\", \"verdict\": 0 or 1}}.

question: {question}
context: {context}
answer: {answer}
";

const RELEVANCY_PROMPT: &str = "\
Generate {count} differently worded questions that the given answer responds to, \
and identify if the answer is noncommittal. \
Give noncommittal as 1 if the answer is noncommittal and 0 if the answer is committal. \
A noncommittal answer is one that is evasive, vague, or ambiguous, \
for example \"I don't know\" or \"I'm not sure\" are noncommittal answers. \
Respond only with a JSON array of {count} objects of the form \
{{\"question\": \"...\", \"noncommittal\": 0 or 1}}.

answer: {answer}
";

/// Parse the JSON object or array in a model reply, tolerating markdown code
/// fences and surrounding prose.
pub fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    for start in ["```json", "```"] {
        if let Some(start_idx) = trimmed.find(start) {
            let body = &trimmed[start_idx + start.len()..];
            if let Some(end_idx) = body.find("```") {
                if let Ok(value) = serde_json::from_str(body[..end_idx].trim()) {
                    return Some(value);
                }
            }
        }
    }

    [('[', ']'), ('{', '}')].into_iter().find_map(|(open, close)| {
        let start = trimmed.find(open)?;
        let end = trimmed.rfind(close)?;
        if end <= start {
            return None;
        }
        serde_json::from_str(&trimmed[start..=end]).ok()
    })
}

/// Read a 0/1 flag that models emit as a number, boolean or string.
fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().and_then(|i| match i {
            0 => Some(false),
            1 => Some(true),
            _ => None,
        }),
        Value::String(s) => match s.trim() {
            "1" | "true" | "yes" => Some(true),
            "0" | "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn judge_error(judge: &str, message: impl Into<String>) -> RagError {
    RagError::Judge { judge: judge.to_string(), message: message.into() }
}

/// A [`PrecisionJudge`] that asks a [`GenerationModel`] for a JSON verdict.
pub struct LlmPrecisionJudge {
    model: Arc<dyn GenerationModel>,
}

impl LlmPrecisionJudge {
    pub fn new(model: Arc<dyn GenerationModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl PrecisionJudge for LlmPrecisionJudge {
    fn name(&self) -> &str {
        "llm_context_precision"
    }

    async fn was_useful(&self, query: &str, answer: &str, context: &str) -> Result<bool> {
        let prompt = fill_template(
            PRECISION_PROMPT,
            &[("question", query), ("context", context), ("answer", answer)],
        )?;
        let reply = self
            .model
            .generate(&prompt)
            .await
            .map_err(|e| judge_error(self.name(), e.to_string()))?;
        let json = extract_json(&reply)
            .ok_or_else(|| judge_error(self.name(), "reply did not contain JSON"))?;
        json.get("verdict").and_then(flag).ok_or_else(|| {
            judge_error(self.name(), format!("missing or invalid verdict in {json}"))
        })
    }
}

/// A [`RelevancyJudge`] that asks a [`GenerationModel`] for several question
/// phrasings in a single JSON array.
pub struct LlmRelevancyJudge {
    model: Arc<dyn GenerationModel>,
}

impl LlmRelevancyJudge {
    pub fn new(model: Arc<dyn GenerationModel>) -> Self {
        Self { model }
    }
}

#[derive(Deserialize)]
struct QuestionReply {
    question: String,
    noncommittal: Value,
}

#[async_trait]
impl RelevancyJudge for LlmRelevancyJudge {
    fn name(&self) -> &str {
        "llm_response_relevancy"
    }

    async fn generate_questions(
        &self,
        answer: &str,
        count: usize,
    ) -> Result<Vec<GeneratedQuestion>> {
        let count_text = count.to_string();
        let prompt =
            fill_template(RELEVANCY_PROMPT, &[("answer", answer), ("count", &count_text)])?;
        let reply = self
            .model
            .generate(&prompt)
            .await
            .map_err(|e| judge_error(self.name(), e.to_string()))?;
        let json = extract_json(&reply)
            .ok_or_else(|| judge_error(self.name(), "reply did not contain JSON"))?;
        // A lone object is accepted as a single phrasing.
        let items = match json {
            Value::Array(items) => items,
            Value::Object(mut obj) if obj.contains_key("questions") => {
                match obj.remove("questions") {
                    Some(Value::Array(items)) => items,
                    _ => return Err(judge_error(self.name(), "`questions` is not an array")),
                }
            }
            other => vec![other],
        };

        items
            .into_iter()
            .map(|item| {
                let parsed: QuestionReply = serde_json::from_value(item)
                    .map_err(|e| judge_error(self.name(), format!("unexpected reply shape: {e}")))?;
                let noncommittal = flag(&parsed.noncommittal)
                    .ok_or_else(|| judge_error(self.name(), "invalid noncommittal flag"))?;
                Ok(GeneratedQuestion { question: parsed.question, noncommittal })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const QUERY: &str = "Can you suggest good budget laptops?";
    const ANSWER: &str = "Laptop X at 45000 INR is a good budget pick.";

    fn contexts() -> Vec<String> {
        vec!["Title: Laptop X\nPrice: 45000\nRating: 4.2\nReviews:\nGreat value".to_string()]
    }

    struct FixedPrecision(bool);

    #[async_trait]
    impl PrecisionJudge for FixedPrecision {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn was_useful(&self, _query: &str, _answer: &str, _context: &str) -> Result<bool> {
            Ok(self.0)
        }
    }

    struct FailingPrecision;

    #[async_trait]
    impl PrecisionJudge for FailingPrecision {
        fn name(&self) -> &str {
            "failing"
        }

        async fn was_useful(&self, _query: &str, _answer: &str, _context: &str) -> Result<bool> {
            Err(judge_error("failing", "rate limited"))
        }
    }

    struct SlowPrecision;

    #[async_trait]
    impl PrecisionJudge for SlowPrecision {
        fn name(&self) -> &str {
            "slow"
        }

        async fn was_useful(&self, _query: &str, _answer: &str, _context: &str) -> Result<bool> {
            tokio::time::sleep(Duration::from_secs(600)).await;
            Ok(true)
        }
    }

    /// Returns `count` copies of one question and records each request.
    struct FixedQuestions {
        question: &'static str,
        noncommittal: bool,
        requested: Mutex<Vec<usize>>,
    }

    impl FixedQuestions {
        fn new(question: &'static str, noncommittal: bool) -> Self {
            Self { question, noncommittal, requested: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl RelevancyJudge for FixedQuestions {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn generate_questions(
            &self,
            _answer: &str,
            count: usize,
        ) -> Result<Vec<GeneratedQuestion>> {
            self.requested.lock().unwrap().push(count);
            Ok((0..count)
                .map(|_| GeneratedQuestion {
                    question: self.question.to_string(),
                    noncommittal: self.noncommittal,
                })
                .collect())
        }
    }

    struct FailingQuestions;

    #[async_trait]
    impl RelevancyJudge for FailingQuestions {
        fn name(&self) -> &str {
            "failing"
        }

        async fn generate_questions(
            &self,
            _answer: &str,
            _count: usize,
        ) -> Result<Vec<GeneratedQuestion>> {
            Err(judge_error("failing", "malformed reply"))
        }
    }

    /// Embeds by counting a few product words.
    struct KeywordEmbedder;

    #[async_trait]
    impl EmbeddingProvider for KeywordEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let lower = text.to_lowercase();
            Ok(["laptop", "phone", "budget"]
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

    /// Replies with a fixed text, or fails when there is none, and records prompts.
    #[derive(Default)]
    struct ScriptedModel {
        reply: Option<String>,
        prompts: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl ScriptedModel {
        fn replying(reply: &str) -> Self {
            Self { reply: Some(reply.to_string()), ..Self::default() }
        }

        fn failing() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl GenerationModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().ok_or_else(|| RagError::Generation {
                model: "scripted".into(),
                message: "service unavailable".into(),
            })
        }
    }

    fn scorer(
        precision: impl PrecisionJudge + 'static,
        relevancy: impl RelevancyJudge + 'static,
        embedder: impl EmbeddingProvider + 'static,
    ) -> EvaluationScorer {
        EvaluationScorer::new(Arc::new(precision), Arc::new(relevancy), Arc::new(embedder))
    }

    #[tokio::test]
    async fn precision_judge_failure_leaves_relevancy_intact() {
        let result = scorer(
            FailingPrecision,
            FixedQuestions::new("Which budget laptop should I buy?", false),
            KeywordEmbedder,
        )
        .evaluate(QUERY, ANSWER, &contexts())
        .await;

        assert_eq!(result.context_precision, None);
        let relevancy = result.response_relevancy.unwrap();
        assert!((relevancy - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn relevancy_judge_failure_leaves_precision_intact() {
        let result = scorer(FixedPrecision(true), FailingQuestions, KeywordEmbedder)
            .evaluate(QUERY, ANSWER, &contexts())
            .await;

        assert!((result.context_precision.unwrap() - 1.0).abs() < 1e-6);
        assert_eq!(result.response_relevancy, None);
    }

    #[tokio::test]
    async fn embedding_failure_voids_relevancy_only() {
        let result = scorer(
            FixedPrecision(false),
            FixedQuestions::new("Which laptop?", false),
            FailingEmbedder,
        )
        .evaluate(QUERY, ANSWER, &contexts())
        .await;

        assert_eq!(result.context_precision, Some(0.0));
        assert_eq!(result.response_relevancy, None);
    }

    #[tokio::test(start_paused = true)]
    async fn judge_timeout_voids_that_metric() {
        let result = scorer(
            SlowPrecision,
            FixedQuestions::new("Which budget laptop should I buy?", false),
            KeywordEmbedder,
        )
        .with_call_timeout(Duration::from_secs(5))
        .evaluate(QUERY, ANSWER, &contexts())
        .await;

        assert_eq!(result.context_precision, None);
        assert!(result.response_relevancy.is_some());
    }

    #[tokio::test]
    async fn noncommittal_answers_score_zero_relevancy() {
        let result = scorer(
            FixedPrecision(true),
            FixedQuestions::new("Which budget laptop should I buy?", true),
            KeywordEmbedder,
        )
        .evaluate(QUERY, "I'm not sure.", &contexts())
        .await;

        assert_eq!(result.response_relevancy, Some(0.0));
    }

    #[tokio::test]
    async fn strictness_sets_question_count_in_a_single_request() {
        let judge = Arc::new(FixedQuestions::new("Which laptop?", false));
        let scorer = EvaluationScorer::new(
            Arc::new(FixedPrecision(true)),
            judge.clone(),
            Arc::new(KeywordEmbedder),
        )
        .with_strictness(4);

        assert!(scorer.response_relevancy(QUERY, ANSWER, &contexts()).await.is_some());
        assert_eq!(*judge.requested.lock().unwrap(), vec![4]);
    }

    #[tokio::test]
    async fn llm_precision_judge_reads_fenced_verdict() {
        let model = Arc::new(ScriptedModel::replying(
            "```json\n{\"reason\": \"mentions the price\", \"verdict\": 1}\n```",
        ));
        let judge = LlmPrecisionJudge::new(model.clone());

        assert!(judge.was_useful(QUERY, ANSWER, "Price: 45000").await.unwrap());
        let prompt = model.prompts.lock().unwrap()[0].clone();
        assert!(prompt.contains(&format!("question: {QUERY}")));
        assert!(prompt.contains("context: Price: 45000"));
    }

    #[tokio::test]
    async fn llm_relevancy_judge_reads_fenced_question_array() {
        let reply = "```json\n[\
            {\"question\": \"Which budget laptop is good?\", \"noncommittal\": 0},\
            {\"question\": \"What laptop costs under 50000?\", \"noncommittal\": 0},\
            {\"question\": \"Is Laptop X worth buying?\", \"noncommittal\": \"0\"}\
        ]\n```";
        let model = Arc::new(ScriptedModel::replying(reply));
        let judge = LlmRelevancyJudge::new(model.clone());

        let questions = judge.generate_questions(ANSWER, 3).await.unwrap();

        assert_eq!(model.calls.load(Ordering::SeqCst), 1);
        assert_eq!(questions.len(), 3);
        let distinct: std::collections::HashSet<_> =
            questions.iter().map(|q| q.question.as_str()).collect();
        assert_eq!(distinct.len(), 3);
        assert!(questions.iter().all(|q| !q.noncommittal));
        assert!(model.prompts.lock().unwrap()[0].contains("Generate 3 differently worded"));
    }

    #[tokio::test]
    async fn llm_relevancy_judge_accepts_a_single_object() {
        let model = Arc::new(ScriptedModel::replying(
            "Sure: {\"question\": \"Which laptop?\", \"noncommittal\": 1}",
        ));
        let questions = LlmRelevancyJudge::new(model).generate_questions(ANSWER, 3).await.unwrap();

        assert_eq!(
            questions,
            vec![GeneratedQuestion { question: "Which laptop?".into(), noncommittal: true }]
        );
    }

    #[tokio::test]
    async fn llm_judges_report_model_and_parse_failures() {
        let err = LlmPrecisionJudge::new(Arc::new(ScriptedModel::failing()))
            .was_useful(QUERY, ANSWER, "ctx")
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Judge { .. }));

        let err = LlmRelevancyJudge::new(Arc::new(ScriptedModel::replying("no idea")))
            .generate_questions(ANSWER, 2)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Judge { .. }));

        let err = LlmPrecisionJudge::new(Arc::new(ScriptedModel::replying(r#"{"verdict": 7}"#)))
            .was_useful(QUERY, ANSWER, "ctx")
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Judge { .. }));
    }

    #[test]
    fn average_precision_rewards_useful_contexts_near_the_top() {
        assert!((average_precision(&[true, false]) - 1.0).abs() < 1e-6);
        assert!((average_precision(&[false, true]) - 0.5).abs() < 1e-6);
        assert_eq!(average_precision(&[false, false]), 0.0);
        assert!((average_precision(&[true, false, true]) - (1.0 + 2.0 / 3.0) / 2.0).abs() < 1e-6);
    }

    #[test]
    fn relevancy_is_zero_when_all_noncommittal() {
        assert_eq!(relevancy_score(&[0.9, 0.8], &[true, true]), Some(0.0));
        let mixed = relevancy_score(&[0.9, 0.7], &[true, false]).unwrap();
        assert!((mixed - 0.8).abs() < 1e-9);
    }

    #[test]
    fn relevancy_is_clamped_and_rejects_non_finite() {
        assert_eq!(relevancy_score(&[-0.4], &[false]), Some(0.0));
        assert_eq!(relevancy_score(&[f64::NAN], &[false]), None);
        assert_eq!(relevancy_score(&[], &[]), None);
    }

    #[test]
    fn extracts_json_from_fences_and_prose() {
        assert_eq!(extract_json(r#"{"verdict": 1}"#).unwrap()["verdict"], 1);
        let fenced = "Here you go:\n```json\n{\"verdict\": 0}\n```";
        assert_eq!(extract_json(fenced).unwrap()["verdict"], 0);
        let prose = "Sure! {\"question\": \"q?\", \"noncommittal\": 0} Hope that helps.";
        assert_eq!(extract_json(prose).unwrap()["question"], "q?");
        let array = "Here: [{\"question\": \"a?\"}, {\"question\": \"b?\"}] done";
        assert_eq!(extract_json(array).unwrap()[1]["question"], "b?");
        assert!(extract_json("no json here").is_none());
    }

    #[test]
    fn flags_accept_common_encodings() {
        assert_eq!(flag(&Value::from(1)), Some(true));
        assert_eq!(flag(&Value::from("0")), Some(false));
        assert_eq!(flag(&Value::from(true)), Some(true));
        assert_eq!(flag(&Value::from(2)), None);
    }

    #[test]
    fn judge_prompts_render() {
        let precision = fill_template(
            PRECISION_PROMPT,
            &[("question", "q"), ("context", "c"), ("answer", "a")],
        )
        .unwrap();
        assert!(precision.contains("{\"reason\": \"...\", \"verdict\": 0 or 1}"));
        let relevancy =
            fill_template(RELEVANCY_PROMPT, &[("answer", "a"), ("count", "3")]).unwrap();
        assert!(relevancy.contains("answer: a"));
        assert!(relevancy.contains("Generate 3 differently worded questions"));
    }
}
