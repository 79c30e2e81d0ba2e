//! Relevance filtering of retrieved candidates.
//!
//! The [`ContextFilter`] asks a [`RelevanceJudge`] about every candidate and
//! drops the ones judged irrelevant. It never reorders, duplicates or edits
//! candidates. When the judge fails, times out or gives an unclear answer the
//! candidate is kept and a warning is logged.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use regex::Regex;
use tracing::{debug, warn};

use crate::document::{Candidate, Document};
use crate::error::{RagError, Result};
use crate::model::{GenerationModel, with_timeout};
use crate::prompt::fill_template;

/// A judge's opinion about one candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relevance {
    Relevant,
    Irrelevant,
    /// The judge answered, but not with a usable verdict.
    Unclear,
}

/// Decides whether a document helps answer a query.
#[async_trait]
pub trait RelevanceJudge: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &str;

    async fn judge(&self, query: &str, document: &Document) -> Result<Relevance>;
}

/// Keeps the candidates a [`RelevanceJudge`] considers relevant.
pub struct ContextFilter {
    judge: Arc<dyn RelevanceJudge>,
    concurrency: usize,
    call_timeout: Duration,
}

impl ContextFilter {
    pub fn new(judge: Arc<dyn RelevanceJudge>) -> Self {
        Self { judge, concurrency: 1, call_timeout: Duration::from_secs(60) }
    }

    /// Allow up to `concurrency` judgments in flight. Output order is unaffected.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Return the relevant subsequence of `candidates`.
    pub async fn filter(&self, query: &str, candidates: Vec<Candidate>) -> Vec<Candidate> {
        if candidates.is_empty() {
            return candidates;
        }
        let total = candidates.len();

        // `buffered` yields results in input order regardless of completion order.
        let verdicts: Vec<(Candidate, bool)> = stream::iter(candidates)
            .map(|candidate| async move {
                let keep = self.keep(query, &candidate).await;
                (candidate, keep)
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let kept: Vec<Candidate> =
            verdicts.into_iter().filter_map(|(c, keep)| keep.then_some(c)).collect();
        debug!(judge = self.judge.name(), total, kept = kept.len(), "filtered candidates");
        kept
    }

    async fn keep(&self, query: &str, candidate: &Candidate) -> bool {
        let judge_name = self.judge.name().to_string();
        let verdict = with_timeout(
            self.call_timeout,
            self.judge.judge(query, &candidate.document),
            |after| RagError::Judge {
                judge: judge_name.clone(),
                message: format!("timed out after {after:?}"),
            },
        )
        .await;

        match verdict {
            Ok(Relevance::Relevant) => true,
            Ok(Relevance::Irrelevant) => false,
            Ok(Relevance::Unclear) => {
                warn!(
                    judge = %judge_name,
                    document.id = %candidate.document.id,
                    rank = candidate.rank,
                    "relevance verdict unclear, keeping candidate"
                );
                true
            }
            Err(e) => {
                warn!(
                    judge = %judge_name,
                    document.id = %candidate.document.id,
                    rank = candidate.rank,
                    error = %e,
                    "relevance judge failed, keeping candidate"
                );
                true
            }
        }
    }
}

const RELEVANCE_PROMPT: &str = "\
Given the following question and context, return YES if the context is relevant to the question \
and NO if it isn't.

> Question: {question}
> Context:
>>>
{context}
>>>
> Relevant (YES / NO):";

static YES_NO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(yes|no)\b").expect("valid yes/no pattern"));

/// A [`RelevanceJudge`] that asks a [`GenerationModel`] a yes/no question.
pub struct LlmRelevanceJudge {
    model: Arc<dyn GenerationModel>,
}

impl LlmRelevanceJudge {
    pub fn new(model: Arc<dyn GenerationModel>) -> Self {
        Self { model }
    }
}

/// Interpret a model reply as a relevance verdict.
///
/// Exactly one of `YES`/`NO` (any case, as a whole word) must appear;
/// anything else is [`Relevance::Unclear`].
pub fn parse_relevance(reply: &str) -> Relevance {
    let mut saw_yes = false;
    let mut saw_no = false;
    for m in YES_NO.find_iter(reply) {
        if m.as_str().eq_ignore_ascii_case("yes") {
            saw_yes = true;
        } else {
            saw_no = true;
        }
    }
    match (saw_yes, saw_no) {
        (true, false) => Relevance::Relevant,
        (false, true) => Relevance::Irrelevant,
        _ => Relevance::Unclear,
    }
}

#[async_trait]
impl RelevanceJudge for LlmRelevanceJudge {
    fn name(&self) -> &str {
        "llm_relevance"
    }

    async fn judge(&self, query: &str, document: &Document) -> Result<Relevance> {
        let to_judge_error = |e: RagError| RagError::Judge {
            judge: self.name().to_string(),
            message: e.to_string(),
        };
        let prompt = fill_template(
            RELEVANCE_PROMPT,
            &[("question", query), ("context", &document.content)],
        )
        .map_err(to_judge_error)?;
        let reply = self.model.generate(&prompt).await.map_err(to_judge_error)?;
        Ok(parse_relevance(&reply))
    }
}
