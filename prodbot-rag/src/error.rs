//! Error types for the `prodbot-rag` crate.

use std::fmt;

use thiserror::Error;

/// A named step of the answer pipeline.
///
/// `Idle` and `Done` never carry an error; they exist so the stage
/// tracker can report the full lifecycle of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    Idle,
    Retrieving,
    Filtering,
    Formatting,
    Generating,
    Done,
    Failed,
}

impl PipelineStage {
    /// Whether the stage ends a request.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Retrieving => "retrieving",
            Self::Filtering => "filtering",
            Self::Formatting => "formatting",
            Self::Generating => "generating",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur in RAG operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// Missing or invalid environment, configuration value, or prompt registry entry.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The document store was unreachable, unconfigured, or rejected the query.
    #[error("Retrieval error ({backend}): {message}")]
    Retrieval {
        /// The store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    Embedding {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// The generation capability failed or returned a malformed response.
    #[error("Generation error ({model}): {message}")]
    Generation {
        /// The model that produced the error.
        model: String,
        /// A description of the failure.
        message: String,
    },

    /// A relevance or evaluation judge failed to produce a verdict.
    #[error("Judge error ({judge}): {message}")]
    Judge {
        /// The judge that produced the error.
        judge: String,
        /// A description of the failure.
        message: String,
    },

    /// A metric could not be computed. Never fatal to a request.
    #[error("Evaluation unavailable ({metric}): {reason}")]
    EvaluationUnavailable {
        /// The metric that could not be computed.
        metric: String,
        /// Why the metric was not computed.
        reason: String,
    },

    /// Reading or parsing the product catalogue failed.
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// A fatal error attributed to the pipeline stage that raised it.
    #[error("Pipeline failed while {stage}: {source}")]
    Pipeline {
        /// The stage that was active when the collaborator failed.
        stage: PipelineStage,
        /// The collaborator's error.
        #[source]
        source: Box<RagError>,
    },
}

impl RagError {
    /// Wrap an error with the stage it occurred in.
    ///
    /// Already-attributed errors are returned as is.
    pub fn at_stage(self, stage: PipelineStage) -> Self {
        match self {
            Self::Pipeline { .. } => self,
            other => Self::Pipeline { stage, source: Box::new(other) },
        }
    }

    /// The stage a pipeline error was attributed to, if any.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::Pipeline { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The underlying error with any stage attribution removed.
    pub fn cause(&self) -> &RagError {
        match self {
            Self::Pipeline { source, .. } => source.cause(),
            other => other,
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cause_unwraps_stage_attribution() {
        let err = RagError::Retrieval { backend: "memory".into(), message: "down".into() }
            .at_stage(PipelineStage::Retrieving);

        assert_eq!(err.stage(), Some(PipelineStage::Retrieving));
        assert!(matches!(err.cause(), RagError::Retrieval { .. }));
        assert_eq!(
            err.to_string(),
            "Pipeline failed while retrieving: Retrieval error (memory): down"
        );
    }

    #[test]
    fn at_stage_keeps_first_attribution() {
        let err = RagError::Generation { model: "m".into(), message: "boom".into() }
            .at_stage(PipelineStage::Generating)
            .at_stage(PipelineStage::Failed);

        assert_eq!(err.stage(), Some(PipelineStage::Generating));
    }
}
