//! Answer generation from a prompt template and formatted context.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error};

use crate::error::{RagError, Result};
use crate::model::{GenerationModel, with_timeout};
use crate::prompt::{CONTEXT_SLOT, PromptRegistry, PromptType, QUESTION_SLOT};

/// Fills the product prompt and calls the generation model once.
///
/// The question is passed through verbatim and the model output is
/// returned unmodified. Failures are not retried.
pub struct GenerationInvoker {
    model: Arc<dyn GenerationModel>,
    prompts: Arc<PromptRegistry>,
    prompt_type: PromptType,
    call_timeout: Duration,
}

impl GenerationInvoker {
    pub fn new(model: Arc<dyn GenerationModel>, prompts: Arc<PromptRegistry>) -> Self {
        Self {
            model,
            prompts,
            prompt_type: PromptType::ProductBot,
            call_timeout: Duration::from_secs(60),
        }
    }

    pub fn with_prompt_type(mut self, prompt_type: PromptType) -> Self {
        self.prompt_type = prompt_type;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Render the prompt for `question` over `context`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] if the prompt type has no template.
    pub fn build_prompt(&self, question: &str, context: &str) -> Result<String> {
        self.prompts
            .get(self.prompt_type)?
            .render(&[(CONTEXT_SLOT, context), (QUESTION_SLOT, question)])
    }

    /// Generate an answer.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Configuration`] for a missing template and
    /// [`RagError::Generation`] if the model fails or times out.
    pub async fn invoke(&self, question: &str, context: &str) -> Result<String> {
        let prompt = self.build_prompt(question, context)?;
        debug!(
            model = self.model.name(),
            prompt_type = %self.prompt_type,
            prompt_len = prompt.len(),
            "invoking generation model"
        );

        let model_name = self.model.name().to_string();
        with_timeout(self.call_timeout, self.model.generate(&prompt), |after| {
            RagError::Generation {
                model: model_name.clone(),
                message: format!("timed out after {after:?}"),
            }
        })
        .await
        .map_err(|e| {
            error!(model = %model_name, error = %e, "generation failed");
            match e {
                RagError::Generation { .. } => e,
                other => {
                    RagError::Generation { model: model_name.clone(), message: other.to_string() }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct RecordingModel {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GenerationModel for RecordingModel {
        fn name(&self) -> &str {
            "recording"
        }

        async fn generate(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok("  raw answer \n".to_string())
        }
    }

    struct BrokenModel;

    #[async_trait]
    impl GenerationModel for BrokenModel {
        fn name(&self) -> &str {
            "broken"
        }

        async fn generate(&self, _prompt: &str) -> Result<String> {
            Err(RagError::Judge { judge: "x".into(), message: "provider down".into() })
        }
    }

    fn registry() -> Arc<PromptRegistry> {
        Arc::new(
            PromptRegistry::empty()
                .with_template(PromptType::ProductBot, "CTX[{context}] Q[{question}]")
                .unwrap(),
        )
    }

    #[tokio::test]
    async fn fills_slots_and_returns_output_unmodified() {
        let model = Arc::new(RecordingModel::default());
        let invoker = GenerationInvoker::new(model.clone(), registry());

        let answer = invoker.invoke("Any {deals}?", "Title: Laptop X").await.unwrap();

        assert_eq!(answer, "  raw answer \n");
        assert_eq!(
            model.prompts.lock().unwrap().as_slice(),
            ["CTX[Title: Laptop X] Q[Any {deals}?]"]
        );
    }

    #[tokio::test]
    async fn model_failure_becomes_generation_error() {
        let invoker = GenerationInvoker::new(Arc::new(BrokenModel), registry());
        let err = invoker.invoke("q", "c").await.unwrap_err();
        assert!(matches!(err, RagError::Generation { ref model, .. } if model == "broken"));
    }

    #[tokio::test]
    async fn missing_template_is_a_configuration_error() {
        let invoker = GenerationInvoker::new(
            Arc::new(RecordingModel::default()),
            Arc::new(PromptRegistry::empty()),
        );
        assert!(matches!(invoker.invoke("q", "c").await, Err(RagError::Configuration(_))));
    }
}
