//! Text generation capability.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A language model that turns a fully rendered prompt into text.
///
/// The answer generator and the LLM-backed judges share this interface so
/// one provider handle can serve all of them.
#[async_trait]
pub trait GenerationModel: Send + Sync {
    /// Model identifier, used in logs and errors.
    fn name(&self) -> &str;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Await `future`, mapping expiry of `limit` to the error built by `on_timeout`.
pub(crate) async fn with_timeout<T, F>(
    limit: Duration,
    future: F,
    on_timeout: impl FnOnce(Duration) -> RagError,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_) => Err(on_timeout(limit)),
    }
}
