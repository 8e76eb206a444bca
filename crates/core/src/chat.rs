//! Chat trait: the abstraction over chat-completion backends.
//!
//! A Chat knows which model and user it speaks for, how to start a
//! [`Prompt`] for a request, and how to get a response for it, either
//! complete or as a stream of [`ChatResponse`] deltas.

use crate::error::{PromptError, ProviderError};
use crate::prompt::Prompt;
use crate::response::ChatResponse;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Receiving end of a streamed completion.
pub type ChatStream = mpsc::Receiver<std::result::Result<ChatResponse, ProviderError>>;

/// The core Chat trait.
///
/// Every provider adapter implements this trait. The assistant calls
/// `initiate()` and then `complete()` or `stream()` without knowing which
/// backend is behind it.
#[async_trait]
pub trait Chat: Send + Sync {
    /// A human-readable name for this backend (e.g., "openai").
    fn name(&self) -> &str;

    /// The model requests are sent to.
    fn model(&self) -> &str;

    /// Whether the assistant should drive this chat through `stream()`.
    fn is_streaming(&self) -> bool {
        false
    }

    /// Start a new prompt for `request`.
    fn initiate(
        &self,
        request: &str,
        function_name: Option<&str>,
    ) -> std::result::Result<Prompt, PromptError>;

    /// Send the prompt and wait for the complete response.
    async fn complete(&self, prompt: &Prompt) -> std::result::Result<ChatResponse, ProviderError>;

    /// Send the prompt and receive response deltas as they arrive.
    ///
    /// Default implementation calls `complete()` and forwards the result as
    /// a single chunk.
    async fn stream(&self, prompt: &Prompt) -> std::result::Result<ChatStream, ProviderError> {
        let response = self.complete(prompt).await?;
        let (tx, rx) = mpsc::channel(1);
        let _ = tx.send(Ok(response)).await;
        Ok(rx)
    }
}
