//! Shared test helpers: a scripted chat and a throwaway store.

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use threadline_core::chat::{Chat, ChatStream};
use threadline_core::error::{PromptError, ProviderError};
use threadline_core::prompt::{Prompt, SealedPrompt, User};
use threadline_core::response::{ChatResponse, Choice};
use threadline_store::PromptStore;

/// A chat that replays the same script on every call.
pub struct ScriptedChat {
    streaming: bool,
    complete: ChatResponse,
    chunks: Vec<Result<ChatResponse, ProviderError>>,
    calls: AtomicUsize,
}

impl ScriptedChat {
    /// Non-streaming; every call answers with one candidate per text.
    pub fn complete(texts: &[&str]) -> Self {
        let choices: Vec<Choice> = texts
            .iter()
            .enumerate()
            .flat_map(|(i, t)| ChatResponse::text("mock-model", i, *t).choices)
            .collect();
        Self {
            streaming: false,
            complete: ChatResponse {
                model: "mock-model".into(),
                choices,
                ..ChatResponse::default()
            },
            chunks: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    /// Streaming; every call replays `chunks` then closes.
    pub fn streaming(chunks: Vec<Result<ChatResponse, ProviderError>>) -> Self {
        Self {
            streaming: true,
            complete: ChatResponse::default(),
            chunks,
            calls: AtomicUsize::new(0),
        }
    }

    #[allow(dead_code)]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Chat for ScriptedChat {
    fn name(&self) -> &str {
        "scripted"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn initiate(&self, request: &str, function_name: Option<&str>) -> Result<Prompt, PromptError> {
        Prompt::new(self.model(), user(), request, function_name)
    }

    async fn complete(&self, _prompt: &Prompt) -> Result<ChatResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.complete.clone())
    }

    async fn stream(&self, _prompt: &Prompt) -> Result<ChatStream, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = tokio::sync::mpsc::channel(self.chunks.len().max(1));
        for chunk in &self.chunks {
            let _ = tx.send(chunk.clone()).await;
        }
        Ok(rx)
    }
}

pub fn user() -> User {
    User {
        name: "Ada".into(),
        email: "ada@example.com".into(),
    }
}

pub async fn open_store() -> (tempfile::TempDir, Arc<PromptStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = PromptStore::open(dir.path()).await.unwrap();
    (dir, Arc::new(store))
}

/// Store an answered prompt directly, bypassing the assistant.
pub async fn seed(
    store: &PromptStore,
    request: &str,
    answer: &str,
    parent: Option<&str>,
    references: &[&str],
) -> SealedPrompt {
    let mut prompt = Prompt::new("mock-model", user(), request, None).unwrap();
    prompt.set_parent(parent.map(String::from));
    for r in references {
        prompt.add_reference(*r);
    }
    prompt
        .set_response(&ChatResponse::text("mock-model", 0, answer))
        .unwrap();
    let sealed = prompt.seal().unwrap();
    store.store_prompt(&sealed).await.unwrap();
    sealed
}
