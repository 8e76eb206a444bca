//! Prompt assembly under a token budget.
//!
//! Fills a new prompt in priority order:
//!
//! 1. **Request**: must fit on its own
//! 2. **Instructions**: joined into one system message, must fit
//! 3. **New context**: each piece must fit
//! 4. **References**: inlined one by one, each stops at its first miss
//! 5. **Ancestors**: walked nearest first, stops at the first miss
//!
//! Steps 1-3 fail the build when they do not fit; steps 4-5 degrade
//! quietly. The remaining budget is recomputed before every append.

use crate::stream::ResponseStream;
use std::sync::Arc;
use threadline_core::chat::Chat;
use threadline_core::error::{PromptError, Result};
use threadline_core::prompt::{HistoryKind, NewKind, Prompt, SealedPrompt, wrap_context};
use threadline_core::token;
use threadline_store::PromptStore;
use tracing::{debug, warn};

/// Everything needed to build one prompt.
#[derive(Debug, Clone, Default)]
pub struct MakePrompt {
    pub request: String,
    pub instruct: Vec<String>,
    pub context: Vec<String>,
    pub parent: Option<String>,
    pub references: Vec<String>,
    pub function_name: Option<String>,
}

impl MakePrompt {
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            request: request.into(),
            ..Self::default()
        }
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.references.push(reference.into());
        self
    }

    pub fn with_instruct(mut self, instruct: impl Into<String>) -> Self {
        self.instruct.push(instruct.into());
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context.push(context.into());
        self
    }

    pub fn with_function_name(mut self, name: impl Into<String>) -> Self {
        self.function_name = Some(name.into());
        self
    }
}

/// Drives one chat backend against one prompt store.
pub struct Assistant {
    pub(crate) chat: Arc<dyn Chat>,
    pub(crate) store: Arc<PromptStore>,
    token_limit: usize,
    pub(crate) prompt: Option<Prompt>,
    pub(crate) sealed: Option<SealedPrompt>,
}

impl Assistant {
    pub fn new(chat: Arc<dyn Chat>, store: Arc<PromptStore>, token_limit: usize) -> Self {
        Self {
            chat,
            store,
            token_limit,
            prompt: None,
            sealed: None,
        }
    }

    pub fn token_limit(&self) -> usize {
        self.token_limit
    }

    /// The prompt being built or awaiting its response.
    pub fn prompt(&self) -> Option<&Prompt> {
        self.prompt.as_ref()
    }

    /// The prompt most recently persisted by a response stream.
    pub fn sealed(&self) -> Option<&SealedPrompt> {
        self.sealed.as_ref()
    }

    fn available(&self, prompt: &Prompt) -> usize {
        self.token_limit.saturating_sub(prompt.request_tokens())
    }

    fn exceeded(&self, prompt: &Prompt, cost: usize) -> PromptError {
        PromptError::TokenLimitExceeded {
            used: prompt.request_tokens() + cost,
            limit: self.token_limit,
        }
    }

    /// Build the prompt for `request`, replacing any earlier one.
    pub async fn make_prompt(&mut self, request: MakePrompt) -> Result<()> {
        self.prompt = None;
        self.sealed = None;

        let mut prompt = self
            .chat
            .initiate(&request.request, request.function_name.as_deref())?;
        if prompt.request_tokens() > self.token_limit {
            return Err(self.exceeded(&prompt, 0).into());
        }

        if !request.instruct.is_empty() {
            let instruct = request.instruct.join("\n");
            if !prompt.append_new(NewKind::Instruct, &instruct, self.available(&prompt))? {
                let cost = token::estimate_text_message_tokens(&instruct);
                return Err(self.exceeded(&prompt, cost).into());
            }
        }

        for context in &request.context {
            if !prompt.append_new(NewKind::Context, context, self.available(&prompt))? {
                let cost = token::estimate_text_message_tokens(&wrap_context(context));
                return Err(self.exceeded(&prompt, cost).into());
            }
        }

        for reference in &request.references {
            match self.store.get_prompt(reference).await {
                Ok(referenced) => {
                    if prompt.references().iter().any(|r| r == referenced.hash()) {
                        debug!(reference = %reference, "Duplicate reference, already inlined");
                        continue;
                    }
                    prompt.add_reference(referenced.hash());
                    self.inline_history(&mut prompt, &referenced);
                }
                Err(e) => {
                    warn!(reference = %reference, error = %e, "Skipping unresolvable reference");
                }
            }
        }

        if let Some(parent) = &request.parent {
            match self.store.get_prompt(parent).await {
                Ok(parent_prompt) => {
                    prompt.set_parent(Some(parent_prompt.hash().to_string()));
                    self.inline_ancestors(&mut prompt, parent_prompt).await;
                }
                Err(e) => {
                    warn!(parent = %parent, error = %e, "Parent not found, starting without history");
                }
            }
        }

        debug!(
            request_tokens = prompt.request_tokens(),
            token_limit = self.token_limit,
            history = prompt.history_chat_messages().len(),
            "Prompt assembled"
        );
        self.prompt = Some(prompt);
        Ok(())
    }

    /// Walk the parent chain from `current` until the budget or the chain
    /// runs out.
    async fn inline_ancestors(&self, prompt: &mut Prompt, mut current: SealedPrompt) {
        loop {
            if !self.inline_history(prompt, &current) {
                debug!(at = %current.hash(), "Token budget reached, history truncated");
                return;
            }
            let Some(next) = current.parent().map(String::from) else {
                return;
            };
            match self.store.get_prompt(&next).await {
                Ok(ancestor) => current = ancestor,
                Err(e) => {
                    warn!(ancestor = %next, error = %e, "Ancestor unavailable, history truncated");
                    return;
                }
            }
        }
    }

    /// Inline one stored prompt: its first response, its request, then its
    /// context. Returns `false` at the first piece that does not fit.
    fn inline_history(&self, prompt: &mut Prompt, source: &SealedPrompt) -> bool {
        if let Some(response) = source.responses().first() {
            let available = self.available(prompt);
            if !prompt.append_history(HistoryKind::Chat, response.clone(), available) {
                return false;
            }
        }

        let available = self.available(prompt);
        if !prompt.append_history(HistoryKind::Chat, source.request().clone(), available) {
            return false;
        }

        for context in source.context_messages() {
            let available = self.available(prompt);
            if !prompt.append_history(HistoryKind::Context, context.clone(), available) {
                return false;
            }
        }
        true
    }

    /// Send the prompt and yield the response as it arrives.
    ///
    /// The prompt is sealed and stored once the response is complete.
    pub fn iterate_response(&mut self) -> ResponseStream<'_> {
        ResponseStream::new(self)
    }
}
