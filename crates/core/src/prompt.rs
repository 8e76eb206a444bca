//! Prompt domain types.
//!
//! A [`Prompt`] is built in two phases. The open `Prompt` collects the
//! request, instructions, context, inherited history and, eventually, the
//! model's responses. [`Prompt::seal`] consumes it and produces a
//! [`SealedPrompt`]: an immutable value carrying the content hash that
//! identifies it in the store. Only sealed prompts can be persisted.
//!
//! Inherited history (`history_context_messages`, `history_chat_messages`)
//! is rebuilt on every request from the store and is never persisted.

use crate::error::PromptError;
use crate::message::{FunctionCall, Message, Role};
use crate::response::{ChatResponse, Delta};
use crate::token;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::ops::Deref;
use tracing::{trace, warn};

/// The developer a prompt is attributed to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub email: String,
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

/// Kinds of content supplied fresh with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewKind {
    Instruct,
    Context,
}

/// Kinds of content inherited from ancestors and references.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    Context,
    Chat,
}

/// Wrap context text in the envelope that separates it from instructions.
pub fn wrap_context(content: &str) -> String {
    format!("<context>\n{content}\n</context>")
}

/// Accumulates one streamed response candidate.
#[derive(Debug, Clone, Default)]
struct Candidate {
    role: Option<Role>,
    content: String,
    name: Option<String>,
    function_call: Option<FunctionCall>,
    finished: bool,
}

impl Candidate {
    /// Fold a delta in, returning the text it added.
    fn absorb(&mut self, delta: &Delta) -> String {
        if delta.role.is_some() {
            self.role = delta.role;
        }
        if delta.name.is_some() {
            self.name.clone_from(&delta.name);
        }
        if let Some(call) = &delta.function_call {
            let acc = self.function_call.get_or_insert_with(|| FunctionCall {
                name: String::new(),
                arguments: String::new(),
            });
            if !call.name.is_empty() {
                acc.name.clone_from(&call.name);
            }
            acc.arguments.push_str(&call.arguments);
        }
        let text = delta.content.clone().unwrap_or_default();
        self.content.push_str(&text);
        text
    }

    fn has_output(&self) -> bool {
        !self.content.is_empty() || self.function_call.is_some()
    }

    /// Build the final message, or `None` if the candidate produced nothing.
    fn into_message(self) -> Result<Option<Message>, PromptError> {
        if self.content.trim().is_empty() && self.function_call.is_none() {
            return Ok(None);
        }
        let content = (!self.content.trim().is_empty()).then_some(self.content);
        let message = Message::new(self.role.unwrap_or(Role::Assistant), content, self.name)?
            .with_function_call(self.function_call);
        Ok(Some(message))
    }
}

/// An open prompt: mutable until sealed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    model: String,
    user: User,
    /// Unix seconds
    timestamp: i64,
    request_tokens: usize,
    response_tokens: usize,
    #[serde(default)]
    instruct_messages: Vec<Message>,
    #[serde(default)]
    context_messages: Vec<Message>,
    #[serde(skip)]
    history_context_messages: Vec<Message>,
    #[serde(skip)]
    history_chat_messages: Vec<Message>,
    request: Message,
    #[serde(default)]
    responses: Vec<Message>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    parent: Option<String>,
    #[serde(default)]
    references: Vec<String>,
    #[serde(skip)]
    pending: BTreeMap<usize, Candidate>,
}

impl Prompt {
    /// Create a prompt for `request`, timestamped now.
    ///
    /// `request_tokens` starts at the cost of the request message.
    pub fn new(
        model: impl Into<String>,
        user: User,
        request: &str,
        function_name: Option<&str>,
    ) -> Result<Self, PromptError> {
        let request_message = Self::build_request(request, function_name)?;
        Ok(Self {
            model: model.into(),
            user,
            timestamp: chrono::Utc::now().timestamp(),
            request_tokens: token::estimate_message_tokens(&request_message),
            response_tokens: 0,
            instruct_messages: Vec::new(),
            context_messages: Vec::new(),
            history_context_messages: Vec::new(),
            history_chat_messages: Vec::new(),
            request: request_message,
            responses: Vec::new(),
            parent: None,
            references: Vec::new(),
            pending: BTreeMap::new(),
        })
    }

    fn build_request(content: &str, function_name: Option<&str>) -> Result<Message, PromptError> {
        if content.trim().is_empty() {
            return Err(PromptError::EmptyRequest);
        }
        match function_name {
            Some(name) => Message::function(name, content),
            None => Message::user(content),
        }
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn request_tokens(&self) -> usize {
        self.request_tokens
    }

    pub fn response_tokens(&self) -> usize {
        self.response_tokens
    }

    pub fn instruct_messages(&self) -> &[Message] {
        &self.instruct_messages
    }

    pub fn context_messages(&self) -> &[Message] {
        &self.context_messages
    }

    pub fn history_context_messages(&self) -> &[Message] {
        &self.history_context_messages
    }

    /// Inherited chat turns in the order they were appended (nearest
    /// ancestor first).
    pub fn history_chat_messages(&self) -> &[Message] {
        &self.history_chat_messages
    }

    pub fn request(&self) -> &Message {
        &self.request
    }

    pub fn responses(&self) -> &[Message] {
        &self.responses
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    pub fn references(&self) -> &[String] {
        &self.references
    }

    // ── Mutation (open prompts only) ──────────────────────────────────────

    /// Override the creation time (imports and tests).
    pub fn set_timestamp(&mut self, timestamp: i64) {
        self.timestamp = timestamp;
    }

    pub fn set_parent(&mut self, parent: Option<String>) {
        self.parent = parent;
    }

    /// Record a reference; duplicates are ignored.
    pub fn add_reference(&mut self, hash: impl Into<String>) {
        let hash = hash.into();
        if !self.references.contains(&hash) {
            self.references.push(hash);
        }
    }

    /// Replace the request message.
    pub fn set_request(
        &mut self,
        content: &str,
        function_name: Option<&str>,
    ) -> Result<(), PromptError> {
        let message = Self::build_request(content, function_name)?;
        let old_cost = token::estimate_message_tokens(&self.request);
        self.request_tokens = self.request_tokens.saturating_sub(old_cost)
            + token::estimate_message_tokens(&message);
        self.request = message;
        Ok(())
    }

    /// Append fresh instruction or context content if it fits the budget.
    ///
    /// Returns `Ok(false)` and leaves the prompt untouched when the wrapped
    /// message would cost more than `available_tokens`.
    pub fn append_new(
        &mut self,
        kind: NewKind,
        content: &str,
        available_tokens: usize,
    ) -> Result<bool, PromptError> {
        let message = Message::system(content)?;
        let cost = match kind {
            NewKind::Instruct => token::estimate_message_tokens(&message),
            NewKind::Context => token::estimate_text_message_tokens(&wrap_context(content)),
        };
        if cost > available_tokens {
            return Ok(false);
        }
        match kind {
            NewKind::Instruct => self.instruct_messages.push(message),
            NewKind::Context => self.context_messages.push(message),
        }
        self.request_tokens += cost;
        Ok(true)
    }

    /// Append inherited content if it fits the budget.
    ///
    /// Same all-or-nothing contract as [`Prompt::append_new`].
    pub fn append_history(
        &mut self,
        kind: HistoryKind,
        message: Message,
        available_tokens: usize,
    ) -> bool {
        let cost = match kind {
            HistoryKind::Context => {
                token::estimate_text_message_tokens(&wrap_context(&message.text()))
            }
            HistoryKind::Chat => token::estimate_message_tokens(&message),
        };
        if cost > available_tokens {
            return false;
        }
        match kind {
            HistoryKind::Context => self.history_context_messages.push(message),
            HistoryKind::Chat => self.history_chat_messages.push(message),
        }
        self.request_tokens += cost;
        true
    }

    fn check_model(&self, responded: &str) {
        if !responded.is_empty() && !responded.starts_with(&self.model) {
            warn!(
                expected = %self.model,
                actual = %responded,
                "Response model does not match requested model"
            );
        }
    }

    fn record_usage(&mut self, response: &ChatResponse) {
        if let Some(usage) = response.usage {
            self.request_tokens = usage.prompt_tokens;
            self.response_tokens = usage.completion_tokens;
        }
    }

    /// Set the full (non-streamed) response, replacing any earlier one.
    ///
    /// Choices are taken in `index` order and blank ones are dropped, so
    /// response indexes are positions in [`Prompt::responses`], not the
    /// provider's choice indexes. Sealing a streamed response compacts the
    /// same way.
    pub fn set_response(&mut self, response: &ChatResponse) -> Result<(), PromptError> {
        self.check_model(&response.model);

        let mut choices: Vec<_> = response.choices.iter().collect();
        choices.sort_by_key(|c| c.index);

        let mut responses = Vec::with_capacity(choices.len());
        for choice in choices {
            let mut candidate = Candidate::default();
            candidate.absorb(&choice.message);
            if let Some(message) = candidate.into_message()? {
                responses.push(message);
            }
        }
        self.responses = responses;
        self.pending.clear();

        if response.usage.is_some() {
            self.record_usage(response);
        } else {
            self.response_tokens = token::estimate_messages_tokens(&self.responses);
        }
        Ok(())
    }

    /// Fold one streamed chunk in.
    ///
    /// Returns the text newly added to candidate 0 (for live echo); text for
    /// other candidates is accumulated silently. A finish reason, a delta
    /// with no fields, or an output-free delta after some output closes its
    /// candidate.
    pub fn append_response_delta(&mut self, chunk: &ChatResponse) -> String {
        if self.pending.is_empty() {
            self.check_model(&chunk.model);
        }
        self.record_usage(chunk);

        let mut echoed = String::new();
        for choice in &chunk.choices {
            let candidate = self.pending.entry(choice.index).or_default();
            if candidate.finished {
                trace!(index = choice.index, "Ignoring delta for finished candidate");
                continue;
            }
            let text = candidate.absorb(&choice.message);
            let delta = &choice.message;
            // A role-only opener carries no output but must not close the candidate.
            let closes = choice.finish_reason.is_some()
                || delta.is_empty()
                || (!delta.has_output() && candidate.has_output());
            if closes {
                candidate.finished = true;
            }
            if choice.index == 0 {
                echoed.push_str(&text);
            }
        }
        echoed
    }

    /// Move accumulated stream candidates into `responses`.
    fn finish_stream(&mut self) -> Result<(), PromptError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut responses = Vec::with_capacity(self.pending.len());
        for (_, candidate) in std::mem::take(&mut self.pending) {
            if let Some(message) = candidate.into_message()? {
                responses.push(message);
            }
        }
        self.responses = responses;
        if self.response_tokens == 0 {
            self.response_tokens = token::estimate_messages_tokens(&self.responses);
        }
        Ok(())
    }

    /// The messages to transmit, in wire order: instructions, inherited
    /// context, inherited chat (oldest first), new context, request.
    pub fn messages(&self) -> Vec<Message> {
        let wrap = |m: &Message| {
            Message::new(Role::System, Some(wrap_context(&m.text())), None)
                .unwrap_or_else(|_| m.clone())
        };

        let mut messages = self.instruct_messages.clone();
        messages.extend(self.history_context_messages.iter().map(wrap));
        messages.extend(self.history_chat_messages.iter().rev().cloned());
        messages.extend(self.context_messages.iter().map(wrap));
        messages.push(self.request.clone());
        messages
    }

    /// Content digest of one response's text.
    pub fn response_hash(&self, index: usize) -> Result<String, PromptError> {
        let response = self
            .responses
            .get(index)
            .ok_or(PromptError::ResponseIndex(index))?;
        Ok(hex::encode(Sha256::digest(response.text().as_bytes())))
    }

    /// A compact summary of the prompt for log listings.
    pub fn shortlog(&self) -> Result<ShortLog, PromptError> {
        self.shortlog_with_hash(None)
    }

    fn shortlog_with_hash(&self, hash: Option<&str>) -> Result<ShortLog, PromptError> {
        if self.responses.is_empty() {
            return Err(PromptError::IncompletePrompt(
                "no response has been captured".into(),
            ));
        }
        Ok(ShortLog {
            user: self.user.to_string(),
            date: self.timestamp,
            model: self.model.clone(),
            context: self.context_messages.iter().map(Message::text).collect(),
            request: self.request.text(),
            responses: self.responses.iter().map(Message::text).collect(),
            request_tokens: self.request_tokens,
            response_tokens: self.response_tokens,
            hash: hash.map(String::from),
            parent: self.parent.clone(),
            references: self.references.clone(),
        })
    }

    /// Seal the prompt: finalize streamed candidates and compute the hash.
    ///
    /// Fails with `IncompletePrompt` when no response has been captured.
    pub fn seal(mut self) -> Result<SealedPrompt, PromptError> {
        self.finish_stream()?;
        if self.responses.is_empty() {
            return Err(PromptError::IncompletePrompt(
                "cannot seal a prompt without a response".into(),
            ));
        }
        let hash = self.identity_hash();
        Ok(SealedPrompt { hash, prompt: self })
    }

    fn identity_hash(&self) -> String {
        let mut references: Vec<&str> = self.references.iter().map(String::as_str).collect();
        references.sort_unstable();

        let input = HashInput {
            model: &self.model,
            user: &self.user,
            timestamp: self.timestamp,
            parent: self.parent.as_deref(),
            references,
            instruct: &self.instruct_messages,
            context: &self.context_messages,
            request: &self.request,
            responses: &self.responses,
        };
        let canonical = serde_json::to_vec(&input).unwrap_or_default();
        hex::encode(Sha256::digest(&canonical))
    }
}

/// Fields covered by the identity hash, in a fixed order.
#[derive(Serialize)]
struct HashInput<'a> {
    model: &'a str,
    user: &'a User,
    timestamp: i64,
    parent: Option<&'a str>,
    references: Vec<&'a str>,
    instruct: &'a [Message],
    context: &'a [Message],
    request: &'a Message,
    responses: &'a [Message],
}

/// Summary record used by `log` listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortLog {
    pub user: String,
    /// Unix seconds
    pub date: i64,
    pub model: String,
    pub context: Vec<String>,
    pub request: String,
    pub responses: Vec<String>,
    pub request_tokens: usize,
    pub response_tokens: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<String>,
}

/// A sealed, immutable prompt identified by its content hash.
///
/// Read access to the prompt's fields goes through `Deref`; there is no
/// mutable access, so the hash always describes the content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SealedPrompt {
    hash: String,
    #[serde(flatten)]
    prompt: Prompt,
}

impl Deref for SealedPrompt {
    type Target = Prompt;

    fn deref(&self) -> &Prompt {
        &self.prompt
    }
}

impl SealedPrompt {
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Recompute the hash and compare it with the sealed one.
    pub fn verify(&self) -> bool {
        self.prompt.identity_hash() == self.hash
    }

    pub fn shortlog(&self) -> Result<ShortLog, PromptError> {
        self.prompt.shortlog_with_hash(Some(&self.hash))
    }

    /// `User: <name> <<email>>` and `Date: ...` lines, then a blank line.
    pub fn formatted_header(&self) -> String {
        let date = DateTime::from_timestamp(self.timestamp(), 0)
            .map(|utc| {
                utc.with_timezone(&Local)
                    .format("%a %b %d %H:%M:%S %Y %z")
                    .to_string()
            })
            .unwrap_or_default();
        format!("User: {}\nDate: {}\n\n", self.user(), date)
    }

    /// The citation line that closes a response.
    pub fn formatted_footer(&self) -> String {
        format!("\n\nprompt {}", self.hash)
    }

    /// Header, response body and citation for one candidate.
    pub fn formatted_full_response(&self, index: usize) -> Result<String, PromptError> {
        let response = self
            .responses()
            .get(index)
            .ok_or(PromptError::ResponseIndex(index))?;
        Ok(format!(
            "{}{}{}",
            self.formatted_header(),
            response.text(),
            self.formatted_footer()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::Choice;

    fn user() -> User {
        User {
            name: "Ada".into(),
            email: "ada@example.com".into(),
        }
    }

    fn prompt(request: &str) -> Prompt {
        let mut p = Prompt::new("gpt-4", user(), request, None).unwrap();
        p.set_timestamp(1_700_000_000);
        p
    }

    fn answered(request: &str, answer: &str) -> SealedPrompt {
        let mut p = prompt(request);
        p.set_response(&ChatResponse::text("gpt-4", 0, answer)).unwrap();
        p.seal().unwrap()
    }

    #[test]
    fn blank_request_rejected() {
        let err = Prompt::new("gpt-4", user(), "   ", None).unwrap_err();
        assert_eq!(err, PromptError::EmptyRequest);
    }

    #[test]
    fn function_request_uses_function_role() {
        let p = Prompt::new("gpt-4", user(), "42", Some("calc")).unwrap();
        assert_eq!(p.request().role(), Role::Function);
        assert_eq!(p.request().name(), Some("calc"));
    }

    #[test]
    fn request_tokens_start_at_request_cost() {
        let p = prompt("test");
        assert_eq!(p.request_tokens(), 5);
    }

    #[test]
    fn set_request_replaces_cost() {
        let mut p = prompt("test");
        p.set_request(&"a".repeat(40), None).unwrap();
        assert_eq!(p.request_tokens(), 14);
        assert_eq!(p.set_request(" ", None), Err(PromptError::EmptyRequest));
        assert_eq!(p.request_tokens(), 14);
    }

    #[test]
    fn append_new_within_budget() {
        let mut p = prompt("test");
        assert!(p.append_new(NewKind::Instruct, "be brief", 100).unwrap());
        assert_eq!(p.instruct_messages().len(), 1);
        assert_eq!(p.request_tokens(), 5 + 6);
    }

    #[test]
    fn failed_append_leaves_prompt_unchanged() {
        let mut p = prompt("test");
        let before = p.request_tokens();
        assert!(!p.append_new(NewKind::Context, &"x".repeat(400), 10).unwrap());
        assert!(p.context_messages().is_empty());
        assert_eq!(p.request_tokens(), before);

        let msg = Message::assistant("y".repeat(400)).unwrap();
        assert!(!p.append_history(HistoryKind::Chat, msg, 10));
        assert!(p.history_chat_messages().is_empty());
        assert_eq!(p.request_tokens(), before);
    }

    #[test]
    fn context_cost_includes_envelope() {
        let mut p = prompt("test");
        p.append_new(NewKind::Context, "ctx", 100).unwrap();
        let expected = token::estimate_text_message_tokens("<context>\nctx\n</context>");
        assert_eq!(p.request_tokens(), 5 + expected);
    }

    #[test]
    fn messages_in_wire_order() {
        let mut p = prompt("now");
        p.append_new(NewKind::Instruct, "rules", 100).unwrap();
        p.append_new(NewKind::Context, "fresh", 100).unwrap();
        p.append_history(HistoryKind::Chat, Message::assistant("answer 2").unwrap(), 100);
        p.append_history(HistoryKind::Chat, Message::user("question 2").unwrap(), 100);
        p.append_history(HistoryKind::Chat, Message::assistant("answer 1").unwrap(), 100);
        p.append_history(HistoryKind::Chat, Message::user("question 1").unwrap(), 100);
        p.append_history(HistoryKind::Context, Message::system("old").unwrap(), 100);

        let texts: Vec<String> = p.messages().iter().map(Message::text).collect();
        assert_eq!(
            texts,
            vec![
                "rules".to_string(),
                "<context>\nold\n</context>".into(),
                "question 1".into(),
                "answer 1".into(),
                "question 2".into(),
                "answer 2".into(),
                "<context>\nfresh\n</context>".into(),
                "now".into(),
            ]
        );
    }

    #[test]
    fn set_response_tolerates_model_suffix_and_records_usage() {
        let mut p = prompt("hi");
        let response = ChatResponse::text("gpt-4-0613", 0, "hello").with_usage(9, 2);
        p.set_response(&response).unwrap();
        assert_eq!(p.responses()[0].content(), Some("hello"));
        assert_eq!(p.request_tokens(), 9);
        assert_eq!(p.response_tokens(), 2);
    }

    #[test]
    fn set_response_orders_candidates_by_index() {
        let mut p = prompt("hi");
        let mut response = ChatResponse::text("gpt-4", 1, "second");
        response.choices.push(ChatResponse::text("gpt-4", 0, "first").choices.remove(0));
        p.set_response(&response).unwrap();
        assert_eq!(p.responses()[0].text(), "first");
        assert_eq!(p.responses()[1].text(), "second");
    }

    #[test]
    fn stream_deltas_accumulate_per_index() {
        let mut p = prompt("hi");
        assert_eq!(p.append_response_delta(&ChatResponse::text("gpt-4", 0, "Hel")), "Hel");
        assert_eq!(p.append_response_delta(&ChatResponse::text("gpt-4", 1, "Bon")), "");
        assert_eq!(p.append_response_delta(&ChatResponse::text("gpt-4", 0, "lo")), "lo");
        assert_eq!(p.append_response_delta(&ChatResponse::text("gpt-4", 0, "")), "");
        // Index 0 is closed; late text is dropped.
        assert_eq!(p.append_response_delta(&ChatResponse::text("gpt-4", 0, "!")), "");
        assert_eq!(p.append_response_delta(&ChatResponse::text("gpt-4", 1, "jour")), "");

        let sealed = p.seal().unwrap();
        assert_eq!(sealed.responses()[0].text(), "Hello");
        assert_eq!(sealed.responses()[1].text(), "Bonjour");
    }

    #[test]
    fn openai_stream_opens_with_role_only_chunk() {
        let chunks = [
            r#"{"model":"gpt-4-0613","choices":[{"index":0,"delta":{"role":"assistant","content":""},"finish_reason":null}]}"#,
            r#"{"model":"gpt-4-0613","choices":[{"index":0,"delta":{"content":"Hel"},"finish_reason":null}]}"#,
            r#"{"model":"gpt-4-0613","choices":[{"index":0,"delta":{"content":"lo"},"finish_reason":null}]}"#,
            r#"{"model":"gpt-4-0613","choices":[{"index":0,"delta":{},"finish_reason":"stop"}]}"#,
        ];
        let mut p = prompt("hi");
        let echoed: Vec<String> = chunks
            .iter()
            .map(|c| p.append_response_delta(&serde_json::from_str(c).unwrap()))
            .collect();
        assert_eq!(echoed, vec!["", "Hel", "lo", ""]);

        let sealed = p.seal().unwrap();
        assert_eq!(sealed.responses()[0].text(), "Hello");
        assert_eq!(sealed.responses()[0].role(), Role::Assistant);
    }

    #[test]
    fn bare_empty_delta_closes_candidate() {
        let mut p = prompt("hi");
        p.append_response_delta(&ChatResponse::text("gpt-4", 0, "done"));
        let bare = ChatResponse {
            choices: vec![Choice::default()],
            ..ChatResponse::default()
        };
        p.append_response_delta(&bare);
        assert_eq!(p.append_response_delta(&ChatResponse::text("gpt-4", 0, "more")), "");
        assert_eq!(p.seal().unwrap().responses()[0].text(), "done");
    }

    #[test]
    fn blank_candidates_are_compacted() {
        let mut p = prompt("hi");
        let mut response = ChatResponse::text("gpt-4", 0, "  ");
        response.choices.push(ChatResponse::text("gpt-4", 1, "kept").choices.remove(0));
        p.set_response(&response).unwrap();
        let sealed = p.seal().unwrap();
        assert_eq!(sealed.responses().len(), 1);
        assert_eq!(sealed.responses()[0].text(), "kept");
        assert_eq!(
            sealed.response_hash(0).unwrap(),
            hex::encode(Sha256::digest("kept".as_bytes()))
        );
        assert!(sealed.formatted_full_response(0).unwrap().contains("\n\nkept\n\n"));
    }

    #[test]
    fn finish_reason_closes_candidate() {
        let mut p = prompt("hi");
        let mut chunk = ChatResponse::text("gpt-4", 0, "done");
        chunk.choices[0].finish_reason = Some("stop".into());
        p.append_response_delta(&chunk);
        assert_eq!(p.append_response_delta(&ChatResponse::text("gpt-4", 0, "more")), "");
        assert_eq!(p.seal().unwrap().responses()[0].text(), "done");
    }

    #[test]
    fn streamed_function_call_assembles() {
        let mut p = prompt("weather?");
        let call_chunk = |name: &str, args: &str| ChatResponse {
            choices: vec![Choice {
                index: 0,
                finish_reason: None,
                message: Delta {
                    function_call: Some(FunctionCall {
                        name: name.into(),
                        arguments: args.into(),
                    }),
                    ..Delta::default()
                },
            }],
            ..ChatResponse::default()
        };
        p.append_response_delta(&call_chunk("get_weather", "{\"city\""));
        p.append_response_delta(&call_chunk("", ":\"Oslo\"}"));
        let sealed = p.seal().unwrap();
        let call = sealed.responses()[0].function_call().unwrap();
        assert_eq!(call.name, "get_weather");
        assert_eq!(call.arguments, "{\"city\":\"Oslo\"}");
        assert!(sealed.responses()[0].content().is_none());
    }

    #[test]
    fn seal_requires_response() {
        let err = prompt("hi").seal().unwrap_err();
        assert!(matches!(err, PromptError::IncompletePrompt(_)));
    }

    #[test]
    fn shortlog_requires_response() {
        assert!(matches!(
            prompt("hi").shortlog(),
            Err(PromptError::IncompletePrompt(_))
        ));
        let log = answered("hi", "there").shortlog().unwrap();
        assert_eq!(log.request, "hi");
        assert_eq!(log.responses, vec!["there".to_string()]);
        assert!(log.hash.is_some());
    }

    #[test]
    fn hash_is_stable() {
        let a = answered("hi", "there");
        let b = answered("hi", "there");
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.hash().len(), 64);
        assert!(a.verify());
    }

    #[test]
    fn hash_covers_linkage_and_content() {
        let base = answered("hi", "there");
        assert_ne!(base.hash(), answered("hi", "elsewhere").hash());

        let mut linked = prompt("hi");
        linked.set_parent(Some(base.hash().to_string()));
        linked
            .set_response(&ChatResponse::text("gpt-4", 0, "there"))
            .unwrap();
        assert_ne!(linked.seal().unwrap().hash(), base.hash());
    }

    #[test]
    fn reference_order_does_not_change_hash() {
        let seal_with = |refs: &[&str]| {
            let mut p = prompt("hi");
            for r in refs {
                p.add_reference(*r);
            }
            p.set_response(&ChatResponse::text("gpt-4", 0, "ok")).unwrap();
            p.seal().unwrap()
        };
        assert_eq!(seal_with(&["a", "b"]).hash(), seal_with(&["b", "a", "b"]).hash());
    }

    #[test]
    fn response_hashes_differ_per_candidate() {
        let mut p = prompt("hi");
        let mut response = ChatResponse::text("gpt-4", 0, "one");
        response.choices.push(ChatResponse::text("gpt-4", 1, "two").choices.remove(0));
        p.set_response(&response).unwrap();
        let sealed = p.seal().unwrap();
        assert_ne!(sealed.response_hash(0).unwrap(), sealed.response_hash(1).unwrap());
        assert_eq!(sealed.response_hash(2), Err(PromptError::ResponseIndex(2)));
    }

    #[test]
    fn sealed_roundtrip_preserves_hash() {
        let mut p = prompt("hi");
        p.append_new(NewKind::Context, "ctx", 100).unwrap();
        p.append_history(HistoryKind::Chat, Message::user("old").unwrap(), 100);
        p.set_response(&ChatResponse::text("gpt-4", 0, "there")).unwrap();
        let sealed = p.seal().unwrap();

        let json = serde_json::to_string(&sealed).unwrap();
        let back: SealedPrompt = serde_json::from_str(&json).unwrap();
        assert_eq!(back.hash(), sealed.hash());
        assert_eq!(back.timestamp(), sealed.timestamp());
        assert_eq!(back.responses(), sealed.responses());
        assert!(back.history_chat_messages().is_empty());
        assert!(back.verify());
    }

    #[test]
    fn full_response_format() {
        let sealed = answered("hi", "there");
        let text = sealed.formatted_full_response(0).unwrap();
        assert!(text.starts_with("User: Ada <ada@example.com>\nDate: "));
        assert!(text.contains("\n\nthere\n\nprompt "));
        assert!(text.ends_with(sealed.hash()));
    }
}
