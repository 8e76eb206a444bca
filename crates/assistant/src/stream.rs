//! Response streaming.
//!
//! A [`ResponseStream`] sends the assistant's prompt, yields response text
//! as it arrives, then seals the prompt, stores it, and yields the citation
//! and any extra candidates. It is finite and cannot be restarted; dropping
//! it before the end leaves the store untouched.

use crate::assistant::Assistant;
use std::collections::VecDeque;
use threadline_core::chat::ChatStream;
use threadline_core::error::{Error, PromptError, Result};
use tracing::debug;

enum StreamState {
    Start,
    Streaming(ChatStream),
    Trailer(VecDeque<String>),
    Done,
}

pub struct ResponseStream<'a> {
    assistant: &'a mut Assistant,
    state: StreamState,
    /// Whether any candidate-0 text has been yielded yet.
    echoed: bool,
}

impl<'a> ResponseStream<'a> {
    pub(crate) fn new(assistant: &'a mut Assistant) -> Self {
        Self {
            assistant,
            state: StreamState::Start,
            echoed: false,
        }
    }

    /// The next piece of output, or `None` once the stream is finished.
    ///
    /// An `Err` is always the last item.
    pub async fn next(&mut self) -> Option<Result<String>> {
        loop {
            let event = match &mut self.state {
                StreamState::Done => return None,
                StreamState::Trailer(pending) => {
                    let text = pending.pop_front();
                    if text.is_none() {
                        self.state = StreamState::Done;
                    }
                    return text.map(Ok);
                }
                StreamState::Start => None,
                StreamState::Streaming(rx) => Some(rx.recv().await),
            };

            let step = match event {
                None => self.start().await,
                Some(Some(Ok(chunk))) => {
                    let Some(prompt) = self.assistant.prompt.as_mut() else {
                        self.state = StreamState::Done;
                        return None;
                    };
                    let text = prompt.append_response_delta(&chunk);
                    if !text.is_empty() {
                        self.echoed = true;
                        return Some(Ok(text));
                    }
                    continue;
                }
                Some(Some(Err(e))) => Err(e.into()),
                Some(None) => self.finish().await,
            };

            match step {
                Ok(state) => self.state = state,
                Err(e) => {
                    self.state = StreamState::Done;
                    return Some(Err(e));
                }
            }
        }
    }

    /// Collect everything the stream yields.
    pub async fn collect(mut self) -> Result<Vec<String>> {
        let mut out = Vec::new();
        while let Some(item) = self.next().await {
            out.push(item?);
        }
        Ok(out)
    }

    async fn start(&mut self) -> Result<StreamState> {
        let chat = self.assistant.chat.clone();
        let prompt = self.assistant.prompt.as_mut().ok_or_else(|| {
            PromptError::IncompletePrompt("no prompt has been made".into())
        })?;

        if chat.is_streaming() {
            debug!(chat = chat.name(), "Streaming response");
            let rx = chat.stream(prompt).await?;
            return Ok(StreamState::Streaming(rx));
        }

        debug!(chat = chat.name(), "Requesting complete response");
        let response = chat.complete(prompt).await?;
        prompt.set_response(&response)?;
        self.finish().await
    }

    /// Seal and store the prompt, then queue what is left to yield.
    ///
    /// When candidate 0 has already been echoed, only the citation and the
    /// other candidates follow it. Otherwise every candidate is shown in
    /// full.
    async fn finish(&mut self) -> Result<StreamState> {
        let prompt = self.assistant.prompt.take().ok_or_else(|| {
            Error::from(PromptError::IncompletePrompt("no prompt has been made".into()))
        })?;
        let sealed = prompt.seal()?;
        self.assistant.store.store_prompt(&sealed).await?;

        let mut trailer = VecDeque::new();
        let first = if self.echoed {
            trailer.push_back(sealed.formatted_footer());
            1
        } else {
            0
        };
        for index in first..sealed.responses().len() {
            trailer.push_back(sealed.formatted_full_response(index)?);
        }

        debug!(hash = %sealed.hash(), candidates = sealed.responses().len(), "Prompt stored");
        self.assistant.sealed = Some(sealed);
        Ok(StreamState::Trailer(trailer))
    }
}
