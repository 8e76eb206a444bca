//! OpenAI-compatible chat implementation.
//!
//! Works with OpenAI, OpenRouter, Ollama, vLLM and any endpoint exposing
//! `/chat/completions`. Both the complete body and the SSE chunks already
//! use the [`ChatResponse`] shape (`choices[].message` or `choices[].delta`),
//! so they deserialize straight into it.

use async_trait::async_trait;
use futures::StreamExt;
use threadline_core::chat::{Chat, ChatStream};
use threadline_core::error::{PromptError, ProviderError};
use threadline_core::prompt::{Prompt, User};
use threadline_core::response::ChatResponse;
use tracing::{debug, trace, warn};

/// A [`Chat`] backed by an OpenAI-compatible HTTP endpoint.
pub struct OpenAiCompatChat {
    name: String,
    base_url: String,
    api_key: String,
    model: String,
    user: User,
    temperature: f32,
    streaming: bool,
    client: reqwest::Client,
}

impl OpenAiCompatChat {
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        user: User,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| ProviderError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            user,
            temperature: 0.7,
            streaming: true,
            client,
        })
    }

    /// Create an OpenAI chat (convenience constructor).
    pub fn openai(
        api_key: impl Into<String>,
        model: impl Into<String>,
        user: User,
    ) -> Result<Self, ProviderError> {
        Self::new("openai", "https://api.openai.com/v1", api_key, model, user)
    }

    /// Create an Ollama chat (convenience constructor).
    pub fn ollama(
        base_url: Option<&str>,
        model: impl Into<String>,
        user: User,
    ) -> Result<Self, ProviderError> {
        Self::new(
            "ollama",
            base_url.unwrap_or("http://localhost:11434/v1"),
            "ollama",
            model,
            user,
        )
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    fn request_body(&self, prompt: &Prompt, stream: bool) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": prompt.messages(),
            "temperature": self.temperature,
            "stream": stream,
        });
        if stream {
            body["stream_options"] = serde_json::json!({ "include_usage": true });
        }
        body
    }

    async fn send(&self, body: &serde_json::Value) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            return Err(ProviderError::RateLimited {
                retry_after_secs: 5,
            });
        }

        if status == 401 || status == 403 {
            return Err(ProviderError::AuthenticationFailed(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(ProviderError::ApiError {
                status_code: status,
                message: error_body,
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Chat for OpenAiCompatChat {
    fn name(&self) -> &str {
        &self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn is_streaming(&self) -> bool {
        self.streaming
    }

    fn initiate(&self, request: &str, function_name: Option<&str>) -> Result<Prompt, PromptError> {
        Prompt::new(&self.model, self.user.clone(), request, function_name)
    }

    async fn complete(&self, prompt: &Prompt) -> Result<ChatResponse, ProviderError> {
        debug!(provider = %self.name, model = %self.model, "Sending completion request");
        let response = self.send(&self.request_body(prompt, false)).await?;

        let parsed: ChatResponse = response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;

        if parsed.choices.is_empty() {
            return Err(ProviderError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            });
        }
        Ok(parsed)
    }

    async fn stream(&self, prompt: &Prompt) -> Result<ChatStream, ProviderError> {
        debug!(provider = %self.name, model = %self.model, "Sending streaming request");
        let response = self.send(&self.request_body(prompt, true)).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        let provider_name = self.name.clone();

        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut lines = SseLines::default();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ProviderError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                for event in lines.push(&bytes) {
                    let data = match event {
                        SseEvent::Done => return,
                        SseEvent::Data(data) => data,
                    };
                    match serde_json::from_str::<ChatResponse>(&data) {
                        Ok(chunk) => {
                            if tx.send(Ok(chunk)).await.is_err() {
                                return; // receiver dropped
                            }
                        }
                        Err(e) => {
                            trace!(
                                provider = %provider_name,
                                data = %data,
                                error = %e,
                                "Ignoring unparseable SSE chunk"
                            );
                        }
                    }
                }
            }
            debug!(provider = %provider_name, "Stream ended without [DONE]");
        });

        Ok(rx)
    }
}

/// One server-sent event payload.
#[derive(Debug, PartialEq, Eq)]
enum SseEvent {
    Data(String),
    Done,
}

/// Splits an SSE byte stream into `data:` payloads across chunk boundaries.
#[derive(Default)]
struct SseLines {
    buffer: String,
}

impl SseLines {
    fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut events = Vec::new();
        while let Some(line_end) = self.buffer.find('\n') {
            let line = self.buffer[..line_end].trim_end_matches('\r').to_string();
            self.buffer.drain(..=line_end);

            // Skip blank lines and SSE comments
            if line.is_empty() || line.starts_with(':') {
                continue;
            }
            if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if data == "[DONE]" {
                    events.push(SseEvent::Done);
                } else {
                    events.push(SseEvent::Data(data.to_string()));
                }
            }
        }
        events
    }
}
