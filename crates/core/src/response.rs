//! The normalized response shape.
//!
//! Every provider adapter reshapes its wire format into a [`ChatResponse`].
//! A complete response carries full messages in its choices; a streamed
//! chunk carries deltas in the same structure (`delta` is accepted as an
//! alias of `message`), so one type covers both.

use crate::message::{FunctionCall, Role};
use serde::{Deserialize, Serialize};

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
}

/// One complete response, or one streamed chunk of a response.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub id: String,

    /// Unix seconds
    #[serde(default)]
    pub created: i64,

    /// Which model actually responded (may carry a version suffix)
    #[serde(default)]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    #[serde(default)]
    pub choices: Vec<Choice>,
}

/// A single response candidate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub index: usize,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    #[serde(default, alias = "delta")]
    pub message: Delta,
}

/// Message content of a choice, complete or partial.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Delta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCall>,
}

impl Delta {
    /// True when the delta carries no fields at all (`{}` or `content: ""`).
    pub fn is_empty(&self) -> bool {
        self.role.is_none() && self.name.is_none() && !self.has_output()
    }

    /// True when the delta adds text or function-call data.
    pub fn has_output(&self) -> bool {
        self.content.as_deref().is_some_and(|c| !c.is_empty()) || self.function_call.is_some()
    }
}

impl ChatResponse {
    /// Build a single-choice text chunk (handy for adapters and tests).
    pub fn text(model: impl Into<String>, index: usize, content: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            choices: vec![Choice {
                index,
                finish_reason: None,
                message: Delta {
                    role: Some(Role::Assistant),
                    content: Some(content.into()),
                    ..Delta::default()
                },
            }],
            ..Self::default()
        }
    }

    /// Attach usage, consuming the response.
    pub fn with_usage(mut self, prompt_tokens: usize, completion_tokens: usize) -> Self {
        self.usage = Some(Usage {
            prompt_tokens,
            completion_tokens,
        });
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_complete_response_shape() {
        let data = r#"{
            "id": "chatcmpl-1",
            "created": 1700000000,
            "model": "gpt-4-0613",
            "usage": {"prompt_tokens": 12, "completion_tokens": 3},
            "choices": [{"index": 0, "finish_reason": "stop",
                         "message": {"role": "assistant", "content": "Hi"}}]
        }"#;
        let parsed: ChatResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.model, "gpt-4-0613");
        assert_eq!(parsed.usage.unwrap().completion_tokens, 3);
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("Hi"));
    }

    #[test]
    fn delta_is_alias_of_message() {
        let data = r#"{"choices": [{"index": 1, "delta": {"content": "lo"}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices[0].index, 1);
        assert_eq!(parsed.choices[0].message.content.as_deref(), Some("lo"));
    }

    #[test]
    fn empty_delta_detection() {
        assert!(Delta::default().is_empty());
        let delta = Delta {
            content: Some(String::new()),
            ..Delta::default()
        };
        assert!(delta.is_empty());
        let delta = Delta {
            content: Some("x".into()),
            ..Delta::default()
        };
        assert!(!delta.is_empty());
        assert!(delta.has_output());
    }

    #[test]
    fn role_only_delta_is_not_empty() {
        let data = r#"{"choices": [{"index": 0, "delta": {"role": "assistant", "content": ""}}]}"#;
        let parsed: ChatResponse = serde_json::from_str(data).unwrap();
        let delta = &parsed.choices[0].message;
        assert!(!delta.is_empty());
        assert!(!delta.has_output());
    }
}
