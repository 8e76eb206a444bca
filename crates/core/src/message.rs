//! Message domain type.
//!
//! A [`Message`] is the smallest unit that flows into a prompt: instructions,
//! context, the request itself, and every response candidate are messages.
//! Messages are validated on construction and never mutated afterwards.

use crate::error::PromptError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::LazyLock;

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_]{1,64}$").expect("name pattern is a valid regex")
});

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Instructions and context
    System,
    /// The developer asking
    User,
    /// The model answering
    Assistant,
    /// Output of a function the model asked for
    Function,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::Function => "function",
        }
    }
}

impl FromStr for Role {
    type Err = PromptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "system" => Ok(Self::System),
            "user" => Ok(Self::User),
            "assistant" => Ok(Self::Assistant),
            "function" => Ok(Self::Function),
            other => Err(PromptError::Validation(format!("unknown role '{other}'"))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A function call requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    #[serde(default)]
    pub name: String,
    /// Arguments as a JSON string, exactly as the model produced them
    #[serde(default)]
    pub arguments: String,
}

/// A single validated message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "MessageRecord", into = "MessageRecord")]
pub struct Message {
    role: Role,
    content: Option<String>,
    name: Option<String>,
    function_call: Option<FunctionCall>,
}

/// The serialized shape of a [`Message`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct MessageRecord {
    role: Role,
    #[serde(default)]
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<FunctionCall>,
}

impl TryFrom<MessageRecord> for Message {
    type Error = PromptError;

    fn try_from(record: MessageRecord) -> Result<Self, Self::Error> {
        Message::new(record.role, record.content, record.name)
            .map(|m| m.with_function_call(record.function_call))
    }
}

impl From<Message> for MessageRecord {
    fn from(message: Message) -> Self {
        Self {
            role: message.role,
            content: message.content,
            name: message.name,
            function_call: message.function_call,
        }
    }
}

impl Message {
    /// Create a validated message.
    ///
    /// Content, when present, must contain a non-whitespace character.
    /// Names must be 1-64 characters of `[A-Za-z0-9_]`, and `function`
    /// messages must carry one.
    pub fn new(
        role: Role,
        content: Option<String>,
        name: Option<String>,
    ) -> Result<Self, PromptError> {
        if let Some(text) = &content {
            if text.trim().is_empty() {
                return Err(PromptError::Validation(
                    "content must contain non-whitespace characters".into(),
                ));
            }
        }
        if let Some(n) = &name {
            if !NAME_PATTERN.is_match(n) {
                return Err(PromptError::Validation(format!(
                    "name '{n}' must be 1-64 alphanumeric or underscore characters"
                )));
            }
        }
        if role == Role::Function && name.is_none() {
            return Err(PromptError::Validation(
                "function messages require a name".into(),
            ));
        }
        Ok(Self {
            role,
            content,
            name,
            function_call: None,
        })
    }

    pub fn system(content: impl Into<String>) -> Result<Self, PromptError> {
        Self::new(Role::System, Some(content.into()), None)
    }

    pub fn user(content: impl Into<String>) -> Result<Self, PromptError> {
        Self::new(Role::User, Some(content.into()), None)
    }

    pub fn assistant(content: impl Into<String>) -> Result<Self, PromptError> {
        Self::new(Role::Assistant, Some(content.into()), None)
    }

    pub fn function(
        name: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Self, PromptError> {
        Self::new(Role::Function, Some(content.into()), Some(name.into()))
    }

    /// Attach a function call, consuming the message.
    pub fn with_function_call(mut self, call: Option<FunctionCall>) -> Self {
        self.function_call = call;
        self
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn function_call(&self) -> Option<&FunctionCall> {
        self.function_call.as_ref()
    }

    /// The text this message contributes to a request: its content, or the
    /// serialized function call when there is no content.
    pub fn text(&self) -> String {
        match (&self.content, &self.function_call) {
            (Some(content), _) => content.clone(),
            (None, Some(call)) => serde_json::to_string(call).unwrap_or_default(),
            (None, None) => String::new(),
        }
    }

    /// Serialize to a JSON record. `name` and `function_call` are omitted
    /// when absent.
    pub fn to_record(&self) -> serde_json::Value {
        serde_json::to_value(MessageRecord::from(self.clone())).unwrap_or_default()
    }

    /// Parse and validate a JSON record.
    pub fn from_record(record: &serde_json::Value) -> Result<Self, PromptError> {
        let record: MessageRecord = serde_json::from_value(record.clone())
            .map_err(|e| PromptError::Validation(format!("malformed message record: {e}")))?;
        Self::try_from(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn create_user_message() {
        let msg = Message::user("Hello").unwrap();
        assert_eq!(msg.role(), Role::User);
        assert_eq!(msg.content(), Some("Hello"));
        assert!(msg.name().is_none());
    }

    #[test]
    fn blank_content_rejected() {
        let err = Message::user("  \n\t ").unwrap_err();
        assert!(matches!(err, PromptError::Validation(_)));
    }

    #[test]
    fn invalid_name_rejected() {
        assert!(Message::new(Role::User, Some("hi".into()), Some("bad name".into())).is_err());
        assert!(Message::new(Role::User, Some("hi".into()), Some("a".repeat(65))).is_err());
        assert!(Message::new(Role::User, Some("hi".into()), Some("ok_name_1".into())).is_ok());
    }

    #[test]
    fn function_message_requires_name() {
        assert!(Message::new(Role::Function, Some("42".into()), None).is_err());
        let msg = Message::function("get_weather", "sunny").unwrap();
        assert_eq!(msg.name(), Some("get_weather"));
    }

    #[test]
    fn unknown_role_rejected() {
        assert!("moderator".parse::<Role>().is_err());
        assert_eq!("assistant".parse::<Role>().unwrap(), Role::Assistant);
    }

    #[test]
    fn record_omits_absent_name() {
        let record = Message::assistant("done").unwrap().to_record();
        assert_eq!(record, json!({"role": "assistant", "content": "done"}));
    }

    #[test]
    fn record_roundtrip_keeps_name_and_call() {
        let msg = Message::new(Role::Assistant, None, Some("bot".into()))
            .unwrap()
            .with_function_call(Some(FunctionCall {
                name: "lookup".into(),
                arguments: r#"{"q":"rust"}"#.into(),
            }));
        let back = Message::from_record(&msg.to_record()).unwrap();
        assert_eq!(back, msg);
    }

    #[test]
    fn from_record_validates() {
        let record = json!({"role": "user", "content": "   "});
        assert!(Message::from_record(&record).is_err());
        let record = json!({"role": "wizard", "content": "hi"});
        assert!(Message::from_record(&record).is_err());
    }

    #[test]
    fn text_falls_back_to_function_call() {
        let msg = Message::new(Role::Assistant, None, None)
            .unwrap()
            .with_function_call(Some(FunctionCall {
                name: "f".into(),
                arguments: "{}".into(),
            }));
        assert!(msg.text().contains("\"name\":\"f\""));
    }
}
