//! Canonical chat types.
//!
//! These OpenAI-shaped records are the gateway's lingua franca: clients
//! submit a [`ChatRequest`], every adapter returns a [`ChatResponse`], and
//! the exact cache stores the serialized response verbatim.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Message author role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction.
    System,
    /// End-user turn.
    User,
    /// Model turn.
    Assistant,
}

impl Role {
    /// Returns the wire-format name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single message in a conversation. Order is significant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Author role.
    pub role: Role,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Convenience constructor.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

fn default_temperature() -> Option<f64> {
    Some(1.0)
}

/// Validated chat-completion request.
///
/// Every field serializes unconditionally (including `null` for an unset
/// `max_tokens`) so the canonical JSON form is stable for fingerprinting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Requested model id; drives provider resolution.
    pub model: String,
    /// Conversation prefix, oldest first. Must be non-empty.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature. Defaults to 1.0 when the field is absent; an
    /// explicit `null` survives validation so adapters can apply their own
    /// upstream defaults.
    #[serde(default = "default_temperature")]
    pub temperature: Option<f64>,
    /// Completion length cap; adapters apply their own defaults when unset.
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Checks the invariants that JSON deserialization alone cannot enforce.
    pub fn validate(&self) -> Result<(), RequestValidationError> {
        if self.messages.is_empty() {
            return Err(RequestValidationError::EmptyMessages);
        }
        Ok(())
    }

    /// Content of the final message, only when that message is a user turn.
    ///
    /// The semantic cache keys on the last user utterance; a conversation
    /// ending in a system or assistant turn has no semantic key.
    pub fn last_user_text(&self) -> Option<&str> {
        self.messages
            .last()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Request shape violations caught after deserialization.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestValidationError {
    /// `messages` was present but empty.
    #[error("messages must not be empty")]
    EmptyMessages,
}

/// Token accounting reported by (or estimated for) the upstream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    /// Tokens in the prompt.
    pub prompt_tokens: u64,
    /// Tokens in the completion.
    pub completion_tokens: u64,
    /// `prompt_tokens + completion_tokens`.
    pub total_tokens: u64,
}

impl Usage {
    /// Builds a usage record, deriving the total.
    pub fn new(prompt_tokens: u64, completion_tokens: u64) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// One completion choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    /// Position within `choices`.
    pub index: u32,
    /// The assistant message.
    pub message: ChatMessage,
    /// Why generation stopped (`"stop"`, `"length"`, ...).
    pub finish_reason: String,
}

/// Canonical chat-completion response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Completion id (`chatcmpl-...`).
    pub id: String,
    /// Always `"chat.completion"`.
    pub object: String,
    /// Unix seconds at creation.
    pub created: u64,
    /// Model that produced the completion.
    pub model: String,
    /// Completion choices; adapters emit exactly one.
    pub choices: Vec<Choice>,
    /// Token accounting.
    pub usage: Usage,
}

impl ChatResponse {
    /// The `object` discriminator shared by every completion.
    pub const OBJECT: &'static str = "chat.completion";

    /// Builds a single-choice response.
    pub fn single(
        id: impl Into<String>,
        created: u64,
        model: impl Into<String>,
        content: impl Into<String>,
        finish_reason: impl Into<String>,
        usage: Usage,
    ) -> Self {
        Self {
            id: id.into(),
            object: Self::OBJECT.to_string(),
            created,
            model: model.into(),
            choices: vec![Choice {
                index: 0,
                message: ChatMessage::new(Role::Assistant, content),
                finish_reason: finish_reason.into(),
            }],
            usage,
        }
    }

    /// Content of the first choice, if any.
    pub fn content(&self) -> Option<&str> {
        self.choices.first().map(|c| c.message.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_request(content: &str) -> ChatRequest {
        ChatRequest {
            model: "gpt-3.5-turbo".to_string(),
            messages: vec![ChatMessage::new(Role::User, content)],
            temperature: Some(1.0),
            max_tokens: None,
        }
    }

    #[test]
    fn test_role_round_trip() {
        for (role, name) in [
            (Role::System, "\"system\""),
            (Role::User, "\"user\""),
            (Role::Assistant, "\"assistant\""),
        ] {
            assert_eq!(serde_json::to_string(&role).unwrap(), name);
            let parsed: Role = serde_json::from_str(name).unwrap();
            assert_eq!(parsed, role);
        }
    }

    #[test]
    fn test_unknown_role_rejected() {
        let result = serde_json::from_str::<ChatMessage>(r#"{"role":"tool","content":"x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_temperature_defaults_to_one() {
        let request: ChatRequest = serde_json::from_str(
            r#"{"model":"gpt-4o","messages":[{"role":"user","content":"Hi"}]}"#,
        )
        .unwrap();
        assert_eq!(request.temperature, Some(1.0));
        assert_eq!(request.max_tokens, None);
    }

    #[test]
    fn test_explicit_null_temperature_survives() {
        let request: ChatRequest = serde_json::from_str(
            r#"{"model":"gpt-4o","messages":[{"role":"user","content":"Hi"}],"temperature":null}"#,
        )
        .unwrap();
        assert_eq!(request.temperature, None);
    }

    #[test]
    fn test_validate_rejects_empty_messages() {
        let request: ChatRequest =
            serde_json::from_str(r#"{"model":"gpt-4o","messages":[]}"#).unwrap();
        assert_eq!(
            request.validate(),
            Err(RequestValidationError::EmptyMessages)
        );
    }

    #[test]
    fn test_last_user_text() {
        let mut request = user_request("hello");
        assert_eq!(request.last_user_text(), Some("hello"));

        request
            .messages
            .push(ChatMessage::new(Role::Assistant, "hi there"));
        assert_eq!(request.last_user_text(), None);
    }

    #[test]
    fn test_usage_total_derived() {
        let usage = Usage::new(10, 5);
        assert_eq!(usage.total_tokens, 15);
    }

    #[test]
    fn test_response_shape() {
        let response = ChatResponse::single(
            "chatcmpl-1",
            1_700_000_000,
            "gpt-4o",
            "Hello!",
            "stop",
            Usage::new(10, 5),
        );

        assert_eq!(response.object, "chat.completion");
        assert_eq!(response.choices.len(), 1);
        assert_eq!(response.choices[0].message.role, Role::Assistant);
        assert_eq!(response.content(), Some("Hello!"));

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["choices"][0]["finish_reason"], "stop");
        assert_eq!(value["usage"]["total_tokens"], 15);
    }

    #[test]
    fn test_request_serializes_unset_max_tokens_as_null() {
        let value = serde_json::to_value(user_request("Hi")).unwrap();
        assert!(value["max_tokens"].is_null());
        assert_eq!(value["temperature"], 1.0);
    }
}
