//! Canonical chat-completion request and response types.
//!
//! These are the gateway-internal shapes, modeled on the OpenAI chat contract:
//! Client sends a `ChatRequest` → dispatcher routes it → adapter translates to
//! the vendor wire format and back into a `ChatResponse`.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::GatewayError;

/// Temperature forwarded to vendors when the client omits one.
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Max tokens forwarded to vendors when the client omits a limit.
pub const DEFAULT_MAX_TOKENS: u32 = 1000;

/// The role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions (at most one per request)
    System,
    /// The end user (exactly one per request)
    User,
    /// The model's reply
    Assistant,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
        }
    }
}

/// A single message in the canonical request or response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The canonical chat-completion request accepted on the public surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// The conversation messages.
    pub messages: Vec<ChatMessage>,

    /// Sampling temperature (default 0.7 when forwarding).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Maximum tokens to generate (default 1000 when forwarding).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    /// Build a request from a single user prompt.
    pub fn from_user(content: impl Into<String>) -> Self {
        Self {
            messages: vec![ChatMessage::user(content)],
            temperature: None,
            max_tokens: None,
        }
    }

    /// Enforce the message-shape invariant: at most one system message and
    /// exactly one user message with non-empty content.
    pub fn validate(&self) -> Result<(), GatewayError> {
        let system_count = self
            .messages
            .iter()
            .filter(|m| m.role == Role::System)
            .count();
        if system_count > 1 {
            return Err(GatewayError::InvalidRequest(
                "at most one system message is allowed".into(),
            ));
        }

        let users: Vec<&ChatMessage> = self
            .messages
            .iter()
            .filter(|m| m.role == Role::User)
            .collect();
        if users.len() != 1 {
            return Err(GatewayError::InvalidRequest(format!(
                "exactly one user message is required, got {}",
                users.len()
            )));
        }
        if users[0].content.trim().is_empty() {
            return Err(GatewayError::InvalidRequest(
                "user message content must not be empty".into(),
            ));
        }

        Ok(())
    }

    /// Content of the system message, if the request carries one.
    pub fn system_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    /// Content of the user message. Call after `validate()`.
    pub fn user_content(&self) -> &str {
        self.messages
            .iter()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default()
    }

    pub fn temperature_or_default(&self) -> f32 {
        self.temperature.unwrap_or(DEFAULT_TEMPERATURE)
    }

    pub fn max_tokens_or_default(&self) -> u32 {
        self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)
    }
}

/// Token usage reported by a vendor. All-zero when the vendor reports none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// One completion choice. The gateway always produces exactly one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Choice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: String,
}

/// The canonical chat-completion response returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Gateway-assigned time-ordered identifier.
    pub id: String,
    /// Always `"chat.completion"`.
    pub object: String,
    /// Unix seconds at adapter completion.
    pub created: i64,
    /// Model name echoed from the vendor.
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: Usage,
}

impl ChatResponse {
    /// Build a response around a single assistant message, minting a fresh
    /// time-ordered id and stamping `created` with the current time.
    pub fn assistant(
        model: impl Into<String>,
        content: impl Into<String>,
        finish_reason: impl Into<String>,
        usage: Usage,
    ) -> Self {
        Self {
            id: format!("chatcmpl-{}", Uuid::now_v7()),
            object: "chat.completion".into(),
            created: Utc::now().timestamp(),
            model: model.into(),
            choices: vec![Choice {
                index: 0,
                message: ChatMessage::assistant(content),
                finish_reason: finish_reason.into(),
            }],
            usage,
        }
    }

    /// The assistant text of the first choice.
    pub fn content(&self) -> &str {
        self.choices
            .first()
            .map(|c| c.message.content.as_str())
            .unwrap_or_default()
    }

    /// Replace the assistant text of the first choice (guardrail rewrites).
    pub fn set_content(&mut self, content: impl Into<String>) {
        if let Some(choice) = self.choices.first_mut() {
            choice.message.content = content.into();
        }
    }
}
