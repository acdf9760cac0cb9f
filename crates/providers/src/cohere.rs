//! Cohere chat adapter.
//!
//! Cohere's native shape differs from the OpenAI contract: the current user
//! turn goes in `message`, prior turns go in `chat_history` with upper-case
//! roles, and system content travels as the `preamble`. The reply comes back
//! as a bare `text` field with usage nested under `meta.tokens`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use aigateway_core::{
    ChatAdapter, ChatRequest, ChatResponse, GatewayError, ProviderId, ProviderSettings, Role,
    Usage,
};

use crate::{decode_response, require_settings, transport_error, DEFAULT_TIMEOUT_SECS};

pub struct CohereAdapter {
    client: reqwest::Client,
}

impl CohereAdapter {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");
        Self { client }
    }

    /// Split the canonical messages into Cohere's `(chat_history, message)`:
    /// everything before the final user turn becomes history.
    fn to_chat_history(request: &ChatRequest) -> (Vec<HistoryEntry>, String) {
        let last_user = request
            .messages
            .iter()
            .rposition(|m| m.role == Role::User);

        let mut history = Vec::new();
        let mut message = String::new();
        for (i, m) in request.messages.iter().enumerate() {
            if Some(i) == last_user {
                message = m.content.clone();
                continue;
            }
            let role = match m.role {
                Role::User => "USER",
                Role::Assistant => "CHATBOT",
                // System content rides in the preamble instead.
                Role::System => continue,
            };
            history.push(HistoryEntry {
                role,
                message: m.content.clone(),
            });
        }
        (history, message)
    }
}

impl Default for CohereAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatAdapter for CohereAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::Cohere
    }

    async fn complete(
        &self,
        settings: &ProviderSettings,
        request: &ChatRequest,
        system_prompt: &str,
    ) -> Result<ChatResponse, GatewayError> {
        require_settings(ProviderId::Cohere, settings, false)?;

        let (chat_history, message) = Self::to_chat_history(request);

        let mut body = serde_json::json!({
            "model": settings.model,
            "message": message,
            "chat_history": chat_history,
            "temperature": request.temperature_or_default(),
            "max_tokens": request.max_tokens_or_default(),
        });
        if !system_prompt.is_empty() {
            body["preamble"] = serde_json::json!(system_prompt);
        }

        let url = format!("{}/v1/chat", settings.endpoint.trim_end_matches('/'));
        debug!(model = %settings.model, "sending Cohere chat request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", settings.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(ProviderId::Cohere, e))?;

        let api: CohereResponse = decode_response(ProviderId::Cohere, response).await?;

        let usage = api
            .meta
            .and_then(|m| m.tokens)
            .map(|t| Usage::new(t.input_tokens, t.output_tokens))
            .unwrap_or_default();

        Ok(ChatResponse::assistant(
            settings.model.clone(),
            api.text,
            api.finish_reason.unwrap_or_else(|| "stop".into()),
            usage,
        ))
    }
}

// --- Cohere wire types ---

#[derive(Debug, Serialize)]
struct HistoryEntry {
    role: &'static str,
    message: String,
}

#[derive(Debug, Deserialize)]
struct CohereResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    meta: Option<CohereMeta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CohereMeta {
    #[serde(default)]
    tokens: Option<CohereTokens>,
}

#[derive(Debug, Deserialize)]
struct CohereTokens {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}
