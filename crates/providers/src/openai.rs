//! OpenAI-compatible adapter.
//!
//! Serves three provider slots: OpenAI, Mistral, and Gemini all accept the
//! OpenAI chat-completions body and return the OpenAI response shape, so they
//! share one adapter. The only per-vendor differences are the URL (Gemini
//! appends `:chatCompletions` to the configured endpoint instead of the
//! `/v1/chat/completions` path) and the configured model name.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use aigateway_core::{
    ChatAdapter, ChatRequest, ChatResponse, GatewayError, ProviderId, ProviderSettings, Usage,
};

use crate::{
    decode_response, outbound_messages, require_settings, transport_error, DEFAULT_TIMEOUT_SECS,
};

pub struct OpenAiCompatAdapter {
    provider: ProviderId,
    client: reqwest::Client,
}

impl OpenAiCompatAdapter {
    /// Create an adapter for one of the OpenAI-compatible providers.
    pub fn new(provider: ProviderId) -> Self {
        debug_assert!(matches!(
            provider,
            ProviderId::Openai | ProviderId::Mistral | ProviderId::Gemini
        ));
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");
        Self { provider, client }
    }

    fn url(&self, endpoint: &str) -> String {
        let base = endpoint.trim_end_matches('/');
        match self.provider {
            ProviderId::Gemini => format!("{base}:chatCompletions"),
            _ => format!("{base}/v1/chat/completions"),
        }
    }
}

#[async_trait]
impl ChatAdapter for OpenAiCompatAdapter {
    fn provider(&self) -> ProviderId {
        self.provider
    }

    async fn complete(
        &self,
        settings: &ProviderSettings,
        request: &ChatRequest,
        system_prompt: &str,
    ) -> Result<ChatResponse, GatewayError> {
        require_settings(self.provider, settings, false)?;

        let body = serde_json::json!({
            "model": settings.model,
            "messages": outbound_messages(request, system_prompt),
            "temperature": request.temperature_or_default(),
            "max_tokens": request.max_tokens_or_default(),
        });

        let url = self.url(&settings.endpoint);
        debug!(provider = %self.provider, model = %settings.model, "sending chat completion");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", settings.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(self.provider, e))?;

        let api: ApiResponse = decode_response(self.provider, response).await?;

        let choice = api
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| GatewayError::ProviderDecode {
                provider: self.provider,
                reason: "no choices in response".into(),
            })?;

        let usage = api
            .usage
            .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();
        let model = if api.model.is_empty() {
            settings.model.clone()
        } else {
            api.model
        };

        Ok(ChatResponse::assistant(
            model,
            choice.message.content.unwrap_or_default(),
            choice.finish_reason.unwrap_or_else(|| "stop".into()),
            usage,
        ))
    }
}

// --- OpenAI wire types ---

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    choices: Vec<ApiChoice>,
    #[serde(default)]
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}
