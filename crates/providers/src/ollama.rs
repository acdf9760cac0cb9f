//! Ollama chat adapter.
//!
//! POSTs to `/api/chat` with streaming disabled. Ollama runs locally and
//! needs no api key; it is also the slowest backend, so the client timeout is
//! 60 seconds instead of the default 30.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use aigateway_core::{
    ChatAdapter, ChatRequest, ChatResponse, GatewayError, ProviderId, ProviderSettings, Usage,
};

use crate::{decode_response, outbound_messages, require_settings, transport_error};

const OLLAMA_TIMEOUT_SECS: u64 = 60;

pub struct OllamaAdapter {
    client: reqwest::Client,
}

impl OllamaAdapter {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(OLLAMA_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");
        Self { client }
    }
}

impl Default for OllamaAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatAdapter for OllamaAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::Ollama
    }

    async fn complete(
        &self,
        settings: &ProviderSettings,
        request: &ChatRequest,
        system_prompt: &str,
    ) -> Result<ChatResponse, GatewayError> {
        require_settings(ProviderId::Ollama, settings, true)?;

        let body = serde_json::json!({
            "model": settings.model,
            "messages": outbound_messages(request, system_prompt),
            "stream": false,
        });

        let url = format!("{}/api/chat", settings.endpoint.trim_end_matches('/'));
        debug!(model = %settings.model, "sending Ollama chat request");

        let mut req = self.client.post(&url).json(&body);
        if !settings.api_key.is_empty() {
            req = req.header("Authorization", format!("Bearer {}", settings.api_key));
        }

        let response = req
            .send()
            .await
            .map_err(|e| transport_error(ProviderId::Ollama, e))?;

        let api: OllamaResponse = decode_response(ProviderId::Ollama, response).await?;

        let usage = Usage::new(api.prompt_eval_count, api.eval_count);
        let model = if api.model.is_empty() {
            settings.model.clone()
        } else {
            api.model
        };

        Ok(ChatResponse::assistant(
            model,
            api.message.content,
            "stop",
            usage,
        ))
    }
}

// --- Ollama wire types ---

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    model: String,
    message: OllamaMessage,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

#[derive(Debug, Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}
