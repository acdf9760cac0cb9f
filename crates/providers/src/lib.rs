//! Vendor adapters for the AI gateway.
//!
//! One adapter per upstream API shape: OpenAI-compatible (OpenAI, Mistral,
//! Gemini), Anthropic Messages, Ollama chat, and Cohere chat. Adapters are
//! pure wire translators — configuration snapshots come in from the
//! dispatcher, canonical responses come out; policy (guardrails, caching,
//! analytics) stays outside.

pub mod anthropic;
pub mod cohere;
pub mod ollama;
pub mod openai;
pub mod registry;

pub use anthropic::AnthropicAdapter;
pub use cohere::CohereAdapter;
pub use ollama::OllamaAdapter;
pub use openai::OpenAiCompatAdapter;
pub use registry::AdapterRegistry;

use aigateway_core::{ChatMessage, ChatRequest, GatewayError, ProviderId, ProviderSettings, Role};

/// Default request timeout for vendor calls.
pub(crate) const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Merge the request-supplied system content with the gateway's stored
/// prompt: request content first, then the gateway prompt, space-joined.
pub fn merge_system_prompt(request_system: Option<&str>, gateway_prompt: &str) -> String {
    let request_system = request_system.unwrap_or("").trim();
    let gateway_prompt = gateway_prompt.trim();
    match (request_system.is_empty(), gateway_prompt.is_empty()) {
        (true, true) => String::new(),
        (false, true) => request_system.to_string(),
        (true, false) => gateway_prompt.to_string(),
        (false, false) => format!("{request_system} {gateway_prompt}"),
    }
}

/// Build the outbound message list: one merged system message (when any
/// system content exists) followed by the request's non-system messages in
/// their original order.
pub(crate) fn outbound_messages(request: &ChatRequest, system_prompt: &str) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(request.messages.len() + 1);
    if !system_prompt.is_empty() {
        messages.push(ChatMessage::system(system_prompt));
    }
    messages.extend(
        request
            .messages
            .iter()
            .filter(|m| m.role != Role::System)
            .cloned(),
    );
    messages
}

/// Shared settings check: configured endpoint, and a non-empty api key unless
/// the vendor permits anonymous access (Ollama).
pub(crate) fn require_settings(
    provider: ProviderId,
    settings: &ProviderSettings,
    allow_empty_key: bool,
) -> Result<(), GatewayError> {
    if !settings.is_configured() {
        return Err(GatewayError::ProviderNotConfigured(provider));
    }
    if !allow_empty_key && settings.api_key.is_empty() {
        return Err(GatewayError::InvalidProviderConfig {
            provider,
            reason: "api key is empty".into(),
        });
    }
    Ok(())
}

/// Map a reqwest send failure to the canonical transport error.
pub(crate) fn transport_error(provider: ProviderId, err: reqwest::Error) -> GatewayError {
    GatewayError::ProviderTransport {
        provider,
        reason: err.to_string(),
    }
}

/// Triage a vendor response: non-2xx becomes `ProviderHttp` carrying the
/// status and body; a 2xx body that fails to parse becomes `ProviderDecode`.
pub(crate) async fn decode_response<T: serde::de::DeserializeOwned>(
    provider: ProviderId,
    response: reqwest::Response,
) -> Result<T, GatewayError> {
    let status = response.status().as_u16();
    let body = response
        .text()
        .await
        .map_err(|e| transport_error(provider, e))?;

    if !(200..300).contains(&status) {
        tracing::warn!(provider = %provider, status, "vendor returned error");
        return Err(GatewayError::ProviderHttp {
            provider,
            status,
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| GatewayError::ProviderDecode {
        provider,
        reason: e.to_string(),
    })
}
