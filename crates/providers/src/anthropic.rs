//! Anthropic Messages API adapter.
//!
//! POSTs to `/v1/messages` with the canonical message list (system content
//! travels as a synthetic system-role message) and decodes the content-block
//! response shape. Sends `Authorization: Bearer` plus the `anthropic-version`
//! header.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use aigateway_core::{
    ChatAdapter, ChatRequest, ChatResponse, GatewayError, ProviderId, ProviderSettings, Usage,
};

use crate::{
    decode_response, outbound_messages, require_settings, transport_error, DEFAULT_TIMEOUT_SECS,
};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicAdapter {
    client: reqwest::Client,
}

impl AnthropicAdapter {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");
        Self { client }
    }
}

impl Default for AnthropicAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChatAdapter for AnthropicAdapter {
    fn provider(&self) -> ProviderId {
        ProviderId::Anthropic
    }

    async fn complete(
        &self,
        settings: &ProviderSettings,
        request: &ChatRequest,
        system_prompt: &str,
    ) -> Result<ChatResponse, GatewayError> {
        require_settings(ProviderId::Anthropic, settings, false)?;

        let body = serde_json::json!({
            "model": settings.model,
            "messages": outbound_messages(request, system_prompt),
            "temperature": request.temperature_or_default(),
            "max_tokens": request.max_tokens_or_default(),
        });

        let url = format!("{}/v1/messages", settings.endpoint.trim_end_matches('/'));
        debug!(model = %settings.model, "sending Anthropic messages request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", settings.api_key))
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(ProviderId::Anthropic, e))?;

        let api: MessagesResponse = decode_response(ProviderId::Anthropic, response).await?;

        let text = api
            .content
            .first()
            .map(|block| block.text.clone())
            .ok_or_else(|| GatewayError::ProviderDecode {
                provider: ProviderId::Anthropic,
                reason: "no content blocks in response".into(),
            })?;

        let usage = api
            .usage
            .map(|u| Usage::new(u.input_tokens, u.output_tokens))
            .unwrap_or_default();
        let model = if api.model.is_empty() {
            settings.model.clone()
        } else {
            api.model
        };

        Ok(ChatResponse::assistant(
            model,
            text,
            api.stop_reason.unwrap_or_else(|| "stop".into()),
            usage,
        ))
    }
}

// --- Anthropic wire types ---

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: String,
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Option<MessagesUsage>,
    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct MessagesUsage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_messages_response() {
        let api: MessagesResponse = serde_json::from_str(
            r#"{
                "id": "msg_01",
                "model": "claude-3-5-sonnet",
                "content": [{"type": "text", "text": "Hello!"}],
                "usage": {"input_tokens": 10, "output_tokens": 5},
                "stop_reason": "end_turn"
            }"#,
        )
        .unwrap();
        assert_eq!(api.content[0].text, "Hello!");
        assert_eq!(api.usage.as_ref().unwrap().input_tokens, 10);
        assert_eq!(api.stop_reason.as_deref(), Some("end_turn"));
    }

    #[tokio::test]
    async fn missing_api_key_rejected() {
        let adapter = AnthropicAdapter::new();
        let settings = ProviderSettings::new("", "claude-3-5-sonnet", "https://api.anthropic.com");
        let err = adapter
            .complete(&settings, &ChatRequest::from_user("hi"), "")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::InvalidProviderConfig { .. }));
    }

    #[tokio::test]
    async fn completes_against_stub_server() {
        use axum::http::HeaderMap;
        use axum::{routing::post, Json, Router};

        let app = Router::new().route(
            "/v1/messages",
            post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
                assert_eq!(
                    headers.get("anthropic-version").unwrap(),
                    ANTHROPIC_VERSION
                );
                assert!(headers
                    .get("authorization")
                    .unwrap()
                    .to_str()
                    .unwrap()
                    .starts_with("Bearer "));
                assert_eq!(body["model"], "claude-3-5-sonnet");
                Json(serde_json::json!({
                    "model": "claude-3-5-sonnet",
                    "content": [{"type":"text","text":"Hi there"}],
                    "usage": {"input_tokens": 4, "output_tokens": 2},
                    "stop_reason": "end_turn"
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let adapter = AnthropicAdapter::new();
        let settings =
            ProviderSettings::new("sk-ant", "claude-3-5-sonnet", format!("http://{addr}"));
        let response = adapter
            .complete(&settings, &ChatRequest::from_user("hi"), "")
            .await
            .unwrap();

        assert_eq!(response.content(), "Hi there");
        assert_eq!(response.usage.prompt_tokens, 4);
        assert_eq!(response.usage.completion_tokens, 2);
        assert_eq!(response.choices[0].finish_reason, "end_turn");
    }

    #[tokio::test]
    async fn empty_content_is_a_decode_error() {
        use axum::{routing::post, Json, Router};

        let app = Router::new().route(
            "/v1/messages",
            post(|| async {
                Json(serde_json::json!({
                    "model": "claude-3-5-sonnet",
                    "content": [],
                    "usage": {"input_tokens": 1, "output_tokens": 0}
                }))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });

        let adapter = AnthropicAdapter::new();
        let settings =
            ProviderSettings::new("sk-ant", "claude-3-5-sonnet", format!("http://{addr}"));
        let err = adapter
            .complete(&settings, &ChatRequest::from_user("hi"), "")
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ProviderDecode { .. }));
    }
}
