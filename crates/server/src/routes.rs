//! Public HTTP surface: the chat-completion endpoint and its middleware.
//!
//! Interceptor chain per request: rate limiting (429 short-circuit, headers
//! stashed for the response), then the chat handler (header parsing + cache +
//! dispatch), then a response layer attaching the `Server` header and the
//! rate-limit headers.

use std::net::SocketAddr;
use std::str::FromStr;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use serde_json::json;

use aigateway_core::{ChatRequest, GatewayError, ProviderId};
use aigateway_ratelimit::RateDecision;

use crate::{SharedState, SERVER_HEADER};

/// Build the public router.
pub fn public_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/chat/completions", post(chat_handler))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn(server_header_middleware))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Client IP: first `X-Forwarded-For` hop when present, else the socket peer.
/// Empty when neither is known — the limiter treats that as trusted.
fn client_ip(headers: &HeaderMap, peer: Option<&SocketAddr>) -> String {
    if let Some(forwarded) = headers.get("x-forwarded-for").and_then(|v| v.to_str().ok()) {
        if let Some(first) = forwarded.split(',').next() {
            let first = first.trim();
            if !first.is_empty() {
                return first.to_string();
            }
        }
    }
    peer.map(|addr| addr.ip().to_string()).unwrap_or_default()
}

/// Rate-limit interceptor. Denials short-circuit with 429 plus the plan
/// details; allowed requests proceed and get the `RateLimit-*` headers
/// attached to whatever response comes back.
async fn rate_limit_middleware(
    State(state): State<SharedState>,
    request: Request,
    next: Next,
) -> Response {
    // Monitoring needs /health unthrottled.
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0);
    let ip = client_ip(request.headers(), peer.as_ref());

    let decision = state.limiter.check(&ip);

    if !decision.allowed {
        state.analytics.record_error(
            None,
            "RateLimitExceeded",
            format!("client {ip} exceeded {} per window", decision.limit),
            "",
        );
        state.analytics.record_failure(None);

        let body = Json(json!({
            "error": "rate limit exceeded",
            "limit": decision.limit,
            "remaining": decision.remaining,
            "reset": decision.reset_secs,
            "planType": decision.plan_type.as_str(),
        }));
        let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
        set_rate_limit_headers(response.headers_mut(), &decision);
        return response;
    }

    let mut response = next.run(request).await;
    if decision.limit > 0 {
        set_rate_limit_headers(response.headers_mut(), &decision);
    }
    response
}

fn set_rate_limit_headers(headers: &mut HeaderMap, decision: &RateDecision) {
    if let Ok(v) = HeaderValue::from_str(&decision.limit.to_string()) {
        headers.insert("RateLimit-Limit", v);
    }
    if let Ok(v) = HeaderValue::from_str(&decision.remaining.to_string()) {
        headers.insert("RateLimit-Remaining", v);
    }
    if let Ok(v) = HeaderValue::from_str(&decision.reset_secs.to_string()) {
        headers.insert("RateLimit-Reset", v);
    }
}

/// Response interceptor: every response names the gateway.
async fn server_header_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert("Server", HeaderValue::from_static(SERVER_HEADER));
    response
}

/// `POST /v1/chat/completions`.
async fn chat_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(raw): Json<serde_json::Value>,
) -> Response {
    let provider = match required_provider(&headers) {
        Ok(provider) => provider,
        Err(reason) => {
            return invalid_request(&state, reason);
        }
    };

    let request: ChatRequest = match serde_json::from_value(raw) {
        Ok(request) => request,
        Err(e) => {
            return invalid_request(&state, format!("malformed request body: {e}"));
        }
    };

    let bypass_cache = headers
        .get("cache-control")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().contains("no-cache"));

    match state.dispatch_chat(provider, request, bypass_cache).await {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(err) => error_response(&err),
    }
}

/// Record and render a request-level rejection.
fn invalid_request(state: &SharedState, reason: String) -> Response {
    let err = GatewayError::InvalidRequest(reason);
    state
        .analytics
        .record_error(None, err.kind(), err.to_string(), "");
    state.analytics.record_failure(None);
    error_response(&err)
}

fn required_provider(headers: &HeaderMap) -> Result<ProviderId, String> {
    let value = headers
        .get("x-llm-provider")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| "missing x-llm-provider header".to_string())?;
    ProviderId::from_str(value)
}

/// Map a gateway error to its HTTP status and `{error}` body.
pub(crate) fn error_response(err: &GatewayError) -> Response {
    let status = match err {
        GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        GatewayError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
        _ => StatusCode::BAD_GATEWAY,
    };
    (status, Json(json!({ "error": err.to_string() }))).into_response()
}
