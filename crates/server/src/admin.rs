//! Admin surface: CRUD over runtime policy plus the stats snapshot.
//!
//! Served on its own port. POST handlers replace whole values under the
//! owning component's lock; GET handlers return snapshots taken the same way.

use std::str::FromStr;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{delete, get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::json;

use aigateway_core::{ProviderId, ProviderSettings};
use aigateway_guardrails::GuardrailConfig;
use aigateway_logging::LoggingConfig;
use aigateway_ratelimit::RateLimitPlan;

use crate::SharedState;

/// Build the admin router.
pub fn admin_router(state: SharedState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(get_stats))
        .route(
            "/admin/system-prompt",
            get(get_system_prompt).post(set_system_prompt),
        )
        .route(
            "/admin/guardrails",
            get(get_guardrails).post(set_guardrails),
        )
        .route("/admin/cache", get(get_cache))
        .route("/admin/cache/clear", post(clear_cache))
        .route("/admin/logging", get(get_logging).post(set_logging))
        .route(
            "/admin/providers/{provider}",
            get(get_provider).post(set_provider),
        )
        .route(
            "/admin/ratelimit/default",
            get(get_default_plan)
                .post(set_default_plan)
                .delete(delete_default_plan),
        )
        .route(
            "/admin/ratelimit/clients",
            get(get_client_plans).post(set_client_plan),
        )
        .route("/admin/ratelimit/clients/{ip}", delete(delete_client_plan))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}

async fn get_stats(State(state): State<SharedState>) -> Response {
    Json(state.analytics.snapshot()).into_response()
}

// --- System prompt ---

#[derive(Deserialize)]
struct SystemPromptBody {
    prompt: String,
}

async fn get_system_prompt(State(state): State<SharedState>) -> Json<serde_json::Value> {
    Json(json!({ "prompt": state.config.system_prompt() }))
}

async fn set_system_prompt(
    State(state): State<SharedState>,
    Json(body): Json<SystemPromptBody>,
) -> Json<serde_json::Value> {
    state.config.set_system_prompt(&body.prompt);
    Json(json!({ "prompt": body.prompt }))
}

// --- Guardrails ---

async fn get_guardrails(State(state): State<SharedState>) -> Json<GuardrailConfig> {
    Json(state.config.guardrails())
}

async fn set_guardrails(
    State(state): State<SharedState>,
    Json(config): Json<GuardrailConfig>,
) -> Json<GuardrailConfig> {
    state.config.set_guardrails(config.clone());
    Json(config)
}

// --- Cache ---

async fn get_cache(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let entries = state.cache.entries();
    let listing: Vec<serde_json::Value> = entries
        .iter()
        .map(|(key, entry)| {
            json!({
                "fingerprint": key,
                "inserted_at": entry.inserted_at,
                "model": entry.response.model,
            })
        })
        .collect();
    Json(json!({ "size": entries.len(), "entries": listing }))
}

async fn clear_cache(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let cleared = state.cache.len();
    state.cache.clear();
    Json(json!({ "cleared": cleared }))
}

// --- Logging ---

async fn get_logging(State(state): State<SharedState>) -> Json<LoggingConfig> {
    Json(state.logger.config())
}

async fn set_logging(
    State(state): State<SharedState>,
    Json(config): Json<LoggingConfig>,
) -> Json<LoggingConfig> {
    state.logger.set_config(config.clone());
    Json(config)
}

// --- Providers ---

async fn get_provider(
    State(state): State<SharedState>,
    Path(provider): Path<String>,
) -> Response {
    let Ok(id) = ProviderId::from_str(&provider) else {
        return unknown_provider(&provider);
    };
    match state.config.provider(id) {
        // The admin port is trusted, but api keys still stay out of reads.
        Some(settings) => Json(json!({
            "provider": id.as_str(),
            "model": settings.model,
            "endpoint": settings.endpoint,
            "configured": settings.is_configured(),
        }))
        .into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("provider '{provider}' has no settings") })),
        )
            .into_response(),
    }
}

async fn set_provider(
    State(state): State<SharedState>,
    Path(provider): Path<String>,
    Json(settings): Json<ProviderSettings>,
) -> Response {
    let Ok(id) = ProviderId::from_str(&provider) else {
        return unknown_provider(&provider);
    };
    state.config.set_provider(id, settings);
    let configured = state.config.configured_provider(id).is_some();
    Json(json!({ "provider": id.as_str(), "configured": configured })).into_response()
}

fn unknown_provider(provider: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({ "error": format!("unknown provider '{provider}'") })),
    )
        .into_response()
}

// --- Rate-limit plans ---

async fn get_default_plan(State(state): State<SharedState>) -> Json<Option<RateLimitPlan>> {
    Json(state.limiter.default_plan())
}

async fn set_default_plan(
    State(state): State<SharedState>,
    Json(plan): Json<RateLimitPlan>,
) -> Json<RateLimitPlan> {
    state.limiter.set_default_plan(Some(plan.clone()));
    Json(plan)
}

async fn delete_default_plan(State(state): State<SharedState>) -> Json<serde_json::Value> {
    state.limiter.set_default_plan(None);
    Json(json!({ "deleted": true }))
}

#[derive(Deserialize)]
struct ClientPlanBody {
    ip: String,

    #[serde(flatten)]
    plan: RateLimitPlan,
}

async fn get_client_plans(State(state): State<SharedState>) -> Json<serde_json::Value> {
    Json(json!(state.limiter.client_plans()))
}

async fn set_client_plan(
    State(state): State<SharedState>,
    Json(body): Json<ClientPlanBody>,
) -> Json<serde_json::Value> {
    state.limiter.set_client_plan(&body.ip, body.plan.clone());
    Json(json!({ "ip": body.ip, "plan": body.plan }))
}

async fn delete_client_plan(
    State(state): State<SharedState>,
    Path(ip): Path<String>,
) -> Response {
    if state.limiter.remove_client_plan(&ip) {
        Json(json!({ "deleted": true })).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("no plan for '{ip}'") })),
        )
            .into_response()
    }
}
