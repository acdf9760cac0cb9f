//! The dispatcher: one chat completion from validation to analytics.
//!
//! Per call, in order: validate the canonical request, check the cache under
//! the primary provider's fingerprint, require the primary to be configured,
//! walk the failover chain, apply guardrails to the winning text, insert into
//! the cache, and record analytics last so a stats read issued after the
//! client sees the response already reflects the call.
//!
//! Failover rules: it only runs when at least two providers are configured,
//! it only triggers on a failed primary *attempt* (an unconfigured primary
//! fails immediately), the chain follows `ProviderId::ALL` order, a guardrail
//! rejection is terminal, and when every attempt fails the last error is
//! returned wrapped in `AllProvidersFailed`.

use serde_json::json;
use uuid::Uuid;

use aigateway_analytics::ALL_PROVIDERS_KIND;
use aigateway_cache::fingerprint;
use aigateway_core::{ChatRequest, ChatResponse, GatewayError, ProviderId, Usage};
use aigateway_logging::LogLevel;
use aigateway_providers::merge_system_prompt;

use crate::AppState;

impl AppState {
    /// Dispatch one chat completion. `bypass_cache` skips both the lookup and
    /// the insert (`Cache-Control: no-cache`).
    pub async fn dispatch_chat(
        &self,
        primary: ProviderId,
        request: ChatRequest,
        bypass_cache: bool,
    ) -> Result<ChatResponse, GatewayError> {
        let request_id = Uuid::now_v7().to_string();

        // A dropped future past this point is a client cancellation: count it
        // as a failed request and insert nothing into the cache.
        let mut guard = CancelGuard::armed(self, &request_id);

        let result = self
            .dispatch_inner(primary, request, bypass_cache, &request_id)
            .await;
        guard.disarm();
        result
    }

    async fn dispatch_inner(
        &self,
        primary: ProviderId,
        request: ChatRequest,
        bypass_cache: bool,
        request_id: &str,
    ) -> Result<ChatResponse, GatewayError> {
        if let Err(err) = request.validate() {
            return Err(self.fail(None, err, request_id));
        }

        // The fingerprint is keyed to the *primary* provider: repeated
        // requests with the same primary observe the same cached result even
        // when failover served the original.
        let key = fingerprint(primary, &request);

        if !bypass_cache {
            if let Some(cached) = self.cache.lookup(&key, self.config.cache_ttl_seconds()) {
                return self.serve_cached(primary, cached, request_id);
            }
            self.analytics.record_cache_miss();
            self.logger.log(
                LogLevel::Debug,
                "cache",
                "cache miss",
                [
                    ("request_id".to_string(), json!(request_id)),
                    ("fingerprint".to_string(), json!(key)),
                ]
                .into_iter()
                .collect(),
            );
        }

        // An unasked-for provider is never substituted: failover requires a
        // failed *attempt*, and an unconfigured primary never gets one.
        if self.config.configured_provider(primary).is_none() {
            let err = GatewayError::ProviderNotConfigured(primary);
            return Err(self.fail(Some(primary), err, request_id));
        }

        let configured = self.config.configured_providers();
        let failover_enabled = configured.len() >= 2;

        let mut chain = vec![primary];
        if failover_enabled {
            chain.extend(configured.iter().copied().filter(|p| *p != primary));
        }

        let system_prompt =
            merge_system_prompt(request.system_content(), &self.config.system_prompt());

        let mut last_error = GatewayError::ProviderNotConfigured(primary);
        let mut last_provider = primary;

        for (attempt, provider) in chain.iter().copied().enumerate() {
            if attempt > 0 {
                self.logger.log(
                    LogLevel::Info,
                    "failover",
                    "attempting provider",
                    failover_metadata(request_id, provider, attempt),
                );
            }

            let settings = match self.config.configured_provider(provider) {
                Some(settings) => settings,
                None => continue,
            };
            let adapter = match self.registry.get(provider) {
                Some(adapter) => adapter,
                None => continue,
            };

            match adapter.complete(&settings, &request, &system_prompt).await {
                Ok(mut response) => {
                    match aigateway_guardrails::apply(&self.config.guardrails(), response.content())
                    {
                        Ok(text) => {
                            response.set_content(text);
                            if attempt > 0 {
                                self.logger.log(
                                    LogLevel::Info,
                                    "failover",
                                    "provider succeeded",
                                    failover_metadata(request_id, provider, attempt),
                                );
                            }
                            if !bypass_cache {
                                self.cache.insert(&key, response.clone());
                            }
                            self.analytics.record_success(provider, response.usage);
                            return Ok(response);
                        }
                        Err(violation) => {
                            // Guardrail rejections are policy, not provider
                            // flakiness — never retried on another provider.
                            let err = GatewayError::GuardrailsRejected(violation.to_string());
                            return Err(self.fail(Some(provider), err, request_id));
                        }
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        provider = %provider,
                        request_id,
                        error = %err,
                        "provider attempt failed"
                    );
                    self.analytics.record_error(
                        Some(provider),
                        err.kind(),
                        err.to_string(),
                        request_id,
                    );
                    last_error = err;
                    last_provider = provider;
                }
            }
        }

        let err = if failover_enabled {
            let err = GatewayError::AllProvidersFailed {
                last: Box::new(last_error),
            };
            self.analytics
                .record_error(None, ALL_PROVIDERS_KIND, err.to_string(), request_id);
            err
        } else {
            last_error
        };
        self.analytics.record_failure(Some(last_provider));
        Err(err)
    }

    /// Serve a cache hit: guardrails are re-evaluated under whatever policy
    /// is active now, not the policy at insert time.
    fn serve_cached(
        &self,
        primary: ProviderId,
        mut cached: ChatResponse,
        request_id: &str,
    ) -> Result<ChatResponse, GatewayError> {
        match aigateway_guardrails::apply(&self.config.guardrails(), cached.content()) {
            Ok(text) => {
                cached.set_content(text);
                self.analytics.record_cache_hit();
                // No upstream call happened, so no token accounting.
                self.analytics.record_success(primary, Usage::default());
                Ok(cached)
            }
            Err(violation) => {
                let err = GatewayError::GuardrailsRejected(violation.to_string());
                Err(self.fail(Some(primary), err, request_id))
            }
        }
    }

    /// Record a terminal failure (error counters + the failed-request
    /// counter) and hand the error back for the HTTP layer.
    fn fail(
        &self,
        provider: Option<ProviderId>,
        err: GatewayError,
        request_id: &str,
    ) -> GatewayError {
        self.analytics
            .record_error(provider, err.kind(), err.to_string(), request_id);
        self.analytics.record_failure(provider);
        err
    }
}

fn failover_metadata(
    request_id: &str,
    provider: ProviderId,
    attempt: usize,
) -> serde_json::Map<String, serde_json::Value> {
    [
        ("request_id".to_string(), json!(request_id)),
        ("provider".to_string(), json!(provider.as_str())),
        ("attempt".to_string(), json!(attempt)),
    ]
    .into_iter()
    .collect()
}

/// Records a cancelled call when the dispatch future is dropped mid-flight.
struct CancelGuard<'a> {
    state: &'a AppState,
    request_id: String,
    armed: bool,
}

impl<'a> CancelGuard<'a> {
    fn armed(state: &'a AppState, request_id: &str) -> Self {
        Self {
            state,
            request_id: request_id.to_string(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for CancelGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.state.analytics.record_error(
                None,
                "Cancelled",
                "client cancelled the request",
                &self.request_id,
            );
            self.state.analytics.record_failure(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;

    use aigateway_core::{
        ChatAdapter, ChatMessage, ChatRequest, ChatResponse, GatewayError, ProviderId,
        ProviderSettings, Usage,
    };
    use aigateway_guardrails::GuardrailConfig;
    use aigateway_providers::AdapterRegistry;

    use crate::AppState;

    /// A scripted adapter: succeeds with fixed text or fails with a fixed
    /// error, counting calls either way.
    struct StubAdapter {
        provider: ProviderId,
        reply: Result<String, GatewayError>,
        calls: AtomicUsize,
    }

    impl StubAdapter {
        fn ok(provider: ProviderId, text: &str) -> Arc<Self> {
            Arc::new(Self {
                provider,
                reply: Ok(text.to_string()),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing(provider: ProviderId, err: GatewayError) -> Arc<Self> {
            Arc::new(Self {
                provider,
                reply: Err(err),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatAdapter for StubAdapter {
        fn provider(&self) -> ProviderId {
            self.provider
        }

        async fn complete(
            &self,
            _settings: &ProviderSettings,
            _request: &ChatRequest,
            _system_prompt: &str,
        ) -> Result<ChatResponse, GatewayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Ok(text) => Ok(ChatResponse::assistant(
                    "stub-model",
                    text.clone(),
                    "stop",
                    Usage::new(1, 1),
                )),
                Err(err) => Err(err.clone()),
            }
        }
    }

    fn transport_err(provider: ProviderId) -> GatewayError {
        GatewayError::ProviderTransport {
            provider,
            reason: "connection refused".into(),
        }
    }

    fn state_with(adapters: Vec<Arc<StubAdapter>>) -> AppState {
        let mut registry = AdapterRegistry::new();
        for adapter in &adapters {
            registry.register(adapter.clone() as Arc<dyn ChatAdapter>);
        }
        let state = AppState::for_tests(registry);
        for adapter in &adapters {
            state.config.set_provider(
                adapter.provider(),
                ProviderSettings::new("key", "stub-model", "http://stub"),
            );
        }
        state.config.set_cache_ttl_seconds(3600);
        state
    }

    #[tokio::test]
    async fn success_on_primary() {
        let openai = StubAdapter::ok(ProviderId::Openai, "hello");
        let state = state_with(vec![openai.clone()]);

        let response = state
            .dispatch_chat(ProviderId::Openai, ChatRequest::from_user("hi"), false)
            .await
            .unwrap();

        assert_eq!(response.content(), "hello");
        assert_eq!(openai.calls(), 1);

        let snap = state.analytics.snapshot();
        assert_eq!(snap.requests.total_requests, 1);
        assert_eq!(snap.requests.successful_requests, 1);
        assert_eq!(snap.requests.cache_misses, 1);
        assert_eq!(snap.tokens.input_tokens_by_provider[&ProviderId::Openai], 1);
    }

    #[tokio::test]
    async fn invalid_request_is_rejected_before_dispatch() {
        let openai = StubAdapter::ok(ProviderId::Openai, "hello");
        let state = state_with(vec![openai.clone()]);

        let bad = ChatRequest {
            messages: vec![ChatMessage::system("only system")],
            temperature: None,
            max_tokens: None,
        };
        let err = state
            .dispatch_chat(ProviderId::Openai, bad, false)
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::InvalidRequest(_)));
        assert_eq!(openai.calls(), 0);

        let snap = state.analytics.snapshot();
        assert_eq!(snap.requests.failed_requests, 1);
        assert_eq!(snap.errors.errors_by_type["BadRequest"], 1);
    }

    #[tokio::test]
    async fn unconfigured_primary_fails_without_failover() {
        // Anthropic is configured and healthy, but the client asked for
        // OpenAI — failover must not substitute an unasked-for provider.
        let anthropic = StubAdapter::ok(ProviderId::Anthropic, "hello");
        let state = state_with(vec![anthropic.clone()]);

        let err = state
            .dispatch_chat(ProviderId::Openai, ChatRequest::from_user("hi"), false)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            GatewayError::ProviderNotConfigured(ProviderId::Openai)
        ));
        assert_eq!(anthropic.calls(), 0);
    }

    #[tokio::test]
    async fn failover_to_next_configured_provider() {
        let anthropic = StubAdapter::failing(
            ProviderId::Anthropic,
            transport_err(ProviderId::Anthropic),
        );
        let openai = StubAdapter::ok(ProviderId::Openai, "from openai");
        let state = state_with(vec![anthropic.clone(), openai.clone()]);

        let response = state
            .dispatch_chat(ProviderId::Anthropic, ChatRequest::from_user("hi"), false)
            .await
            .unwrap();

        assert_eq!(response.content(), "from openai");
        assert_eq!(anthropic.calls(), 1);
        assert_eq!(openai.calls(), 1);

        let snap = state.analytics.snapshot();
        // One attempt-level error, one success; no terminal entry.
        assert_eq!(snap.requests.successful_requests, 1);
        assert_eq!(snap.requests.failed_requests, 0);
        assert_eq!(snap.errors.total_errors, 1);
        assert_eq!(snap.errors.errors_by_provider[&ProviderId::Anthropic], 1);
        assert_eq!(snap.requests.requests_by_provider[&ProviderId::Openai], 1);
    }

    #[tokio::test]
    async fn failover_order_is_deterministic() {
        // A=openai fails, B=anthropic fails, C=gemini succeeds: the chain
        // must land on gemini, trying anthropic before it.
        let openai =
            StubAdapter::failing(ProviderId::Openai, transport_err(ProviderId::Openai));
        let anthropic = StubAdapter::failing(
            ProviderId::Anthropic,
            transport_err(ProviderId::Anthropic),
        );
        let gemini = StubAdapter::ok(ProviderId::Gemini, "from gemini");
        let state = state_with(vec![openai.clone(), anthropic.clone(), gemini.clone()]);

        let response = state
            .dispatch_chat(ProviderId::Openai, ChatRequest::from_user("hi"), false)
            .await
            .unwrap();

        assert_eq!(response.content(), "from gemini");
        assert_eq!(openai.calls(), 1);
        assert_eq!(anthropic.calls(), 1);
        assert_eq!(gemini.calls(), 1);
    }

    #[tokio::test]
    async fn all_providers_failing_returns_last_error_wrapped() {
        let openai =
            StubAdapter::failing(ProviderId::Openai, transport_err(ProviderId::Openai));
        let cohere = StubAdapter::failing(
            ProviderId::Cohere,
            GatewayError::ProviderHttp {
                provider: ProviderId::Cohere,
                status: 500,
                body: "upstream broke".into(),
            },
        );
        let state = state_with(vec![openai.clone(), cohere.clone()]);

        let err = state
            .dispatch_chat(ProviderId::Openai, ChatRequest::from_user("hi"), false)
            .await
            .unwrap_err();

        match &err {
            GatewayError::AllProvidersFailed { last } => {
                assert!(matches!(**last, GatewayError::ProviderHttp { status: 500, .. }));
            }
            other => panic!("expected AllProvidersFailed, got: {other:?}"),
        }

        let snap = state.analytics.snapshot();
        // Two attempt-level errors plus one terminal all-providers entry,
        // and exactly one failed request.
        assert_eq!(snap.requests.failed_requests, 1);
        assert_eq!(snap.requests.successful_requests, 0);
        assert_eq!(snap.errors.total_errors, 3);
        assert_eq!(snap.errors.errors_by_type["all-providers"], 1);
    }

    #[tokio::test]
    async fn single_provider_failure_is_not_wrapped() {
        let openai =
            StubAdapter::failing(ProviderId::Openai, transport_err(ProviderId::Openai));
        let state = state_with(vec![openai.clone()]);

        let err = state
            .dispatch_chat(ProviderId::Openai, ChatRequest::from_user("hi"), false)
            .await
            .unwrap_err();

        // Only one provider configured: failover disabled, raw error surfaces.
        assert!(matches!(err, GatewayError::ProviderTransport { .. }));
        let snap = state.analytics.snapshot();
        assert_eq!(snap.errors.errors_by_type.get("all-providers"), None);
    }

    #[tokio::test]
    async fn guardrail_rejection_is_never_retried() {
        let openai = StubAdapter::ok(ProviderId::Openai, "this is Forbidden");
        let anthropic = StubAdapter::ok(ProviderId::Anthropic, "clean");
        let state = state_with(vec![openai.clone(), anthropic.clone()]);
        state.config.set_guardrails(GuardrailConfig {
            banned_phrases: vec!["forbidden".into()],
            ..GuardrailConfig::default()
        });

        let err = state
            .dispatch_chat(ProviderId::Openai, ChatRequest::from_user("hi"), false)
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::GuardrailsRejected(_)));
        assert_eq!(anthropic.calls(), 0);

        let snap = state.analytics.snapshot();
        assert_eq!(snap.requests.failed_requests, 1);
        assert_eq!(snap.errors.errors_by_type["GuardrailsCheckFailed"], 1);
        // The rejected response never reached the cache.
        assert!(state.cache.is_empty());
        assert_eq!(snap.requests.cache_misses, 1);
        assert_eq!(snap.requests.cache_hits, 0);
    }

    #[tokio::test]
    async fn second_identical_request_is_served_from_cache() {
        let openai = StubAdapter::ok(ProviderId::Openai, "hello");
        let state = state_with(vec![openai.clone()]);

        let first = state
            .dispatch_chat(ProviderId::Openai, ChatRequest::from_user("hi"), false)
            .await
            .unwrap();
        let second = state
            .dispatch_chat(ProviderId::Openai, ChatRequest::from_user("hi"), false)
            .await
            .unwrap();

        // Byte-identical bodies, one upstream call.
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(openai.calls(), 1);

        let snap = state.analytics.snapshot();
        assert_eq!(snap.requests.cache_hits, 1);
        assert_eq!(snap.requests.cache_misses, 1);
        assert_eq!(snap.requests.successful_requests, 2);
        // Cache hits add no tokens.
        assert_eq!(snap.tokens.input_tokens_by_provider[&ProviderId::Openai], 1);
    }

    #[tokio::test]
    async fn bypass_cache_skips_lookup_and_insert() {
        let openai = StubAdapter::ok(ProviderId::Openai, "hello");
        let state = state_with(vec![openai.clone()]);

        state
            .dispatch_chat(ProviderId::Openai, ChatRequest::from_user("hi"), true)
            .await
            .unwrap();
        state
            .dispatch_chat(ProviderId::Openai, ChatRequest::from_user("hi"), true)
            .await
            .unwrap();

        assert_eq!(openai.calls(), 2);
        assert!(state.cache.is_empty());

        let snap = state.analytics.snapshot();
        assert_eq!(snap.requests.cache_hits, 0);
        assert_eq!(snap.requests.cache_misses, 0);
    }

    #[tokio::test]
    async fn tightened_guardrails_apply_to_cached_responses() {
        let openai = StubAdapter::ok(ProviderId::Openai, "now restricted words");
        let state = state_with(vec![openai.clone()]);

        state
            .dispatch_chat(ProviderId::Openai, ChatRequest::from_user("hi"), false)
            .await
            .unwrap();

        // Tighten policy after the insert; the hit re-checks at serve time.
        state.config.set_guardrails(GuardrailConfig {
            banned_phrases: vec!["restricted".into()],
            ..GuardrailConfig::default()
        });

        let err = state
            .dispatch_chat(ProviderId::Openai, ChatRequest::from_user("hi"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::GuardrailsRejected(_)));
    }

    #[tokio::test]
    async fn failover_served_response_is_cached_under_primary() {
        let anthropic = StubAdapter::failing(
            ProviderId::Anthropic,
            transport_err(ProviderId::Anthropic),
        );
        let openai = StubAdapter::ok(ProviderId::Openai, "from openai");
        let state = state_with(vec![anthropic.clone(), openai.clone()]);

        state
            .dispatch_chat(ProviderId::Anthropic, ChatRequest::from_user("hi"), false)
            .await
            .unwrap();

        // Same primary again: served from cache, no new attempts anywhere.
        let second = state
            .dispatch_chat(ProviderId::Anthropic, ChatRequest::from_user("hi"), false)
            .await
            .unwrap();

        assert_eq!(second.content(), "from openai");
        assert_eq!(anthropic.calls(), 1);
        assert_eq!(openai.calls(), 1);
    }

    #[tokio::test]
    async fn cancelled_dispatch_counts_a_failed_request() {
        use std::time::Duration;

        /// An adapter that never finishes.
        struct HangingAdapter;

        #[async_trait]
        impl ChatAdapter for HangingAdapter {
            fn provider(&self) -> ProviderId {
                ProviderId::Openai
            }

            async fn complete(
                &self,
                _settings: &ProviderSettings,
                _request: &ChatRequest,
                _system_prompt: &str,
            ) -> Result<ChatResponse, GatewayError> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                unreachable!()
            }
        }

        let mut registry = AdapterRegistry::new();
        registry.register(Arc::new(HangingAdapter));
        let state = Arc::new(AppState::for_tests(registry));
        state.config.set_provider(
            ProviderId::Openai,
            ProviderSettings::new("key", "stub-model", "http://stub"),
        );

        let dispatch_state = state.clone();
        let handle = tokio::spawn(async move {
            dispatch_state
                .dispatch_chat(ProviderId::Openai, ChatRequest::from_user("hi"), false)
                .await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.abort();
        let _ = handle.await;

        let snap = state.analytics.snapshot();
        assert_eq!(snap.requests.failed_requests, 1);
        assert_eq!(snap.errors.errors_by_type["Cancelled"], 1);
        assert!(state.cache.is_empty());
    }
}
