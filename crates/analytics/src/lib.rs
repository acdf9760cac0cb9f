//! Thread-safe usage analytics.
//!
//! Three counter families (requests, tokens, errors), each behind its own
//! mutex with brief increment windows. Exactly one of success/failure is
//! recorded per client call; attempt-level provider errors during failover
//! touch only the error counters so the request totals never double-count.

pub mod model;

use std::sync::Mutex;

use chrono::Utc;

use aigateway_core::{ProviderId, Usage};

pub use model::{ErrorEntry, ErrorStats, RequestStats, StatsSnapshot, TokenStats, RECENT_ERRORS_CAP};

/// Kind label used for the terminal entry when failover is exhausted.
pub const ALL_PROVIDERS_KIND: &str = "all-providers";

/// The analytics aggregator.
#[derive(Default)]
pub struct Analytics {
    requests: Mutex<RequestStats>,
    tokens: Mutex<TokenStats>,
    errors: Mutex<ErrorStats>,
}

impl Analytics {
    pub fn new() -> Self {
        Self::default()
    }

    /// A call completed successfully, served by `provider`.
    pub fn record_success(&self, provider: ProviderId, usage: Usage) {
        {
            let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
            requests.total_requests += 1;
            requests.successful_requests += 1;
            *requests.requests_by_provider.entry(provider).or_default() += 1;
        }
        if usage.prompt_tokens > 0 || usage.completion_tokens > 0 {
            let mut tokens = self.tokens.lock().unwrap_or_else(|e| e.into_inner());
            *tokens.input_tokens_by_provider.entry(provider).or_default() +=
                u64::from(usage.prompt_tokens);
            *tokens.output_tokens_by_provider.entry(provider).or_default() +=
                u64::from(usage.completion_tokens);
        }
    }

    /// A call failed terminally. `provider` is the provider that ultimately
    /// served or was last attempted, when one applies.
    pub fn record_failure(&self, provider: Option<ProviderId>) {
        let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        requests.total_requests += 1;
        requests.failed_requests += 1;
        if let Some(p) = provider {
            *requests.requests_by_provider.entry(p).or_default() += 1;
        }
    }

    /// Record one error occurrence: attempt-level during failover, terminal,
    /// or request-level. Touches only the error counters.
    pub fn record_error(
        &self,
        provider: Option<ProviderId>,
        kind: impl Into<String>,
        message: impl Into<String>,
        request_id: impl Into<String>,
    ) {
        let kind = kind.into();
        let mut errors = self.errors.lock().unwrap_or_else(|e| e.into_inner());
        errors.total_errors += 1;
        *errors.errors_by_type.entry(kind.clone()).or_default() += 1;
        if let Some(p) = provider {
            *errors.errors_by_provider.entry(p).or_default() += 1;
        }
        errors.recent_errors.push_back(ErrorEntry {
            timestamp: Utc::now(),
            provider,
            kind,
            message: message.into(),
            request_id: request_id.into(),
        });
        while errors.recent_errors.len() > RECENT_ERRORS_CAP {
            errors.recent_errors.pop_front();
        }
    }

    pub fn record_cache_hit(&self) {
        let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        requests.cache_hits += 1;
    }

    pub fn record_cache_miss(&self) {
        let mut requests = self.requests.lock().unwrap_or_else(|e| e.into_inner());
        requests.cache_misses += 1;
    }

    /// A consistent snapshot: each family is cloned under its own lock.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            requests: self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone(),
            tokens: self.tokens.lock().unwrap_or_else(|e| e.into_inner()).clone(),
            errors: self.errors.lock().unwrap_or_else(|e| e.into_inner()).clone(),
        }
    }
}
