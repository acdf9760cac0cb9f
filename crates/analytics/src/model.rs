//! Serializable counter structs and the stats snapshot.

use std::collections::HashMap;
use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aigateway_core::ProviderId;

/// How many recent errors the FIFO retains.
pub const RECENT_ERRORS_CAP: usize = 10;

/// Request-level counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestStats {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    #[serde(default)]
    pub requests_by_provider: HashMap<ProviderId, u64>,
}

/// Cumulative token counters per provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenStats {
    #[serde(default)]
    pub input_tokens_by_provider: HashMap<ProviderId, u64>,
    #[serde(default)]
    pub output_tokens_by_provider: HashMap<ProviderId, u64>,
}

impl TokenStats {
    pub fn total_input(&self) -> u64 {
        self.input_tokens_by_provider.values().sum()
    }

    pub fn total_output(&self) -> u64 {
        self.output_tokens_by_provider.values().sum()
    }
}

/// One recorded error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEntry {
    pub timestamp: DateTime<Utc>,
    /// The provider the error is attributable to, if any. `None` for
    /// request-level failures (bad request, rate limit) and the terminal
    /// `all-providers` entry.
    pub provider: Option<ProviderId>,
    /// Stable error-kind label (`GatewayError::kind()` or `all-providers`).
    pub kind: String,
    pub message: String,
    pub request_id: String,
}

/// Error counters and the bounded recent-error FIFO.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorStats {
    pub total_errors: u64,
    #[serde(default)]
    pub errors_by_type: HashMap<String, u64>,
    #[serde(default)]
    pub errors_by_provider: HashMap<ProviderId, u64>,
    /// At most [`RECENT_ERRORS_CAP`] entries, oldest first.
    #[serde(default)]
    pub recent_errors: VecDeque<ErrorEntry>,
}

/// A consistent point-in-time view of every counter, served by `GET /stats`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub requests: RequestStats,
    pub tokens: TokenStats,
    pub errors: ErrorStats,
}
