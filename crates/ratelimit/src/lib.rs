//! Fixed-window rate limiting keyed by client IP.
//!
//! Plan precedence (highest first): exact-IP client plan, the wildcard plan
//! (keyed by the sentinel `*.*.*.*`), then the process-wide default plan.
//! With no plan at all, every request passes. Window state is created lazily
//! per IP and the whole read-modify-write runs under one mutex — the map is
//! small and hot, so a global lock beats sharding here.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

/// The sentinel IP string that keys the wildcard plan.
pub const WILDCARD_IP: &str = "*.*.*.*";

/// A rate-limit plan: N requests per W-second window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitPlan {
    pub name: String,
    pub requests_per_window: u32,
    pub window_seconds: u64,
}

impl RateLimitPlan {
    pub fn new(name: impl Into<String>, requests_per_window: u32, window_seconds: u64) -> Self {
        Self {
            name: name.into(),
            requests_per_window,
            window_seconds,
        }
    }
}

/// Which tier a decision was made under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Client,
    Wildcard,
    Default,
    /// No plan applies — unlimited.
    None,
}

impl PlanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Wildcard => "wildcard",
            Self::Default => "default",
            Self::None => "",
        }
    }
}

/// The outcome of a rate-limit check, carrying everything the HTTP layer
/// needs for the `RateLimit-*` headers and the 429 body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    pub reset_secs: u64,
    pub plan_type: PlanType,
}

impl RateDecision {
    /// The unlimited pass-through used when no plan applies.
    fn pass() -> Self {
        Self {
            allowed: true,
            limit: 0,
            remaining: 0,
            reset_secs: 0,
            plan_type: PlanType::None,
        }
    }
}

/// Per-IP window bookkeeping.
#[derive(Debug, Clone, Copy)]
struct WindowState {
    requests: u32,
    window_start: u64,
}

#[derive(Default)]
struct Inner {
    default_plan: Option<RateLimitPlan>,
    /// Client plans keyed by exact IP; the wildcard plan lives under
    /// [`WILDCARD_IP`].
    client_plans: HashMap<String, RateLimitPlan>,
    states: HashMap<String, WindowState>,
}

/// The fixed-window limiter. One mutex covers plan reads and the state-map
/// read-modify-write so each check is atomic per key.
#[derive(Default)]
pub struct RateLimiter {
    inner: Mutex<Inner>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check `client_ip` against the applicable plan at the current time.
    pub fn check(&self, client_ip: &str) -> RateDecision {
        self.check_at(client_ip, unix_now())
    }

    /// Check at an explicit timestamp. Exposed so tests control the clock.
    pub fn check_at(&self, client_ip: &str, now: u64) -> RateDecision {
        // Internal callers and trusted paths pass an empty IP.
        if client_ip.is_empty() {
            return RateDecision::pass();
        }

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let (plan, plan_type) = match select_plan(&inner, client_ip) {
            Some(found) => found,
            None => return RateDecision::pass(),
        };
        let limit = plan.requests_per_window;
        let window = plan.window_seconds;

        let state = inner
            .states
            .entry(client_ip.to_string())
            .or_insert(WindowState {
                requests: 0,
                window_start: now,
            });

        if now.saturating_sub(state.window_start) >= window {
            state.requests = 0;
            state.window_start = now;
        }

        let reset_secs = window.saturating_sub(now.saturating_sub(state.window_start));

        if state.requests >= limit {
            debug!(ip = %client_ip, limit, plan = plan_type.as_str(), "rate limit exceeded");
            return RateDecision {
                allowed: false,
                limit,
                remaining: 0,
                reset_secs,
                plan_type,
            };
        }

        state.requests += 1;
        RateDecision {
            allowed: true,
            limit,
            remaining: limit - state.requests,
            reset_secs,
            plan_type,
        }
    }

    /// Replace the default plan. Window state is reset only for IPs that do
    /// not carry a client-specific plan — those were counting against the old
    /// default and must restart under the new one.
    pub fn set_default_plan(&self, plan: Option<RateLimitPlan>) {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let keep: Vec<String> = inner.client_plans.keys().cloned().collect();
        inner.states.retain(|ip, _| keep.contains(ip));
        inner.default_plan = plan;
    }

    pub fn default_plan(&self) -> Option<RateLimitPlan> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .default_plan
            .clone()
    }

    /// Install (or replace) a plan for one IP. Use [`WILDCARD_IP`] for the
    /// wildcard tier. Any existing window state for that IP restarts.
    pub fn set_client_plan(&self, ip: impl Into<String>, plan: RateLimitPlan) {
        let ip = ip.into();
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.states.remove(&ip);
        inner.client_plans.insert(ip, plan);
    }

    /// Remove a per-IP plan. Returns whether one existed.
    pub fn remove_client_plan(&self, ip: &str) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        inner.states.remove(ip);
        inner.client_plans.remove(ip).is_some()
    }

    pub fn client_plan(&self, ip: &str) -> Option<RateLimitPlan> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .client_plans
            .get(ip)
            .cloned()
    }

    /// Snapshot of all per-IP plans (wildcard included) for the admin surface.
    pub fn client_plans(&self) -> HashMap<String, RateLimitPlan> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .client_plans
            .clone()
    }
}

/// Tier precedence: client > wildcard > default.
fn select_plan(inner: &Inner, client_ip: &str) -> Option<(RateLimitPlan, PlanType)> {
    if let Some(plan) = inner.client_plans.get(client_ip) {
        return Some((plan.clone(), PlanType::Client));
    }
    if let Some(plan) = inner.client_plans.get(WILDCARD_IP) {
        return Some((plan.clone(), PlanType::Wildcard));
    }
    inner
        .default_plan
        .as_ref()
        .map(|plan| (plan.clone(), PlanType::Default))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
