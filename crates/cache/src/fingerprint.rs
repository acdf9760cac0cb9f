//! Cache-key fingerprinting.
//!
//! The key is `hex(SHA-1(provider || canonical_json(request)))` — 40 hex
//! digits. Canonical JSON must be deterministic: `serde_json`'s default map
//! is a `BTreeMap`, so building the payload through `json!` gives sorted keys
//! and `to_string` emits no whitespace. Temperature is normalized to three
//! decimals before hashing so float formatting noise cannot fragment keys.

use serde_json::json;
use sha1::{Digest, Sha1};

use aigateway_core::{ChatRequest, ProviderId};

/// Compute the cache fingerprint for a request routed to `provider`.
pub fn fingerprint(provider: ProviderId, request: &ChatRequest) -> String {
    let payload = canonical_json(request);
    let mut hasher = Sha1::new();
    hasher.update(provider.as_str().as_bytes());
    hasher.update(payload.as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

/// Deterministic serialization of a request: sorted keys, no whitespace,
/// temperature pinned to three decimals, optional fields omitted when unset.
pub fn canonical_json(request: &ChatRequest) -> String {
    let messages: Vec<serde_json::Value> = request
        .messages
        .iter()
        .map(|m| json!({ "content": m.content, "role": m.role }))
        .collect();

    let mut value = json!({ "messages": messages });
    if let Some(t) = request.temperature {
        value["temperature"] = json!(format!("{t:.3}"));
    }
    if let Some(m) = request.max_tokens {
        value["max_tokens"] = json!(m);
    }

    value.to_string()
}
