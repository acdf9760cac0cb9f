//! In-memory response cache keyed by request fingerprint.
//!
//! A mutex-guarded map of fingerprint → (response, insertion time). Entries
//! expire passively: expiry is checked at lookup and the stale entry evicted
//! under the same lock. There is no size cap beyond TTL; hit/miss accounting
//! belongs to the caller so analytics keeps single ownership of counters.

pub mod fingerprint;

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::debug;

use aigateway_core::ChatResponse;

pub use fingerprint::{canonical_json, fingerprint};

/// A cached response and when it was stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub response: ChatResponse,
    pub inserted_at: u64,
}

/// The concurrent response cache.
#[derive(Default)]
pub struct ResponseCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up `key`, treating entries older than `ttl_secs` as absent.
    /// Expired entries are evicted under the lock.
    pub fn lookup(&self, key: &str, ttl_secs: u64) -> Option<ChatResponse> {
        self.lookup_at(key, ttl_secs, unix_now())
    }

    /// Lookup at an explicit timestamp. Exposed so tests control the clock.
    pub fn lookup_at(&self, key: &str, ttl_secs: u64, now: u64) -> Option<ChatResponse> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let expired = match entries.get(key) {
            Some(entry) if now.saturating_sub(entry.inserted_at) < ttl_secs => {
                return Some(entry.response.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            debug!(key, "evicting expired cache entry");
            entries.remove(key);
        }
        None
    }

    /// Store a response under `key`. Overwrites any existing entry.
    pub fn insert(&self, key: impl Into<String>, response: ChatResponse) {
        self.insert_at(key, response, unix_now())
    }

    pub fn insert_at(&self, key: impl Into<String>, response: ChatResponse, now: u64) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(
            key.into(),
            CacheEntry {
                response,
                inserted_at: now,
            },
        );
    }

    /// Drop every entry.
    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all entries for the admin surface.
    pub fn entries(&self) -> HashMap<String, CacheEntry> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
