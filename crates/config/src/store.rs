//! The runtime config store.
//!
//! Process-wide singleton holding the mutable policy state: provider slots,
//! the system prompt, guardrails, and the cache TTL. One mutex; setters
//! replace whole values, getters clone, so readers never see a half-written
//! struct. Rate-limit plans and logging config are administered through the
//! `RateLimiter` and `Logger` directly — each owns its own lock.

use std::collections::HashMap;
use std::sync::Mutex;

use aigateway_core::{ProviderId, ProviderSettings};
use aigateway_guardrails::GuardrailConfig;

use crate::GatewayConfig;

#[derive(Debug, Clone, Default)]
struct RuntimeConfig {
    providers: HashMap<ProviderId, ProviderSettings>,
    system_prompt: String,
    guardrails: GuardrailConfig,
    cache_ttl_seconds: u64,
}

/// Mutex-guarded runtime configuration.
#[derive(Default)]
pub struct ConfigStore {
    inner: Mutex<RuntimeConfig>,
}

impl ConfigStore {
    /// Seed the store from a validated file config.
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            inner: Mutex::new(RuntimeConfig {
                providers: config.providers.clone(),
                system_prompt: config.system_prompt.clone(),
                guardrails: config.guardrails.clone(),
                cache_ttl_seconds: config.cache_ttl_seconds,
            }),
        }
    }

    /// Settings for one provider slot, if present.
    pub fn provider(&self, id: ProviderId) -> Option<ProviderSettings> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .providers
            .get(&id)
            .cloned()
    }

    /// Settings for a provider only when it is actually configured.
    pub fn configured_provider(&self, id: ProviderId) -> Option<ProviderSettings> {
        self.provider(id).filter(|s| s.is_configured())
    }

    /// Replace one provider slot.
    pub fn set_provider(&self, id: ProviderId, settings: ProviderSettings) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .providers
            .insert(id, settings);
    }

    /// Configured providers in failover order (`ProviderId::ALL`). This
    /// order is the documented failover contract.
    pub fn configured_providers(&self) -> Vec<ProviderId> {
        let inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        ProviderId::ALL
            .into_iter()
            .filter(|id| {
                inner
                    .providers
                    .get(id)
                    .is_some_and(|s| s.is_configured())
            })
            .collect()
    }

    pub fn system_prompt(&self) -> String {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .system_prompt
            .clone()
    }

    pub fn set_system_prompt(&self, prompt: impl Into<String>) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .system_prompt = prompt.into();
    }

    pub fn guardrails(&self) -> GuardrailConfig {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .guardrails
            .clone()
    }

    pub fn set_guardrails(&self, config: GuardrailConfig) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .guardrails = config;
    }

    pub fn cache_ttl_seconds(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cache_ttl_seconds
    }

    pub fn set_cache_ttl_seconds(&self, ttl: u64) {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cache_ttl_seconds = ttl;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_two_providers() -> ConfigStore {
        let store = ConfigStore::default();
        store.set_provider(
            ProviderId::Anthropic,
            ProviderSettings::new("sk-ant", "claude", "https://api.anthropic.com"),
        );
        store.set_provider(
            ProviderId::Openai,
            ProviderSettings::new("sk-oai", "gpt-4", "https://api.openai.com"),
        );
        store
    }

    #[test]
    fn getters_return_copies() {
        let store = store_with_two_providers();
        let mut copy = store.provider(ProviderId::Openai).unwrap();
        copy.api_key = "mutated".into();

        assert_eq!(store.provider(ProviderId::Openai).unwrap().api_key, "sk-oai");
    }

    #[test]
    fn configured_providers_follow_failover_order() {
        let store = store_with_two_providers();
        // Declaration order, not insertion order.
        assert_eq!(
            store.configured_providers(),
            vec![ProviderId::Openai, ProviderId::Anthropic]
        );
    }

    #[test]
    fn unconfigured_slot_is_filtered() {
        let store = store_with_two_providers();
        store.set_provider(ProviderId::Gemini, ProviderSettings::default());

        assert!(store.provider(ProviderId::Gemini).is_some());
        assert!(store.configured_provider(ProviderId::Gemini).is_none());
        assert!(!store
            .configured_providers()
            .contains(&ProviderId::Gemini));
    }

    #[test]
    fn system_prompt_replace() {
        let store = ConfigStore::default();
        assert_eq!(store.system_prompt(), "");
        store.set_system_prompt("Respond tersely.");
        assert_eq!(store.system_prompt(), "Respond tersely.");
    }

    #[test]
    fn guardrails_replace() {
        let store = ConfigStore::default();
        let mut config = store.guardrails();
        config.banned_phrases.push("foo".into());
        store.set_guardrails(config);

        assert_eq!(store.guardrails().banned_phrases, vec!["foo"]);
    }

    #[test]
    fn seeded_from_file_config() {
        let toml_str = r#"
cache_ttl_seconds = 120
system_prompt = "Be helpful."

[providers.cohere]
api_key = "co-key"
endpoint = "https://api.cohere.com"
"#;
        let config: GatewayConfig = toml::from_str(toml_str).unwrap();
        let store = ConfigStore::from_config(&config);

        assert_eq!(store.cache_ttl_seconds(), 120);
        assert_eq!(store.system_prompt(), "Be helpful.");
        assert_eq!(store.configured_providers(), vec![ProviderId::Cohere]);
    }
}
