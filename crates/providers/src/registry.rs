//! Adapter registry — the static provider-name → adapter table.
//!
//! Built once at startup; the dispatcher looks adapters up by `ProviderId`.
//! Tests swap in mock adapters through `register`.

use std::collections::HashMap;
use std::sync::Arc;

use aigateway_core::{ChatAdapter, ProviderId};

use crate::anthropic::AnthropicAdapter;
use crate::cohere::CohereAdapter;
use crate::ollama::OllamaAdapter;
use crate::openai::OpenAiCompatAdapter;

/// Maps each provider to its adapter.
#[derive(Default)]
pub struct AdapterRegistry {
    adapters: HashMap<ProviderId, Arc<dyn ChatAdapter>>,
}

impl AdapterRegistry {
    /// An empty registry (for tests that register mocks).
    pub fn new() -> Self {
        Self::default()
    }

    /// The production table: all six providers.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(OpenAiCompatAdapter::new(ProviderId::Openai)));
        registry.register(Arc::new(AnthropicAdapter::new()));
        registry.register(Arc::new(OpenAiCompatAdapter::new(ProviderId::Gemini)));
        registry.register(Arc::new(OllamaAdapter::new()));
        registry.register(Arc::new(OpenAiCompatAdapter::new(ProviderId::Mistral)));
        registry.register(Arc::new(CohereAdapter::new()));
        registry
    }

    /// Register (or replace) the adapter for its provider.
    pub fn register(&mut self, adapter: Arc<dyn ChatAdapter>) {
        self.adapters.insert(adapter.provider(), adapter);
    }

    pub fn get(&self, id: ProviderId) -> Option<Arc<dyn ChatAdapter>> {
        self.adapters.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_covers_all_providers() {
        let registry = AdapterRegistry::with_defaults();
        assert_eq!(registry.len(), 6);
        for id in ProviderId::ALL {
            let adapter = registry.get(id).expect("adapter missing");
            assert_eq!(adapter.provider(), id);
        }
    }

    #[test]
    fn register_replaces() {
        let mut registry = AdapterRegistry::new();
        assert!(registry.is_empty());
        registry.register(Arc::new(OllamaAdapter::new()));
        registry.register(Arc::new(OllamaAdapter::new()));
        assert_eq!(registry.len(), 1);
    }
}
