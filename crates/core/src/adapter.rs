//! The ChatAdapter trait — the seam between the dispatcher and each vendor.
//!
//! One implementation per vendor. The dispatcher hands an adapter a snapshot
//! of its settings and the merged gateway system prompt; the adapter owns the
//! wire translation in both directions and nothing else.

use async_trait::async_trait;

use crate::chat::{ChatRequest, ChatResponse};
use crate::error::GatewayError;
use crate::provider::{ProviderId, ProviderSettings};

/// A vendor adapter: canonical request in, canonical response out.
#[async_trait]
pub trait ChatAdapter: Send + Sync {
    /// Which provider this adapter speaks for.
    fn provider(&self) -> ProviderId;

    /// Translate, send, and decode one chat completion.
    ///
    /// `system_prompt` is the already-merged system content (request-supplied
    /// first, then the gateway's stored prompt); empty means none.
    async fn complete(
        &self,
        settings: &ProviderSettings,
        request: &ChatRequest,
        system_prompt: &str,
    ) -> Result<ChatResponse, GatewayError>;
}
