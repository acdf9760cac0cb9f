//! Error taxonomy for the gateway.
//!
//! Uses `thiserror`. Every variant maps to a stable analytics label via
//! [`GatewayError::kind`]; the HTTP layer maps variants to status codes.

use thiserror::Error;

use crate::provider::ProviderId;

/// The gateway-wide error type.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The request violated the canonical message-shape invariant.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The requested provider has no endpoint configured.
    #[error("provider '{0}' is not configured")]
    ProviderNotConfigured(ProviderId),

    /// The provider slot exists but its settings are unusable.
    #[error("invalid configuration for provider '{provider}': {reason}")]
    InvalidProviderConfig {
        provider: ProviderId,
        reason: String,
    },

    /// The vendor answered with a non-2xx status.
    #[error("provider '{provider}' returned HTTP {status}: {body}")]
    ProviderHttp {
        provider: ProviderId,
        status: u16,
        body: String,
    },

    /// The vendor could not be reached.
    #[error("transport error calling provider '{provider}': {reason}")]
    ProviderTransport {
        provider: ProviderId,
        reason: String,
    },

    /// The vendor answered 2xx but the body did not parse.
    #[error("failed to decode response from provider '{provider}': {reason}")]
    ProviderDecode {
        provider: ProviderId,
        reason: String,
    },

    /// The guardrails filter rejected the assistant text.
    #[error("guardrails rejected response: {0}")]
    GuardrailsRejected(String),

    /// The client exhausted its rate-limit window.
    #[error("rate limit exceeded: {limit} requests per window ({plan_type} plan), retry in {reset_secs}s")]
    RateLimitExceeded {
        limit: u32,
        reset_secs: u64,
        plan_type: String,
    },

    /// Failover ran out of providers; carries the last attempt's error.
    #[error("all providers failed; last error: {last}")]
    AllProvidersFailed { last: Box<GatewayError> },
}

impl GatewayError {
    /// Stable label used as the `errors_by_type` analytics key.
    pub fn kind(&self) -> String {
        match self {
            Self::InvalidRequest(_) => "BadRequest".into(),
            Self::ProviderNotConfigured(_) => "NotConfigured".into(),
            Self::InvalidProviderConfig { .. } => "InvalidConfig".into(),
            Self::ProviderHttp { status, .. } => format!("HTTP_{status}"),
            Self::ProviderTransport { .. } => "TransportError".into(),
            Self::ProviderDecode { .. } => "DecodeError".into(),
            Self::GuardrailsRejected(_) => "GuardrailsCheckFailed".into(),
            Self::RateLimitExceeded { .. } => "RateLimitExceeded".into(),
            Self::AllProvidersFailed { .. } => "AllProvidersFailed".into(),
        }
    }

    /// The provider an error is attributable to, when there is one.
    pub fn provider(&self) -> Option<ProviderId> {
        match self {
            Self::ProviderNotConfigured(p) => Some(*p),
            Self::InvalidProviderConfig { provider, .. }
            | Self::ProviderHttp { provider, .. }
            | Self::ProviderTransport { provider, .. }
            | Self::ProviderDecode { provider, .. } => Some(*provider),
            Self::AllProvidersFailed { last } => last.provider(),
            _ => None,
        }
    }
}

/// Result type alias using the gateway error.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_kind_carries_status() {
        let err = GatewayError::ProviderHttp {
            provider: ProviderId::Openai,
            status: 503,
            body: "overloaded".into(),
        };
        assert_eq!(err.kind(), "HTTP_503");
        assert!(err.to_string().contains("503"));
        assert_eq!(err.provider(), Some(ProviderId::Openai));
    }

    #[test]
    fn guardrail_kind_label() {
        let err = GatewayError::GuardrailsRejected("banned phrase".into());
        assert_eq!(err.kind(), "GuardrailsCheckFailed");
    }

    #[test]
    fn all_providers_failed_propagates_last() {
        let last = GatewayError::ProviderTransport {
            provider: ProviderId::Cohere,
            reason: "connection refused".into(),
        };
        let err = GatewayError::AllProvidersFailed {
            last: Box::new(last),
        };
        assert_eq!(err.kind(), "AllProvidersFailed");
        assert_eq!(err.provider(), Some(ProviderId::Cohere));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn not_configured_names_the_provider() {
        let err = GatewayError::ProviderNotConfigured(ProviderId::Gemini);
        assert!(err.to_string().contains("gemini"));
        assert_eq!(err.kind(), "NotConfigured");
    }
}
