//! Configuration loading, validation, and the runtime config store.
//!
//! Startup reads a TOML file into [`GatewayConfig`] and validates it: the
//! gateway refuses to start with zero configured providers, and any provider
//! slot that is filled in at all must carry an endpoint. The validated file
//! config seeds the [`ConfigStore`], the mutex-guarded runtime view that the
//! admin surface mutates; every getter returns a clone taken under the lock
//! so no reader can observe a partially written value.

pub mod store;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use aigateway_core::{ProviderId, ProviderSettings};
use aigateway_guardrails::GuardrailConfig;
use aigateway_logging::LoggingConfig;
use aigateway_ratelimit::RateLimitPlan;

pub use store::ConfigStore;

/// The root configuration structure, mapped from the TOML config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Seconds a cached response stays fresh.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,

    /// System prompt injected into every outbound request.
    #[serde(default)]
    pub system_prompt: String,

    #[serde(default)]
    pub gateway: ServerConfig,

    /// Provider slots, keyed by provider name. A slot is configured iff its
    /// endpoint is non-empty.
    #[serde(default)]
    pub providers: HashMap<ProviderId, ProviderSettings>,

    #[serde(default)]
    pub guardrails: GuardrailConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub ratelimit: RateLimitConfig,
}

fn default_cache_ttl() -> u64 {
    3600
}

/// Listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_admin_port")]
    pub admin_port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default)]
    pub verbose_logging: bool,
}

fn default_port() -> u16 {
    8080
}
fn default_admin_port() -> u16 {
    8081
}
fn default_host() -> String {
    "0.0.0.0".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            admin_port: default_admin_port(),
            host: default_host(),
            verbose_logging: false,
        }
    }
}

/// Seed rate-limit plans. The wildcard tier is a client entry with the
/// sentinel IP `*.*.*.*`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<RateLimitPlan>,

    #[serde(default)]
    pub clients: Vec<ClientPlanConfig>,
}

/// One per-IP plan entry in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientPlanConfig {
    pub ip: String,

    #[serde(flatten)]
    pub plan: RateLimitPlan,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            cache_ttl_seconds: default_cache_ttl(),
            system_prompt: String::new(),
            gateway: ServerConfig::default(),
            providers: HashMap::new(),
            guardrails: GuardrailConfig::default(),
            logging: LoggingConfig::default(),
            ratelimit: RateLimitConfig::default(),
        }
    }
}

impl GatewayConfig {
    /// Read a TOML config file and validate it. A missing file falls back to
    /// the defaults first, so the caller gets one uniform failure: the
    /// validation error naming what the gateway cannot start without.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let config = match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str::<Self>(&content).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "config file missing, starting from defaults");
                Self::default()
            }
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Startup validation: at least one configured provider; a filled-in
    /// slot without an endpoint is a mistake worth failing loudly on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let configured = self
            .providers
            .values()
            .filter(|s| s.is_configured())
            .count();
        if configured == 0 {
            return Err(ConfigError::Invalid(
                "no provider is configured — at least one [providers.<name>] needs an endpoint"
                    .into(),
            ));
        }

        for (id, settings) in &self.providers {
            let filled = !settings.api_key.is_empty() || !settings.model.is_empty();
            if filled && settings.endpoint.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "provider '{id}' has settings but no endpoint"
                )));
            }
        }

        if self.cache_ttl_seconds == 0 {
            return Err(ConfigError::Invalid(
                "cache_ttl_seconds must be greater than zero".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for the `init` command).
    pub fn default_toml() -> String {
        let mut config = Self::default();
        config.providers.insert(
            ProviderId::Openai,
            ProviderSettings::new("sk-...", "gpt-4", "https://api.openai.com"),
        );
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("configuration rejected: {0}")]
    Invalid(String),
}
