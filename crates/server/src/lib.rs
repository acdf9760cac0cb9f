//! HTTP surfaces of the AI gateway.
//!
//! Wires the shared singletons (config store, cache, rate limiter, analytics,
//! logger, adapter registry) into two axum routers: the public chat surface
//! and the admin surface, served on separate ports under one runtime.
//!
//! Built on Axum for high performance async HTTP.

pub mod admin;
pub mod dispatch;
pub mod routes;

use std::sync::Arc;

use tracing::info;

use aigateway_analytics::Analytics;
use aigateway_cache::ResponseCache;
use aigateway_config::{ConfigStore, GatewayConfig};
use aigateway_logging::{Logger, LoggingConfig};
use aigateway_providers::AdapterRegistry;
use aigateway_ratelimit::RateLimiter;

/// Value of the `Server` response header.
pub const SERVER_HEADER: &str = concat!("ai-gateway/", env!("CARGO_PKG_VERSION"));

/// Shared application state: every singleton the handlers borrow.
///
/// Each component carries its own interior mutability, so the state itself is
/// immutable once built and shared as one `Arc`.
pub struct AppState {
    pub config: ConfigStore,
    pub registry: AdapterRegistry,
    pub cache: ResponseCache,
    pub limiter: RateLimiter,
    pub analytics: Analytics,
    pub logger: Logger,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    /// Build the runtime state from a validated file config, seeding the
    /// rate limiter and logger from their config sections.
    pub fn from_config(config: &GatewayConfig, registry: AdapterRegistry) -> Self {
        let limiter = RateLimiter::new();
        if let Some(plan) = &config.ratelimit.default {
            limiter.set_default_plan(Some(plan.clone()));
        }
        for client in &config.ratelimit.clients {
            limiter.set_client_plan(&client.ip, client.plan.clone());
        }

        let mut logging = config.logging.clone();
        logging.verbose = logging.verbose || config.gateway.verbose_logging;

        Self {
            config: ConfigStore::from_config(config),
            registry,
            cache: ResponseCache::new(),
            limiter,
            analytics: Analytics::new(),
            logger: Logger::new(logging),
        }
    }

    /// State with default components for tests.
    pub fn for_tests(registry: AdapterRegistry) -> Self {
        Self {
            config: ConfigStore::default(),
            registry,
            cache: ResponseCache::new(),
            limiter: RateLimiter::new(),
            analytics: Analytics::new(),
            logger: Logger::new(LoggingConfig::default()),
        }
    }
}

/// Start both listeners and serve until one of them fails.
pub async fn start(config: GatewayConfig) -> Result<(), Box<dyn std::error::Error>> {
    config.validate()?;

    let host = config.gateway.host.clone();
    let port = config.gateway.port;
    let admin_port = config.gateway.admin_port;

    let state = Arc::new(AppState::from_config(
        &config,
        AdapterRegistry::with_defaults(),
    ));

    let public = routes::public_router(state.clone());
    let admin = admin::admin_router(state.clone());

    let public_listener = tokio::net::TcpListener::bind(format!("{host}:{port}")).await?;
    let admin_listener = tokio::net::TcpListener::bind(format!("{host}:{admin_port}")).await?;

    info!(
        providers = ?state.config.configured_providers(),
        port,
        admin_port,
        "gateway starting"
    );

    tokio::try_join!(
        axum::serve(
            public_listener,
            public.into_make_service_with_connect_info::<std::net::SocketAddr>(),
        ),
        axum::serve(admin_listener, admin),
    )?;

    Ok(())
}
