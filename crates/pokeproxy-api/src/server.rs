//! HTTP server configuration and request routing.
//!
//! Requests flow through middleware in order:
//! 1. Request ID generation
//! 2. Request/response tracing
//! 3. Timeout enforcement
//! 4. Per-client rate limiting (stricter on `/stream`)
//! 5. Handler execution
//!
//! # Graceful Shutdown
//!
//! On CTRL+C or SIGTERM the server stops accepting connections and lets
//! in-flight requests, including their outbound deliveries, complete.

use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use axum::{
    extract::{DefaultBodyLimit, Request},
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use pokeproxy_core::{rules::Rule, stats::StatsStore};
use pokeproxy_delivery::DeliveryClient;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    config::{Config, MatchMode},
    handlers,
    middleware::rate_limit::{rate_limit_middleware, spawn_cleanup, ClientRateLimiter},
};

/// How often idle rate limit state is pruned.
const RATE_LIMIT_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Shared application state.
///
/// Rules and secret are immutable after startup; the stats store is the only
/// mutable shared state.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Routing rules in declared order.
    pub rules: Arc<[Rule]>,
    /// Base64 HMAC secret, if configured.
    pub secret: Option<Arc<str>>,
    /// Outbound delivery client.
    pub client: DeliveryClient,
    /// Per-destination statistics.
    pub stats: Arc<StatsStore>,
    /// First-match or all-matches dispatch.
    pub match_mode: MatchMode,
    /// Largest accepted request body.
    pub max_payload_bytes: usize,
    /// Whole-request timeout.
    pub request_timeout: Duration,
    /// Limiter for `/stream`.
    pub stream_limiter: ClientRateLimiter,
    /// Limiter for all other routes.
    pub default_limiter: ClientRateLimiter,
}

impl AppState {
    /// Builds state from configuration and loaded rules.
    ///
    /// # Errors
    ///
    /// Returns an error if the delivery client cannot be built or a rate
    /// limit is malformed.
    pub fn from_config(config: &Config, rules: Vec<Rule>, stats: Arc<StatsStore>) -> Result<Self> {
        let client = DeliveryClient::new(config.to_client_config())
            .context("Failed to create delivery client")?;

        if config.enc_secret.is_none() {
            warn!("ENC_SECRET is not set; /stream will reject every request");
        }

        Ok(Self {
            rules: rules.into(),
            secret: config.enc_secret.as_deref().map(Arc::from),
            client,
            stats,
            match_mode: config.match_mode,
            max_payload_bytes: config.max_payload_bytes,
            request_timeout: Duration::from_secs(config.request_timeout),
            stream_limiter: ClientRateLimiter::new(config.stream_quota()?),
            default_limiter: ClientRateLimiter::new(config.default_quota()?),
        })
    }
}

/// Creates the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
///
/// use pokeproxy_api::{create_router, AppState, Config};
/// use pokeproxy_core::StatsStore;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::load()?;
/// let state = AppState::from_config(&config, Vec::new(), Arc::new(StatsStore::new()))?;
/// let app = create_router(state);
/// # Ok(())
/// # }
/// ```
pub fn create_router(state: AppState) -> Router {
    let stream_routes = Router::new()
        .route("/stream", post(handlers::stream))
        .layer(DefaultBodyLimit::max(state.max_payload_bytes))
        .layer(middleware::from_fn_with_state(state.stream_limiter.clone(), rate_limit_middleware));

    let other_routes = Router::new()
        .route("/stats", get(handlers::get_stats))
        .route("/health", get(handlers::health_check))
        .route("/test-destination", post(handlers::test_destination))
        .layer(middleware::from_fn_with_state(
            state.default_limiter.clone(),
            rate_limit_middleware,
        ));

    Router::new()
        .merge(stream_routes)
        .merge(other_routes)
        .layer(TimeoutLayer::new(state.request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(inject_request_id))
        .with_state(state)
}

/// Middleware to inject request ID into all responses.
///
/// Adds X-Request-Id header for tracing requests across services.
async fn inject_request_id(req: Request, next: Next) -> Response {
    let request_id = Uuid::new_v4().to_string();

    let mut req = req;
    req.extensions_mut().insert(request_id.clone());

    let mut response = next.run(req).await;

    if let Ok(header_value) = request_id.parse() {
        response.headers_mut().insert("X-Request-Id", header_value);
    }

    response
}

/// Starts the HTTP server with graceful shutdown support.
///
/// Serves with peer addresses attached so rate limiting can key on the
/// client IP.
///
/// # Errors
///
/// Returns `std::io::Error` if the address cannot be bound.
pub async fn start_server(state: AppState, addr: SocketAddr) -> Result<(), std::io::Error> {
    spawn_cleanup(
        vec![state.stream_limiter.clone(), state.default_limiter.clone()],
        RATE_LIMIT_CLEANUP_INTERVAL,
    );
    let app = create_router(state);

    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let actual_addr = listener.local_addr()?;

    info!("HTTP server listening on {}", actual_addr);

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped gracefully");
    Ok(())
}

/// Waits for shutdown signal (CTRL+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received CTRL+C, starting graceful shutdown");
        },
        () = terminate => {
            info!("Received SIGTERM, starting graceful shutdown");
        },
    }

    warn!("Waiting for in-flight requests to complete");
}
