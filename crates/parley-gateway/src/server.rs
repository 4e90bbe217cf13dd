// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::future::Future;

use axum::{
    Router,
    http::HeaderValue,
    middleware as axum_middleware,
    routing::{get, post},
};
use parley_core::ParleyError;
use parley_engine::Engine;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// Health state for the unauthenticated health endpoint.
#[derive(Clone)]
pub struct HealthState {
    pub start_time: std::time::Instant,
}

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub engine: Engine,
    pub auth: AuthConfig,
    pub health: HealthState,
}

impl GatewayState {
    pub fn new(engine: Engine, auth: AuthConfig) -> Self {
        Self {
            engine,
            auth,
            health: HealthState {
                start_time: std::time::Instant::now(),
            },
        }
    }
}

/// Gateway server configuration (mirrors `[server]` from parley-config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed to call the widget endpoints from a browser. Empty
    /// allows any origin.
    pub cors_origins: Vec<String>,
}

/// Build the full route table.
///
/// Public: `/health`, webhooks (authenticated per tenant by the engine), and
/// the customer side of the widget. Everything else needs the API key.
pub fn router(state: GatewayState, cors_origins: &[String]) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .route(
            "/webhooks/{provider}/{tenant_id}/{token}",
            post(handlers::post_webhook),
        )
        .route(
            "/widget/{tenant_id}/messages",
            post(handlers::post_widget_message),
        )
        .route(
            "/widget/{tenant_id}/sessions/{session_id}/messages",
            get(handlers::poll_widget),
        )
        .with_state(state.clone());

    let api_routes = Router::new()
        .route(
            "/widget/{tenant_id}/responses",
            post(handlers::post_widget_response),
        )
        .route("/v1/tenants/{tenant_id}/messages", post(handlers::post_message))
        .route(
            "/v1/tenants/{tenant_id}/conversations",
            get(handlers::list_conversations),
        )
        .route(
            "/v1/tenants/{tenant_id}/conversations/{id}",
            axum::routing::patch(handlers::patch_conversation),
        )
        .route(
            "/v1/tenants/{tenant_id}/conversations/{id}/messages",
            get(handlers::list_messages),
        )
        .route(
            "/v1/tenants/{tenant_id}/conversations/{id}/read",
            post(handlers::mark_read),
        )
        .route(
            "/v1/tenants/{tenant_id}/blacklist/{address}",
            post(handlers::add_blacklist).delete(handlers::remove_blacklist),
        )
        .route(
            "/v1/tenants/{tenant_id}/provider/health",
            get(handlers::provider_health),
        )
        .route_layer(axum_middleware::from_fn_with_state(
            state.auth.clone(),
            auth_middleware,
        ))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.is_empty() {
        return CorsLayer::permissive();
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                tracing::warn!(origin = %o, "ignoring unparseable CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::permissive().allow_origin(AllowOrigin::list(allowed))
}

/// Bind and serve until `shutdown` resolves.
pub async fn start_server<F>(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: F,
) -> Result<(), ParleyError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(state, &config.cors_origins);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| ParleyError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("Gateway server listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| ParleyError::Internal(format!("gateway server error: {e}")))?;

    tracing::info!("Gateway server stopped");
    Ok(())
}
