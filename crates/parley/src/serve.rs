// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `parley serve` command implementation.
//!
//! Opens SQLite storage, assembles the engine over the configured tenants
//! and serves the HTTP gateway until SIGTERM or Ctrl+C.

use std::sync::Arc;

use parley_config::model::ParleyConfig;
use parley_core::{MessageStore, ParleyError};
use parley_engine::{Engine, EngineSettings, StaticConfigStore};
use parley_gateway::{AuthConfig, GatewayState, ServerConfig, start_server};
use parley_storage::SqliteStore;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Runs the `parley serve` command.
pub async fn run_serve(config: ParleyConfig) -> Result<(), ParleyError> {
    init_tracing(&config.logging.level);

    info!(tenants = config.tenants.len(), "starting parley serve");

    let storage = Arc::new(SqliteStore::new(config.storage.clone()));
    storage.initialize().await?;
    let store: Arc<dyn MessageStore> = storage.clone();

    let configs = Arc::new(StaticConfigStore::from_tenants(&config.tenants));
    let engine = Engine::new(store, configs, EngineSettings::from_config(&config));

    if config.server.api_key.is_none() {
        warn!("server.api_key is not set, management API requests will be rejected");
    }

    let cancel = install_signal_handler();
    let event_log = tokio::spawn(log_events(engine.subscribe(), cancel.clone()));

    let server_config = ServerConfig {
        host: config.server.bind_address.clone(),
        port: config.server.port,
        cors_origins: config.server.cors_origins.clone(),
    };
    let state = GatewayState::new(
        engine,
        AuthConfig {
            api_key: config.server.api_key.clone(),
        },
    );

    let shutdown = cancel.clone();
    let result = start_server(&server_config, state, async move {
        shutdown.cancelled().await;
    })
    .await;

    cancel.cancel();
    if let Err(e) = event_log.await {
        debug!(error = %e, "event log task ended abnormally");
    }

    if let Err(e) = storage.checkpoint().await {
        warn!(error = %e, "WAL checkpoint on shutdown failed");
    }
    info!("parley stopped");
    result
}

/// Installs handlers for SIGTERM and SIGINT.
///
/// The returned token is cancelled when either signal arrives.
fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let token_clone = token.clone();

    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        {
            use tokio::signal::unix::{SignalKind, signal};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
                        _ = sigterm.recv() => info!("received SIGTERM, initiating shutdown"),
                        _ = token_clone.cancelled() => return,
                    }
                }
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler, Ctrl+C only");
                    tokio::select! {
                        _ = ctrl_c => info!("received SIGINT (Ctrl+C), initiating shutdown"),
                        _ = token_clone.cancelled() => return,
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                _ = ctrl_c => info!("received Ctrl+C, initiating shutdown"),
                _ = token_clone.cancelled() => return,
            }
        }

        token_clone.cancel();
        debug!("shutdown signal handler completed");
    });

    token
}

/// Mirrors notification events into the log until shutdown.
async fn log_events(
    mut events: broadcast::Receiver<parley_engine::NotificationEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            received = events.recv() => match received {
                Ok(event) => debug!(tenant_id = event.tenant_id(), ?event, "notification"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "event log lagged behind the notification bus");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }
}

/// Initialize the tracing subscriber. `RUST_LOG` overrides `logging.level`.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("parley={log_level},warn")));

    // A subscriber may already be installed when embedded in tests.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .try_init();
}
