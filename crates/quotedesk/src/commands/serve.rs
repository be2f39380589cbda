//! The `serve` command.

use anyhow::Context;
use quotedesk_core::Config;
use quotedesk_server::{create_router, spawn_audit_logger, AppState};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{info, warn};

const AUDIT_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Run the HTTP server until Ctrl-C, then close the lock store.
pub async fn run_server(config: Config, address: Option<SocketAddr>) -> anyhow::Result<()> {
    let address = match address {
        Some(address) => address,
        None => config
            .server_address()
            .parse()
            .with_context(|| format!("Invalid server address: {}", config.server_address()))?,
    };

    let state = AppState::from_config(&config)?;
    let audit = spawn_audit_logger(&state.bus);
    let app = create_router(state.clone());

    let listener = tokio::net::TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!(
        lock_ttl_seconds = state.locks().ttl().as_secs(),
        "Server listening on http://{}", address
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.shutdown().await?;

    // The audit logger exits once every bus handle is gone, after draining
    // whatever is still queued.
    drop(state);
    match tokio::time::timeout(AUDIT_DRAIN_TIMEOUT, audit).await {
        Ok(Ok(written)) => info!(records = written, "Audit log closed"),
        Ok(Err(e)) => warn!(error = %e, "Audit logger failed"),
        Err(_) => warn!("Audit logger did not drain before shutdown"),
    }
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down"),
        Err(e) => {
            warn!(error = %e, "Could not listen for Ctrl-C; graceful shutdown disabled");
            std::future::pending::<()>().await;
        }
    }
}
