//! Authgate Server
//!
//! The server handles:
//! - Email/password sign-in against the configured user store
//! - Federated sign-in (Google) when client credentials are configured
//! - Stateless JWT sessions

use std::time::Duration;

use anyhow::Context;
use authgate_server::{create_app, init_tracing, AppState, ServerConfig};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info};

/// How often expired authorization states are dropped.
const STATE_CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::load().context("Failed to load configuration")?;

    init_tracing(&config.log_level);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = ?config.auth.environment,
        "Starting Authgate Server"
    );

    let state = AppState::new(config.clone())
        .await
        .context("Failed to initialize application state")?;

    let app = create_app(state.clone());

    // Start authorization state cleanup task
    let cleanup_state = state.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(STATE_CLEANUP_INTERVAL);
        loop {
            interval.tick().await;
            match cleanup_state.authenticator.cleanup_expired_states().await {
                Ok(0) => {}
                Ok(count) => info!(count, "Cleaned up expired authorization states"),
                Err(e) => error!(error = %e, "Failed to clean up authorization states"),
            }
        }
    });

    let listener = TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!(address = %config.bind_address, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        }
    }
}
