//! # community-board
//!
//! The entry point that assembles the application from configuration and
//! compile-time features, then serves the HTTP API.

use std::sync::Arc;

use anyhow::Context;
use api_adapters::{router, AppState, Metrics};
use community_board::{telemetry, wiring};
use configs::Settings;
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load().context("loading configuration")?;
    telemetry::init_tracing(&settings.log);

    let backend = wiring::build_backend(&settings).await?;
    let metrics = Arc::new(Metrics::new());
    let state = AppState::new(backend, metrics, settings.media.max_upload_bytes);
    let app = router(state, &settings.server.cors_origins);

    let address = settings.server.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("binding {address}"))?;
    info!(%address, backend = ?settings.database.backend, "community board listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
