mod api;
mod auth;
mod bus;
mod config;
mod error;
mod geo;
mod lifecycle;
mod models;
mod notify;
mod observability;
mod presence;
mod state;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::lifecycle::store::MemoryStore;
use crate::notify::LogOnlyGateway;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let http_port = config.http_port;
    let state = Arc::new(state::AppState::new(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(LogOnlyGateway),
    ));

    tokio::spawn(presence::run_retention_task(state.clone()));

    let app = api::rest::router(state);

    let bind_addr = format!("0.0.0.0:{http_port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
