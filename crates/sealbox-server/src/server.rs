//! Server startup and lifecycle

use crate::{AppState, ServerConfig, routes};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Run the sealbox server
pub async fn run_server(config: ServerConfig) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    run_with_listener(config, listener).await
}

/// Run the server on an already-bound listener
///
/// Tests bind port 0 and read the local address back before calling
/// this.
pub async fn run_with_listener(config: ServerConfig, listener: TcpListener) -> anyhow::Result<()> {
    let state = Arc::new(AppState::new(config)?);
    let app = routes::create_router(state);

    info!("sealbox server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Run the server with graceful shutdown
pub async fn run_server_with_shutdown(
    config: ServerConfig,
    shutdown_signal: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr).await?;
    let state = Arc::new(AppState::new(config)?);
    let app = routes::create_router(state);

    info!("sealbox server listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("server shutdown complete");
    Ok(())
}
