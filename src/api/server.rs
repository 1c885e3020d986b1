//! Axum server setup and startup

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use super::routes::create_router;
use crate::bridge::Bridge;

/// Serve the API on `addr` until `shutdown_rx` changes.
pub async fn run_server(
    addr: SocketAddr,
    bridge: Arc<Bridge>,
    mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
) -> Result<(), std::io::Error> {
    // Classroom front ends are served from other origins
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(bridge).layer(cors);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("[api] Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.changed().await;
            info!("[api] Shutting down");
        })
        .await
}
