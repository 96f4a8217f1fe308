//! HTTP server lifecycle.

use std::net::SocketAddr;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::routes;
use crate::state::AppState;

/// Router with request tracing attached.
pub fn app(state: AppState) -> Router {
    routes::router(state).layer(TraceLayer::new_for_http())
}

/// Bind `addr` and serve until the process is stopped.
pub async fn run(state: AppState, addr: &str) -> std::io::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    serve(state, listener).await
}

/// Serve on an already-bound listener.
pub async fn serve(state: AppState, listener: TcpListener) -> std::io::Result<()> {
    let local: Option<SocketAddr> = listener.local_addr().ok();
    info!(
        addr = ?local,
        relay = state.relay.display_name(),
        "Parlor backend listening"
    );

    axum::serve(listener, app(state)).await
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
