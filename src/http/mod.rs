//! Practice backend
//!
//! A small server speaking the same contract as the production backend, used by
//! the `serve` command and by end-to-end tests:
//! - GET /api/scenes - Scene catalog
//! - GET /api/config - Client configuration
//! - GET /health - Health check
//! - WebSocket at the socket path - acknowledges scene/role and session events

mod handlers;
mod routes;
mod socket;
mod state;

pub use routes::create_router;
pub use state::AppState;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;

/// Serve the practice backend on an already bound listener
pub async fn serve(listener: TcpListener, state: AppState, socket_path: &str) -> Result<()> {
    let addr = listener.local_addr().context("Listener has no local address")?;
    info!("Practice backend listening on http://{}", addr);

    axum::serve(listener, create_router(state, socket_path))
        .await
        .context("Practice backend stopped unexpectedly")
}
