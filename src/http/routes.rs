use super::handlers;
use super::socket;
use super::state::AppState;
use axum::{routing::get, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the practice backend router.
///
/// `socket_path` is where the event channel is mounted (e.g. `/ws/socket.io`).
pub fn create_router(state: AppState, socket_path: &str) -> Router {
    let socket_path = format!("/{}", socket_path.trim_start_matches('/'));

    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Catalog and client config
        .route("/api/scenes", get(handlers::get_scenes))
        .route("/api/config", get(handlers::get_config))
        // Event channel
        .route(&socket_path, get(socket::ws_handler))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
