use super::state::AppState;
use crate::catalog::ScenesResponse;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};

/// GET /api/scenes
/// Available scenes and their roles
pub async fn get_scenes(State(state): State<AppState>) -> impl IntoResponse {
    Json(ScenesResponse {
        scenes: state.catalog.scenes().to_vec(),
    })
}

/// GET /api/config
/// Client configuration (audio constraints, languages)
pub async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.app_config.as_ref().clone())
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
