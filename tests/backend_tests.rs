// Practice backend HTTP routes, exercised in-process through the router

use anyhow::Result;
use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use speaking_practice::catalog::ScenesResponse;
use speaking_practice::{create_router, AppState, CaptureConfig, SceneCatalog};
use tower::ServiceExt;

fn router() -> axum::Router {
    let state = AppState::new(SceneCatalog::builtin(), &CaptureConfig::default());
    create_router(state, "/ws/socket.io")
}

async fn get(uri: &str) -> Result<(StatusCode, Vec<u8>)> {
    let response = router()
        .oneshot(Request::builder().uri(uri).body(Body::empty())?)
        .await?;
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await?;
    Ok((status, body.to_vec()))
}

#[tokio::test]
async fn test_health() -> Result<()> {
    let (status, body) = get("/health").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, b"OK");
    Ok(())
}

#[tokio::test]
async fn test_scenes_match_builtin_catalog() -> Result<()> {
    let (status, body) = get("/api/scenes").await?;
    assert_eq!(status, StatusCode::OK);

    let response: ScenesResponse = serde_json::from_slice(&body)?;
    let ids: Vec<&str> = response.scenes.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec!["restaurant", "hotel", "airport", "shopping"]);

    let restaurant = &response.scenes[0];
    assert_eq!(restaurant.roles.user, vec!["customer", "waiter"]);
    assert_eq!(restaurant.roles.ai, vec!["waiter", "customer"]);
    Ok(())
}

#[tokio::test]
async fn test_config_reports_audio_constraints() -> Result<()> {
    let (status, body) = get("/api/config").await?;
    assert_eq!(status, StatusCode::OK);

    let config: serde_json::Value = serde_json::from_slice(&body)?;
    assert_eq!(config["audio_settings"]["sampleRate"], 16000);
    assert_eq!(config["audio_settings"]["channelCount"], 1);
    assert_eq!(config["audio_settings"]["echoCancellation"], true);
    Ok(())
}

#[tokio::test]
async fn test_unknown_route() -> Result<()> {
    let (status, _) = get("/api/nothing").await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    Ok(())
}
