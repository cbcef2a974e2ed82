//! Scene catalog
//!
//! Scenes are loaded once at startup from the backend's `GET /api/scenes` and
//! never change afterwards. The practice backend serves `SceneCatalog::builtin()`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("scene catalog is empty")]
    Empty,
}

/// Roles each participant may play in a scene
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneRoles {
    pub user: Vec<String>,
    pub ai: Vec<String>,
}

/// A practice scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scene {
    pub id: String,
    pub name: String,
    pub icon: String,
    pub roles: SceneRoles,
}

impl Scene {
    pub fn has_user_role(&self, role: &str) -> bool {
        self.roles.user.iter().any(|r| r == role)
    }

    pub fn has_ai_role(&self, role: &str) -> bool {
        self.roles.ai.iter().any(|r| r == role)
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ScenesResponse {
    pub scenes: Vec<Scene>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SceneCatalog {
    scenes: Vec<Scene>,
}

impl SceneCatalog {
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self { scenes }
    }

    /// Restaurant, hotel, airport and shopping scenes
    pub fn builtin() -> Self {
        fn scene(id: &str, name: &str, icon: &str, a: &str, b: &str) -> Scene {
            Scene {
                id: id.into(),
                name: name.into(),
                icon: icon.into(),
                roles: SceneRoles {
                    user: vec![a.into(), b.into()],
                    ai: vec![b.into(), a.into()],
                },
            }
        }

        Self::new(vec![
            scene("restaurant", "Restaurant", "🍽️", "customer", "waiter"),
            scene("hotel", "Hotel", "🏨", "guest", "receptionist"),
            scene("airport", "Airport", "✈️", "passenger", "staff"),
            scene("shopping", "Shopping", "🛍️", "customer", "clerk"),
        ])
    }

    pub fn get(&self, id: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == id)
    }

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// `GET {base_url}/api/scenes`
    pub async fn fetch(client: &reqwest::Client, base_url: &str) -> Result<Self, CatalogError> {
        let url = format!("{}/api/scenes", base_url.trim_end_matches('/'));
        let response: ScenesResponse = get_json(client, &url).await?;

        if response.scenes.is_empty() {
            return Err(CatalogError::Empty);
        }

        info!("Loaded {} scenes from {}", response.scenes.len(), url);
        Ok(Self::new(response.scenes))
    }
}

/// `GET {base_url}/api/config`; the payload is opaque to the client
pub async fn fetch_app_config(client: &reqwest::Client, base_url: &str) -> Result<Value, CatalogError> {
    let url = format!("{}/api/config", base_url.trim_end_matches('/'));
    get_json(client, &url).await
}

async fn get_json<T: serde::de::DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
) -> Result<T, CatalogError> {
    let wrap = |source| CatalogError::Request {
        url: url.to_string(),
        source,
    };

    client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(wrap)?
        .json::<T>()
        .await
        .map_err(wrap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_catalog_has_four_scenes() {
        let catalog = SceneCatalog::builtin();
        assert_eq!(catalog.scenes().len(), 4);

        let restaurant = catalog.get("restaurant").unwrap();
        assert!(restaurant.has_user_role("customer"));
        assert!(restaurant.has_ai_role("waiter"));
        assert!(!restaurant.has_ai_role("guest"));
    }

    #[test]
    fn parses_scenes_response() {
        let json = r#"{
            "scenes": [
                {"id": "hotel", "name": "Hotel", "icon": "🏨",
                 "roles": {"user": ["guest"], "ai": ["receptionist"]}}
            ]
        }"#;

        let response: ScenesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.scenes[0].id, "hotel");
        assert_eq!(response.scenes[0].roles.ai, vec!["receptionist"]);
    }
}
