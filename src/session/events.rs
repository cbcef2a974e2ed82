use serde::Serialize;

use super::error::ValidationError;
use super::state::{Phase, RoleSelection};
use super::transcript::ConversationMessage;
use crate::audio::CaptureError;
use crate::catalog::Scene;
use crate::channel::ConnectionState;

/// Scene and role choice for `request_start`; empty strings count as missing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartRequest {
    pub scene: Option<String>,
    pub user_role: Option<String>,
    pub ai_role: Option<String>,
}

impl StartRequest {
    pub fn new(scene: &str, user_role: &str, ai_role: &str) -> Self {
        Self {
            scene: Some(scene.to_string()),
            user_role: Some(user_role.to_string()),
            ai_role: Some(ai_role.to_string()),
        }
    }
}

/// What the learner asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserIntent {
    SelectScene(String),
    RequestStart(StartRequest),
    ToggleSession,
    /// Back to scene selection
    Reset,
    ClearHistory,
}

/// State changes for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SessionNotification {
    PhaseChanged {
        from: Phase,
        to: Phase,
    },
    /// Role pickers must be rebuilt from this scene
    RoleOptions {
        scene: Scene,
    },
    SceneConfirmed {
        scene: Scene,
        roles: RoleSelection,
    },
    ValidationFailed {
        message: String,
    },
    AudioUnavailable {
        message: String,
        permission_denied: bool,
    },
    ConnectionChanged {
        state: ConnectionState,
    },
    ConnectionError {
        message: String,
    },
    TranscriptAppended {
        message: ConversationMessage,
    },
    /// An existing message gained a translation
    TranslationUpdated {
        message: ConversationMessage,
    },
    HistoryCleared,
}

impl From<ValidationError> for SessionNotification {
    fn from(e: ValidationError) -> Self {
        SessionNotification::ValidationFailed {
            message: e.to_string(),
        }
    }
}

impl From<CaptureError> for SessionNotification {
    fn from(e: CaptureError) -> Self {
        SessionNotification::AudioUnavailable {
            permission_denied: e == CaptureError::PermissionDenied,
            message: e.to_string(),
        }
    }
}
