use thiserror::Error;

use super::state::Phase;

/// Local, pre-send failures. Never change state or touch the network.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("select a scene first")]
    MissingScene,

    #[error("select your role")]
    MissingUserRole,

    #[error("select the AI's role")]
    MissingAiRole,

    #[error("unknown scene '{0}'")]
    UnknownScene(String),

    #[error("'{role}' is not a {side} role in scene '{scene}'")]
    RoleNotInScene {
        role: String,
        side: &'static str,
        scene: String,
    },

    #[error("not allowed while {0}")]
    WrongPhase(Phase),
}
