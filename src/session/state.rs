use serde::Serialize;
use std::fmt;

use crate::catalog::Scene;

/// Where the session stands relative to the backend
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Phase {
    /// Nothing selected yet
    #[default]
    Idle,
    /// `select_scene_role` sent, waiting for the server
    AwaitingConfirmation,
    /// Scene and roles acknowledged; conversation not running
    Confirmed,
    /// Server reports the session active
    Active,
    /// Server reports the session inactive
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::AwaitingConfirmation => "awaiting confirmation",
            Phase::Confirmed => "confirmed",
            Phase::Active => "active",
            Phase::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleSelection {
    pub user_role: String,
    pub ai_role: String,
}

/// The single session owned by `SessionController`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    scene: Option<Scene>,
    roles: Option<RoleSelection>,
    phase: Phase,
}

impl Session {
    pub fn scene(&self) -> Option<&Scene> {
        self.scene.as_ref()
    }

    pub fn roles(&self) -> Option<&RoleSelection> {
        self.roles.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    /// Scene and roles both recorded
    pub fn is_confirmed(&self) -> bool {
        self.scene.is_some() && self.roles.is_some()
    }

    /// Active implies a confirmed scene and roles
    pub fn invariant_holds(&self) -> bool {
        self.phase != Phase::Active || self.is_confirmed()
    }

    pub(crate) fn record(&mut self, scene: Scene, roles: RoleSelection) {
        self.scene = Some(scene);
        self.roles = Some(roles);
    }

    /// Returns the previous phase
    pub(crate) fn set_phase(&mut self, phase: Phase) -> Phase {
        std::mem::replace(&mut self.phase, phase)
    }

    pub(crate) fn reset(&mut self) {
        *self = Session::default();
    }
}
