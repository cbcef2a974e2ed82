use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Wire frame: `{"event": "<name>", "data": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl Envelope {
    pub fn new(event: &str, data: impl Serialize) -> Result<Self, MessageError> {
        Ok(Self {
            event: event.to_string(),
            data: serde_json::to_value(data).map_err(MessageError::Malformed)?,
        })
    }

    pub fn parse(text: &str) -> Result<Self, MessageError> {
        serde_json::from_str(text).map_err(MessageError::Malformed)
    }

    pub fn to_text(&self) -> Result<String, MessageError> {
        serde_json::to_string(self).map_err(MessageError::Malformed)
    }

    fn payload<T: DeserializeOwned>(self) -> Result<T, MessageError> {
        // Events without a body may omit `data` entirely
        let data = if self.data.is_null() {
            Value::Object(Default::default())
        } else {
            self.data
        };
        serde_json::from_value(data).map_err(|source| MessageError::InvalidPayload {
            event: self.event,
            source,
        })
    }
}

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("malformed frame: {0}")]
    Malformed(#[source] serde_json::Error),

    #[error("unknown event '{0}'")]
    UnknownEvent(String),

    #[error("invalid '{event}' payload: {source}")]
    InvalidPayload {
        event: String,
        #[source]
        source: serde_json::Error,
    },
}

// ============================================================================
// Client -> server
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneRoleSelection {
    pub scene: String,
    pub user_role: String,
    pub ai_role: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Empty {}

/// Events the client sends
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    SelectSceneRole(SceneRoleSelection),
    StartSession,
    StopSession,
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OutboundEvent::SelectSceneRole(_) => "select_scene_role",
            OutboundEvent::StartSession => "start_session",
            OutboundEvent::StopSession => "stop_session",
        }
    }

    pub fn to_envelope(&self) -> Result<Envelope, MessageError> {
        match self {
            OutboundEvent::SelectSceneRole(selection) => Envelope::new(self.name(), selection),
            OutboundEvent::StartSession | OutboundEvent::StopSession => {
                Envelope::new(self.name(), Empty {})
            }
        }
    }

    pub fn from_envelope(envelope: Envelope) -> Result<Self, MessageError> {
        match envelope.event.as_str() {
            "select_scene_role" => Ok(OutboundEvent::SelectSceneRole(envelope.payload()?)),
            "start_session" => Ok(OutboundEvent::StartSession),
            "stop_session" => Ok(OutboundEvent::StopSession),
            _ => Err(MessageError::UnknownEvent(envelope.event)),
        }
    }
}

// ============================================================================
// Server -> client
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionEstablished {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneRoleConfirmed {
    pub scene: String,
    pub user_role: String,
    pub ai_role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl SessionStatus {
    pub const ACTIVE: &'static str = "active";
    pub const INACTIVE: &'static str = "inactive";

    pub fn active(message: impl Into<String>) -> Self {
        Self {
            status: Self::ACTIVE.to_string(),
            message: Some(message.into()),
        }
    }

    pub fn inactive(message: impl Into<String>) -> Self {
        Self {
            status: Self::INACTIVE.to_string(),
            message: Some(message.into()),
        }
    }

    /// Anything other than "active" counts as stopped
    pub fn is_active(&self) -> bool {
        self.status == Self::ACTIVE
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioReceived {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Who said a transcribed line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Ai,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptionUpdate {
    pub speaker: Speaker,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<String>,
}

/// Events the server sends
/// Late translation for the newest message (from `speaker`, when given)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<Speaker>,
    pub translation: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    ConnectionEstablished(ConnectionEstablished),
    SceneRoleConfirmed(SceneRoleConfirmed),
    SessionStatus(SessionStatus),
    AudioReceived(AudioReceived),
    TranscriptionUpdate(TranscriptionUpdate),
    TranslationUpdate(TranslationUpdate),
}

impl InboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            InboundEvent::ConnectionEstablished(_) => "connection_established",
            InboundEvent::SceneRoleConfirmed(_) => "scene_role_confirmed",
            InboundEvent::SessionStatus(_) => "session_status",
            InboundEvent::AudioReceived(_) => "audio_received",
            InboundEvent::TranscriptionUpdate(_) => "transcription_update",
            InboundEvent::TranslationUpdate(_) => "translation_update",
        }
    }

    pub fn to_envelope(&self) -> Result<Envelope, MessageError> {
        match self {
            InboundEvent::ConnectionEstablished(data) => Envelope::new(self.name(), data),
            InboundEvent::SceneRoleConfirmed(data) => Envelope::new(self.name(), data),
            InboundEvent::SessionStatus(data) => Envelope::new(self.name(), data),
            InboundEvent::AudioReceived(data) => Envelope::new(self.name(), data),
            InboundEvent::TranscriptionUpdate(data) => Envelope::new(self.name(), data),
            InboundEvent::TranslationUpdate(data) => Envelope::new(self.name(), data),
        }
    }

    pub fn from_envelope(envelope: Envelope) -> Result<Self, MessageError> {
        match envelope.event.as_str() {
            "connection_established" => Ok(InboundEvent::ConnectionEstablished(envelope.payload()?)),
            "scene_role_confirmed" => Ok(InboundEvent::SceneRoleConfirmed(envelope.payload()?)),
            "session_status" => Ok(InboundEvent::SessionStatus(envelope.payload()?)),
            "audio_received" => Ok(InboundEvent::AudioReceived(envelope.payload()?)),
            "transcription_update" => Ok(InboundEvent::TranscriptionUpdate(envelope.payload()?)),
            "translation_update" => Ok(InboundEvent::TranslationUpdate(envelope.payload()?)),
            _ => Err(MessageError::UnknownEvent(envelope.event)),
        }
    }

    /// Parse and validate one text frame
    pub fn parse(text: &str) -> Result<Self, MessageError> {
        Self::from_envelope(Envelope::parse(text)?)
    }
}
