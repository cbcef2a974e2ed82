use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::error::ValidationError;
use super::events::{SessionNotification, StartRequest, UserIntent};
use super::state::{Phase, RoleSelection, Session};
use super::transcript::ConversationLog;
use crate::audio::AudioCapturePipeline;
use crate::catalog::{Scene, SceneCatalog};
use crate::channel::{
    ChannelEvent, ConnectionState, EventSink, InboundEvent, OutboundEvent, SceneRoleConfirmed,
    SceneRoleSelection, SessionStatus, TranscriptionUpdate, TranslationUpdate,
};

/// Session state machine.
///
/// Validates user intents, forwards them to the backend, and applies the
/// backend's acknowledgements. Every transition performs its side effects
/// before returning, so the next scheduled task always sees a settled state.
pub struct SessionController {
    catalog: SceneCatalog,
    session: Session,
    /// Scene picked in the selection UI, before any request is sent
    selected_scene: Option<Scene>,
    /// Selection sent with the last request, until the server confirms it
    pending: Option<SceneRoleSelection>,
    channel: Box<dyn EventSink>,
    audio: AudioCapturePipeline,
    notifications: mpsc::UnboundedSender<SessionNotification>,
    history: ConversationLog,
}

impl SessionController {
    pub fn new(
        catalog: SceneCatalog,
        channel: Box<dyn EventSink>,
        audio: AudioCapturePipeline,
        notifications: mpsc::UnboundedSender<SessionNotification>,
    ) -> Self {
        Self {
            catalog,
            session: Session::default(),
            selected_scene: None,
            pending: None,
            channel,
            audio,
            notifications,
            history: ConversationLog::new(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn phase(&self) -> Phase {
        self.session.phase()
    }

    pub fn catalog(&self) -> &SceneCatalog {
        &self.catalog
    }

    pub fn selected_scene(&self) -> Option<&Scene> {
        self.selected_scene.as_ref()
    }

    pub fn history(&self) -> &ConversationLog {
        &self.history
    }

    pub fn audio(&self) -> &AudioCapturePipeline {
        &self.audio
    }

    /// Apply one user intent; validation failures are reported, not returned
    pub async fn apply(&mut self, intent: UserIntent) {
        let result = match intent {
            UserIntent::SelectScene(id) => self.select_scene(&id).map(|_| ()),
            UserIntent::RequestStart(request) => self.request_start(request),
            UserIntent::ToggleSession => self.toggle_session(),
            UserIntent::Reset => {
                self.reset();
                Ok(())
            }
            UserIntent::ClearHistory => {
                self.clear_history();
                Ok(())
            }
        };

        if let Err(e) = result {
            self.notify(e.into());
        }
    }

    /// Choose a scene in the selection UI and publish its role options
    pub fn select_scene(&mut self, id: &str) -> Result<&Scene, ValidationError> {
        if self.phase() != Phase::Idle {
            return Err(ValidationError::WrongPhase(self.phase()));
        }

        let scene = self
            .catalog
            .get(id)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownScene(id.to_string()))?;

        info!("Scene selected: {}", scene.id);
        self.notify(SessionNotification::RoleOptions {
            scene: scene.clone(),
        });
        Ok(self.selected_scene.insert(scene))
    }

    /// Ask the backend to confirm a scene and roles.
    ///
    /// A missing scene falls back to the one picked with `select_scene`.
    pub fn request_start(&mut self, request: StartRequest) -> Result<(), ValidationError> {
        if self.phase() != Phase::Idle {
            return Err(ValidationError::WrongPhase(self.phase()));
        }

        let scene_id = non_empty(request.scene)
            .or_else(|| self.selected_scene.as_ref().map(|s| s.id.clone()))
            .ok_or(ValidationError::MissingScene)?;
        let user_role = non_empty(request.user_role).ok_or(ValidationError::MissingUserRole)?;
        let ai_role = non_empty(request.ai_role).ok_or(ValidationError::MissingAiRole)?;

        let scene = self.validate(&scene_id, &user_role, &ai_role)?;

        info!(
            "Requesting scene {} (user: {}, ai: {})",
            scene.id, user_role, ai_role
        );
        let selection = SceneRoleSelection {
            scene: scene.id.clone(),
            user_role,
            ai_role,
        };
        self.channel
            .send(OutboundEvent::SelectSceneRole(selection.clone()));
        self.pending = Some(selection);
        self.transition(Phase::AwaitingConfirmation);
        Ok(())
    }

    /// Start or stop the conversation on the backend.
    ///
    /// Only sends the request; the phase follows the server's `session_status`.
    pub fn toggle_session(&mut self) -> Result<(), ValidationError> {
        match self.phase() {
            Phase::Confirmed | Phase::Stopped => {
                info!("Requesting session start");
                self.channel.send(OutboundEvent::StartSession);
                self.transition(Phase::Confirmed);
                Ok(())
            }
            Phase::Active => {
                info!("Requesting session stop");
                self.channel.send(OutboundEvent::StopSession);
                Ok(())
            }
            phase @ (Phase::Idle | Phase::AwaitingConfirmation) => {
                Err(ValidationError::WrongPhase(phase))
            }
        }
    }

    /// Back to scene selection from any phase. Always stops audio.
    pub fn reset(&mut self) {
        if self.session.is_active() {
            self.channel.send(OutboundEvent::StopSession);
        }

        if let Err(e) = self.audio.stop() {
            warn!("Audio release reported an error during reset: {}", e);
        }

        let from = self.session.phase();
        self.session.reset();
        self.selected_scene = None;
        self.pending = None;

        info!("Session reset from {}", from);
        if from != Phase::Idle {
            self.notify(SessionNotification::PhaseChanged {
                from,
                to: Phase::Idle,
            });
        }
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
        self.notify(SessionNotification::HistoryCleared);
    }

    /// Route one channel event.
    ///
    /// Status changes arrive separately through `handle_connection_state`.
    pub async fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => info!("Channel connected"),
            ChannelEvent::Disconnected { reason } => {
                info!("Channel disconnected: {}", reason);
            }
            ChannelEvent::ConnectError { attempt, message } => {
                self.notify(SessionNotification::ConnectionError {
                    message: format!("connection attempt {} failed: {}", attempt, message),
                });
            }
            ChannelEvent::Message(inbound) => self.handle_inbound(inbound).await,
        }
    }

    /// Connection changes are shown, never acted on
    pub fn handle_connection_state(&mut self, state: ConnectionState) {
        self.notify(SessionNotification::ConnectionChanged { state });
    }

    /// Apply one server event. Repeats re-apply the same transition.
    pub async fn handle_inbound(&mut self, event: InboundEvent) {
        match event {
            InboundEvent::ConnectionEstablished(data) => {
                debug!("Connection established: {:?}", data);
            }
            InboundEvent::SceneRoleConfirmed(confirmed) => self.on_scene_role_confirmed(confirmed),
            InboundEvent::SessionStatus(status) => self.on_session_status(status).await,
            InboundEvent::AudioReceived(data) => {
                debug!("Audio acknowledged: {:?}", data);
            }
            InboundEvent::TranscriptionUpdate(update) => self.on_transcription(update),
            InboundEvent::TranslationUpdate(update) => self.on_translation(update),
        }
    }

    fn on_scene_role_confirmed(&mut self, confirmed: SceneRoleConfirmed) {
        if self.phase() == Phase::Idle {
            warn!(
                "Ignoring confirmation for {} received after reset",
                confirmed.scene
            );
            return;
        }

        if self.phase() == Phase::AwaitingConfirmation && !self.is_pending(&confirmed) {
            warn!(
                "Ignoring confirmation for {} ({} / {}), waiting on {:?}",
                confirmed.scene, confirmed.user_role, confirmed.ai_role, self.pending
            );
            return;
        }

        let scene = match self.validate(&confirmed.scene, &confirmed.user_role, &confirmed.ai_role) {
            Ok(scene) => scene,
            Err(e) => {
                error!("Server confirmed an invalid selection: {}", e);
                self.notify(e.into());
                return;
            }
        };

        let roles = RoleSelection {
            user_role: confirmed.user_role,
            ai_role: confirmed.ai_role,
        };

        info!(
            "Scene and role confirmed: {} (user: {}, ai: {})",
            scene.id, roles.user_role, roles.ai_role
        );
        self.session.record(scene.clone(), roles.clone());
        self.notify(SessionNotification::SceneConfirmed { scene, roles });

        if self.phase() == Phase::AwaitingConfirmation {
            self.pending = None;
            self.transition(Phase::Confirmed);
        }
    }

    /// Confirmation echoes the selection we are waiting on
    fn is_pending(&self, confirmed: &SceneRoleConfirmed) -> bool {
        self.pending.as_ref().is_some_and(|pending| {
            pending.scene == confirmed.scene
                && pending.user_role == confirmed.user_role
                && pending.ai_role == confirmed.ai_role
        })
    }

    async fn on_session_status(&mut self, status: SessionStatus) {
        info!("Session status: {}", status.status);

        if !self.session.is_confirmed() {
            // No scene to talk about; keep audio off and the phase as is
            warn!(
                "Session status '{}' received while {}, ignoring",
                status.status,
                self.phase()
            );
            if let Err(e) = self.audio.stop() {
                warn!("Audio release reported an error: {}", e);
            }
            return;
        }

        if status.is_active() {
            self.transition(Phase::Active);
            if let Err(e) = self.audio.start().await {
                warn!("Volume monitoring unavailable: {}", e);
                self.notify(e.into());
            }
        } else {
            if let Err(e) = self.audio.stop() {
                warn!("Audio release reported an error: {}", e);
            }
            self.transition(Phase::Stopped);
        }
    }

    fn on_transcription(&mut self, update: TranscriptionUpdate) {
        let message = self
            .history
            .add(update.speaker, update.text, update.translation)
            .clone();
        self.notify(SessionNotification::TranscriptAppended { message });
    }

    fn on_translation(&mut self, update: TranslationUpdate) {
        let Some(id) = self.history.latest(update.speaker) else {
            warn!("Translation received with no message to attach it to");
            return;
        };

        self.history.update_translation(id, update.translation);
        if let Some(message) = self.history.get(id).cloned() {
            self.notify(SessionNotification::TranslationUpdated { message });
        }
    }

    /// Scene must exist and both roles must belong to it
    fn validate(&self, scene_id: &str, user_role: &str, ai_role: &str) -> Result<Scene, ValidationError> {
        let scene = self
            .catalog
            .get(scene_id)
            .ok_or_else(|| ValidationError::UnknownScene(scene_id.to_string()))?;

        if !scene.has_user_role(user_role) {
            return Err(ValidationError::RoleNotInScene {
                role: user_role.to_string(),
                side: "user",
                scene: scene.id.clone(),
            });
        }
        if !scene.has_ai_role(ai_role) {
            return Err(ValidationError::RoleNotInScene {
                role: ai_role.to_string(),
                side: "AI",
                scene: scene.id.clone(),
            });
        }

        Ok(scene.clone())
    }

    fn transition(&mut self, to: Phase) {
        let from = self.session.set_phase(to);
        debug_assert!(self.session.invariant_holds());
        if from != to {
            debug!("Phase {} -> {}", from, to);
            self.notify(SessionNotification::PhaseChanged { from, to });
        }
    }

    fn notify(&self, notification: SessionNotification) {
        if self.notifications.send(notification).is_err() {
            debug!("No presentation subscriber");
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
