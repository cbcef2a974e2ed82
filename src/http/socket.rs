use super::state::AppState;
use crate::channel::messages::{
    AudioReceived, ConnectionEstablished, Envelope, InboundEvent, OutboundEvent, SceneRoleConfirmed,
    SessionStatus,
};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use tracing::{error, info, warn};

/// GET <socket path>
/// Upgrade to the event channel
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let client_id = uuid::Uuid::new_v4();
    let open = state.connection_opened();
    info!("Client connected: {} ({} open)", client_id, open);

    let greeting = InboundEvent::ConnectionEstablished(ConnectionEstablished {
        status: Some("connected".to_string()),
        timestamp: Some(chrono::Utc::now().to_rfc3339()),
    });

    if send_event(&mut socket, &greeting).await {
        while let Some(frame) = socket.recv().await {
            match frame {
                Ok(Message::Text(text)) => {
                    let Some(reply) = respond(&text) else {
                        continue;
                    };
                    if !send_event(&mut socket, &reply).await {
                        break;
                    }
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    warn!("Socket error from {}: {}", client_id, e);
                    break;
                }
            }
        }
    }

    state.connection_closed();
    info!(
        "Client disconnected: {} ({} open)",
        client_id,
        state.connection_count()
    );
}

/// Acknowledgement for one client frame, if any
fn respond(text: &str) -> Option<InboundEvent> {
    let envelope = match Envelope::parse(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!("Ignoring malformed frame: {}", e);
            return None;
        }
    };

    // Raw audio is acknowledged but never processed
    if envelope.event == "audio_data" {
        info!("Audio data received");
        return Some(InboundEvent::AudioReceived(AudioReceived {
            status: Some("received".to_string()),
            message: Some("Audio received (not processed)".to_string()),
        }));
    }

    match OutboundEvent::from_envelope(envelope) {
        Ok(OutboundEvent::SelectSceneRole(selection)) => {
            info!(
                "Scene selected: {}, User role: {}, AI role: {}",
                selection.scene, selection.user_role, selection.ai_role
            );
            Some(InboundEvent::SceneRoleConfirmed(SceneRoleConfirmed {
                scene: selection.scene,
                user_role: selection.user_role,
                ai_role: selection.ai_role,
                status: Some("ready".to_string()),
            }))
        }
        Ok(OutboundEvent::StartSession) => {
            info!("Session start requested");
            Some(InboundEvent::SessionStatus(SessionStatus::active(
                "Session started",
            )))
        }
        Ok(OutboundEvent::StopSession) => {
            info!("Session stop requested");
            Some(InboundEvent::SessionStatus(SessionStatus::inactive(
                "Session stopped",
            )))
        }
        Err(e) => {
            warn!("Ignoring client frame: {}", e);
            None
        }
    }
}

/// Returns false when the socket is gone
async fn send_event(socket: &mut WebSocket, event: &InboundEvent) -> bool {
    let text = match event.to_envelope().and_then(|e| e.to_text()) {
        Ok(text) => text,
        Err(e) => {
            error!("Failed to encode {}: {}", event.name(), e);
            return true;
        }
    };

    socket.send(Message::Text(text)).await.is_ok()
}
