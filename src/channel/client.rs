use futures::{SinkExt, StreamExt};
use std::collections::VecDeque;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use super::messages::{InboundEvent, OutboundEvent};
use super::policy::{ConnectionState, ReconnectPolicy};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("invalid endpoint '{0}': expected http(s):// or ws(s):// URL")]
    InvalidEndpoint(String),
}

/// Everything the channel reports to its subscriber, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A connection was established
    Connected,
    /// An established connection ended, or attempts ran out
    Disconnected { reason: String },
    /// A connection attempt failed; `attempt` is 0 for the initial try
    ConnectError { attempt: u32, message: String },
    /// Validated application event from the server
    Message(InboundEvent),
}

/// Fire-and-forget outbound side of a channel
pub trait EventSink: Send {
    fn send(&self, event: OutboundEvent);
}

enum Command {
    Send(OutboundEvent),
    Reconnect,
    Close,
}

/// Cloneable sender for outbound events
#[derive(Clone)]
pub struct ChannelSender {
    commands: mpsc::UnboundedSender<Command>,
}

impl EventSink for ChannelSender {
    fn send(&self, event: OutboundEvent) {
        debug!("Queueing outbound {}", event.name());
        if self.commands.send(Command::Send(event)).is_err() {
            warn!("Message channel closed, outbound event dropped");
        }
    }
}

/// Reconnecting WebSocket event channel
pub struct MessageChannel {
    endpoint: String,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<ConnectionState>,
    task: JoinHandle<()>,
}

impl MessageChannel {
    /// Build the socket URL from the backend base URL and socket path
    pub fn endpoint_url(base_url: &str, path: &str) -> Result<String, ChannelError> {
        let base = base_url.trim_end_matches('/');
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else if base.starts_with("ws://") || base.starts_with("wss://") {
            base.to_string()
        } else {
            return Err(ChannelError::InvalidEndpoint(base_url.to_string()));
        };

        let path = path.trim_start_matches('/');
        Ok(format!("{}/{}", ws_base, path))
    }

    /// Start connecting in the background.
    ///
    /// Returns the channel handle and the receiver for channel events.
    pub fn connect(
        endpoint: impl Into<String>,
        policy: ReconnectPolicy,
    ) -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let endpoint = endpoint.into();
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ConnectionState::default());

        info!(
            "Message channel connecting to {} (retry every {}ms, max {} attempts)",
            endpoint, policy.delay_ms, policy.max_attempts
        );

        let task = tokio::spawn(run(
            endpoint.clone(),
            policy,
            commands_rx,
            events_tx,
            state_tx,
        ));

        (
            Self {
                endpoint,
                commands: commands_tx,
                state: state_rx,
                task,
            },
            events_rx,
        )
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn sender(&self) -> ChannelSender {
        ChannelSender {
            commands: self.commands.clone(),
        }
    }

    /// Queue an event; delivered once connected
    pub fn send(&self, event: OutboundEvent) {
        self.sender().send(event);
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    /// Restart attempts after retries were exhausted
    pub fn reconnect(&self) {
        let _ = self.commands.send(Command::Reconnect);
    }

    /// Close the connection and stop reconnecting
    pub async fn close(self) {
        let _ = self.commands.send(Command::Close);
        if let Err(e) = self.task.await {
            error!("Message channel task panicked: {}", e);
        }
    }
}

enum SessionEnd {
    /// Shut down on request
    Closed,
    /// Connection lost
    Dropped(String),
}

async fn run(
    endpoint: String,
    policy: ReconnectPolicy,
    mut commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<ChannelEvent>,
    state: watch::Sender<ConnectionState>,
) {
    let mut attempt: u32 = 0;
    let mut pending: VecDeque<OutboundEvent> = VecDeque::new();

    loop {
        match connect_async(endpoint.as_str()).await {
            Ok((socket, _)) => {
                attempt = 0;
                state.send_replace(ConnectionState::connected());
                info!("Connected to {}", endpoint);
                let _ = events.send(ChannelEvent::Connected);

                match serve(socket, &mut commands, &events, &mut pending).await {
                    SessionEnd::Closed => {
                        state.send_replace(ConnectionState::disconnected(0));
                        info!("Message channel closed");
                        return;
                    }
                    SessionEnd::Dropped(reason) => {
                        warn!("Disconnected from {}: {}", endpoint, reason);
                        state.send_replace(ConnectionState::disconnected(0));
                        let _ = events.send(ChannelEvent::Disconnected { reason });
                    }
                }
            }
            Err(e) => {
                error!("Connection error (attempt {}): {}", attempt, e);
                let _ = events.send(ChannelEvent::ConnectError {
                    attempt,
                    message: e.to_string(),
                });
            }
        }

        if !policy.allows(attempt) {
            warn!("Giving up on {} after {} attempts", endpoint, attempt);
            state.send_replace(ConnectionState::disconnected(attempt));
            let _ = events.send(ChannelEvent::Disconnected {
                reason: format!("reconnection failed after {} attempts", attempt),
            });

            if !wait_for_reconnect(&mut commands, &mut pending).await {
                return;
            }
            info!("Manual reconnect requested");
            attempt = 0;
            continue;
        }

        attempt += 1;
        state.send_replace(ConnectionState::reconnecting(attempt));
        if !back_off(policy.delay(), &mut commands, &mut pending).await {
            state.send_replace(ConnectionState::disconnected(attempt));
            return;
        }
    }
}

/// Pump one live connection until it drops or a close is requested
async fn serve(
    socket: Socket,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    events: &mpsc::UnboundedSender<ChannelEvent>,
    pending: &mut VecDeque<OutboundEvent>,
) -> SessionEnd {
    let (mut sink, mut stream) = socket.split();

    // Flush anything queued while disconnected, in order
    while let Some(event) = pending.pop_front() {
        if let Err(reason) = write_event(&mut sink, &event).await {
            pending.push_front(event);
            return SessionEnd::Dropped(reason);
        }
    }

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(Command::Send(event)) => {
                    if let Err(reason) = write_event(&mut sink, &event).await {
                        pending.push_front(event);
                        return SessionEnd::Dropped(reason);
                    }
                }
                Some(Command::Reconnect) => debug!("Already connected, reconnect ignored"),
                Some(Command::Close) | None => {
                    let _ = sink.close().await;
                    return SessionEnd::Closed;
                }
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => match InboundEvent::parse(&text) {
                    Ok(event) => {
                        debug!("Inbound {}", event.name());
                        let _ = events.send(ChannelEvent::Message(event));
                    }
                    Err(e) => warn!("Dropping invalid frame: {}", e),
                },
                Some(Ok(Message::Close(frame))) => {
                    let reason = frame
                        .map(|f| f.reason.to_string())
                        .filter(|r| !r.is_empty())
                        .unwrap_or_else(|| "server closed the connection".to_string());
                    return SessionEnd::Dropped(reason);
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => return SessionEnd::Dropped(e.to_string()),
                None => return SessionEnd::Dropped("connection lost".to_string()),
            },
        }
    }
}

async fn write_event<S>(sink: &mut S, event: &OutboundEvent) -> Result<(), String>
where
    S: futures::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
{
    let text = event
        .to_envelope()
        .and_then(|envelope| envelope.to_text())
        .map_err(|e| e.to_string())?;
    sink.send(Message::Text(text)).await.map_err(|e| e.to_string())?;
    debug!("Sent {}", event.name());
    Ok(())
}

/// Sleep for `delay` while still accepting commands.
///
/// Returns false when the channel should shut down.
async fn back_off(
    delay: std::time::Duration,
    commands: &mut mpsc::UnboundedReceiver<Command>,
    pending: &mut VecDeque<OutboundEvent>,
) -> bool {
    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            command = commands.recv() => match command {
                Some(Command::Send(event)) => pending.push_back(event),
                Some(Command::Reconnect) => {}
                Some(Command::Close) | None => return false,
            },
        }
    }
}

/// Park after exhausting attempts until a manual reconnect or shutdown
async fn wait_for_reconnect(
    commands: &mut mpsc::UnboundedReceiver<Command>,
    pending: &mut VecDeque<OutboundEvent>,
) -> bool {
    while let Some(command) = commands.recv().await {
        match command {
            Command::Send(event) => pending.push_back(event),
            Command::Reconnect => return true,
            Command::Close => return false,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_from_http_base() {
        assert_eq!(
            MessageChannel::endpoint_url("http://localhost:5000/", "/ws/socket.io").unwrap(),
            "ws://localhost:5000/ws/socket.io"
        );
    }

    #[test]
    fn endpoint_from_https_base() {
        assert_eq!(
            MessageChannel::endpoint_url("https://example.com", "ws").unwrap(),
            "wss://example.com/ws"
        );
    }

    #[test]
    fn endpoint_rejects_other_schemes() {
        assert!(MessageChannel::endpoint_url("ftp://example.com", "/ws").is_err());
    }
}
