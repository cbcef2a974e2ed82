// Integration tests for the reconnecting message channel
//
// Runs against the practice backend and against hand-rolled WebSocket
// servers bound to ephemeral local ports.

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use speaking_practice::channel::{
    ChannelEvent, ConnectionState, ConnectionStatus, InboundEvent, MessageChannel, OutboundEvent, ReconnectPolicy,
    SceneRoleSelection, SessionStatus,
};
use speaking_practice::{http, AppState, CaptureConfig, SceneCatalog};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

const SOCKET_PATH: &str = "/ws/socket.io";

fn fast_policy() -> ReconnectPolicy {
    ReconnectPolicy {
        delay_ms: 10,
        max_attempts: 5,
    }
}

async fn spawn_backend() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = AppState::new(SceneCatalog::builtin(), &CaptureConfig::default());
    tokio::spawn(http::serve(listener, state, SOCKET_PATH));
    Ok(format!("ws://{}{}", addr, SOCKET_PATH))
}

/// Address nothing is listening on
async fn closed_endpoint() -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    drop(listener);
    Ok(format!("ws://{}/ws", addr))
}

async fn next_event(events: &mut UnboundedReceiver<ChannelEvent>) -> ChannelEvent {
    timeout(Duration::from_secs(5), events.recv())
        .await
        .expect("timed out waiting for channel event")
        .expect("channel event stream ended")
}

/// Skip events until one matches
async fn wait_for<F>(events: &mut UnboundedReceiver<ChannelEvent>, mut matches: F) -> ChannelEvent
where
    F: FnMut(&ChannelEvent) -> bool,
{
    loop {
        let event = next_event(events).await;
        if matches(&event) {
            return event;
        }
    }
}

#[tokio::test]
async fn test_gives_up_after_max_attempts() -> Result<()> {
    let (channel, mut events) = MessageChannel::connect(closed_endpoint().await?, fast_policy());

    let mut attempts = Vec::new();
    loop {
        match next_event(&mut events).await {
            ChannelEvent::ConnectError { attempt, .. } => attempts.push(attempt),
            ChannelEvent::Disconnected { reason } => {
                assert!(reason.contains("5"), "unexpected reason: {}", reason);
                break;
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    // Initial try plus five retries
    assert_eq!(attempts, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(channel.connection_state(), ConnectionState::disconnected(5));

    // No further attempts once exhausted
    let quiet = timeout(Duration::from_millis(200), events.recv()).await;
    assert!(quiet.is_err(), "channel kept retrying: {:?}", quiet);

    channel.close().await;
    Ok(())
}

#[tokio::test]
async fn test_manual_reconnect_restarts_attempts() -> Result<()> {
    let (channel, mut events) = MessageChannel::connect(closed_endpoint().await?, fast_policy());

    wait_for(&mut events, |e| matches!(e, ChannelEvent::Disconnected { .. })).await;

    channel.reconnect();
    assert!(matches!(
        next_event(&mut events).await,
        ChannelEvent::ConnectError { attempt: 0, .. }
    ));

    channel.close().await;
    Ok(())
}

#[tokio::test]
async fn test_reconnecting_state_is_published() -> Result<()> {
    let (channel, mut events) = MessageChannel::connect(closed_endpoint().await?, fast_policy());
    let mut state = channel.watch_state();

    // The watch channel may coalesce updates, so only ordering is checked
    let mut seen = Vec::new();
    loop {
        timeout(Duration::from_secs(5), state.changed()).await??;
        let current = *state.borrow_and_update();
        match current.status {
            ConnectionStatus::Reconnecting => seen.push(current.attempt),
            ConnectionStatus::Disconnected if current.attempt == 5 => break,
            _ => {}
        }
    }
    assert!(!seen.is_empty());
    assert!(seen.windows(2).all(|w| w[0] < w[1]), "attempts out of order: {:?}", seen);
    assert!(seen.iter().all(|&a| (1..=5).contains(&a)));

    wait_for(&mut events, |e| matches!(e, ChannelEvent::Disconnected { .. })).await;
    channel.close().await;
    Ok(())
}

#[tokio::test]
async fn test_round_trip_with_practice_backend() -> Result<()> {
    let endpoint = spawn_backend().await?;
    let (channel, mut events) = MessageChannel::connect(endpoint, fast_policy());

    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);
    assert!(matches!(
        next_event(&mut events).await,
        ChannelEvent::Message(InboundEvent::ConnectionEstablished(_))
    ));
    assert!(channel.connection_state().is_connected());

    channel.send(OutboundEvent::SelectSceneRole(SceneRoleSelection {
        scene: "airport".to_string(),
        user_role: "passenger".to_string(),
        ai_role: "staff".to_string(),
    }));
    match next_event(&mut events).await {
        ChannelEvent::Message(InboundEvent::SceneRoleConfirmed(confirmed)) => {
            assert_eq!(confirmed.scene, "airport");
            assert_eq!(confirmed.user_role, "passenger");
            assert_eq!(confirmed.ai_role, "staff");
        }
        other => panic!("unexpected event: {:?}", other),
    }

    channel.send(OutboundEvent::StartSession);
    channel.send(OutboundEvent::StopSession);
    assert_eq!(
        next_event(&mut events).await,
        ChannelEvent::Message(InboundEvent::SessionStatus(SessionStatus::active(
            "Session started"
        )))
    );
    assert_eq!(
        next_event(&mut events).await,
        ChannelEvent::Message(InboundEvent::SessionStatus(SessionStatus::inactive(
            "Session stopped"
        )))
    );

    channel.close().await;
    Ok(())
}

#[tokio::test]
async fn test_sends_queued_before_connect_are_delivered_in_order() -> Result<()> {
    let endpoint = spawn_backend().await?;
    let (channel, mut events) = MessageChannel::connect(endpoint, fast_policy());

    // Queued before the handshake completes
    channel.send(OutboundEvent::StartSession);
    channel.send(OutboundEvent::StopSession);

    let statuses: Vec<bool> = {
        let mut statuses = Vec::new();
        while statuses.len() < 2 {
            if let ChannelEvent::Message(InboundEvent::SessionStatus(status)) =
                next_event(&mut events).await
            {
                statuses.push(status.is_active());
            }
        }
        statuses
    };
    assert_eq!(statuses, vec![true, false]);

    channel.close().await;
    Ok(())
}

#[tokio::test]
async fn test_invalid_frames_are_dropped() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws = tokio_tungstenite::accept_async(stream).await.expect("handshake");
        for frame in [
            "not json",
            r#"{"event":"dance","data":{}}"#,
            r#"{"event":"session_status","data":{"message":"no status field"}}"#,
            r#"{"event":"session_status","data":{"status":"active"}}"#,
        ] {
            ws.send(Message::Text(frame.to_string())).await.expect("send");
        }
        // Hold the connection open until the client leaves
        while let Some(Ok(_)) = ws.next().await {}
    });

    let (channel, mut events) = MessageChannel::connect(format!("ws://{}/ws", addr), fast_policy());

    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);
    assert_eq!(
        next_event(&mut events).await,
        ChannelEvent::Message(InboundEvent::SessionStatus(SessionStatus {
            status: "active".to_string(),
            message: None,
        }))
    );

    channel.close().await;
    Ok(())
}

#[tokio::test]
async fn test_reconnects_after_server_drops_connection() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        // First connection is closed right after the handshake
        let (stream, _) = listener.accept().await.expect("accept");
        let mut first = tokio_tungstenite::accept_async(stream).await.expect("handshake");
        first.close(None).await.expect("close");
        drop(first);

        let (stream, _) = listener.accept().await.expect("accept");
        let mut second = tokio_tungstenite::accept_async(stream).await.expect("handshake");
        while let Some(Ok(_)) = second.next().await {}
    });

    let (channel, mut events) = MessageChannel::connect(format!("ws://{}/ws", addr), fast_policy());

    assert_eq!(next_event(&mut events).await, ChannelEvent::Connected);
    assert!(matches!(
        next_event(&mut events).await,
        ChannelEvent::Disconnected { .. }
    ));
    wait_for(&mut events, |e| *e == ChannelEvent::Connected).await;
    assert!(channel.connection_state().is_connected());

    channel.close().await;
    Ok(())
}

#[tokio::test]
async fn test_backend_tracks_open_connections() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = AppState::new(SceneCatalog::builtin(), &CaptureConfig::default());
    tokio::spawn(http::serve(listener, state.clone(), SOCKET_PATH));
    assert_eq!(state.connection_count(), 0);

    let endpoint = format!("ws://{}{}", addr, SOCKET_PATH);
    let (channel, mut events) = MessageChannel::connect(endpoint, fast_policy());
    // The greeting is sent after the server has counted the socket
    wait_for(&mut events, |e| {
        matches!(e, ChannelEvent::Message(InboundEvent::ConnectionEstablished(_)))
    })
    .await;
    assert_eq!(state.connection_count(), 1);

    channel.close().await;
    timeout(Duration::from_secs(5), async {
        while state.connection_count() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await?;
    Ok(())
}
