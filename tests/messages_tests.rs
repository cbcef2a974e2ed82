// Wire format tests for the `{"event", "data"}` envelope

use serde_json::json;
use speaking_practice::channel::{
    Envelope, InboundEvent, MessageError, OutboundEvent, SceneRoleSelection, Speaker,
    TranslationUpdate,
};

#[test]
fn test_outbound_selection_payload() {
    let event = OutboundEvent::SelectSceneRole(SceneRoleSelection {
        scene: "restaurant".to_string(),
        user_role: "customer".to_string(),
        ai_role: "waiter".to_string(),
    });

    let text = event.to_envelope().unwrap().to_text().unwrap();
    let value: serde_json::Value = serde_json::from_str(&text).unwrap();

    assert_eq!(
        value,
        json!({
            "event": "select_scene_role",
            "data": {"scene": "restaurant", "user_role": "customer", "ai_role": "waiter"}
        })
    );
}

#[test]
fn test_outbound_session_commands_have_empty_body() {
    for (event, name) in [
        (OutboundEvent::StartSession, "start_session"),
        (OutboundEvent::StopSession, "stop_session"),
    ] {
        let envelope = event.to_envelope().unwrap();
        assert_eq!(envelope.event, name);
        assert_eq!(envelope.data, json!({}));
    }
}

#[test]
fn test_inbound_server_frames() {
    let confirmed = InboundEvent::parse(
        r#"{"event":"scene_role_confirmed","data":{"scene":"hotel","user_role":"guest","ai_role":"receptionist","status":"ready"}}"#,
    )
    .unwrap();
    match confirmed {
        InboundEvent::SceneRoleConfirmed(c) => {
            assert_eq!(c.scene, "hotel");
            assert_eq!(c.status.as_deref(), Some("ready"));
        }
        other => panic!("unexpected: {:?}", other),
    }

    let status = InboundEvent::parse(
        r#"{"event":"session_status","data":{"status":"inactive","message":"Session stopped"}}"#,
    )
    .unwrap();
    match status {
        InboundEvent::SessionStatus(s) => {
            assert!(!s.is_active());
            assert_eq!(s.message.as_deref(), Some("Session stopped"));
        }
        other => panic!("unexpected: {:?}", other),
    }

    // `data` may be absent on events without required fields
    assert!(matches!(
        InboundEvent::parse(r#"{"event":"connection_established"}"#).unwrap(),
        InboundEvent::ConnectionEstablished(_)
    ));
}

#[test]
fn test_transcription_update() {
    let update = InboundEvent::parse(
        r#"{"event":"transcription_update","data":{"speaker":"user","text":"お水をください"}}"#,
    )
    .unwrap();

    match update {
        InboundEvent::TranscriptionUpdate(t) => {
            assert_eq!(t.speaker, Speaker::User);
            assert_eq!(t.text, "お水をください");
            assert!(t.translation.is_none());
        }
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn test_translation_update() {
    let update = InboundEvent::parse(
        r#"{"event":"translation_update","data":{"speaker":"ai","translation":"Welcome"}}"#,
    )
    .unwrap();
    assert_eq!(
        update,
        InboundEvent::TranslationUpdate(TranslationUpdate {
            speaker: Some(Speaker::Ai),
            translation: "Welcome".to_string(),
        })
    );

    // Speaker is optional
    match InboundEvent::parse(r#"{"event":"translation_update","data":{"translation":"Water, please"}}"#)
        .unwrap()
    {
        InboundEvent::TranslationUpdate(t) => assert!(t.speaker.is_none()),
        other => panic!("unexpected: {:?}", other),
    }
}

#[test]
fn test_rejects_bad_frames() {
    assert!(matches!(
        InboundEvent::parse("{not json"),
        Err(MessageError::Malformed(_))
    ));
    assert!(matches!(
        InboundEvent::parse(r#"{"event":"select_scene_role","data":{}}"#),
        Err(MessageError::UnknownEvent(e)) if e == "select_scene_role"
    ));
    assert!(matches!(
        InboundEvent::parse(r#"{"event":"scene_role_confirmed","data":{"scene":"hotel"}}"#),
        Err(MessageError::InvalidPayload { event, .. }) if event == "scene_role_confirmed"
    ));
    assert!(matches!(
        InboundEvent::parse(r#"{"event":"transcription_update","data":{"speaker":"robot","text":"hi"}}"#),
        Err(MessageError::InvalidPayload { .. })
    ));
}

#[test]
fn test_envelope_round_trips_server_event() {
    let original = InboundEvent::SessionStatus(speaking_practice::channel::SessionStatus::active(
        "Session started",
    ));

    let text = original.to_envelope().unwrap().to_text().unwrap();
    let envelope = Envelope::parse(&text).unwrap();

    assert_eq!(envelope.event, "session_status");
    assert_eq!(InboundEvent::from_envelope(envelope).unwrap(), original);
}
