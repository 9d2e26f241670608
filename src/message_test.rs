use super::*;
use time::macros::datetime;

#[test]
fn message_type_known_and_unknown_tags() {
    assert_eq!(MessageType::from("text"), MessageType::Text);
    assert_eq!(MessageType::from("image"), MessageType::Other("image".into()));
    assert_eq!(MessageType::Other("file".into()).as_str(), "file");
    assert_eq!(MessageType::default().to_string(), "text");
}

#[test]
fn chat_message_parses_relay_payload() {
    let json = serde_json::json!({
        "id": "msg_1",
        "message": "hello",
        "senderId": "u1",
        "senderName": "Ann",
        "messageType": "text",
        "timestamp": "2025-03-01T10:15:30.000Z",
        "roomId": "appointment_12345"
    });
    let msg: ChatMessage = serde_json::from_value(json).unwrap();
    assert_eq!(msg.id, "msg_1");
    assert_eq!(msg.body, "hello");
    assert_eq!(msg.room_id, "appointment_12345");
    assert_eq!(msg.message_type, MessageType::Text);
    assert_eq!(msg.timestamp, datetime!(2025-03-01 10:15:30 UTC));
    assert!(msg.seq.is_none());
}

#[test]
fn chat_message_defaults_missing_type_to_text() {
    let json = serde_json::json!({
        "id": "m2",
        "message": "x",
        "senderId": "u1",
        "senderName": "Ann",
        "timestamp": "2025-03-01T10:15:30Z",
        "roomId": "r1",
        "seq": 7
    });
    let msg: ChatMessage = serde_json::from_value(json).unwrap();
    assert_eq!(msg.message_type, MessageType::Text);
    assert_eq!(msg.seq, Some(7));
}

#[test]
fn chat_message_serializes_body_as_message_field() {
    let msg = ChatMessage {
        id: "m1".into(),
        room_id: "r1".into(),
        sender_id: "u1".into(),
        sender_name: "Ann".into(),
        body: "hi".into(),
        message_type: MessageType::Other("system".into()),
        timestamp: datetime!(2025-03-01 10:15:30 UTC),
        seq: None,
    };
    let value = serde_json::to_value(&msg).unwrap();
    assert_eq!(value["message"], "hi");
    assert_eq!(value["messageType"], "system");
    assert_eq!(value["senderName"], "Ann");
    assert!(value.get("body").is_none());
    assert!(value.get("seq").is_none());
}

#[test]
fn chat_message_rejects_non_rfc3339_timestamp() {
    let json = serde_json::json!({
        "id": "m1",
        "message": "x",
        "senderId": "u1",
        "senderName": "Ann",
        "timestamp": "yesterday",
        "roomId": "r1"
    });
    assert!(serde_json::from_value::<ChatMessage>(json).is_err());
}

#[test]
fn message_page_defaults_has_more() {
    let page: MessagePage = serde_json::from_str(r#"{"messages":[]}"#).unwrap();
    assert!(page.messages.is_empty());
    assert!(!page.has_more);
}
