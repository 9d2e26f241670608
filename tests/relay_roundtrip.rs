//! End-to-end: real relay on an ephemeral port, real HTTP client.

use std::time::Duration;

use chatpoll::relay::{self, RelayState};
use chatpoll::{ChatEvent, ClientConfig, EventKind, MessageType, PollingSyncClient, RelayConfig};
use tokio::sync::mpsc;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(3);

async fn start_relay() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(relay::serve(listener, RelayState::new(RelayConfig::default())));
    format!("http://{addr}")
}

fn client(base_url: &str, user_id: &str, user_name: &str) -> PollingSyncClient {
    let config = ClientConfig { polling_interval: Duration::from_millis(50), ..ClientConfig::with_base_url(base_url) };
    let client = PollingSyncClient::new(&config).expect("client should build");
    client.identify(user_id, user_name);
    client
}

fn messages(client: &PollingSyncClient) -> mpsc::UnboundedReceiver<ChatEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    client.on(EventKind::Message, move |event| {
        let _ = tx.send(event.clone());
    });
    rx
}

async fn next_body(rx: &mut mpsc::UnboundedReceiver<ChatEvent>) -> String {
    match timeout(WAIT, rx.recv()).await {
        Ok(Some(ChatEvent::Message(message))) => message.body,
        other => panic!("expected a message event, got {other:?}"),
    }
}

#[tokio::test]
async fn two_clients_exchange_messages_through_relay() {
    let base_url = start_relay().await;
    let ann = client(&base_url, "u1", "Ann");
    let bo = client(&base_url, "u2", "Bo");
    let mut bo_inbox = messages(&bo);
    let mut ann_inbox = messages(&ann);

    assert!(ann.health_check().await);
    assert!(ann.join_room("appointment_1").await);
    assert!(bo.join_room("appointment_1").await);

    let users = ann.active_users("appointment_1").await;
    let names: Vec<&str> = users.iter().map(|u| u.user_name.as_str()).collect();
    assert_eq!(names, vec!["Ann", "Bo"]);

    let sent = ann
        .send_message("appointment_1", "  first  ", MessageType::Text)
        .await
        .expect("relay should accept the message");
    assert_eq!(sent.body, "first");
    assert_eq!(sent.sender_id, "u1");
    assert_eq!(next_body(&mut ann_inbox).await, "first");

    ann.send_text("appointment_1", "second").await.expect("second send");
    ann.send_text("appointment_1", "third").await.expect("third send");

    assert_eq!(next_body(&mut bo_inbox).await, "first");
    assert_eq!(next_body(&mut bo_inbox).await, "second");
    assert_eq!(next_body(&mut bo_inbox).await, "third");

    // Several more ticks pass without redelivery.
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(bo_inbox.try_recv().is_err());

    let history = bo.latest_messages("appointment_1").await;
    let bodies: Vec<&str> = history.messages.iter().map(|m| m.body.as_str()).collect();
    assert_eq!(bodies, vec!["first", "second", "third"]);
    assert!(!history.has_more);

    let older = bo
        .get_message_history("appointment_1", 10, Some(history.messages[1].timestamp))
        .await;
    assert!(older.messages.iter().all(|m| m.timestamp < history.messages[1].timestamp));

    assert!(bo.leave_room("appointment_1").await);
    assert!(!bo.is_polling());
    assert_eq!(ann.active_users("appointment_1").await.len(), 1);

    ann.disconnect();
    bo.disconnect();
}

#[tokio::test]
async fn relay_validation_surfaces_as_error_event() {
    let base_url = start_relay().await;
    let anon = PollingSyncClient::new(&ClientConfig::with_base_url(&base_url)).expect("client should build");
    let (tx, mut errors) = mpsc::unbounded_channel();
    anon.on(EventKind::Error, move |event| {
        let _ = tx.send(event.clone());
    });

    assert!(!anon.join_room("r1").await);
    match timeout(WAIT, errors.recv()).await {
        Ok(Some(ChatEvent::Error { message, .. })) => assert_eq!(message, "userId and userName are required"),
        other => panic!("expected an error event, got {other:?}"),
    }
    assert!(anon.send_text("r1", "hello").await.is_none());
}

#[tokio::test]
async fn unreachable_relay_reads_unhealthy() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("local addr");
    drop(listener);

    let client = client(&format!("http://{addr}"), "u1", "Ann");
    assert!(!client.health_check().await);
    assert!(client.latest_messages("r1").await.messages.is_empty());
}
