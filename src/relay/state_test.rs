use super::*;
use time::Duration;
use time::macros::datetime;

const T0: OffsetDateTime = datetime!(2025-03-01 10:00:00 UTC);

fn draft(body: &str) -> NewMessage {
    NewMessage {
        sender_id: "u1".into(),
        sender_name: "Ann".into(),
        body: body.into(),
        message_type: MessageType::Text,
    }
}

fn log_with(count: i64) -> RoomLog {
    let mut log = RoomLog::default();
    for i in 0..count {
        log.append("r1", draft(&format!("m{i}")), T0 + Duration::seconds(i), 1000);
    }
    log
}

fn bodies(page: &MessagePage) -> Vec<&str> {
    page.messages.iter().map(|m| m.body.as_str()).collect()
}

fn query(limit: usize) -> PageQuery {
    PageQuery { limit, before: None, after: None }
}

// =============================================================================
// append
// =============================================================================

#[test]
fn append_assigns_ids_and_sequence() {
    let mut log = RoomLog::default();
    let a = log.append("r1", draft("a"), T0, 10);
    let b = log.append("r1", draft("b"), T0 + Duration::seconds(1), 10);
    assert_eq!(a.seq, Some(1));
    assert_eq!(b.seq, Some(2));
    assert_ne!(a.id, b.id);
    assert!(a.id.starts_with("msg_"));
    assert_eq!(a.room_id, "r1");
}

#[test]
fn append_never_moves_timestamp_backwards() {
    let mut log = RoomLog::default();
    log.append("r1", draft("a"), T0, 10);
    let skewed = log.append("r1", draft("b"), T0 - Duration::seconds(5), 10);
    assert_eq!(skewed.timestamp, T0);
}

#[test]
fn append_drops_oldest_beyond_cap() {
    let mut log = RoomLog::default();
    for i in 0..5 {
        log.append("r1", draft(&format!("m{i}")), T0 + Duration::seconds(i), 3);
    }
    assert_eq!(log.len(), 3);
    assert_eq!(bodies(&log.page(query(10))), vec!["m2", "m3", "m4"]);
    // Sequence keeps counting across evictions.
    assert_eq!(log.page(query(1)).messages[0].seq, Some(5));
}

// =============================================================================
// page
// =============================================================================

#[test]
fn latest_page_is_newest_in_chronological_order() {
    let page = log_with(5).page(query(2));
    assert_eq!(bodies(&page), vec!["m3", "m4"]);
    assert!(page.has_more);

    let page = log_with(2).page(query(50));
    assert_eq!(bodies(&page), vec!["m0", "m1"]);
    assert!(!page.has_more);
}

#[test]
fn before_is_strictly_older() {
    let q = PageQuery { limit: 10, before: Some(T0 + Duration::seconds(2)), after: None };
    let page = log_with(5).page(q);
    assert_eq!(bodies(&page), vec!["m0", "m1"]);
    assert!(!page.has_more);

    let q = PageQuery { limit: 1, before: Some(T0 + Duration::seconds(3)), after: None };
    let page = log_with(5).page(q);
    assert_eq!(bodies(&page), vec!["m2"]);
    assert!(page.has_more);
}

#[test]
fn after_is_inclusive_and_oldest_first() {
    let q = PageQuery { limit: 2, before: None, after: Some(T0 + Duration::seconds(2)) };
    let page = log_with(5).page(q);
    assert_eq!(bodies(&page), vec!["m2", "m3"]);
    assert!(page.has_more);
}

#[test]
fn after_beyond_newest_is_empty() {
    let q = PageQuery { limit: 20, before: None, after: Some(T0 + Duration::minutes(1)) };
    let page = log_with(3).page(q);
    assert!(page.messages.is_empty());
    assert!(!page.has_more);
}

#[test]
fn zero_limit_returns_nothing() {
    let page = log_with(3).page(query(0));
    assert!(page.messages.is_empty());
    assert!(page.has_more);
}

// =============================================================================
// store
// =============================================================================

#[test]
fn unknown_room_pages_empty() {
    let store = RelayStore::new();
    assert_eq!(store.page("nowhere", query(50)), MessagePage::default());
    assert_eq!(store.active_rooms(), 0);
}

#[test]
fn join_tracks_presence_per_room() {
    let mut store = RelayStore::new();
    store.join("r1", "u1", "Ann", T0);
    store.join("r2", "u1", "Ann", T0);
    let users = store.join("r1", "u2", "Bo", T0 + Duration::seconds(1));

    let ids: Vec<&str> = users.iter().map(|u| u.user_id.as_str()).collect();
    assert_eq!(ids, vec!["u1", "u2"]);
    assert_eq!(store.active_users("r2").len(), 1);
    assert_eq!(store.active_connections(), 3);
}

#[test]
fn rejoin_keeps_joined_at() {
    let mut store = RelayStore::new();
    store.join("r1", "u1", "Ann", T0);
    let users = store.join("r1", "u1", "Annie", T0 + Duration::seconds(30));
    assert_eq!(users.len(), 1);
    assert_eq!(users[0].joined_at, T0);
    assert_eq!(users[0].last_seen, T0 + Duration::seconds(30));
    assert_eq!(users[0].user_name, "Annie");
}

#[test]
fn leave_only_affects_that_room() {
    let mut store = RelayStore::new();
    store.join("r1", "u1", "Ann", T0);
    store.join("r2", "u1", "Ann", T0);

    assert!(store.leave("r1", "u1"));
    assert!(!store.leave("r1", "u1"));
    assert!(store.active_users("r1").is_empty());
    assert_eq!(store.active_users("r2").len(), 1);
    assert!(!store.presence.contains_key("r1"));
}

#[test]
fn post_refreshes_sender_last_seen() {
    let mut store = RelayStore::new();
    store.join("r1", "u1", "Ann", T0);
    let later = T0 + Duration::seconds(10);
    store.post("r1", draft("hi"), later, 1000);

    assert_eq!(store.active_users("r1")[0].last_seen, later);
    assert_eq!(store.active_rooms(), 1);
}
