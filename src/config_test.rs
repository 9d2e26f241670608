use super::*;
use std::sync::Mutex;

static ENV_LOCK: Mutex<()> = Mutex::new(());

/// # Safety
/// Callers hold `ENV_LOCK` so no other test in this module touches the
/// environment concurrently.
unsafe fn clear_chat_env() {
    unsafe {
        std::env::remove_var("CHAT_API_BASE_URL");
        std::env::remove_var("CHAT_POLL_INTERVAL_MS");
        std::env::remove_var("CHAT_REQUEST_TIMEOUT_SECS");
        std::env::remove_var("CHAT_CONNECT_TIMEOUT_SECS");
        std::env::remove_var("PORT");
        std::env::remove_var("RELAY_ROOM_MESSAGE_CAP");
        std::env::remove_var("RELAY_DEFAULT_HISTORY_LIMIT");
    }
}

#[test]
fn client_from_env_defaults() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe { clear_chat_env() };

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg, ClientConfig::default());
    assert_eq!(cfg.api_base_url, "");
    assert_eq!(cfg.polling_interval, Duration::from_millis(3000));
    assert_eq!(cfg.timeouts, HttpTimeouts { request_secs: 30, connect_secs: 10 });
}

#[test]
fn client_from_env_parses_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_chat_env();
        std::env::set_var("CHAT_API_BASE_URL", "https://chat.example.test/");
        std::env::set_var("CHAT_POLL_INTERVAL_MS", "250");
        std::env::set_var("CHAT_REQUEST_TIMEOUT_SECS", "5");
        std::env::set_var("CHAT_CONNECT_TIMEOUT_SECS", "2");
    }

    let cfg = ClientConfig::from_env().unwrap();
    assert_eq!(cfg.api_base_url, "https://chat.example.test");
    assert_eq!(cfg.polling_interval, Duration::from_millis(250));
    assert_eq!(cfg.timeouts, HttpTimeouts { request_secs: 5, connect_secs: 2 });

    unsafe { clear_chat_env() };
}

#[test]
fn client_from_env_rejects_zero_interval() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe {
        clear_chat_env();
        std::env::set_var("CHAT_POLL_INTERVAL_MS", "0");
    }

    let err = ClientConfig::from_env().unwrap_err();
    assert!(err.to_string().contains("CHAT_POLL_INTERVAL_MS"));

    unsafe { clear_chat_env() };
}

#[test]
fn relay_from_env_defaults_and_overrides() {
    let _guard = ENV_LOCK.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    unsafe { clear_chat_env() };
    assert_eq!(RelayConfig::from_env(), RelayConfig::default());

    unsafe {
        std::env::set_var("PORT", "8081");
        std::env::set_var("RELAY_ROOM_MESSAGE_CAP", "0");
        std::env::set_var("RELAY_DEFAULT_HISTORY_LIMIT", "10");
    }
    let cfg = RelayConfig::from_env();
    assert_eq!(cfg.port, 8081);
    assert_eq!(cfg.room_message_cap, 1);
    assert_eq!(cfg.default_history_limit, 10);

    unsafe { clear_chat_env() };
}

#[test]
fn parse_poll_interval_cases() {
    assert_eq!(parse_poll_interval(None), Ok(DEFAULT_POLL_INTERVAL_MS));
    assert_eq!(parse_poll_interval(Some(" 1500 ")), Ok(1500));
    assert!(parse_poll_interval(Some("fast")).is_err());
    assert!(parse_poll_interval(Some("0")).is_err());
}

#[test]
fn with_base_url_trims_trailing_slash() {
    let cfg = ClientConfig::with_base_url("http://127.0.0.1:3000/");
    assert_eq!(cfg.api_base_url, "http://127.0.0.1:3000");
    assert_eq!(cfg.polling_interval, Duration::from_millis(DEFAULT_POLL_INTERVAL_MS));
}
