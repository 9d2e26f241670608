use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::{Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use chatpoll::config::{ClientConfig, HttpTimeouts, RelayConfig, parse_poll_interval};
use chatpoll::relay::{self, RelayState};
use chatpoll::{ApiError, ChatEvent, ConfigError, EventKind, MessageType, PollingSyncClient};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("client setup failed: {0}")]
    Api(#[from] ApiError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("invalid --before timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("could not join room {0}")]
    JoinFailed(String),
    #[error("message was not accepted")]
    SendFailed,
    #[error("chat relay is unhealthy or unreachable")]
    Unhealthy,
}

#[derive(Parser, Debug)]
#[command(name = "chatpoll", about = "Polling chat client and relay")]
struct Cli {
    #[arg(long, env = "CHAT_API_BASE_URL", default_value = "http://127.0.0.1:3000")]
    base_url: String,

    #[arg(long, env = "CHAT_USER_ID", default_value = "cli")]
    user_id: String,

    #[arg(long, env = "CHAT_USER_NAME", default_value = "CLI")]
    user_name: String,

    #[arg(long, env = "CHAT_POLL_INTERVAL_MS")]
    poll_interval_ms: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the in-memory relay.
    Serve {
        #[arg(long, env = "PORT")]
        port: Option<u16>,
    },
    /// Join a room and print events until Ctrl-C.
    Watch { room: String },
    /// Post one message.
    Send {
        room: String,
        text: String,
        #[arg(long, default_value = "text")]
        message_type: String,
    },
    /// Print one page of history.
    History {
        room: String,
        #[arg(long, default_value_t = chatpoll::config::DEFAULT_HISTORY_LIMIT)]
        limit: usize,
        /// RFC 3339 instant; only older messages are returned.
        #[arg(long)]
        before: Option<String>,
    },
    /// List users present in a room.
    Users { room: String },
    /// Check that the relay is up.
    Health,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    // stdout carries the JSON output; logs go to stderr.
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let cli = Cli::parse();
    if let Command::Serve { port } = cli.command {
        return run_serve(port).await;
    }
    let client = build_client(&cli)?;
    run_client(&client, &cli.command).await
}

fn build_client(cli: &Cli) -> Result<PollingSyncClient, CliError> {
    let interval_ms = parse_poll_interval(cli.poll_interval_ms.as_deref())?;
    let config = ClientConfig {
        polling_interval: Duration::from_millis(interval_ms),
        timeouts: HttpTimeouts::from_env(),
        ..ClientConfig::with_base_url(&cli.base_url)
    };
    let client = PollingSyncClient::new(&config)?;
    client.identify(cli.user_id.clone(), cli.user_name.clone());
    Ok(client)
}

async fn run_serve(port: Option<u16>) -> Result<(), CliError> {
    let mut config = RelayConfig::from_env();
    if let Some(port) = port {
        config.port = port;
    }
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port)).await?;
    relay::serve(listener, RelayState::new(config)).await?;
    Ok(())
}

async fn run_client(client: &PollingSyncClient, command: &Command) -> Result<(), CliError> {
    match command {
        Command::Serve { .. } => Ok(()),
        Command::Watch { room } => run_watch(client, room).await,
        Command::Send { room, text, message_type } => {
            let kind = MessageType::from(message_type.as_str());
            let message = client
                .send_message(room, text, kind)
                .await
                .ok_or(CliError::SendFailed)?;
            print_json(&serde_json::to_value(message)?)
        }
        Command::History { room, limit, before } => {
            let before = before
                .as_deref()
                .map(|raw| OffsetDateTime::parse(raw, &Rfc3339).map_err(|e| CliError::InvalidTimestamp(e.to_string())))
                .transpose()?;
            let page = client.get_message_history(room, *limit, before).await;
            print_json(&serde_json::to_value(page)?)
        }
        Command::Users { room } => {
            let users = client.active_users(room).await;
            print_json(&json!({ "activeUsers": users, "count": users.len() }))
        }
        Command::Health => {
            if !client.health_check().await {
                return Err(CliError::Unhealthy);
            }
            println!("ok");
            Ok(())
        }
    }
}

async fn run_watch(client: &PollingSyncClient, room: &str) -> Result<(), CliError> {
    for kind in [EventKind::Message, EventKind::RoomJoined, EventKind::RoomLeft, EventKind::Error] {
        client.on(kind, |event| println!("{}", event_json(event)));
    }

    if !client.join_room(room).await {
        client.disconnect();
        return Err(CliError::JoinFailed(room.to_owned()));
    }
    tokio::signal::ctrl_c().await?;
    if !client.leave_room(room).await {
        tracing::warn!(room, "leave failed before disconnect");
    }
    client.disconnect();
    Ok(())
}

fn event_json(event: &ChatEvent) -> Value {
    match event {
        ChatEvent::Message(message) => json!({ "event": "message", "message": message }),
        ChatEvent::RoomJoined { room_id, active_users } => {
            json!({ "event": "room_joined", "roomId": room_id, "activeUsers": active_users })
        }
        ChatEvent::RoomLeft { room_id } => json!({ "event": "room_left", "roomId": room_id }),
        ChatEvent::Error { kind, message } => json!({ "event": "error", "kind": kind, "message": message }),
    }
}

fn print_json(value: &Value) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
