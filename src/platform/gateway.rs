//! Inbound event stream: a Discord gateway websocket client feeding the dispatcher.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;
use tokio::{sync::mpsc, time::Instant};
use tokio_tungstenite::{
    connect_async,
    tungstenite::{self, Message as WsMessage},
};
use tracing::{debug, error, info, warn};

use crate::dto::events::BotEvent;

/// Default gateway endpoint (API v10, JSON encoding).
pub const DEFAULT_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";

/// GUILDS | GUILD_MEMBERS | GUILD_MESSAGES | GUILD_MESSAGE_REACTIONS | MESSAGE_CONTENT.
pub const GATEWAY_INTENTS: u64 = 1 | (1 << 1) | (1 << 9) | (1 << 10) | (1 << 15);

const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(5);
const AUTHENTICATION_FAILED: u16 = 4004;
const DISALLOWED_INTENTS: u16 = 4014;

mod opcode {
    pub const DISPATCH: u8 = 0;
    pub const HEARTBEAT: u8 = 1;
    pub const IDENTIFY: u8 = 2;
    pub const RECONNECT: u8 = 7;
    pub const INVALID_SESSION: u8 = 9;
    pub const HELLO: u8 = 10;
    pub const HEARTBEAT_ACK: u8 = 11;
}

/// Connection settings for the gateway client.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Websocket URL, including the version and encoding query.
    pub url: String,
    /// Bot token sent in the identify payload.
    pub token: String,
    /// Pause between two sessions.
    pub reconnect_delay: Duration,
}

impl GatewayConfig {
    /// Settings with the default reconnect delay.
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
        }
    }
}

/// Errors raised by a gateway session.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The websocket handshake failed.
    #[error("failed to connect to gateway")]
    Connect {
        /// Handshake failure.
        #[source]
        source: tungstenite::Error,
    },
    /// Reading or writing a frame failed.
    #[error("gateway socket error")]
    Socket {
        /// Socket failure.
        #[source]
        source: tungstenite::Error,
    },
    /// A text frame was not a valid gateway payload.
    #[error("malformed gateway payload")]
    Decode {
        /// Decoding failure.
        #[source]
        source: serde_json::Error,
    },
    /// The server broke the expected opcode sequence.
    #[error("gateway protocol violation: {0}")]
    Protocol(String),
    /// The token was rejected; reconnecting cannot help.
    #[error("gateway rejected the bot token")]
    AuthenticationFailed,
    /// The requested intents are not enabled for the application.
    #[error("gateway refused the requested intents")]
    DisallowedIntents,
    /// The server closed the socket.
    #[error("gateway closed the connection (code {code:?})")]
    Closed {
        /// Close code, when one was sent.
        code: Option<u16>,
    },
}

impl GatewayError {
    /// Whether the client must stop instead of reconnecting.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            GatewayError::AuthenticationFailed | GatewayError::DisallowedIntents
        )
    }

    fn from_close_code(code: Option<u16>) -> Self {
        match code {
            Some(AUTHENTICATION_FAILED) => GatewayError::AuthenticationFailed,
            Some(DISALLOWED_INTENTS) => GatewayError::DisallowedIntents,
            code => GatewayError::Closed { code },
        }
    }
}

/// Raw gateway frame.
#[derive(Debug, Deserialize, PartialEq)]
struct GatewayPayload {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Hello {
    heartbeat_interval: u64,
}

enum SessionEnd {
    /// The gateway asked for a fresh session, or heartbeats went unacknowledged.
    Reconnect,
    /// Nobody consumes events anymore.
    ReceiverClosed,
}

/// Keep a gateway session alive and forward decoded events to `events`.
///
/// Transient failures reconnect after [`GatewayConfig::reconnect_delay`]. Returns
/// `Ok(())` once the receiving side is dropped and an error for fatal closes.
pub async fn run(config: GatewayConfig, events: mpsc::Sender<BotEvent>) -> Result<(), GatewayError> {
    loop {
        match run_session(&config, &events).await {
            Ok(SessionEnd::ReceiverClosed) => {
                info!("event receiver dropped; stopping gateway client");
                return Ok(());
            }
            Ok(SessionEnd::Reconnect) => info!("gateway session ended; reconnecting"),
            Err(err) if err.is_fatal() => {
                error!(error = %err, "fatal gateway error");
                return Err(err);
            }
            Err(err) => warn!(error = %err, "gateway session failed"),
        }
        tokio::time::sleep(config.reconnect_delay).await;
    }
}

async fn run_session(
    config: &GatewayConfig,
    events: &mpsc::Sender<BotEvent>,
) -> Result<SessionEnd, GatewayError> {
    let (stream, _response) = connect_async(config.url.as_str())
        .await
        .map_err(|source| GatewayError::Connect { source })?;
    let (mut sink, mut frames) = stream.split();

    let heartbeat_interval = loop {
        let Some(frame) = frames.next().await else {
            return Err(GatewayError::Closed { code: None });
        };
        let frame = frame.map_err(|source| GatewayError::Socket { source })?;
        if let Some(payload) = decode_frame(frame)? {
            if payload.op != opcode::HELLO {
                return Err(GatewayError::Protocol(format!(
                    "expected hello, got opcode {}",
                    payload.op
                )));
            }
            let hello: Hello = serde_json::from_value(payload.d)
                .map_err(|source| GatewayError::Decode { source })?;
            break Duration::from_millis(hello.heartbeat_interval);
        }
    };
    debug!(interval_ms = heartbeat_interval.as_millis() as u64, "gateway hello");

    send_payload(&mut sink, identify_payload(&config.token)).await?;

    let mut sequence: Option<u64> = None;
    let mut acknowledged = true;
    let mut next_heartbeat = Instant::now() + heartbeat_interval.mul_f64(rand::random::<f64>());

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(next_heartbeat) => {
                if !acknowledged {
                    warn!("heartbeat not acknowledged; dropping zombie connection");
                    return Ok(SessionEnd::Reconnect);
                }
                send_payload(&mut sink, heartbeat_payload(sequence)).await?;
                acknowledged = false;
                next_heartbeat = Instant::now() + heartbeat_interval;
            }
            frame = frames.next() => {
                let Some(frame) = frame else {
                    return Err(GatewayError::Closed { code: None });
                };
                let frame = frame.map_err(|source| GatewayError::Socket { source })?;
                let Some(payload) = decode_frame(frame)? else {
                    continue;
                };
                match payload.op {
                    opcode::DISPATCH => {
                        if payload.s.is_some() {
                            sequence = payload.s;
                        }
                        let Some(kind) = payload.t else {
                            continue;
                        };
                        if kind == "READY" {
                            info!("gateway session ready");
                            continue;
                        }
                        match BotEvent::from_dispatch(&kind, payload.d) {
                            Ok(Some(event)) => {
                                if events.send(event).await.is_err() {
                                    return Ok(SessionEnd::ReceiverClosed);
                                }
                            }
                            Ok(None) => {}
                            Err(err) => warn!(error = %err, kind, "failed to decode dispatch"),
                        }
                    }
                    opcode::HEARTBEAT => send_payload(&mut sink, heartbeat_payload(sequence)).await?,
                    opcode::HEARTBEAT_ACK => acknowledged = true,
                    opcode::RECONNECT => return Ok(SessionEnd::Reconnect),
                    opcode::INVALID_SESSION => {
                        warn!("gateway invalidated the session");
                        return Ok(SessionEnd::Reconnect);
                    }
                    other => debug!(opcode = other, "ignoring gateway opcode"),
                }
            }
        }
    }
}

async fn send_payload<S>(sink: &mut S, payload: Value) -> Result<(), GatewayError>
where
    S: futures::Sink<WsMessage, Error = tungstenite::Error> + Unpin,
{
    sink.send(WsMessage::Text(payload.to_string().into()))
        .await
        .map_err(|source| GatewayError::Socket { source })
}

/// Turn a websocket frame into a gateway payload; control frames yield `None`.
fn decode_frame(frame: WsMessage) -> Result<Option<GatewayPayload>, GatewayError> {
    let payload = match frame {
        WsMessage::Text(text) => serde_json::from_str(&text),
        WsMessage::Binary(bytes) => serde_json::from_slice(&bytes),
        WsMessage::Close(close) => {
            return Err(GatewayError::from_close_code(
                close.map(|frame| u16::from(frame.code)),
            ));
        }
        WsMessage::Ping(_) | WsMessage::Pong(_) | WsMessage::Frame(_) => return Ok(None),
    };
    payload
        .map(Some)
        .map_err(|source| GatewayError::Decode { source })
}

fn identify_payload(token: &str) -> Value {
    json!({
        "op": opcode::IDENTIFY,
        "d": {
            "token": token,
            "intents": GATEWAY_INTENTS,
            "properties": {
                "os": std::env::consts::OS,
                "browser": env!("CARGO_PKG_NAME"),
                "device": env!("CARGO_PKG_NAME"),
            }
        }
    })
}

fn heartbeat_payload(sequence: Option<u64>) -> Value {
    json!({ "op": opcode::HEARTBEAT, "d": sequence })
}
