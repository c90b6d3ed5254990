//! Socket.IO v4 text framing over Engine.IO v4, reduced to what a game
//! session uses: the default namespace, events without acks, and the
//! transport heartbeat.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use crate::input::Direction;
use crate::state::{GameMap, PlayerUpdate, Snowball};

pub const ENGINE_IO_VERSION: &str = "4";
pub const SOCKET_IO_PATH: &str = "/socket.io/";

/// Frame sent to join the default namespace after the transport opens.
pub const NAMESPACE_CONNECT: &str = "40";
/// Frame sent to leave the default namespace.
pub const NAMESPACE_DISCONNECT: &str = "41";
/// Answer to a transport heartbeat.
pub const HEARTBEAT_REPLY: &str = "3";

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("empty frame")]
    Empty,
    #[error("unknown engine packet type `{0}`")]
    EnginePacket(char),
    #[error("unknown socket packet type `{0}`")]
    SocketPacket(char),
    #[error("event frame without a name")]
    MissingEventName,
    #[error("event `{event}` has a malformed payload: {source}")]
    Payload {
        event: String,
        source: serde_json::Error,
    },
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Participant {
    #[serde(default)]
    pub id: Option<String>,
    pub nickname: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct DeathEvent {
    pub victim: Participant,
    pub killer: Participant,
}

/// Server to client. Names and payload shapes follow the game server.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Namespace joined; carries the identity the server assigned.
    Connect { id: String },
    /// Channel closed, cleanly or not.
    Disconnect { reason: Option<String> },
    Map(GameMap),
    End { winner: String },
    Players(Vec<PlayerUpdate>),
    Snowballs(Vec<Snowball>),
    Death(DeathEvent),
    Remaining(u64),
    Pong,
    Refresh,
}

impl InboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connect { .. } => "connect",
            Self::Disconnect { .. } => "disconnect",
            Self::Map(_) => "map",
            Self::End { .. } => "end",
            Self::Players(_) => "players",
            Self::Snowballs(_) => "snowballs",
            Self::Death(_) => "death",
            Self::Remaining(_) => "remaining",
            Self::Pong => "pong",
            Self::Refresh => "refresh",
        }
    }

    /// Builds an event from a Socket.IO event name and its arguments.
    /// Unknown names yield `Ok(None)`.
    pub fn from_socket_event(name: &str, mut args: Vec<Value>) -> Result<Option<Self>, ProtocolError> {
        let first = if args.is_empty() {
            Value::Null
        } else {
            args.swap_remove(0)
        };

        let event = match name {
            "map" => Self::Map(payload(name, first)?),
            "end" => Self::End {
                winner: payload(name, first)?,
            },
            "players" => Self::Players(payload(name, first)?),
            "snowballs" => Self::Snowballs(payload(name, first)?),
            "death" => Self::Death(payload(name, first)?),
            "remaining" => {
                let ms: f64 = payload(name, first)?;
                Self::Remaining(ms.max(0.0) as u64)
            }
            "pong" => Self::Pong,
            "refresh" => Self::Refresh,
            _ => return Ok(None),
        };
        Ok(Some(event))
    }
}

fn payload<T: for<'de> Deserialize<'de>>(event: &str, value: Value) -> Result<T, ProtocolError> {
    serde_json::from_value(value).map_err(|source| ProtocolError::Payload {
        event: event.to_string(),
        source,
    })
}

/// Client to server.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutboundEvent {
    Ping,
    Inputs(Direction),
    /// Fire angle in radians.
    Snowball(f32),
}

impl OutboundEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Inputs(_) => "inputs",
            Self::Snowball(_) => "snowball",
        }
    }

    pub fn encode(&self) -> String {
        let args = match self {
            Self::Ping => Value::Array(vec![Value::from(self.name())]),
            Self::Inputs(direction) => {
                Value::Array(vec![Value::from(self.name()), Value::from(direction.bits())])
            }
            Self::Snowball(angle) => {
                Value::Array(vec![Value::from(self.name()), Value::from(*angle as f64)])
            }
        };
        format!("42{args}")
    }
}

/// Liveness parameters from the Engine.IO open packet, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    #[serde(default = "default_ping_interval")]
    pub ping_interval: u64,
    #[serde(default = "default_ping_timeout")]
    pub ping_timeout: u64,
}

fn default_ping_interval() -> u64 {
    25_000
}

fn default_ping_timeout() -> u64 {
    20_000
}

impl Default for Handshake {
    fn default() -> Self {
        Self {
            ping_interval: default_ping_interval(),
            ping_timeout: default_ping_timeout(),
        }
    }
}

impl Handshake {
    /// Longest silence before the server is considered gone.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_interval + self.ping_timeout)
    }
}

/// One decoded text frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Engine.IO open handshake; the client must join the namespace.
    Open(Handshake),
    /// Engine.IO ping; the client must answer with [`HEARTBEAT_REPLY`].
    Heartbeat,
    Event(InboundEvent),
    /// Something valid that a session does not act on.
    Ignored,
}

pub fn decode_frame(text: &str) -> Result<Frame, ProtocolError> {
    let mut chars = text.chars();
    let engine_type = chars.next().ok_or(ProtocolError::Empty)?;
    let rest = chars.as_str();

    match engine_type {
        '0' if rest.is_empty() => Ok(Frame::Open(Handshake::default())),
        '0' => Ok(Frame::Open(serde_json::from_str(rest)?)),
        '1' => Ok(Frame::Event(InboundEvent::Disconnect {
            reason: Some(String::from("transport closed by server")),
        })),
        '2' => Ok(Frame::Heartbeat),
        '3' | '6' => Ok(Frame::Ignored),
        '4' => decode_socket_packet(rest),
        other => Err(ProtocolError::EnginePacket(other)),
    }
}

fn decode_socket_packet(text: &str) -> Result<Frame, ProtocolError> {
    let mut chars = text.chars();
    let socket_type = chars.next().ok_or(ProtocolError::Empty)?;
    let body = strip_namespace(chars.as_str());

    match socket_type {
        '0' => {
            #[derive(Deserialize)]
            struct ConnectAck {
                sid: String,
            }
            let ack: ConnectAck = serde_json::from_str(body)?;
            Ok(Frame::Event(InboundEvent::Connect { id: ack.sid }))
        }
        '1' => Ok(Frame::Event(InboundEvent::Disconnect {
            reason: Some(String::from("namespace disconnect")),
        })),
        '2' => {
            let body = body.trim_start_matches(|c: char| c.is_ascii_digit());
            let mut parts: Vec<Value> = serde_json::from_str(body)?;
            if parts.is_empty() {
                return Err(ProtocolError::MissingEventName);
            }
            let name = match parts.remove(0) {
                Value::String(name) => name,
                _ => return Err(ProtocolError::MissingEventName),
            };
            Ok(InboundEvent::from_socket_event(&name, parts)?
                .map(Frame::Event)
                .unwrap_or(Frame::Ignored))
        }
        '4' => Ok(Frame::Event(InboundEvent::Disconnect {
            reason: Some(format!("connect error: {body}")),
        })),
        '3' | '5' | '6' => Ok(Frame::Ignored),
        other => Err(ProtocolError::SocketPacket(other)),
    }
}

/// Drops a `/nsp,` prefix. Only the default namespace is joined, so the
/// name itself is not checked.
fn strip_namespace(body: &str) -> &str {
    if body.starts_with('/') {
        body.split_once(',').map_or("", |(_, rest)| rest)
    } else {
        body
    }
}
