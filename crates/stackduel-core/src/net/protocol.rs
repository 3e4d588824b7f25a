use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::messages::{
    ClientMessage, EmptyMsg, GameOverMsg, InputBatchMsg, InputEchoMsg, MessageType, OccupancyMsg,
    PingMsg, PlayerEventMsg, PongMsg, ServerMessage, StartMsg, StateSyncMsg,
};
use crate::time::timestamp_millis;

/// Maximum size of one text frame in bytes.
pub const MAX_MESSAGE_SIZE: usize = 10 * 1024; // 10 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(String),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(t) => write!(f, "unknown message type: {t:?}"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

#[derive(Serialize)]
struct OutgoingEnvelope<'a, T> {
    #[serde(rename = "type")]
    kind: &'static str,
    payload: &'a T,
    timestamp: i64,
}

#[derive(Deserialize)]
struct IncomingEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: serde_json::Value,
    #[serde(default)]
    timestamp: i64,
}

/// A decoded envelope whose payload has not been interpreted yet.
#[derive(Debug)]
pub struct RawMessage {
    pub msg_type: MessageType,
    pub payload: serde_json::Value,
    pub timestamp: i64,
}

fn encode_at<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
    timestamp: i64,
) -> Result<String, ProtocolError> {
    let envelope = OutgoingEnvelope {
        kind: msg_type.as_str(),
        payload,
        timestamp,
    };
    let text =
        serde_json::to_string(&envelope).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(text.len()));
    }
    Ok(text)
}

/// Wrap a payload in a `{type, payload, timestamp}` envelope stamped now.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<String, ProtocolError> {
    encode_at(msg_type, payload, timestamp_millis())
}

pub fn encode_server_message(msg: &ServerMessage) -> Result<String, ProtocolError> {
    let t = msg.message_type();
    match msg {
        ServerMessage::Start(m) => encode_message(t, m),
        ServerMessage::Opponent(m) | ServerMessage::GarbageSync(m) => encode_message(t, m),
        ServerMessage::InputServer(m) => encode_message(t, m),
        ServerMessage::GameOver(m) => encode_message(t, m),
        ServerMessage::Ready(m) | ServerMessage::Unready(m) => encode_message(t, m),
        ServerMessage::Pause(m) | ServerMessage::Unpause(m) => encode_message(t, m),
        ServerMessage::Pong(m) => encode_message(t, m),
    }
}

pub fn encode_client_message(msg: &ClientMessage) -> Result<String, ProtocolError> {
    let empty = EmptyMsg {};
    match msg {
        ClientMessage::Ready => encode_message(MessageType::Ready, &empty),
        ClientMessage::Start => encode_message(MessageType::Start, &empty),
        ClientMessage::Input(m) => encode_message(MessageType::Input, m),
        ClientMessage::Pause => encode_message(MessageType::Pause, &empty),
        ClientMessage::Unpause => encode_message(MessageType::Unpause, &empty),
        ClientMessage::Ping(m) => encode_at(MessageType::Ping, &empty, m.sent_at),
        ClientMessage::OutRoom => encode_message(MessageType::OutRoom, &empty),
    }
}

/// Parse the envelope and resolve its type without touching the payload.
pub fn decode_envelope(text: &str) -> Result<RawMessage, ProtocolError> {
    if text.trim().is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    if text.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(text.len()));
    }
    let envelope: IncomingEnvelope =
        serde_json::from_str(text).map_err(|e| ProtocolError::DeserializeError(e.to_string()))?;
    let msg_type =
        MessageType::parse(&envelope.kind).ok_or(ProtocolError::UnknownMessageType(envelope.kind))?;
    Ok(RawMessage {
        msg_type,
        payload: envelope.payload,
        timestamp: envelope.timestamp,
    })
}

/// Deserialize an envelope payload. A missing payload reads as `{}`.
pub fn decode_payload<T: DeserializeOwned>(payload: serde_json::Value) -> Result<T, ProtocolError> {
    let payload = if payload.is_null() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        payload
    };
    serde_json::from_value(payload).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

pub fn decode_client_message(text: &str) -> Result<ClientMessage, ProtocolError> {
    let raw = decode_envelope(text)?;
    match raw.msg_type {
        MessageType::Ready => Ok(ClientMessage::Ready),
        MessageType::Start => Ok(ClientMessage::Start),
        MessageType::Input => Ok(ClientMessage::Input(decode_payload::<InputBatchMsg>(
            raw.payload,
        )?)),
        MessageType::Pause => Ok(ClientMessage::Pause),
        MessageType::Unpause => Ok(ClientMessage::Unpause),
        MessageType::Ping => Ok(ClientMessage::Ping(PingMsg {
            sent_at: raw.timestamp,
        })),
        MessageType::OutRoom => Ok(ClientMessage::OutRoom),
        other => Err(ProtocolError::UnknownMessageType(other.as_str().to_string())),
    }
}

pub fn decode_server_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    let raw = decode_envelope(text)?;
    let p = raw.payload;
    match raw.msg_type {
        MessageType::Start => Ok(ServerMessage::Start(decode_payload::<StartMsg>(p)?)),
        MessageType::Opponent => Ok(ServerMessage::Opponent(decode_payload::<StateSyncMsg>(p)?)),
        MessageType::GarbageSync => Ok(ServerMessage::GarbageSync(decode_payload::<
            StateSyncMsg,
        >(p)?)),
        MessageType::InputServer => Ok(ServerMessage::InputServer(decode_payload::<
            InputEchoMsg,
        >(p)?)),
        MessageType::GameOver => Ok(ServerMessage::GameOver(decode_payload::<GameOverMsg>(p)?)),
        MessageType::Ready => Ok(ServerMessage::Ready(decode_payload::<OccupancyMsg>(p)?)),
        MessageType::Unready => Ok(ServerMessage::Unready(decode_payload::<OccupancyMsg>(p)?)),
        MessageType::Pause => Ok(ServerMessage::Pause(decode_payload::<PlayerEventMsg>(p)?)),
        MessageType::Unpause => Ok(ServerMessage::Unpause(decode_payload::<PlayerEventMsg>(p)?)),
        MessageType::Pong => Ok(ServerMessage::Pong(decode_payload::<PongMsg>(p)?)),
        other => Err(ProtocolError::UnknownMessageType(other.as_str().to_string())),
    }
}
