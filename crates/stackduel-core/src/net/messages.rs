use serde::{Deserialize, Serialize};

use crate::board::Grid;
use crate::frame_queue::Frame;
use crate::piece::Tetromino;
use crate::state::BoardState;

/// Envelope `type` discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    // Client -> Server
    Ready,
    Start,
    Input,
    Pause,
    Unpause,
    Ping,
    OutRoom,

    // Server -> Client (Ready, Start, Pause and Unpause are shared)
    Opponent,
    GarbageSync,
    InputServer,
    GameOver,
    Unready,
    Pong,
}

impl MessageType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ready => "ready",
            Self::Start => "start",
            Self::Input => "input",
            Self::Pause => "pause",
            Self::Unpause => "unpause",
            Self::Ping => "ping",
            Self::OutRoom => "out_room",
            Self::Opponent => "opponent",
            Self::GarbageSync => "garbage-sync",
            Self::InputServer => "input-server",
            Self::GameOver => "gameover",
            Self::Unready => "unready",
            Self::Pong => "pong",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ready" => Some(Self::Ready),
            "start" => Some(Self::Start),
            "input" | "inputs" => Some(Self::Input),
            "pause" => Some(Self::Pause),
            "unpause" => Some(Self::Unpause),
            "ping" => Some(Self::Ping),
            "out_room" => Some(Self::OutRoom),
            "opponent" => Some(Self::Opponent),
            "garbage-sync" => Some(Self::GarbageSync),
            "input-server" => Some(Self::InputServer),
            "gameover" => Some(Self::GameOver),
            "unready" => Some(Self::Unready),
            "pong" => Some(Self::Pong),
            _ => None,
        }
    }
}

/// Payload for messages that carry nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmptyMsg {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameInput {
    pub frame: Frame,
    #[serde(default)]
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InputBatchMsg {
    pub inputs: Vec<FrameInput>,
    /// Last frame the client has produced input for.
    pub latest_frame: Frame,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PingMsg {
    /// Client clock, taken from the envelope timestamp.
    pub sent_at: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartMsg {
    #[serde(default)]
    pub list_block: Vec<Tetromino>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The part of a board state clients render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    pub board: Grid,
    pub block: Vec<Vec<u8>>,
    pub c_row: i32,
    pub c_col: i32,
}

impl From<&BoardState> for BoardSnapshot {
    fn from(state: &BoardState) -> Self {
        Self {
            board: state.board,
            block: state.block.shape.rows(),
            c_row: state.row,
            c_col: state.col,
        }
    }
}

/// Used by both `opponent` and `garbage-sync`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSyncMsg {
    pub state: BoardSnapshot,
    pub latest_frame: Frame,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEchoMsg {
    pub inputs: Vec<FrameInput>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameOverMsg {
    /// The winner.
    pub player_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyMsg {
    pub players: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerEventMsg {
    pub player_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PongMsg {
    pub client_timestamp: i64,
}

/// Messages a player's client sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    Ready,
    Start,
    Input(InputBatchMsg),
    Pause,
    Unpause,
    Ping(PingMsg),
    OutRoom,
}

/// Messages the server sends to clients.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerMessage {
    Start(StartMsg),
    Opponent(StateSyncMsg),
    GarbageSync(StateSyncMsg),
    InputServer(InputEchoMsg),
    GameOver(GameOverMsg),
    Ready(OccupancyMsg),
    Unready(OccupancyMsg),
    Pause(PlayerEventMsg),
    Unpause(PlayerEventMsg),
    Pong(PongMsg),
}

impl ServerMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::Start(_) => MessageType::Start,
            Self::Opponent(_) => MessageType::Opponent,
            Self::GarbageSync(_) => MessageType::GarbageSync,
            Self::InputServer(_) => MessageType::InputServer,
            Self::GameOver(_) => MessageType::GameOver,
            Self::Ready(_) => MessageType::Ready,
            Self::Unready(_) => MessageType::Unready,
            Self::Pause(_) => MessageType::Pause,
            Self::Unpause(_) => MessageType::Unpause,
            Self::Pong(_) => MessageType::Pong,
        }
    }
}
