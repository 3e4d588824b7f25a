use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};

use crate::directory::RoomSummary;
use crate::error::AppError;
use crate::room::RoomHandle;
use crate::state::AppState;

/// Optional `?roomid=` on POST /rooms. Absent means "create".
#[derive(Debug, Deserialize)]
pub struct RoomQuery {
    pub roomid: Option<String>,
}

/// Body of POST /rooms.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RoomRequest {
    pub player_id: String,
    pub key: String,
}

#[derive(Debug, Serialize)]
pub struct PlayerView {
    pub id: String,
}

#[derive(Debug, Serialize)]
pub struct RoomView {
    pub id: String,
    pub players: Vec<PlayerView>,
}

impl RoomView {
    fn new(id: &str, members: Vec<String>) -> Self {
        Self {
            id: id.to_string(),
            players: members.into_iter().map(|id| PlayerView { id }).collect(),
        }
    }
}

impl From<RoomSummary> for RoomView {
    fn from(summary: RoomSummary) -> Self {
        Self::new(&summary.id, summary.players)
    }
}

impl From<&RoomHandle> for RoomView {
    fn from(room: &RoomHandle) -> Self {
        Self::new(room.id(), room.members())
    }
}

#[derive(Debug, Serialize)]
pub struct RoomListResponse {
    pub rooms: Vec<RoomView>,
}

#[derive(Debug, Serialize)]
pub struct RoomTicket {
    pub room: RoomView,
    pub ws_url: String,
}

/// Player ids travel in the socket URL, so they stay within an unreserved
/// character set.
pub fn check_player_id(player_id: &str, max_len: usize) -> Result<(), AppError> {
    if player_id.is_empty() {
        return Err(AppError::BadRequest("playerId is required".to_string()));
    }
    if player_id.chars().count() > max_len {
        return Err(AppError::BadRequest(format!(
            "playerId exceeds {max_len} chars"
        )));
    }
    if !player_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(AppError::BadRequest(
            "playerId may only contain letters, digits, '-', '_' and '.'".to_string(),
        ));
    }
    Ok(())
}

fn check_key(key: &str, max_len: usize) -> Result<(), AppError> {
    if key.chars().count() > max_len {
        return Err(AppError::BadRequest(format!("key exceeds {max_len} chars")));
    }
    Ok(())
}

/// GET /rooms
pub async fn list_rooms(State(state): State<AppState>) -> Json<RoomListResponse> {
    let rooms = state
        .directory
        .list()
        .await
        .into_iter()
        .map(RoomView::from)
        .collect();
    Json(RoomListResponse { rooms })
}

/// POST /rooms creates a room, POST /rooms?roomid=ID joins one. Either way
/// the response carries the socket URL to dial next.
pub async fn create_or_join_room(
    State(state): State<AppState>,
    Query(query): Query<RoomQuery>,
    body: Result<Json<RoomRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<RoomTicket>), AppError> {
    let Json(req) = body.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let limits = &state.config.rooms;
    check_player_id(&req.player_id, limits.max_player_id_len)?;
    check_key(&req.key, limits.max_key_len)?;

    let room = match query.roomid.filter(|id| !id.is_empty()) {
        Some(room_id) => {
            let room = state
                .directory
                .join_check(&room_id, &req.key, &req.player_id)
                .await?;
            tracing::info!(room_id = %room_id, player_id = %req.player_id, "Join ticket issued");
            room
        },
        None => {
            let room = state.directory.create(&req.key).await?;
            tracing::info!(room_id = %room.id(), player_id = %req.player_id, "Room ticket issued");
            room
        },
    };

    let ticket = RoomTicket {
        ws_url: state.ws_url(room.id(), &req.player_id),
        room: RoomView::from(&room),
    };
    Ok((StatusCode::ACCEPTED, Json(ticket)))
}
