use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket, close_code};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use stackduel_core::net::messages::ClientMessage;
use stackduel_core::net::protocol::decode_client_message;

use crate::api::check_player_id;
use crate::config::HeartbeatConfig;
use crate::directory::DirectoryError;
use crate::error::AppError;
use crate::room::{ConnectionHandle, PlayerId, RoomHandle};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MatchQuery {
    #[serde(default)]
    pub roomid: String,
    #[serde(default)]
    pub playerid: String,
}

/// GET /ws/match?roomid=ID&playerid=P
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<MatchQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, AppError> {
    check_player_id(&query.playerid, state.config.rooms.max_player_id_len)?;

    let room = state
        .directory
        .get(&query.roomid)
        .await
        .ok_or_else(|| DirectoryError::NotFound(query.roomid.clone()))?;
    // Advisory only; the room actor has the final say on join.
    if !room.has_room_for(&query.playerid) {
        return Err(DirectoryError::RoomFull(query.roomid).into());
    }

    let player_id = query.playerid;
    Ok(ws
        .max_message_size(state.config.limits.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state, room, player_id))
        .into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState, room: RoomHandle, player_id: PlayerId) {
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let heartbeat = state.config.heartbeat.clone();

    let conn_id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel::<Utf8Bytes>(state.config.limits.player_message_buffer);
    let conn = ConnectionHandle {
        player_id: player_id.clone(),
        conn_id,
        sender: tx,
    };

    if let Err(e) = room.join(conn).await {
        tracing::warn!(room_id = %room.id(), %player_id, error = %e, "Join rejected");
        let frame = CloseFrame {
            code: close_code::POLICY,
            reason: Utf8Bytes::from(e.to_string()),
        };
        if let Err(e) = ws_sender.send(Message::Close(Some(frame))).await {
            tracing::debug!(error = %e, "Failed to send close frame");
        }
        return;
    }
    tracing::info!(room_id = %room.id(), %player_id, %conn_id, "Player connected");

    let cancel = CancellationToken::new();
    let mut writer = tokio::spawn(write_pump(ws_sender, rx, cancel.clone(), heartbeat.clone()));

    read_pump(
        &mut ws_receiver,
        &room,
        &player_id,
        &cancel,
        heartbeat.pong_wait(),
    )
    .await;

    // Leaving drops the room's sender, which lets the writer close the socket.
    room.leave(&player_id, conn_id);
    if tokio::time::timeout(heartbeat.write_wait(), &mut writer)
        .await
        .is_err()
    {
        cancel.cancel();
        let _ = writer.await;
    }

    tracing::info!(room_id = %room.id(), %player_id, %conn_id, "Player disconnected");
}

async fn write_pump(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Utf8Bytes>,
    cancel: CancellationToken,
    heartbeat: HeartbeatConfig,
) {
    let write_wait = heartbeat.write_wait();
    let period = heartbeat.ping_period();
    let mut ping = tokio::time::interval_at(Instant::now() + period, period);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let msg = tokio::select! {
            data = rx.recv() => match data {
                Some(text) => Message::Text(text),
                None => {
                    let _ = tokio::time::timeout(write_wait, ws_sender.send(Message::Close(None))).await;
                    break;
                },
            },
            _ = ping.tick() => Message::Ping(Bytes::new()),
            _ = cancel.cancelled() => break,
        };

        match tokio::time::timeout(write_wait, ws_sender.send(msg)).await {
            Ok(Ok(())) => {},
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "Socket write failed");
                break;
            },
            Err(_) => {
                tracing::warn!(?write_wait, "Socket write deadline exceeded");
                break;
            },
        }
    }

    cancel.cancel();
}

async fn read_pump(
    ws_receiver: &mut SplitStream<WebSocket>,
    room: &RoomHandle,
    player_id: &str,
    cancel: &CancellationToken,
    pong_wait: Duration,
) {
    let deadline = tokio::time::sleep(pong_wait);
    tokio::pin!(deadline);

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            _ = &mut deadline => {
                tracing::warn!(room_id = %room.id(), player_id, "Heartbeat timed out");
                break;
            },
            next = ws_receiver.next() => next,
        };

        let msg = match next {
            Some(Ok(msg)) => msg,
            Some(Err(e)) => {
                tracing::debug!(room_id = %room.id(), player_id, error = %e, "Socket read failed");
                break;
            },
            None => break,
        };

        match msg {
            Message::Text(text) => match decode_client_message(text.as_str()) {
                Ok(ClientMessage::OutRoom) => {
                    tracing::info!(room_id = %room.id(), player_id, "Player left room");
                    break;
                },
                Ok(msg) => room.game_message(player_id, msg),
                Err(e) => {
                    tracing::warn!(room_id = %room.id(), player_id, error = %e, "Discarding bad message");
                },
            },
            Message::Pong(_) => deadline.as_mut().reset(Instant::now() + pong_wait),
            Message::Close(_) => break,
            Message::Binary(_) | Message::Ping(_) => {},
        }
    }
}
