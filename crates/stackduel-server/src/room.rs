use std::future::Future;
use std::time::Duration;

use axum::extract::ws::Utf8Bytes;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use stackduel_core::net::messages::{ClientMessage, OccupancyMsg, ServerMessage};
use stackduel_core::net::protocol::{ProtocolError, encode_server_message};

use crate::config::{GameConfig, ServerConfig};
use crate::game::Game;

pub type PlayerId = String;
pub type RoomId = String;

/// A room never holds more than this many connections.
pub const MAX_PLAYERS: usize = 2;

/// Who a packet is delivered to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    All,
    Direct(PlayerId),
    Except(PlayerId),
}

impl Target {
    pub fn includes(&self, player_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Direct(id) => id == player_id,
            Self::Except(id) => id != player_id,
        }
    }
}

/// An encoded server message with its recipients.
#[derive(Debug, Clone)]
pub struct Packet {
    pub target: Target,
    pub data: Utf8Bytes,
}

impl Packet {
    pub fn encode(target: Target, msg: &ServerMessage) -> Result<Self, ProtocolError> {
        let text = encode_server_message(msg)?;
        Ok(Self {
            target,
            data: Utf8Bytes::from(text),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinError {
    RoomFull,
    RoomClosed,
}

impl std::fmt::Display for JoinError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoomFull => write!(f, "room is full"),
            Self::RoomClosed => write!(f, "room is closed"),
        }
    }
}

impl std::error::Error for JoinError {}

/// The room's view of one connected player.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    pub player_id: PlayerId,
    pub conn_id: Uuid,
    pub sender: mpsc::Sender<Utf8Bytes>,
}

#[derive(Debug)]
enum RoomEvent {
    Join {
        conn: ConnectionHandle,
        reply: oneshot::Sender<Result<(), JoinError>>,
    },
    Leave {
        player_id: PlayerId,
        conn_id: Uuid,
    },
    Game {
        player_id: PlayerId,
        msg: ClientMessage,
    },
    GameOver {
        match_id: u64,
        winner: PlayerId,
    },
}

/// Per-room settings taken from the server config.
#[derive(Debug, Clone)]
pub struct RoomSettings {
    pub broadcast_buffer: usize,
    pub empty_ttl: Duration,
    pub game: GameConfig,
}

impl From<&ServerConfig> for RoomSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            broadcast_buffer: config.limits.room_broadcast_buffer,
            empty_ttl: Duration::from_secs(config.rooms.empty_room_ttl_secs),
            game: config.game.clone(),
        }
    }
}

/// Cloneable handle to a running room actor.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    id: RoomId,
    key: String,
    control: mpsc::UnboundedSender<RoomEvent>,
    broadcast: mpsc::Sender<Packet>,
    members: watch::Receiver<Vec<PlayerId>>,
    stop: CancellationToken,
}

impl RoomHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Current members in join order.
    pub fn members(&self) -> Vec<PlayerId> {
        self.members.borrow().clone()
    }

    /// Advisory: whether `player_id` would currently be admitted.
    pub fn has_room_for(&self, player_id: &str) -> bool {
        let members = self.members.borrow();
        members.len() < MAX_PLAYERS || members.iter().any(|m| m == player_id)
    }

    pub fn is_closed(&self) -> bool {
        self.stop.is_cancelled()
    }

    /// Resolves once the room has stopped.
    pub async fn closed(&self) {
        self.stop.cancelled().await;
    }

    /// Register a connection. The actor's answer is authoritative.
    pub async fn join(&self, conn: ConnectionHandle) -> Result<(), JoinError> {
        let (reply, rx) = oneshot::channel();
        self.control
            .send(RoomEvent::Join { conn, reply })
            .map_err(|_| JoinError::RoomClosed)?;
        rx.await.unwrap_or(Err(JoinError::RoomClosed))
    }

    /// Remove a connection, if it is still the one registered for `player_id`.
    pub fn leave(&self, player_id: &str, conn_id: Uuid) {
        let _ = self.control.send(RoomEvent::Leave {
            player_id: player_id.to_string(),
            conn_id,
        });
    }

    /// Forward a decoded client message to the room's game.
    pub fn game_message(&self, player_id: &str, msg: ClientMessage) {
        let _ = self.control.send(RoomEvent::Game {
            player_id: player_id.to_string(),
            msg,
        });
    }

    pub fn report_game_over(&self, match_id: u64, winner: &str) {
        let _ = self.control.send(RoomEvent::GameOver {
            match_id,
            winner: winner.to_string(),
        });
    }

    /// Queue a packet for delivery without waiting. Returns false when the
    /// packet was dropped.
    pub fn broadcast(&self, packet: Packet) -> bool {
        match self.broadcast.try_send(packet) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(room_id = %self.id, "Room broadcast channel full, dropping packet");
                false
            },
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(room_id = %self.id, "Room closed, dropping packet");
                false
            },
        }
    }
}

/// Spawn a room actor. `on_close` runs once after the actor stops.
pub fn spawn_room<F, Fut>(
    id: RoomId,
    key: String,
    settings: RoomSettings,
    on_close: F,
) -> RoomHandle
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (control, control_rx) = mpsc::unbounded_channel();
    let (broadcast, broadcast_rx) = mpsc::channel(settings.broadcast_buffer.max(1));
    let (members_tx, members) = watch::channel(Vec::new());
    let stop = CancellationToken::new();

    let handle = RoomHandle {
        id: id.clone(),
        key,
        control,
        broadcast,
        members,
        stop: stop.clone(),
    };

    let actor = RoomActor {
        id,
        members: Vec::new(),
        members_tx,
        game: Game::new(handle.clone(), settings.game),
        stop,
    };

    let empty_ttl = settings.empty_ttl;
    tokio::spawn(async move {
        let room_id = actor.id.clone();
        actor.run(control_rx, broadcast_rx, empty_ttl).await;
        on_close().await;
        tracing::info!(room_id = %room_id, "Room closed");
    });

    handle
}

struct RoomActor {
    id: RoomId,
    members: Vec<ConnectionHandle>,
    members_tx: watch::Sender<Vec<PlayerId>>,
    game: Game,
    stop: CancellationToken,
}

impl RoomActor {
    async fn run(
        mut self,
        mut control_rx: mpsc::UnboundedReceiver<RoomEvent>,
        mut broadcast_rx: mpsc::Receiver<Packet>,
        empty_ttl: Duration,
    ) {
        let stop = self.stop.clone();
        let ttl = tokio::time::sleep(empty_ttl);
        tokio::pin!(ttl);
        let mut ever_joined = false;

        loop {
            tokio::select! {
                _ = stop.cancelled() => break,
                _ = &mut ttl, if !ever_joined => {
                    tracing::info!(room_id = %self.id, "Nobody joined, closing room");
                    break;
                },
                Some(event) = control_rx.recv() => {
                    self.handle_event(event);
                    ever_joined |= !self.members.is_empty();
                },
                Some(packet) = broadcast_rx.recv() => self.deliver(packet),
            }
        }

        self.game.shutdown();
        stop.cancel();
        // Dropping the members closes their outbound queues.
        self.members.clear();
    }

    fn handle_event(&mut self, event: RoomEvent) {
        match event {
            RoomEvent::Join { conn, reply } => {
                let result = self.join(conn);
                let _ = reply.send(result);
            },
            RoomEvent::Leave { player_id, conn_id } => {
                self.remove(&player_id, conn_id, "left");
            },
            RoomEvent::Game { player_id, msg } => {
                if !self.members.iter().any(|m| m.player_id == player_id) {
                    tracing::debug!(room_id = %self.id, player_id, "Game message from non-member");
                    return;
                }
                let members = self.member_ids();
                let packets = self.game.on_message(&player_id, msg, &members);
                self.deliver_all(packets);
            },
            RoomEvent::GameOver { match_id, winner } => {
                self.game.finished(match_id, &winner);
            },
        }
    }

    fn member_ids(&self) -> Vec<PlayerId> {
        self.members.iter().map(|m| m.player_id.clone()).collect()
    }

    fn publish_members(&self) {
        self.members_tx.send_replace(self.member_ids());
    }

    fn join(&mut self, conn: ConnectionHandle) -> Result<(), JoinError> {
        if self.stop.is_cancelled() {
            return Err(JoinError::RoomClosed);
        }

        if let Some(slot) = self
            .members
            .iter_mut()
            .find(|m| m.player_id == conn.player_id)
        {
            tracing::info!(
                room_id = %self.id,
                player_id = %conn.player_id,
                old_conn = %slot.conn_id,
                new_conn = %conn.conn_id,
                "Replacing stale connection"
            );
            // The old handle drops here, closing its outbound queue.
            *slot = conn;
            self.publish_members();
            return Ok(());
        }

        if self.members.len() >= MAX_PLAYERS {
            tracing::info!(room_id = %self.id, player_id = %conn.player_id, "Join rejected, room is full");
            return Err(JoinError::RoomFull);
        }

        tracing::info!(room_id = %self.id, player_id = %conn.player_id, "Player joined");
        self.members.push(conn);
        self.publish_members();

        if self.members.len() == MAX_PLAYERS {
            let players = self.member_ids();
            self.send(Target::All, &ServerMessage::Ready(OccupancyMsg { players }));
        }
        Ok(())
    }

    fn remove(&mut self, player_id: &str, conn_id: Uuid, reason: &str) {
        let Some(pos) = self
            .members
            .iter()
            .position(|m| m.player_id == player_id && m.conn_id == conn_id)
        else {
            tracing::debug!(room_id = %self.id, player_id, %conn_id, "Ignoring leave for replaced connection");
            return;
        };

        let was_full = self.members.len() == MAX_PLAYERS;
        self.members.remove(pos);
        self.publish_members();
        tracing::info!(room_id = %self.id, player_id, reason, "Player removed");

        let remaining = self.member_ids();
        let packets = self.game.player_left(player_id, &remaining);
        self.deliver_all(packets);

        if was_full && !self.members.is_empty() {
            self.send(
                Target::All,
                &ServerMessage::Unready(OccupancyMsg { players: remaining }),
            );
        }

        if self.members.is_empty() {
            self.stop.cancel();
        }
    }

    fn send(&mut self, target: Target, msg: &ServerMessage) {
        match Packet::encode(target, msg) {
            Ok(packet) => self.deliver(packet),
            Err(e) => {
                tracing::error!(room_id = %self.id, error = %e, "Failed to encode room message");
            },
        }
    }

    fn deliver_all(&mut self, packets: Vec<Packet>) {
        for packet in packets {
            self.deliver(packet);
        }
    }

    /// Hand a packet to each recipient's queue. A recipient whose queue is
    /// full or closed is evicted.
    fn deliver(&mut self, packet: Packet) {
        let mut evicted = Vec::new();
        for member in &self.members {
            if !packet.target.includes(&member.player_id) {
                continue;
            }
            match member.sender.try_send(packet.data.clone()) {
                Ok(()) => {},
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(
                        room_id = %self.id,
                        player_id = %member.player_id,
                        "Outbound queue full, evicting player"
                    );
                    evicted.push((member.player_id.clone(), member.conn_id));
                },
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    tracing::debug!(
                        room_id = %self.id,
                        player_id = %member.player_id,
                        "Outbound queue closed, evicting player"
                    );
                    evicted.push((member.player_id.clone(), member.conn_id));
                },
            }
        }
        for (player_id, conn_id) in evicted {
            self.remove(&player_id, conn_id, "evicted");
        }
    }
}

/// A handle wired to bare channels instead of an actor, for driving room
/// collaborators directly in tests.
#[cfg(test)]
pub(crate) struct RoomTap {
    pub broadcast_rx: mpsc::Receiver<Packet>,
    control_rx: mpsc::UnboundedReceiver<RoomEvent>,
    _members_tx: watch::Sender<Vec<PlayerId>>,
}

#[cfg(test)]
impl RoomTap {
    pub fn new(buffer: usize) -> (RoomHandle, Self) {
        let (control, control_rx) = mpsc::unbounded_channel();
        let (broadcast, broadcast_rx) = mpsc::channel(buffer);
        let (members_tx, members) = watch::channel(Vec::new());
        let handle = RoomHandle {
            id: "TAP00".to_string(),
            key: String::new(),
            control,
            broadcast,
            members,
            stop: CancellationToken::new(),
        };
        (
            handle,
            Self {
                broadcast_rx,
                control_rx,
                _members_tx: members_tx,
            },
        )
    }

    /// Drain every queued packet, decoded.
    pub fn drain(&mut self) -> Vec<(Target, ServerMessage)> {
        let mut out = Vec::new();
        while let Ok(packet) = self.broadcast_rx.try_recv() {
            let msg = stackduel_core::net::protocol::decode_server_message(packet.data.as_str())
                .expect("tap packets decode");
            out.push((packet.target, msg));
        }
        out
    }

    /// The winner of the next reported game over, if any.
    pub fn game_over_report(&mut self) -> Option<(u64, PlayerId)> {
        while let Ok(event) = self.control_rx.try_recv() {
            if let RoomEvent::GameOver { match_id, winner } = event {
                return Some((match_id, winner));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> RoomSettings {
        RoomSettings::from(&ServerConfig::default())
    }

    fn conn(player_id: &str, buffer: usize) -> (ConnectionHandle, mpsc::Receiver<Utf8Bytes>) {
        let (sender, rx) = mpsc::channel(buffer);
        (
            ConnectionHandle {
                player_id: player_id.to_string(),
                conn_id: Uuid::new_v4(),
                sender,
            },
            rx,
        )
    }

    fn room() -> RoomHandle {
        spawn_room("ROOM1".to_string(), String::new(), settings(), || async {})
    }

    async fn next_msg(rx: &mut mpsc::Receiver<Utf8Bytes>) -> ServerMessage {
        let data = tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for packet")
            .expect("queue closed");
        stackduel_core::net::protocol::decode_server_message(data.as_str()).unwrap()
    }

    fn player_event(id: &str) -> ServerMessage {
        ServerMessage::Pause(stackduel_core::net::messages::PlayerEventMsg {
            player_id: id.to_string(),
        })
    }

    #[tokio::test]
    async fn second_join_broadcasts_ready() {
        let room = room();
        let (a, mut a_rx) = conn("alice", 8);
        let (b, mut b_rx) = conn("bob", 8);
        room.join(a).await.unwrap();
        room.join(b).await.unwrap();

        for rx in [&mut a_rx, &mut b_rx] {
            match next_msg(rx).await {
                ServerMessage::Ready(m) => assert_eq!(m.players, vec!["alice", "bob"]),
                other => panic!("expected ready, got {other:?}"),
            }
        }
        assert_eq!(room.members(), vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn third_player_is_rejected() {
        let room = room();
        let (a, _a_rx) = conn("alice", 8);
        let (b, _b_rx) = conn("bob", 8);
        let (c, _c_rx) = conn("carol", 8);
        room.join(a).await.unwrap();
        room.join(b).await.unwrap();
        assert!(!room.has_room_for("carol"));
        assert_eq!(room.join(c).await, Err(JoinError::RoomFull));
        assert_eq!(room.members().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_joins_never_exceed_two() {
        let room = room();
        let mut tasks = Vec::new();
        let mut queues = Vec::new();
        for name in ["a", "b", "c", "d", "e"] {
            let (c, rx) = conn(name, 8);
            queues.push(rx);
            let room = room.clone();
            tasks.push(tokio::spawn(async move { room.join(c).await }));
        }
        let mut admitted = 0;
        for task in tasks {
            match task.await.unwrap() {
                Ok(()) => admitted += 1,
                Err(e) => assert_eq!(e, JoinError::RoomFull),
            }
        }
        assert_eq!(admitted, 2);
        assert_eq!(room.members().len(), 2);
    }

    #[tokio::test]
    async fn same_player_replaces_stale_connection() {
        let room = room();
        let (old, mut old_rx) = conn("alice", 8);
        let old_id = old.conn_id;
        let (fresh, _fresh_rx) = conn("alice", 8);
        room.join(old).await.unwrap();
        room.join(fresh).await.unwrap();

        // the stale queue is closed
        let closed = tokio::time::timeout(Duration::from_secs(1), old_rx.recv())
            .await
            .unwrap();
        assert!(closed.is_none());

        // a late leave from the stale connection changes nothing
        room.leave("alice", old_id);
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(room.members(), vec!["alice"]);
        assert!(!room.is_closed());
    }

    #[tokio::test]
    async fn broadcast_respects_targets() {
        let room = room();
        let (a, mut a_rx) = conn("alice", 8);
        let (b, mut b_rx) = conn("bob", 8);
        room.join(a).await.unwrap();
        room.join(b).await.unwrap();
        next_msg(&mut a_rx).await;
        next_msg(&mut b_rx).await;

        room.broadcast(Packet::encode(Target::Except("alice".into()), &player_event("x")).unwrap());
        room.broadcast(Packet::encode(Target::Direct("alice".into()), &player_event("y")).unwrap());
        room.broadcast(Packet::encode(Target::All, &player_event("z")).unwrap());

        assert_eq!(next_msg(&mut a_rx).await, player_event("y"));
        assert_eq!(next_msg(&mut a_rx).await, player_event("z"));
        assert_eq!(next_msg(&mut b_rx).await, player_event("x"));
        assert_eq!(next_msg(&mut b_rx).await, player_event("z"));
        assert!(a_rx.try_recv().is_err());
        assert!(b_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn full_queue_evicts_recipient() {
        let room = room();
        let (a, mut a_rx) = conn("alice", 8);
        let (slow, _slow_rx) = conn("bob", 1);
        room.join(a).await.unwrap();
        room.join(slow).await.unwrap();
        // ready fills bob's single slot
        next_msg(&mut a_rx).await;

        room.broadcast(Packet::encode(Target::All, &player_event("x")).unwrap());
        assert_eq!(next_msg(&mut a_rx).await, player_event("x"));
        match next_msg(&mut a_rx).await {
            ServerMessage::Unready(m) => assert_eq!(m.players, vec!["alice"]),
            other => panic!("expected unready, got {other:?}"),
        }
        assert_eq!(room.members(), vec!["alice"]);
    }

    #[tokio::test]
    async fn last_leave_closes_room_and_runs_teardown() {
        let (done_tx, done_rx) = oneshot::channel();
        let room = spawn_room("ROOM2".to_string(), String::new(), settings(), move || async move {
            let _ = done_tx.send(());
        });
        let (a, mut a_rx) = conn("alice", 8);
        let (b, _b_rx) = conn("bob", 8);
        let (a_id, b_id) = (a.conn_id, b.conn_id);
        room.join(a).await.unwrap();
        room.join(b).await.unwrap();
        next_msg(&mut a_rx).await;

        room.leave("bob", b_id);
        match next_msg(&mut a_rx).await {
            ServerMessage::Unready(m) => assert_eq!(m.players, vec!["alice"]),
            other => panic!("expected unready, got {other:?}"),
        }
        assert!(!room.is_closed());

        room.leave("alice", a_id);
        tokio::time::timeout(Duration::from_secs(1), room.closed())
            .await
            .expect("room should close");
        tokio::time::timeout(Duration::from_secs(1), done_rx)
            .await
            .expect("teardown should run")
            .unwrap();

        let (late, _late_rx) = conn("carol", 8);
        assert_eq!(room.join(late).await, Err(JoinError::RoomClosed));
    }

    #[tokio::test(start_paused = true)]
    async fn unjoined_room_expires() {
        let room = room();
        tokio::time::timeout(Duration::from_secs(121), room.closed())
            .await
            .expect("empty room should expire");
    }

    #[tokio::test(start_paused = true)]
    async fn joined_room_does_not_expire() {
        let room = room();
        let (a, _a_rx) = conn("alice", 8);
        room.join(a).await.unwrap();
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(!room.is_closed());
    }
}
