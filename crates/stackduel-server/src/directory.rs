use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use tokio::sync::RwLock;

use crate::room::{RoomHandle, RoomId, RoomSettings, spawn_room};

const ROOM_ID_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    NotFound(RoomId),
    RoomFull(RoomId),
    KeyMismatch(RoomId),
    /// No free id was found within the configured attempts.
    Busy,
}

impl std::fmt::Display for DirectoryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "room {id} not found"),
            Self::RoomFull(id) => write!(f, "room {id} is full"),
            Self::KeyMismatch(id) => write!(f, "wrong key for room {id}"),
            Self::Busy => write!(f, "could not allocate a room id, try again"),
        }
    }
}

impl std::error::Error for DirectoryError {}

/// Summary of a room for listings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomSummary {
    pub id: RoomId,
    pub players: Vec<String>,
}

/// Every live room, keyed by id. The lock only guards whole-room insert,
/// remove and lookup; per-room state lives in each room's actor.
pub struct RoomDirectory {
    rooms: Arc<RwLock<HashMap<RoomId, RoomHandle>>>,
    settings: RoomSettings,
    id_length: usize,
    create_attempts: usize,
}

impl RoomDirectory {
    pub fn new(settings: RoomSettings, id_length: usize, create_attempts: usize) -> Self {
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            settings,
            id_length: id_length.max(1),
            create_attempts: create_attempts.max(1),
        }
    }

    /// Create a room guarded by `key` (empty for an open room).
    pub async fn create(&self, key: &str) -> Result<RoomHandle, DirectoryError> {
        let mut rooms = self.rooms.write().await;
        for _ in 0..self.create_attempts {
            let id = generate_room_id(&mut rand::rng(), self.id_length);
            if rooms.contains_key(&id) {
                tracing::debug!(room_id = %id, "Room id collision, retrying");
                continue;
            }

            let registry = Arc::clone(&self.rooms);
            let closing_id = id.clone();
            let handle = spawn_room(id.clone(), key.to_string(), self.settings.clone(), move || async move {
                registry.write().await.remove(&closing_id);
            });
            rooms.insert(id.clone(), handle.clone());
            tracing::info!(room_id = %id, "Room created");
            return Ok(handle);
        }
        tracing::warn!(attempts = self.create_attempts, "Could not allocate a room id");
        Err(DirectoryError::Busy)
    }

    pub async fn get(&self, id: &str) -> Option<RoomHandle> {
        self.rooms.read().await.get(id).cloned()
    }

    /// Look up a room for `player_id` to join with `key`.
    pub async fn join_check(
        &self,
        id: &str,
        key: &str,
        player_id: &str,
    ) -> Result<RoomHandle, DirectoryError> {
        let room = self
            .get(id)
            .await
            .ok_or_else(|| DirectoryError::NotFound(id.to_string()))?;
        if room.key() != key {
            return Err(DirectoryError::KeyMismatch(id.to_string()));
        }
        if !room.has_room_for(player_id) {
            return Err(DirectoryError::RoomFull(id.to_string()));
        }
        Ok(room)
    }

    /// Snapshot of every open room, sorted by id.
    pub async fn list(&self) -> Vec<RoomSummary> {
        let rooms = self.rooms.read().await;
        let mut out: Vec<RoomSummary> = rooms
            .values()
            .filter(|room| !room.is_closed())
            .map(|room| RoomSummary {
                id: room.id().to_string(),
                players: room.members(),
            })
            .collect();
        out.sort_by(|a, b| a.id.cmp(&b.id));
        out
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }
}

/// Generate a room id of `len` characters from `A-Z0-9`.
pub fn generate_room_id<R: Rng + ?Sized>(rng: &mut R, len: usize) -> RoomId {
    (0..len)
        .map(|_| ROOM_ID_CHARS[rng.random_range(0..ROOM_ID_CHARS.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use axum::extract::ws::Utf8Bytes;
    use tokio::sync::mpsc;
    use uuid::Uuid;

    use super::*;
    use crate::config::ServerConfig;
    use crate::room::ConnectionHandle;

    fn directory() -> RoomDirectory {
        let config = ServerConfig::default();
        RoomDirectory::new(
            RoomSettings::from(&config),
            config.rooms.id_length,
            config.rooms.create_attempts,
        )
    }

    fn conn(player_id: &str) -> (ConnectionHandle, mpsc::Receiver<Utf8Bytes>) {
        let (sender, rx) = mpsc::channel(8);
        let handle = ConnectionHandle {
            player_id: player_id.to_string(),
            conn_id: Uuid::new_v4(),
            sender,
        };
        (handle, rx)
    }

    #[test]
    fn room_ids_use_the_alphabet() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..100 {
            let id = generate_room_id(&mut rng, 5);
            assert_eq!(id.len(), 5);
            assert!(id.bytes().all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn create_then_get() {
        let dir = directory();
        let room = dir.create("secret").await.unwrap();
        assert_eq!(room.id().len(), 5);
        assert_eq!(dir.len().await, 1);
        let found = dir.get(room.id()).await.unwrap();
        assert_eq!(found.key(), "secret");
        assert!(dir.get("NOPE0").await.is_none());
    }

    #[tokio::test]
    async fn join_check_errors() {
        let dir = directory();
        let room = dir.create("k").await.unwrap();
        let id = room.id().to_string();

        assert_eq!(
            dir.join_check("ZZZZZ", "k", "alice").await.unwrap_err(),
            DirectoryError::NotFound("ZZZZZ".into())
        );
        assert_eq!(
            dir.join_check(&id, "wrong", "alice").await.unwrap_err(),
            DirectoryError::KeyMismatch(id.clone())
        );

        // receivers stay alive, a closed queue gets evicted on the ready broadcast
        let (alice, _alice_rx) = conn("alice");
        let (bob, _bob_rx) = conn("bob");
        room.join(alice).await.unwrap();
        room.join(bob).await.unwrap();
        assert_eq!(
            dir.join_check(&id, "k", "carol").await.unwrap_err(),
            DirectoryError::RoomFull(id.clone())
        );
        // a member may always come back
        assert!(dir.join_check(&id, "k", "alice").await.is_ok());
    }

    #[tokio::test]
    async fn room_leaves_directory_when_emptied() {
        let dir = directory();
        let room = dir.create("").await.unwrap();
        let (alice, _rx) = conn("alice");
        let conn_id = alice.conn_id;
        room.join(alice).await.unwrap();
        assert_eq!(dir.list().await[0].players, vec!["alice"]);

        room.leave("alice", conn_id);
        tokio::time::timeout(Duration::from_secs(1), async {
            while !dir.is_empty().await {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("room should be removed");
    }

    #[tokio::test]
    async fn one_letter_ids_run_out() {
        let config = ServerConfig::default();
        let dir = RoomDirectory::new(RoomSettings::from(&config), 1, 3);
        let mut created = 0;
        let mut busy = 0;
        for _ in 0..200 {
            match dir.create("").await {
                Ok(_) => created += 1,
                Err(DirectoryError::Busy) => busy += 1,
                Err(e) => panic!("unexpected error {e}"),
            }
        }
        assert!(created <= ROOM_ID_CHARS.len());
        assert!(busy > 0);
        assert_eq!(dir.len().await, created);
    }
}
