use std::sync::Arc;

use crate::config::ServerConfig;
use crate::directory::RoomDirectory;
use crate::room::RoomSettings;

#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<RoomDirectory>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let directory = RoomDirectory::new(
            RoomSettings::from(&config),
            config.rooms.id_length,
            config.rooms.create_attempts,
        );
        Self {
            directory: Arc::new(directory),
            config: Arc::new(config),
        }
    }

    /// The socket URL a client should dial for `room_id`.
    pub fn ws_url(&self, room_id: &str, player_id: &str) -> String {
        format!(
            "{}/ws/match?roomid={room_id}&playerid={player_id}",
            self.config.public_ws_base.trim_end_matches('/')
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ws_url_joins_base_and_query() {
        let mut config = ServerConfig::default();
        config.public_ws_base = "wss://duel.example/".to_string();
        let state = AppState::new(config);
        assert_eq!(
            state.ws_url("AB12C", "alice"),
            "wss://duel.example/ws/match?roomid=AB12C&playerid=alice"
        );
    }
}
