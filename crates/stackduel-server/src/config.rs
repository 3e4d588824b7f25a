use std::time::Duration;

use serde::Deserialize;

use stackduel_core::state::SimParams;

/// Top-level server configuration, loaded from `stackduel.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Prefix for the `ws_url` handed out by the room endpoints.
    pub public_ws_base: String,
    pub limits: LimitsConfig,
    pub heartbeat: HeartbeatConfig,
    pub rooms: RoomsConfig,
    pub game: GameConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            public_ws_base: "ws://localhost:8080".to_string(),
            limits: LimitsConfig::default(),
            heartbeat: HeartbeatConfig::default(),
            rooms: RoomsConfig::default(),
            game: GameConfig::default(),
        }
    }
}

/// Buffer sizes and transport limits.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub player_message_buffer: usize,
    pub room_broadcast_buffer: usize,
    pub max_message_size: usize,
    pub http_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            player_message_buffer: 256,
            room_broadcast_buffer: 32,
            max_message_size: stackduel_core::net::protocol::MAX_MESSAGE_SIZE,
            http_timeout_secs: 10,
        }
    }
}

/// WebSocket keepalive timing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub write_wait_ms: u64,
    pub pong_wait_secs: u64,
    pub ping_period_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            write_wait_ms: 3000,
            pong_wait_secs: 30,
            ping_period_secs: 25,
        }
    }
}

impl HeartbeatConfig {
    pub fn write_wait(&self) -> Duration {
        Duration::from_millis(self.write_wait_ms)
    }

    pub fn pong_wait(&self) -> Duration {
        Duration::from_secs(self.pong_wait_secs)
    }

    pub fn ping_period(&self) -> Duration {
        Duration::from_secs(self.ping_period_secs)
    }
}

/// Room directory and lifecycle settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoomsConfig {
    pub id_length: usize,
    pub create_attempts: usize,
    /// A created room nobody joins is closed after this long.
    pub empty_room_ttl_secs: u64,
    pub max_player_id_len: usize,
    pub max_key_len: usize,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            id_length: 5,
            create_attempts: 5,
            empty_room_ttl_secs: 120,
            max_player_id_len: 15,
            max_key_len: 7,
        }
    }
}

/// Simulation and netcode tuning.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub tick_rate: u32,
    pub queue_capacity: usize,
    /// Frames between an attack and its garbage landing.
    pub incoming_delay: i64,
    /// Ticks of client silence before the server advances the confirmed
    /// frame on its own.
    pub catch_up_threshold: i64,
    /// Ticks between `opponent` snapshots.
    pub sync_interval: u64,
    pub bag_length: usize,
    pub drop_speed_ms: f64,
    pub soft_drop_ms: f64,
    pub lock_delay_ms: f64,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            tick_rate: stackduel_core::state::DEFAULT_TICK_RATE,
            queue_capacity: stackduel_core::frame_queue::DEFAULT_CAPACITY,
            incoming_delay: stackduel_core::frame_queue::DEFAULT_INCOMING,
            catch_up_threshold: 4,
            sync_interval: 3,
            bag_length: stackduel_core::bag::DEFAULT_BAG_LENGTH,
            drop_speed_ms: stackduel_core::state::DEFAULT_DROP_SPEED_MS,
            soft_drop_ms: stackduel_core::state::DEFAULT_SOFT_DROP_MS,
            lock_delay_ms: stackduel_core::state::DEFAULT_LOCK_DELAY_MS,
        }
    }
}

impl GameConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.max(1)))
    }

    pub fn sim_params(&self) -> SimParams {
        SimParams {
            drop_speed_ms: self.drop_speed_ms,
            soft_drop_ms: self.soft_drop_ms,
            lock_delay_ms: self.lock_delay_ms,
            ..SimParams::for_tick_rate(self.tick_rate)
        }
    }
}

impl ServerConfig {
    /// Check for problems the server cannot run with. Returns the first one.
    pub fn check(&self) -> Result<(), String> {
        if self.listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "listen_addr {:?} is not a valid socket address",
                self.listen_addr
            ));
        }
        if self.limits.player_message_buffer == 0 {
            return Err("limits.player_message_buffer must be > 0".to_string());
        }
        if self.limits.room_broadcast_buffer == 0 {
            return Err("limits.room_broadcast_buffer must be > 0".to_string());
        }
        if self.limits.max_message_size == 0 {
            return Err("limits.max_message_size must be > 0".to_string());
        }
        if self.limits.http_timeout_secs == 0 {
            return Err("limits.http_timeout_secs must be > 0".to_string());
        }
        if self.heartbeat.write_wait_ms == 0 || self.heartbeat.ping_period_secs == 0 {
            return Err("heartbeat intervals must be > 0".to_string());
        }
        if self.heartbeat.ping_period_secs >= self.heartbeat.pong_wait_secs {
            return Err("heartbeat.ping_period_secs must be < heartbeat.pong_wait_secs".to_string());
        }
        if self.rooms.id_length == 0 || self.rooms.create_attempts == 0 {
            return Err("rooms.id_length and rooms.create_attempts must be > 0".to_string());
        }
        if self.rooms.max_player_id_len == 0 {
            return Err("rooms.max_player_id_len must be > 0".to_string());
        }
        if self.game.tick_rate == 0 {
            return Err("game.tick_rate must be > 0".to_string());
        }
        if self.game.queue_capacity < 2 {
            return Err("game.queue_capacity must be >= 2".to_string());
        }
        if self.game.incoming_delay <= 0
            || self.game.incoming_delay >= (self.game.queue_capacity / 2) as i64
        {
            return Err("game.incoming_delay must be in 1..queue_capacity/2".to_string());
        }
        if self.game.sync_interval == 0 {
            return Err("game.sync_interval must be > 0".to_string());
        }
        if self.game.bag_length == 0 {
            return Err("game.bag_length must be > 0".to_string());
        }
        if self.game.drop_speed_ms <= 0.0
            || self.game.soft_drop_ms <= 0.0
            || self.game.lock_delay_ms < 0.0
        {
            return Err("game timing values must be positive".to_string());
        }
        Ok(())
    }

    /// Validate configuration, exiting the process on a fatal problem.
    pub fn validate(&self) {
        if let Err(reason) = self.check() {
            tracing::error!(%reason, "Invalid configuration");
            std::process::exit(1);
        }
    }

    /// Load config from `stackduel.toml` if it exists, then apply env var overrides.
    pub fn load() -> Self {
        let mut config = match std::fs::read_to_string("stackduel.toml") {
            Ok(content) => match toml::from_str::<ServerConfig>(&content) {
                Ok(cfg) => {
                    tracing::info!("Loaded configuration from stackduel.toml");
                    cfg
                },
                Err(e) => {
                    tracing::warn!("Failed to parse stackduel.toml: {e}, using defaults");
                    ServerConfig::default()
                },
            },
            Err(_) => {
                tracing::info!("No stackduel.toml found, using defaults");
                ServerConfig::default()
            },
        };
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    /// Apply environment overrides read through `var`.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(addr) = var("STACKDUEL_LISTEN_ADDR")
            && !addr.is_empty()
        {
            self.listen_addr = addr;
        }
        if let Some(val) = var("PORT")
            && let Ok(port) = val.parse::<u16>()
        {
            self.listen_addr = with_port(&self.listen_addr, port);
        }
        if let Some(val) = var("STACKDUEL_TICK_RATE")
            && let Ok(n) = val.parse::<u32>()
        {
            self.game.tick_rate = n;
        }
        if let Some(val) = var("STACKDUEL_PLAYER_BUFFER")
            && let Ok(n) = val.parse::<usize>()
        {
            self.limits.player_message_buffer = n;
        }
    }
}

/// Replace the port of a `host:port` address, keeping the host.
fn with_port(addr: &str, port: u16) -> String {
    match addr.rsplit_once(':') {
        Some((host, _)) => format!("{host}:{port}"),
        None => format!("{addr}:{port}"),
    }
}
