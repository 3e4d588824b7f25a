use std::collections::{HashMap, HashSet};

use stackduel_core::bag::generate_bag_sequence;
use stackduel_core::net::messages::{
    ClientMessage, GameOverMsg, PlayerEventMsg, PongMsg, ServerMessage, StartMsg,
};
use stackduel_core::piece::Tetromino;

use crate::config::GameConfig;
use crate::executor::{ExecutorSetup, FrameExecutor};
use crate::game_loop::{ClockHandle, clock_channel, spawn_clock};
use crate::room::{MAX_PLAYERS, Packet, PlayerId, RoomHandle, Target};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Waiting,
    /// Bags dealt, waiting for both `start` messages.
    Prepared,
    Playing,
    Finished,
}

/// One match between the two members of a room. Lives inside the room
/// actor, so every method runs on the actor task.
pub struct Game {
    room: RoomHandle,
    config: GameConfig,
    phase: Phase,
    ready: HashSet<PlayerId>,
    started: HashSet<PlayerId>,
    bags: HashMap<PlayerId, Vec<Tetromino>>,
    clocks: Vec<(PlayerId, ClockHandle)>,
    match_id: u64,
}

impl Game {
    pub fn new(room: RoomHandle, config: GameConfig) -> Self {
        Self {
            room,
            config,
            phase: Phase::Waiting,
            ready: HashSet::new(),
            started: HashSet::new(),
            bags: HashMap::new(),
            clocks: Vec::new(),
            match_id: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Handle a message from `from`. Returns the packets to deliver.
    pub fn on_message(
        &mut self,
        from: &str,
        msg: ClientMessage,
        members: &[PlayerId],
    ) -> Vec<Packet> {
        let mut out = Vec::new();
        match msg {
            ClientMessage::Ready => self.on_ready(from, members, &mut out),
            ClientMessage::Start => self.on_start(from, members),
            ClientMessage::Input(batch) => {
                if self.phase != Phase::Playing {
                    tracing::debug!(player_id = from, "Input outside of a match");
                } else if let Some(clock) = self.clock_for(from) {
                    clock.record_inputs(batch.inputs, batch.latest_frame);
                }
            },
            ClientMessage::Pause => {
                if self.phase == Phase::Playing {
                    for (_, clock) in &self.clocks {
                        clock.pause();
                    }
                    push(&mut out, Target::Except(from.to_string()), &ServerMessage::Pause(PlayerEventMsg {
                        player_id: from.to_string(),
                    }));
                }
            },
            ClientMessage::Unpause => {
                if self.phase == Phase::Playing {
                    for (_, clock) in &self.clocks {
                        clock.resume();
                    }
                    push(&mut out, Target::Except(from.to_string()), &ServerMessage::Unpause(PlayerEventMsg {
                        player_id: from.to_string(),
                    }));
                }
            },
            ClientMessage::Ping(ping) => {
                push(&mut out, Target::Direct(from.to_string()), &ServerMessage::Pong(PongMsg {
                    client_timestamp: ping.sent_at,
                }));
            },
            // The connection handles leaving itself.
            ClientMessage::OutRoom => {},
        }
        out
    }

    fn on_ready(&mut self, from: &str, members: &[PlayerId], out: &mut Vec<Packet>) {
        if members.len() < MAX_PLAYERS {
            push(out, Target::Direct(from.to_string()), &ServerMessage::Start(StartMsg {
                list_block: Vec::new(),
                error: Some("cannot start".to_string()),
            }));
            return;
        }
        if matches!(self.phase, Phase::Playing | Phase::Prepared) {
            tracing::debug!(player_id = from, phase = ?self.phase, "Ignoring ready");
            return;
        }

        self.ready.insert(from.to_string());
        if !members.iter().all(|m| self.ready.contains(m)) {
            return;
        }

        let mut rng = rand::rng();
        self.bags.clear();
        for member in members {
            let bag = generate_bag_sequence(&mut rng, self.config.bag_length);
            push(out, Target::Direct(member.clone()), &ServerMessage::Start(StartMsg {
                list_block: bag.clone(),
                error: None,
            }));
            self.bags.insert(member.clone(), bag);
        }
        self.ready.clear();
        self.started.clear();
        self.phase = Phase::Prepared;
        tracing::info!(room_id = %self.room.id(), "Bags dealt, waiting for start");
    }

    fn on_start(&mut self, from: &str, members: &[PlayerId]) {
        if self.phase != Phase::Prepared {
            tracing::debug!(player_id = from, phase = ?self.phase, "Ignoring start");
            return;
        }
        self.started.insert(from.to_string());
        if members.len() == MAX_PLAYERS && members.iter().all(|m| self.started.contains(m)) {
            self.spawn_executors(&members[0], &members[1]);
        }
    }

    fn spawn_executors(&mut self, a: &str, b: &str) {
        self.match_id += 1;
        let (a_clock, a_rx) = clock_channel();
        let (b_clock, b_rx) = clock_channel();
        let period = self.config.tick_period();

        for (player, opponent, rx, opponent_clock) in [
            (a, b, a_rx, b_clock.clone()),
            (b, a, b_rx, a_clock.clone()),
        ] {
            let executor = FrameExecutor::new(ExecutorSetup {
                player_id: player.to_string(),
                opponent_id: opponent.to_string(),
                bag: self.bags.remove(player).unwrap_or_default(),
                match_id: self.match_id,
                room: self.room.clone(),
                opponent_clock,
                config: self.config.clone(),
            });
            spawn_clock(executor, rx, period);
        }

        self.clocks = vec![(a.to_string(), a_clock), (b.to_string(), b_clock)];
        self.started.clear();
        self.phase = Phase::Playing;
        tracing::info!(room_id = %self.room.id(), match_id = self.match_id, "Game started");
    }

    fn clock_for(&self, player_id: &str) -> Option<&ClockHandle> {
        self.clocks
            .iter()
            .find(|(id, _)| id == player_id)
            .map(|(_, clock)| clock)
    }

    fn quit_clocks(&mut self) {
        for (_, clock) in self.clocks.drain(..) {
            clock.quit();
        }
    }

    /// A member left the room. The remaining player wins a running match.
    pub fn player_left(&mut self, player_id: &str, remaining: &[PlayerId]) -> Vec<Packet> {
        let mut out = Vec::new();
        match self.phase {
            Phase::Playing => {
                self.quit_clocks();
                for winner in remaining {
                    push(&mut out, Target::Direct(winner.clone()), &ServerMessage::GameOver(GameOverMsg {
                        player_id: winner.clone(),
                    }));
                }
                tracing::info!(room_id = %self.room.id(), player_id, "Match abandoned");
                self.reset();
            },
            Phase::Waiting | Phase::Prepared => self.reset(),
            Phase::Finished => {
                self.ready.remove(player_id);
            },
        }
        out
    }

    /// An executor reported game over for `match_id`.
    pub fn finished(&mut self, match_id: u64, winner: &str) {
        if match_id != self.match_id || self.phase != Phase::Playing {
            tracing::debug!(match_id, current = self.match_id, "Ignoring stale game over");
            return;
        }
        tracing::info!(room_id = %self.room.id(), match_id, winner, "Game over");
        self.quit_clocks();
        self.ready.clear();
        self.started.clear();
        self.phase = Phase::Finished;
    }

    pub fn shutdown(&mut self) {
        self.quit_clocks();
    }

    fn reset(&mut self) {
        self.ready.clear();
        self.started.clear();
        self.bags.clear();
        self.phase = Phase::Waiting;
    }
}

fn push(out: &mut Vec<Packet>, target: Target, msg: &ServerMessage) {
    match Packet::encode(target, msg) {
        Ok(packet) => out.push(packet),
        Err(e) => tracing::error!(error = %e, "Failed to encode game message"),
    }
}
