use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use stackduel_core::board::BOARD_WIDTH;
use stackduel_core::frame_queue::{Attack, Frame, FrameError, FrameQueue};
use stackduel_core::input::InputSet;
use stackduel_core::net::messages::{
    FrameInput, GameOverMsg, InputEchoMsg, ServerMessage, StateSyncMsg,
};
use stackduel_core::piece::Tetromino;
use stackduel_core::state::{BoardState, FrameOutcome, SimParams};

use crate::config::GameConfig;
use crate::game_loop::{ClockHandle, TickFlow, TickHandler};
use crate::room::{Packet, PlayerId, RoomHandle, Target};

/// Everything an executor needs at construction.
pub struct ExecutorSetup {
    pub player_id: PlayerId,
    pub opponent_id: PlayerId,
    pub bag: Vec<Tetromino>,
    pub match_id: u64,
    pub room: RoomHandle,
    pub opponent_clock: ClockHandle,
    pub config: GameConfig,
}

/// Drives one player's simulation. Owned by that player's clock task.
pub struct FrameExecutor {
    player_id: PlayerId,
    opponent_id: PlayerId,
    match_id: u64,
    bag: Vec<Tetromino>,
    queue: FrameQueue,
    /// Latest frame the client has confirmed, or the server has assumed.
    net_frame: Frame,
    params: SimParams,
    catch_up_threshold: Frame,
    sync_interval: u64,
    room: RoomHandle,
    opponent_clock: ClockHandle,
    /// Attacks whose landing frame is still past the queue horizon.
    pending: Vec<Attack>,
    rng: StdRng,
}

impl FrameExecutor {
    pub fn new(setup: ExecutorSetup) -> Self {
        let params = setup.config.sim_params();
        let initial = BoardState::spawn(&setup.bag, &params);
        let queue = FrameQueue::new(
            setup.config.queue_capacity,
            setup.config.incoming_delay,
            initial,
        );
        Self {
            player_id: setup.player_id,
            opponent_id: setup.opponent_id,
            match_id: setup.match_id,
            bag: setup.bag,
            queue,
            net_frame: 1,
            params,
            catch_up_threshold: setup.config.catch_up_threshold,
            sync_interval: setup.config.sync_interval.max(1),
            room: setup.room,
            opponent_clock: setup.opponent_clock,
            pending: Vec::new(),
            rng: StdRng::seed_from_u64(rand::rng().random()),
        }
    }

    fn send(&self, target: Target, msg: &ServerMessage) {
        match Packet::encode(target, msg) {
            Ok(packet) => {
                self.room.broadcast(packet);
            },
            Err(e) => {
                tracing::error!(player_id = %self.player_id, error = %e, "Failed to encode message");
            },
        }
    }

    fn snapshot(&self, state: &BoardState, latest_frame: Frame) -> StateSyncMsg {
        StateSyncMsg {
            state: state.into(),
            latest_frame,
        }
    }

    fn schedule(&mut self, attack: Attack) -> Result<(), FrameError> {
        let landing = self.queue.garbage_upcoming(attack.at_frame, attack.lines)?;
        tracing::debug!(player_id = %self.player_id, lines = attack.lines, landing, "Garbage scheduled");
        Ok(())
    }

    /// Move held attacks into the queue once their landing frame is
    /// addressable.
    fn schedule_pending(&mut self) -> Result<(), FrameError> {
        let horizon = self.queue.horizon();
        let incoming = self.queue.incoming();
        let (due, held): (Vec<Attack>, Vec<Attack>) = std::mem::take(&mut self.pending)
            .into_iter()
            .partition(|a| a.at_frame + incoming <= horizon);
        self.pending = held;
        for attack in due {
            self.schedule(attack)?;
        }
        Ok(())
    }

    /// Simulate one frame on top of the previous one. Returns true on game
    /// over.
    fn step(&mut self, frame: Frame) -> Result<bool, FrameError> {
        self.schedule_pending()?;
        let input = self.queue.get(frame)?.input;
        let mut next = self.queue.get(frame - 1)?.derive_next(input);

        let due = self.queue.garbage_at(frame)?;
        let cancel = self.queue.cancel_at(frame)?;
        let hole = self.rng.random_range(0..BOARD_WIDTH);
        let absorbed = next.absorb_garbage(due, cancel, hole);
        if absorbed.landed > 0 {
            tracing::debug!(player_id = %self.player_id, frame, lines = absorbed.landed, "Garbage landed");
            let sync = self.snapshot(&next, frame - 1);
            self.send(
                Target::Direct(self.player_id.clone()),
                &ServerMessage::GarbageSync(sync),
            );
        }

        let outcome = if absorbed.game_over {
            FrameOutcome {
                game_over: true,
                ..FrameOutcome::default()
            }
        } else {
            next.advance(&self.bag, &self.params)
        };

        if outcome.sent > 0 {
            self.queue.cancel_garbage(frame, outcome.sent)?;
        }
        if let Some(lines) = outcome.attack {
            tracing::debug!(player_id = %self.player_id, frame, lines, "Sending attack");
            self.opponent_clock.attack(Attack {
                lines,
                at_frame: frame,
            });
        }

        next.input = InputSet::EMPTY;
        self.queue.set(frame, next)?;
        self.queue.forward();
        Ok(outcome.game_over)
    }

    fn finish(&self) {
        tracing::info!(
            player_id = %self.player_id,
            winner = %self.opponent_id,
            frame = self.queue.sim_frame(),
            "Player topped out"
        );
        self.send(
            Target::All,
            &ServerMessage::GameOver(GameOverMsg {
                player_id: self.opponent_id.clone(),
            }),
        );
        self.opponent_clock.quit();
        self.room.report_game_over(self.match_id, &self.opponent_id);
    }

    fn sync_opponent(&self) {
        let sim = self.queue.sim_frame();
        match self.queue.get(sim) {
            Ok(state) => {
                let sync = self.snapshot(state, sim);
                self.send(
                    Target::Except(self.player_id.clone()),
                    &ServerMessage::Opponent(sync),
                );
            },
            Err(e) => tracing::warn!(player_id = %self.player_id, error = %e, "Cannot read current frame"),
        }
    }
}

impl TickHandler for FrameExecutor {
    fn on_tick(&mut self, tick: u64) -> TickFlow {
        let tick_frame = tick as Frame;
        if self.net_frame + self.catch_up_threshold < tick_frame {
            self.net_frame += 1;
        }

        let first = self.queue.sim_frame() + 1;
        for frame in first..=self.net_frame {
            match self.step(frame) {
                Ok(false) => {},
                Ok(true) => {
                    self.finish();
                    return TickFlow::Stop;
                },
                Err(e) => {
                    tracing::warn!(player_id = %self.player_id, frame, error = %e, "Simulation stalled");
                    break;
                },
            }
        }

        if tick % self.sync_interval == 0 {
            self.sync_opponent();
        }
        TickFlow::Continue
    }

    fn on_inputs(&mut self, inputs: Vec<FrameInput>, latest_frame: Frame) {
        let mut confirmed = Vec::new();
        let sim_frame = self.queue.sim_frame();
        for input in inputs {
            // its slot is already simulated and would replay a lap later
            if input.frame <= sim_frame {
                tracing::debug!(player_id = %self.player_id, frame = input.frame, sim_frame, "Dropping late input");
                continue;
            }
            match self.queue.get_mut(input.frame) {
                Ok(slot) => {
                    let keys = InputSet::from_keys(&input.keys);
                    slot.input = keys;
                    if !keys.is_empty() {
                        confirmed.push(FrameInput {
                            frame: input.frame,
                            keys: keys.key_names(),
                        });
                    }
                },
                Err(e) => {
                    tracing::warn!(player_id = %self.player_id, frame = input.frame, error = %e, "Dropping stale input");
                },
            }
        }

        if !confirmed.is_empty() {
            self.send(
                Target::Direct(self.player_id.clone()),
                &ServerMessage::InputServer(InputEchoMsg { inputs: confirmed }),
            );
        }

        self.net_frame = self.net_frame.max(latest_frame.min(self.queue.horizon()));
    }

    fn on_attack(&mut self, attack: Attack) {
        if attack.at_frame + self.queue.incoming() > self.queue.horizon() {
            tracing::debug!(player_id = %self.player_id, lines = attack.lines, at_frame = attack.at_frame, "Holding attack");
            self.pending.push(attack);
            return;
        }
        if let Err(e) = self.schedule(attack) {
            tracing::warn!(player_id = %self.player_id, lines = attack.lines, error = %e, "Dropping attack");
        }
    }
}
