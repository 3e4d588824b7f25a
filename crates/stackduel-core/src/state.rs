use crate::board::{
    Grid, SPAWN_COL, SPAWN_ROW, clear_lines, empty_board, find_landing_row, has_collision,
    is_perfect_clear, place_block, take_garbage,
};
use crate::input::{InputKey, InputSet};
use crate::kick::kick_offsets;
use crate::piece::{Block, Tetromino};
use crate::scoring::calculate_garbage_rows;

/// Default ticks per second.
pub const DEFAULT_TICK_RATE: u32 = 30;
pub const DEFAULT_DROP_SPEED_MS: f64 = 800.0;
pub const DEFAULT_SOFT_DROP_MS: f64 = 100.0;
pub const DEFAULT_LOCK_DELAY_MS: f64 = 300.0;

/// Timing parameters for one simulation step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimParams {
    /// Milliseconds of game time per frame.
    pub interval_ms: f64,
    pub drop_speed_ms: f64,
    pub soft_drop_ms: f64,
    pub lock_delay_ms: f64,
}

impl SimParams {
    pub fn for_tick_rate(tick_rate: u32) -> Self {
        Self {
            interval_ms: 1000.0 / f64::from(tick_rate.max(1)),
            ..Self::default()
        }
    }
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            interval_ms: 1000.0 / f64::from(DEFAULT_TICK_RATE),
            drop_speed_ms: DEFAULT_DROP_SPEED_MS,
            soft_drop_ms: DEFAULT_SOFT_DROP_MS,
            lock_delay_ms: DEFAULT_LOCK_DELAY_MS,
        }
    }
}

/// Kind of the last line clear, used for back-to-back bonuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClearKind {
    #[default]
    None,
    Quad,
    Spin,
}

/// What happened during one frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameOutcome {
    /// Lines cleared by a lock this frame.
    pub cleared: usize,
    /// Garbage generated by this frame's clear (already added to `send`).
    pub sent: u32,
    /// Accumulated garbage released to the opponent when a combo ended.
    pub attack: Option<u32>,
    pub game_over: bool,
}

/// Result of landing scheduled garbage on a frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Absorbed {
    pub landed: u32,
    pub game_over: bool,
}

/// One player's state at one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct BoardState {
    pub board: Grid,
    pub block: Block,
    pub hold: Option<Tetromino>,
    pub can_hold: bool,
    pub row: i32,
    pub col: i32,
    pub gravity_timer: f64,
    pub lock_timer: f64,
    pub drop_speed: f64,
    pub on_ground: bool,
    /// Last successful action was a rotation.
    pub spun: bool,
    /// Keys recorded for this frame. Cleared once the frame is simulated.
    pub input: InputSet,
    pub combo: u32,
    pub b2b: ClearKind,
    /// Garbage accumulated during the current combo, not yet sent.
    pub send: u32,
    /// Cancel credit against incoming garbage. Never positive.
    pub cancel: i32,
    /// Index of the next piece to take from the bag.
    pub next_piece: usize,
}

fn nth_piece(bag: &[Tetromino], index: usize) -> Tetromino {
    if bag.is_empty() {
        Tetromino::I
    } else {
        bag[index % bag.len()]
    }
}

impl BoardState {
    /// Initial state: empty board with the bag's first piece at spawn.
    pub fn spawn(bag: &[Tetromino], params: &SimParams) -> Self {
        Self {
            board: empty_board(),
            block: Block::spawn(nth_piece(bag, 0)),
            hold: None,
            can_hold: true,
            row: SPAWN_ROW,
            col: SPAWN_COL,
            gravity_timer: 0.0,
            lock_timer: 0.0,
            drop_speed: params.drop_speed_ms,
            on_ground: false,
            spun: false,
            input: InputSet::EMPTY,
            combo: 0,
            b2b: ClearKind::None,
            send: 0,
            cancel: 0,
            next_piece: 1,
        }
    }

    /// State for the next frame: a full copy of this one carrying `input`.
    pub fn derive_next(&self, input: InputSet) -> Self {
        Self {
            input,
            ..self.clone()
        }
    }

    pub fn collides(&self, block: &Block, row: i32, col: i32) -> bool {
        has_collision(&self.board, &block.shape, row, col)
    }

    pub fn landing_row(&self) -> i32 {
        find_landing_row(&self.board, &self.block.shape, self.row, self.col)
    }

    /// Land garbage due this frame, offset by cancel credit.
    ///
    /// `cancel_delta` is the frame's cancel-ring entry: negative values add
    /// credit, positive values expire it.
    pub fn absorb_garbage(&mut self, due: u32, cancel_delta: i32, hole_col: usize) -> Absorbed {
        self.cancel = (self.cancel + cancel_delta).min(0);
        if due == 0 {
            return Absorbed::default();
        }
        let due = due as i32;
        let landed = (due + self.cancel).max(0);
        self.cancel = (self.cancel + due).min(0);
        if landed == 0 {
            return Absorbed::default();
        }

        let topped_out = take_garbage(&mut self.board, landed as usize, hole_col);
        self.row = (self.row - landed).max(1);
        Absorbed {
            landed: landed as u32,
            game_over: topped_out || self.collides(&self.block, self.row, self.col),
        }
    }

    /// Run input, gravity and lock for this frame.
    pub fn advance(&mut self, bag: &[Tetromino], params: &SimParams) -> FrameOutcome {
        let mut outcome = FrameOutcome::default();
        if self.apply_input(bag, params) {
            outcome.game_over = true;
            return outcome;
        }

        let landing = self.landing_row();
        if !self.on_ground {
            self.gravity_timer += params.interval_ms;
            if self.gravity_timer >= self.drop_speed {
                if self.row < landing {
                    self.row += 1;
                    self.spun = false;
                }
                self.gravity_timer -= self.drop_speed;
            }
            if self.row >= landing {
                self.on_ground = true;
            }
        } else {
            self.lock_timer += params.interval_ms;
        }

        if self.on_ground {
            if self.row < self.landing_row() {
                self.on_ground = false;
                self.lock_timer = 0.0;
            } else if self.lock_timer >= params.lock_delay_ms {
                self.lock(bag, &mut outcome);
            }
        }
        outcome
    }

    /// Returns true when a hold spawned into a collision.
    fn apply_input(&mut self, bag: &[Tetromino], params: &SimParams) -> bool {
        let input = self.input;
        for key in input.keys() {
            match key {
                InputKey::Left => self.try_shift(-1),
                InputKey::Right => self.try_shift(1),
                InputKey::RotateRight => self.try_rotate(self.block.rotated_right()),
                InputKey::RotateLeft => self.try_rotate(self.block.rotated_left()),
                InputKey::SoftDropOn => self.drop_speed = params.soft_drop_ms,
                InputKey::SoftDropOff => self.drop_speed = params.drop_speed_ms,
                InputKey::Hold => {
                    if self.hold_piece(bag) {
                        return true;
                    }
                },
                InputKey::HardDrop => {
                    self.row = self.landing_row();
                    self.on_ground = true;
                    self.lock_timer = params.lock_delay_ms;
                },
            }
        }
        false
    }

    fn try_shift(&mut self, dc: i32) {
        if !self.collides(&self.block, self.row, self.col + dc) {
            self.col += dc;
            self.spun = false;
        }
    }

    fn try_rotate(&mut self, rotated: Block) {
        let kicks = kick_offsets(rotated.shape.size(), self.block.form, rotated.form);
        for &(dx, dy) in kicks {
            let (row, col) = (self.row + dy, self.col + dx);
            if !self.collides(&rotated, row, col) {
                self.block = rotated;
                self.row = row;
                self.col = col;
                self.spun = true;
                return;
            }
        }
    }

    /// Swap the active piece into the hold slot. Returns true on a spawn
    /// collision.
    fn hold_piece(&mut self, bag: &[Tetromino]) -> bool {
        if !self.can_hold {
            return false;
        }
        let current = self.block.kind;
        let incoming = match self.hold.replace(current) {
            Some(held) => held,
            None => {
                let next = nth_piece(bag, self.next_piece);
                self.next_piece += 1;
                next
            },
        };
        self.reset_piece(Block::spawn(incoming));
        self.can_hold = false;
        self.collides(&self.block, self.row, self.col)
    }

    fn reset_piece(&mut self, block: Block) {
        self.block = block;
        self.row = SPAWN_ROW;
        self.col = SPAWN_COL;
        self.gravity_timer = 0.0;
        self.lock_timer = 0.0;
        self.on_ground = false;
        self.spun = false;
    }

    fn lock(&mut self, bag: &[Tetromino], outcome: &mut FrameOutcome) {
        place_block(&mut self.board, &self.block.shape, self.row, self.col);
        let lines = clear_lines(&mut self.board);
        outcome.cleared = lines;

        if lines > 0 {
            let kind = if self.spun {
                ClearKind::Spin
            } else if lines == 4 {
                ClearKind::Quad
            } else {
                ClearKind::None
            };
            let b2b = kind != ClearKind::None && self.b2b != ClearKind::None;
            let perfect = is_perfect_clear(&self.board);
            let sent = calculate_garbage_rows(lines, self.spun, self.combo, b2b, perfect);
            self.send += sent;
            outcome.sent = sent;
            self.b2b = kind;
            self.combo += 1;
        } else {
            self.combo = 0;
            self.b2b = ClearKind::None;
            if self.send > 0 {
                outcome.attack = Some(self.send);
                self.send = 0;
            }
        }

        let next = nth_piece(bag, self.next_piece);
        self.next_piece += 1;
        self.reset_piece(Block::spawn(next));
        self.can_hold = true;
        outcome.game_over = self.collides(&self.block, self.row, self.col);
    }
}
