pub mod bag;
pub mod board;
pub mod frame_queue;
pub mod input;
pub mod kick;
pub mod net;
pub mod piece;
pub mod scoring;
pub mod state;
pub mod time;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::board::{BOARD_HEIGHT, BOARD_WIDTH, Grid};
    use crate::net::messages::{FrameInput, InputBatchMsg};
    use crate::piece::Tetromino;
    use crate::state::{BoardState, SimParams};

    /// A bag that deals nothing but `piece`.
    pub fn uniform_bag(piece: Tetromino, len: usize) -> Vec<Tetromino> {
        vec![piece; len]
    }

    /// Fresh state for a uniform bag with default timing.
    pub fn spawned(piece: Tetromino) -> BoardState {
        BoardState::spawn(&[piece], &SimParams::default())
    }

    /// Fill the bottom `rows` rows, leaving `gap` open in each.
    pub fn stack_with_gap(board: &mut Grid, rows: usize, gap: usize) {
        for row in &mut board[BOARD_HEIGHT - rows..] {
            *row = [1; BOARD_WIDTH];
            row[gap] = 0;
        }
    }

    /// An input batch with one key list per consecutive frame, starting at
    /// `first`.
    pub fn input_batch(first: i64, frames: &[&[&str]]) -> InputBatchMsg {
        let inputs: Vec<FrameInput> = frames
            .iter()
            .enumerate()
            .map(|(i, keys)| FrameInput {
                frame: first + i as i64,
                keys: keys.iter().map(|k| k.to_string()).collect(),
            })
            .collect();
        let latest_frame = inputs.last().map_or(first - 1, |f| f.frame);
        InputBatchMsg {
            inputs,
            latest_frame,
        }
    }

    // ================================================================
    // Determinism checks
    // ================================================================

    /// Simulate `frames` of key lists from `start` and return every state.
    pub fn replay(
        start: &BoardState,
        bag: &[Tetromino],
        frames: &[&[&str]],
    ) -> Vec<BoardState> {
        let params = SimParams::default();
        let mut out = Vec::with_capacity(frames.len());
        let mut cur = start.clone();
        for keys in frames {
            let mut next = cur.derive_next(crate::input::InputSet::from_keys(keys));
            next.advance(bag, &params);
            out.push(next.clone());
            cur = next;
        }
        out
    }

    /// Replaying the same inputs twice must produce identical states.
    pub fn assert_replay_deterministic(start: &BoardState, bag: &[Tetromino], frames: &[&[&str]]) {
        let a = replay(start, bag, frames);
        let b = replay(start, bag, frames);
        assert_eq!(a, b, "replay must be deterministic for identical inputs");
    }
}
