use crate::piece::Shape;

pub const BOARD_WIDTH: usize = 10;
pub const BOARD_HEIGHT: usize = 22;

/// Cell value used for injected garbage rows.
pub const GARBAGE_CELL: u8 = 4;

/// Spawn position of a new piece.
pub const SPAWN_ROW: i32 = 0;
pub const SPAWN_COL: i32 = 4;

/// Row 0 is the top of the well.
pub type Grid = [[u8; BOARD_WIDTH]; BOARD_HEIGHT];

pub fn empty_board() -> Grid {
    [[0; BOARD_WIDTH]; BOARD_HEIGHT]
}

/// True if `shape` placed at (`row`, `col`) leaves the well or overlaps a
/// filled cell.
pub fn has_collision(board: &Grid, shape: &Shape, row: i32, col: i32) -> bool {
    shape.occupied().any(|(dr, dc, _)| {
        let r = row + dr as i32;
        let c = col + dc as i32;
        if r < 0 || c < 0 || r >= BOARD_HEIGHT as i32 || c >= BOARD_WIDTH as i32 {
            return true;
        }
        board[r as usize][c as usize] != 0
    })
}

/// Lowest row the shape can drop to from `row` without colliding. Returns
/// `row` itself when the piece already rests.
pub fn find_landing_row(board: &Grid, shape: &Shape, row: i32, col: i32) -> i32 {
    let mut landing = row;
    while landing < BOARD_HEIGHT as i32 && !has_collision(board, shape, landing + 1, col) {
        landing += 1;
    }
    landing
}

/// Write the shape's cell values into the board. Cells outside the well are
/// skipped.
pub fn place_block(board: &mut Grid, shape: &Shape, row: i32, col: i32) {
    for (dr, dc, value) in shape.occupied() {
        let r = row + dr as i32;
        let c = col + dc as i32;
        if (0..BOARD_HEIGHT as i32).contains(&r) && (0..BOARD_WIDTH as i32).contains(&c) {
            board[r as usize][c as usize] = value;
        }
    }
}

/// Remove every full row. Surviving rows keep their order and settle at the
/// bottom; vacated rows at the top are zeroed. Returns the number cleared.
pub fn clear_lines(board: &mut Grid) -> usize {
    let mut write = BOARD_HEIGHT;
    for read in (0..BOARD_HEIGHT).rev() {
        if board[read].iter().all(|&c| c != 0) {
            continue;
        }
        write -= 1;
        if write != read {
            board[write] = board[read];
        }
    }
    for row in board.iter_mut().take(write) {
        *row = [0; BOARD_WIDTH];
    }
    write
}

/// Push `lines` garbage rows in from the bottom, each filled with
/// [`GARBAGE_CELL`] except for `hole_col`. Returns true when a non-empty row
/// was pushed off the top.
pub fn take_garbage(board: &mut Grid, lines: usize, hole_col: usize) -> bool {
    let lines = lines.min(BOARD_HEIGHT);
    if lines == 0 {
        return false;
    }
    let topped_out = board[..lines]
        .iter()
        .any(|row| row.iter().any(|&c| c != 0));

    board.copy_within(lines.., 0);

    let mut garbage = [GARBAGE_CELL; BOARD_WIDTH];
    if hole_col < BOARD_WIDTH {
        garbage[hole_col] = 0;
    }
    for row in board.iter_mut().skip(BOARD_HEIGHT - lines) {
        *row = garbage;
    }
    topped_out
}

pub fn is_perfect_clear(board: &Grid) -> bool {
    board.iter().all(|row| row.iter().all(|&c| c == 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piece::Tetromino;

    fn full_row() -> [u8; BOARD_WIDTH] {
        [1; BOARD_WIDTH]
    }

    #[test]
    fn empty_board_has_no_collision_at_spawn() {
        let board = empty_board();
        for kind in Tetromino::ALL {
            assert!(!has_collision(&board, &kind.spawn_shape(), SPAWN_ROW, SPAWN_COL));
        }
    }

    #[test]
    fn walls_and_floor_collide() {
        let board = empty_board();
        let shape = Tetromino::O.spawn_shape();
        assert!(has_collision(&board, &shape, 0, -1));
        assert!(has_collision(&board, &shape, 0, BOARD_WIDTH as i32 - 1));
        assert!(has_collision(&board, &shape, BOARD_HEIGHT as i32 - 1, 0));
        assert!(!has_collision(&board, &shape, BOARD_HEIGHT as i32 - 2, 0));
    }

    #[test]
    fn landing_row_on_empty_board() {
        let board = empty_board();
        let shape = Tetromino::I.spawn_shape();
        assert_eq!(find_landing_row(&board, &shape, 0, 3), BOARD_HEIGHT as i32 - 1);
        let t = Tetromino::T.spawn_shape();
        assert_eq!(find_landing_row(&board, &t, 0, 3), BOARD_HEIGHT as i32 - 2);
    }

    #[test]
    fn landing_row_stops_on_stack() {
        let mut board = empty_board();
        board[BOARD_HEIGHT - 1] = [1, 1, 1, 1, 0, 1, 1, 1, 1, 1];
        let shape = Tetromino::O.spawn_shape();
        assert_eq!(find_landing_row(&board, &shape, 0, 0), BOARD_HEIGHT as i32 - 3);
    }

    #[test]
    fn place_writes_shape_values() {
        let mut board = empty_board();
        place_block(&mut board, &Tetromino::S.spawn_shape(), 20, 0);
        assert_eq!(board[20][..3], [0, 2, 2]);
        assert_eq!(board[21][..3], [2, 2, 0]);
    }

    #[test]
    fn clear_lines_drops_rows_in_order() {
        let mut board = empty_board();
        board[18][0] = 5;
        board[19] = full_row();
        board[20][1] = 6;
        board[21] = full_row();

        assert_eq!(clear_lines(&mut board), 2);
        assert_eq!(board[21][1], 6);
        assert_eq!(board[20][0], 5);
        assert!(board[..20].iter().all(|r| r.iter().all(|&c| c == 0)));
    }

    #[test]
    fn clear_nothing_leaves_board_unchanged() {
        let mut board = empty_board();
        board[21] = [1, 1, 1, 1, 1, 1, 1, 1, 1, 0];
        board[10][3] = 2;
        let before = board;
        assert_eq!(clear_lines(&mut board), 0);
        assert_eq!(board, before);
    }

    #[test]
    fn garbage_pushes_stack_up() {
        let mut board = empty_board();
        board[21][0] = 7;
        let topped = take_garbage(&mut board, 2, 3);
        assert!(!topped);
        assert_eq!(board[19][0], 7);
        for row in &board[20..] {
            assert_eq!(row[3], 0);
            assert_eq!(row.iter().filter(|&&c| c == GARBAGE_CELL).count(), BOARD_WIDTH - 1);
        }
    }

    #[test]
    fn garbage_reports_top_out() {
        let mut board = empty_board();
        board[0][5] = 1;
        assert!(take_garbage(&mut board, 1, 0));
    }

    #[test]
    fn perfect_clear_detection() {
        let mut board = empty_board();
        assert!(is_perfect_clear(&board));
        board[21][9] = 1;
        assert!(!is_perfect_clear(&board));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_board() -> impl Strategy<Value = Grid> {
            proptest::collection::vec(
                proptest::collection::vec(prop_oneof![Just(0u8), Just(1u8)], BOARD_WIDTH),
                BOARD_HEIGHT,
            )
            .prop_map(|rows| {
                let mut grid = empty_board();
                for (r, row) in rows.iter().enumerate() {
                    grid[r].copy_from_slice(row);
                }
                grid
            })
        }

        proptest! {
            #[test]
            fn clear_lines_keeps_partial_rows_in_order(board in arb_board()) {
                let partial: Vec<_> = board
                    .iter()
                    .filter(|r| r.iter().any(|&c| c == 0))
                    .copied()
                    .collect();
                let mut cleared = board;
                let n = clear_lines(&mut cleared);

                prop_assert_eq!(n, BOARD_HEIGHT - partial.len());
                prop_assert!(cleared[..n].iter().all(|r| r.iter().all(|&c| c == 0)));
                prop_assert!(cleared.iter().all(|r| r.iter().any(|&c| c == 0)));
                let tail: Vec<_> = cleared[n..].to_vec();
                prop_assert_eq!(tail, partial);
            }
        }
    }
}
