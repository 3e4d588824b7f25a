use serde::{Deserialize, Serialize};

/// Largest shape matrix side (the I piece).
pub const MAX_SHAPE: usize = 4;

/// The seven tetrominoes. The discriminant is the id used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum Tetromino {
    I = 1,
    O = 2,
    T = 3,
    S = 4,
    Z = 5,
    J = 6,
    L = 7,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownPiece(pub u8);

impl std::fmt::Display for UnknownPiece {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "unknown piece id: {}", self.0)
    }
}

impl std::error::Error for UnknownPiece {}

impl Tetromino {
    pub const ALL: [Tetromino; 7] = [
        Tetromino::I,
        Tetromino::O,
        Tetromino::T,
        Tetromino::S,
        Tetromino::Z,
        Tetromino::J,
        Tetromino::L,
    ];

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::I),
            2 => Some(Self::O),
            3 => Some(Self::T),
            4 => Some(Self::S),
            5 => Some(Self::Z),
            6 => Some(Self::J),
            7 => Some(Self::L),
            _ => None,
        }
    }

    /// Shape matrix in rotation form 0.
    pub fn spawn_shape(self) -> Shape {
        match self {
            Self::I => I_SHAPE,
            Self::O => O_SHAPE,
            Self::T => T_SHAPE,
            Self::S => S_SHAPE,
            Self::Z => Z_SHAPE,
            Self::J => J_SHAPE,
            Self::L => L_SHAPE,
        }
    }
}

impl From<Tetromino> for u8 {
    fn from(t: Tetromino) -> u8 {
        t.id()
    }
}

impl TryFrom<u8> for Tetromino {
    type Error = UnknownPiece;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Self::from_id(id).ok_or(UnknownPiece(id))
    }
}

/// Square piece matrix of side `size` (2, 3 or 4). Cells outside the
/// `size` x `size` corner are always zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shape {
    size: usize,
    cells: [[u8; MAX_SHAPE]; MAX_SHAPE],
}

const I_SHAPE: Shape = Shape {
    size: 4,
    cells: [[0, 0, 0, 0], [1, 1, 1, 1], [0, 0, 0, 0], [0, 0, 0, 0]],
};
const O_SHAPE: Shape = Shape {
    size: 2,
    cells: [[1, 1, 0, 0], [1, 1, 0, 0], [0, 0, 0, 0], [0, 0, 0, 0]],
};
const T_SHAPE: Shape = Shape {
    size: 3,
    cells: [[0, 1, 0, 0], [1, 1, 1, 0], [0, 0, 0, 0], [0, 0, 0, 0]],
};
const S_SHAPE: Shape = Shape {
    size: 3,
    cells: [[0, 2, 2, 0], [2, 2, 0, 0], [0, 0, 0, 0], [0, 0, 0, 0]],
};
const Z_SHAPE: Shape = Shape {
    size: 3,
    cells: [[3, 3, 0, 0], [0, 3, 3, 0], [0, 0, 0, 0], [0, 0, 0, 0]],
};
const J_SHAPE: Shape = Shape {
    size: 3,
    cells: [[2, 0, 0, 0], [2, 2, 2, 0], [0, 0, 0, 0], [0, 0, 0, 0]],
};
const L_SHAPE: Shape = Shape {
    size: 3,
    cells: [[0, 0, 3, 0], [3, 3, 3, 0], [0, 0, 0, 0], [0, 0, 0, 0]],
};

impl Shape {
    pub fn size(&self) -> usize {
        self.size
    }

    /// Clockwise quarter turn: `out[i][j] = in[n-1-j][i]`.
    pub fn rotate_right(&self) -> Shape {
        let n = self.size;
        let mut cells = [[0; MAX_SHAPE]; MAX_SHAPE];
        for (i, row) in cells.iter_mut().enumerate().take(n) {
            for (j, cell) in row.iter_mut().enumerate().take(n) {
                *cell = self.cells[n - 1 - j][i];
            }
        }
        Shape { size: n, cells }
    }

    /// Counter-clockwise quarter turn: `out[i][j] = in[j][n-1-i]`.
    pub fn rotate_left(&self) -> Shape {
        let n = self.size;
        let mut cells = [[0; MAX_SHAPE]; MAX_SHAPE];
        for (i, row) in cells.iter_mut().enumerate().take(n) {
            for (j, cell) in row.iter_mut().enumerate().take(n) {
                *cell = self.cells[j][n - 1 - i];
            }
        }
        Shape { size: n, cells }
    }

    /// Occupied cells as `(row, col, value)`.
    ///
    /// All-zero matrix rows are skipped and the remaining rows are numbered
    /// consecutively from 0, so an I piece lying flat occupies row 0 of its
    /// position rather than row 1. Board collision, placement and the
    /// client renderer all rely on this compaction.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, usize, u8)> + '_ {
        let n = self.size;
        self.cells[..n]
            .iter()
            .filter(move |row| row[..n].iter().any(|&c| c != 0))
            .enumerate()
            .flat_map(move |(r, row)| {
                row[..n]
                    .iter()
                    .enumerate()
                    .filter(|&(_, &c)| c != 0)
                    .map(move |(c, &v)| (r, c, v))
            })
    }

    /// Matrix as nested vectors, the form sent to clients.
    pub fn rows(&self) -> Vec<Vec<u8>> {
        self.cells[..self.size]
            .iter()
            .map(|row| row[..self.size].to_vec())
            .collect()
    }
}

/// The active piece: its kind, current matrix and rotation form (0..=3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub kind: Tetromino,
    pub shape: Shape,
    pub form: u8,
}

impl Block {
    pub fn spawn(kind: Tetromino) -> Self {
        Self {
            kind,
            shape: kind.spawn_shape(),
            form: 0,
        }
    }

    pub fn rotated_right(&self) -> Self {
        Self {
            kind: self.kind,
            shape: self.shape.rotate_right(),
            form: (self.form + 1) % 4,
        }
    }

    pub fn rotated_left(&self) -> Self {
        Self {
            kind: self.kind,
            shape: self.shape.rotate_left(),
            form: (self.form + 3) % 4,
        }
    }
}
