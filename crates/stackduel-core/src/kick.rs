//! SRS wall-kick offsets.
//!
//! Each entry is `(dx, dy)`: `dx` is added to the column and `dy` to the
//! row of the rotated piece. Candidates are tried in order and the first
//! one that fits wins.

pub type Kick = (i32, i32);

// Indexed by `transition_index(from, to)`.
const JLSTZ_KICKS: [[Kick; 5]; 8] = [
    [(0, 0), (-1, 0), (-1, 1), (0, -2), (-1, -2)], // 0->1
    [(0, 0), (1, 0), (1, -1), (0, 2), (1, 2)],     // 1->2
    [(0, 0), (1, 0), (1, 1), (0, -2), (1, -2)],    // 2->3
    [(0, 0), (-1, 0), (-1, -1), (0, 2), (-1, 2)],  // 3->0
    [(0, 0), (1, 0), (1, -1), (0, 2), (1, 2)],     // 1->0
    [(0, 0), (-1, 0), (-1, 1), (0, -2), (-1, -2)], // 2->1
    [(0, 0), (-1, 0), (-1, -1), (0, 2), (-1, 2)],  // 3->2
    [(0, 0), (1, 0), (1, 1), (0, -2), (1, -2)],    // 0->3
];

const I_KICKS: [[Kick; 5]; 8] = [
    [(0, 0), (-2, 0), (1, 0), (-2, -1), (1, 2)], // 0->1
    [(0, 0), (-1, 0), (2, 0), (-1, 2), (2, -1)], // 1->2
    [(0, 0), (2, 0), (-1, 0), (2, 1), (-1, -2)], // 2->3
    [(0, 0), (1, 0), (-2, 0), (1, -2), (-2, 1)], // 3->0
    [(0, 0), (2, 0), (-1, 0), (2, 1), (-1, -2)], // 1->0
    [(0, 0), (1, 0), (-2, 0), (1, -2), (-2, 1)], // 2->1
    [(0, 0), (-2, 0), (1, 0), (-2, -1), (1, 2)], // 3->2
    [(0, 0), (-1, 0), (2, 0), (-1, 2), (2, -1)], // 0->3
];

const NO_KICKS: [Kick; 1] = [(0, 0)];

fn transition_index(from: u8, to: u8) -> Option<usize> {
    match (from, to) {
        (0, 1) => Some(0),
        (1, 2) => Some(1),
        (2, 3) => Some(2),
        (3, 0) => Some(3),
        (1, 0) => Some(4),
        (2, 1) => Some(5),
        (3, 2) => Some(6),
        (0, 3) => Some(7),
        _ => None,
    }
}

/// Kick candidates for a piece whose matrix has side `size`, rotating from
/// form `from` to form `to`. Non-adjacent transitions and the 2x2 piece only
/// try the unshifted position.
pub fn kick_offsets(size: usize, from: u8, to: u8) -> &'static [Kick] {
    let Some(idx) = transition_index(from, to) else {
        return &NO_KICKS;
    };
    match size {
        3 => &JLSTZ_KICKS[idx],
        4 => &I_KICKS[idx],
        _ => &NO_KICKS,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn o_piece_never_kicks() {
        assert_eq!(kick_offsets(2, 0, 1), &[(0, 0)]);
    }

    #[test]
    fn every_table_starts_unshifted() {
        for size in [3, 4] {
            for (from, to) in [(0, 1), (1, 2), (2, 3), (3, 0), (1, 0), (2, 1), (3, 2), (0, 3)] {
                let kicks = kick_offsets(size, from, to);
                assert_eq!(kicks.len(), 5);
                assert_eq!(kicks[0], (0, 0));
            }
        }
    }

    #[test]
    fn reverse_transitions_negate() {
        // SRS: kicks for b->a are the negation of a->b.
        for size in [3, 4] {
            for (a, b) in [(0, 1), (1, 2), (2, 3), (3, 0)] {
                let fwd = kick_offsets(size, a, b);
                let back = kick_offsets(size, b, a);
                for (f, r) in fwd.iter().zip(back) {
                    assert_eq!((f.0, f.1), (-r.0, -r.1), "size {size} {a}->{b}");
                }
            }
        }
    }

    #[test]
    fn non_adjacent_transition_is_unshifted() {
        assert_eq!(kick_offsets(3, 0, 2), &[(0, 0)]);
    }
}
