use rand::Rng;
use rand::seq::SliceRandom;

use crate::piece::Tetromino;

/// Default number of pieces dealt to each player at match start.
pub const DEFAULT_BAG_LENGTH: usize = 1000;

/// Deal `len` pieces from consecutive shuffled 7-bags.
pub fn generate_bag_sequence<R: Rng + ?Sized>(rng: &mut R, len: usize) -> Vec<Tetromino> {
    let mut out = Vec::with_capacity(len + Tetromino::ALL.len());
    while out.len() < len {
        let mut bag = Tetromino::ALL;
        bag.shuffle(rng);
        out.extend_from_slice(&bag);
    }
    out.truncate(len);
    out
}
