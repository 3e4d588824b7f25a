/// Garbage lines sent for a clear.
///
/// Base is `lines - 1`. An active combo adds 1, a spin clear adds 2, a
/// back-to-back clear adds 3 for spins and 2 otherwise, and a perfect clear
/// adds 4. Clearing nothing sends nothing.
pub fn calculate_garbage_rows(
    lines: usize,
    has_spin: bool,
    combo: u32,
    b2b: bool,
    perfect: bool,
) -> u32 {
    if lines == 0 {
        return 0;
    }
    let mut rows = lines as u32 - 1;
    if combo > 0 {
        rows += 1;
    }
    if has_spin {
        rows += 2;
    }
    if b2b {
        rows += if has_spin { 3 } else { 2 };
    }
    if perfect {
        rows += 4;
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn four_line_clear_sends_three() {
        assert_eq!(calculate_garbage_rows(4, false, 0, false, false), 3);
    }

    #[test]
    fn spin_single_sends_two() {
        assert_eq!(calculate_garbage_rows(1, true, 0, false, false), 2);
    }

    #[test]
    fn plain_single_sends_nothing() {
        assert_eq!(calculate_garbage_rows(1, false, 0, false, false), 0);
    }

    #[test]
    fn bonuses_stack() {
        // double (1) + combo (1) + spin (2) + b2b spin (3) + perfect (4)
        assert_eq!(calculate_garbage_rows(2, true, 3, true, true), 11);
        // tetris under back-to-back
        assert_eq!(calculate_garbage_rows(4, false, 0, true, false), 5);
    }

    #[test]
    fn no_lines_no_garbage() {
        assert_eq!(calculate_garbage_rows(0, true, 5, true, true), 0);
    }
}
