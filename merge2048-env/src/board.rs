//! Board state and move mechanics.
use std::fmt;

/// Side length of the board.
pub const SIDE: usize = 4;

/// Number of cells.
pub const CELLS: usize = SIDE * SIDE;

/// A sliding direction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Slide tiles up.
    Up,
    /// Slide tiles right.
    Right,
    /// Slide tiles down.
    Down,
    /// Slide tiles left.
    Left,
}

impl Direction {
    pub(crate) const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Right,
        Direction::Down,
        Direction::Left,
    ];
}

/// A 4x4 board of tile ranks. A cell holds the exponent of its tile value
/// (`2^rank`), with 0 meaning empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Board {
    cells: [u8; CELLS],
}

/// Cell indices of one line in sliding order: the first index is the cell
/// tiles slide towards.
fn line_indices(dir: Direction, line: usize) -> [usize; SIDE] {
    match dir {
        Direction::Left => [4 * line, 4 * line + 1, 4 * line + 2, 4 * line + 3],
        Direction::Right => [4 * line + 3, 4 * line + 2, 4 * line + 1, 4 * line],
        Direction::Up => [line, line + 4, line + 8, line + 12],
        Direction::Down => [line + 12, line + 8, line + 4, line],
    }
}

impl Board {
    /// An empty board.
    pub fn empty() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) fn from_cells(cells: [u8; CELLS]) -> Self {
        Self { cells }
    }

    /// The rank at a cell index.
    pub fn rank(&self, ix: usize) -> u8 {
        self.cells[ix]
    }

    /// The largest rank on the board.
    pub fn max_rank(&self) -> usize {
        *self.cells.iter().max().unwrap() as usize
    }

    /// Slides and merges all tiles in the given direction.
    ///
    /// Returns the score gained (the sum of the values of the tiles created
    /// by merges), or `None` if the move changed nothing, i.e. was rejected.
    pub fn slide(&mut self, dir: Direction) -> Option<u32> {
        let mut changed = false;
        let mut gained = 0u32;

        for line in 0..SIDE {
            let idx = line_indices(dir, line);
            let vals: Vec<u8> = idx
                .iter()
                .map(|&i| self.cells[i])
                .filter(|&v| v != 0)
                .collect();

            let mut out = [0u8; SIDE];
            let mut k = 0;
            let mut i = 0;
            while i < vals.len() {
                if i + 1 < vals.len() && vals[i] == vals[i + 1] {
                    // A tile created by a merge cannot merge again this move.
                    out[k] = vals[i] + 1;
                    gained += 1u32 << (vals[i] + 1);
                    i += 2;
                } else {
                    out[k] = vals[i];
                    i += 1;
                }
                k += 1;
            }

            for (k, &i) in idx.iter().enumerate() {
                if self.cells[i] != out[k] {
                    self.cells[i] = out[k];
                    changed = true;
                }
            }
        }

        if changed {
            Some(gained)
        } else {
            None
        }
    }

    /// Inserts a rank-1 tile (90%) or a rank-2 tile (10%) into a random
    /// empty cell. Panics if the board is full.
    pub fn spawn(&mut self, rng: &mut fastrand::Rng) {
        let empty: Vec<usize> = (0..CELLS).filter(|&i| self.cells[i] == 0).collect();
        let ix = empty[rng.usize(..empty.len())];
        self.cells[ix] = if rng.f32() < 0.9 { 1 } else { 2 };
    }

    /// Whether any cell is empty.
    pub fn has_empty(&self) -> bool {
        self.cells.iter().any(|&v| v == 0)
    }

    /// Whether any move would change the board.
    pub fn has_moves(&self) -> bool {
        if self.has_empty() {
            return true;
        }
        for row in 0..SIDE {
            for col in 0..SIDE {
                let v = self.cells[4 * row + col];
                if col + 1 < SIDE && self.cells[4 * row + col + 1] == v {
                    return true;
                }
                if row + 1 < SIDE && self.cells[4 * (row + 1) + col] == v {
                    return true;
                }
            }
        }
        false
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in 0..SIDE {
            for col in 0..SIDE {
                let rank = self.cells[4 * row + col];
                let value = if rank == 0 { 0 } else { 1u64 << rank };
                write!(f, "{:>6}", value)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{Board, Direction};

    #[test]
    fn test_simple_merge() {
        let mut b = Board::from_cells([
            1, 1, 0, 0, //
            0, 0, 0, 0, //
            0, 0, 0, 0, //
            0, 0, 0, 0,
        ]);
        assert_eq!(b.slide(Direction::Left), Some(4));
        assert_eq!(b.rank(0), 2);
        assert_eq!(b.rank(1), 0);
    }

    #[test]
    fn test_merged_tile_does_not_merge_again() {
        let mut b = Board::from_cells([
            1, 1, 1, 1, //
            0, 0, 0, 0, //
            0, 0, 0, 0, //
            0, 0, 0, 0,
        ]);
        assert_eq!(b.slide(Direction::Left), Some(8));
        assert_eq!(b.rank(0), 2);
        assert_eq!(b.rank(1), 2);
        assert_eq!(b.rank(2), 0);
    }

    #[test]
    fn test_pair_merges_once_per_move() {
        let mut b = Board::from_cells([
            2, 1, 1, 0, //
            0, 0, 0, 0, //
            0, 0, 0, 0, //
            0, 0, 0, 0,
        ]);
        assert_eq!(b.slide(Direction::Left), Some(4));
        assert_eq!(b.rank(0), 2);
        assert_eq!(b.rank(1), 2);
    }

    #[test]
    fn test_vertical_slide() {
        let mut b = Board::from_cells([
            1, 0, 0, 0, //
            0, 0, 0, 0, //
            1, 0, 0, 0, //
            0, 0, 0, 0,
        ]);
        assert_eq!(b.slide(Direction::Down), Some(4));
        assert_eq!(b.rank(12), 2);
    }

    #[test]
    fn test_rejected_move_changes_nothing() {
        let mut b = Board::from_cells([
            1, 0, 0, 0, //
            0, 0, 0, 0, //
            0, 0, 0, 0, //
            0, 0, 0, 0,
        ]);
        let before = b;
        assert_eq!(b.slide(Direction::Left), None);
        assert_eq!(b, before);
    }

    #[test]
    fn test_has_moves_on_stuck_board() {
        // Checkerboard with no equal neighbors.
        let b = Board::from_cells([
            1, 2, 1, 2, //
            2, 1, 2, 1, //
            1, 2, 1, 2, //
            2, 1, 2, 1,
        ]);
        assert!(!b.has_moves());

        let b = Board::from_cells([
            1, 2, 1, 2, //
            2, 1, 2, 1, //
            1, 2, 1, 2, //
            2, 1, 2, 2,
        ]);
        assert!(b.has_moves());
    }

    #[test]
    fn test_spawn_fills_an_empty_cell() {
        let mut rng = fastrand::Rng::with_seed(7);
        let mut b = Board::empty();
        b.spawn(&mut rng);
        b.spawn(&mut rng);
        let filled = (0..16).filter(|&i| b.rank(i) != 0).count();
        assert_eq!(filled, 2);
    }
}
