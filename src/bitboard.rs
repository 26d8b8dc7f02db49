//! Bit-packed PopOut positions
//!
//! Cells are numbered column by column from the bottom, with one spare
//! sentinel bit on top of every column. For the 7x6 board:
//!
//! ```text
//! .  .  .  .  .  .  .   sentinel
//! 5 12 19 26 33 40 47
//! 4 11 18 25 32 39 46
//! 3 10 17 24 31 38 45
//! 2  9 16 23 30 37 44
//! 1  8 15 22 29 36 43
//! 0  7 14 21 28 35 42
//! ```

use crate::error::{Error, Result};
use crate::{HEIGHT, WIDTH};

/// Board dimensions and the masks derived from them
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Geometry {
    width: usize,
    height: usize,
    // every cell including the sentinel row
    all: u64,
    // the first column including its sentinel
    column: u64,
    // the bottom cell of every column
    bottom: u64,
    // the sentinel row
    top: u64,
    // every playable cell
    full: u64,
}

impl Geometry {
    pub fn new(width: usize, height: usize) -> Result<Self> {
        let invalid = |reason| Error::InvalidGeometry {
            width,
            height,
            reason,
        };
        if width == 0 || height == 0 {
            return Err(invalid("dimensions must be positive"));
        }
        if width > 26 {
            return Err(invalid("at most 26 columns can be named"));
        }
        if width * (height + 1) > 63 {
            return Err(invalid("board does not fit in a 64-bit position code"));
        }
        Ok(Self::build(width, height))
    }

    const fn build(width: usize, height: usize) -> Self {
        let h1 = height + 1;
        let all = (1u64 << (h1 * width)) - 1;
        let column = (1u64 << h1) - 1;
        let bottom = all / column;
        let top = bottom << height;
        Self {
            width,
            height,
            all,
            column,
            bottom,
            top,
            full: all ^ top,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of playable cells
    pub fn cells(&self) -> usize {
        self.width * self.height
    }

    /// Number of bits in a position code
    pub fn code_bits(&self) -> usize {
        self.width * (self.height + 1)
    }

    /// The first middle column (the left one on even widths)
    pub fn middle_column(&self) -> usize {
        (self.width - 1) / 2
    }

    pub fn full_mask(&self) -> u64 {
        self.full
    }

    pub fn bit(&self, column: usize, row: usize) -> u64 {
        1 << (column * (self.height + 1) + row)
    }

    pub fn column_mask(&self, column: usize) -> u64 {
        self.column << (column * (self.height + 1))
    }

    /// Whether a player mask contains four in a row
    pub fn has_won(&self, mask: u64) -> bool {
        let h = self.height;
        let h1 = h + 1;
        let h2 = h + 2;

        let vertical = mask & (mask >> 1);
        let horizontal = mask & (mask >> h1);
        let slash = mask & (mask >> h);
        let backslash = mask & (mask >> h2);

        (vertical & (vertical >> 2))
            | (horizontal & (horizontal >> (2 * h1)))
            | (slash & (slash >> (2 * h)))
            | (backslash & (backslash >> (2 * h2)))
            != 0
    }

    /// Canonical key of a position, reversible with [`Geometry::decode`]
    pub fn code(&self, board: BitBoard) -> u64 {
        self.bottom + board.current + board.current + board.other
    }

    /// Recovers the masks from a position code, or `None` if the code
    /// does not describe a board of this geometry
    pub fn decode(&self, code: u64) -> Option<BitBoard> {
        if code & !self.all != 0 {
            return None;
        }
        let mut board = BitBoard::default();
        for column in 0..self.width {
            let shift = column * (self.height + 1);
            let bits = (code >> shift) & self.column;
            if bits == 0 {
                return None;
            }
            // the highest set bit marks the first free cell
            let height = 63 - bits.leading_zeros() as usize;
            let occupied = (1u64 << height) - 1;
            board.current |= (bits & occupied) << shift;
            board.other |= (!bits & occupied) << shift;
        }
        Some(board)
    }

    /// Mirrors a position code left to right
    pub fn flip(&self, code: u64) -> u64 {
        let h1 = self.height + 1;
        let mut rest = code;
        let mut mirror = 0;
        for _ in 0..self.width {
            mirror = (mirror << h1) | (rest & self.column);
            rest >>= h1;
        }
        mirror
    }

    fn shift_down(&self, mask: u64, column: u64) -> u64 {
        (mask & !column) | ((mask & column) >> 1)
    }

    fn shift_up(&self, mask: u64, column: u64) -> u64 {
        (mask & !column) | ((mask & column) << 1)
    }
}

impl Default for Geometry {
    fn default() -> Self {
        Self::build(WIDTH, HEIGHT)
    }
}

/// A position as seen by the side to move
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BitBoard {
    /// mask of the side to move
    pub current: u64,
    /// mask of the side that just moved
    pub other: u64,
}

impl BitBoard {
    pub fn new(current: u64, other: u64) -> Self {
        Self { current, other }
    }

    pub fn occupied(&self) -> u64 {
        self.current | self.other
    }

    pub fn is_full(&self, geometry: &Geometry) -> bool {
        self.occupied() == geometry.full
    }

    /// Number of discs in a column
    pub fn column_height(&self, geometry: &Geometry, column: usize) -> usize {
        (self.occupied() & geometry.column_mask(column)).count_ones() as usize
    }

    pub fn swapped(&self) -> Self {
        Self {
            current: self.other,
            other: self.current,
        }
    }

    // the lowest free cell of a column
    fn height_bit(&self, geometry: &Geometry, column: usize) -> u64 {
        (self.occupied() & geometry.column_mask(column)) + geometry.bit(column, 0)
    }

    pub fn can_drop(&self, geometry: &Geometry, column: usize) -> bool {
        self.height_bit(geometry, column) & geometry.top == 0
    }

    pub fn can_pop(&self, geometry: &Geometry, column: usize) -> bool {
        self.current & geometry.bit(column, 0) != 0
    }

    /// The position after the mover drops a disc into `column`
    pub fn drop(&self, geometry: &Geometry, column: usize) -> Option<Self> {
        let dropped = self.current | self.height_bit(geometry, column);
        if dropped & geometry.top != 0 {
            return None;
        }
        Some(Self {
            current: self.other,
            other: dropped,
        })
    }

    /// The position after the mover pops its bottom disc from `column`
    pub fn pop(&self, geometry: &Geometry, column: usize) -> Option<Self> {
        let bit = geometry.bit(column, 0);
        if self.current & bit == 0 {
            return None;
        }
        let column = geometry.column_mask(column);
        Some(Self {
            current: geometry.shift_down(self.other, column),
            other: geometry.shift_down(self.current ^ bit, column),
        })
    }

    /// The position before the opponent dropped into `column`
    pub fn undrop(&self, geometry: &Geometry, column: usize) -> Option<Self> {
        let top_disc = self.height_bit(geometry, column) >> 1;
        if top_disc & self.other == 0 {
            return None;
        }
        Some(Self {
            current: self.other ^ top_disc,
            other: self.current,
        })
    }

    /// The position before the opponent popped from `column`
    ///
    /// Only legal, non-terminal predecessors are returned, since retrograde
    /// analysis walks edges that forward play never produced.
    pub fn unpop(&self, geometry: &Geometry, column: usize) -> Option<Self> {
        let mask = geometry.column_mask(column);
        let mover = geometry.shift_up(self.current, mask);
        let popper = geometry.shift_up(self.other, mask) | geometry.bit(column, 0);

        if (mover | popper) & geometry.top != 0 {
            return None;
        }
        if geometry.has_won(mover) || geometry.has_won(popper) {
            return None;
        }
        Some(Self {
            current: popper,
            other: mover,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn play(geometry: &Geometry, drops: &[usize]) -> BitBoard {
        drops.iter().fold(BitBoard::default(), |board, &column| {
            board.drop(geometry, column).unwrap()
        })
    }

    #[test]
    fn masks() {
        let geometry = Geometry::default();
        assert_eq!(geometry.bit(1, 0), 1 << 7);
        assert_eq!(geometry.column_mask(0), 0b111_1111);
        assert_eq!(geometry.full_mask().count_ones(), 42);
        assert_eq!(geometry.middle_column(), 3);
        assert_eq!(Geometry::new(4, 4).unwrap().middle_column(), 1);
    }

    #[test]
    fn rejects_oversized_boards() {
        assert!(Geometry::new(9, 7).is_err());
        assert!(Geometry::new(0, 6).is_err());
        assert!(Geometry::new(7, 6).is_ok());
        assert!(Geometry::new(9, 6).is_ok());
    }

    #[test]
    fn wins_in_every_direction() {
        let geometry = Geometry::default();
        let line = |cells: [(usize, usize); 4]| {
            cells
                .iter()
                .fold(0, |mask, &(x, y)| mask | geometry.bit(x, y))
        };
        assert!(geometry.has_won(line([(0, 0), (0, 1), (0, 2), (0, 3)])));
        assert!(geometry.has_won(line([(2, 1), (3, 1), (4, 1), (5, 1)])));
        assert!(geometry.has_won(line([(0, 0), (1, 1), (2, 2), (3, 3)])));
        assert!(geometry.has_won(line([(6, 0), (5, 1), (4, 2), (3, 3)])));
        // runs must not wrap over the sentinel row
        assert!(!geometry.has_won(line([(0, 3), (0, 4), (0, 5), (1, 0)])));
        assert!(!geometry.has_won(line([(0, 0), (0, 1), (0, 2), (1, 1)])));
    }

    #[test]
    fn code_round_trip() {
        let geometry = Geometry::default();
        let board = play(&geometry, &[3, 3, 2, 4, 4, 4, 0]);
        let code = geometry.code(board);
        assert_eq!(geometry.decode(code), Some(board));
        assert_eq!(geometry.code(BitBoard::default()), 0b1_0000001_0000001_0000001_0000001_0000001_0000001);
        assert_eq!(geometry.decode(0), None);
    }

    #[test]
    fn drop_fills_a_column() {
        let geometry = Geometry::default();
        let mut board = BitBoard::default();
        for _ in 0..6 {
            board = board.drop(&geometry, 2).unwrap();
        }
        assert_eq!(board.column_height(&geometry, 2), 6);
        assert_eq!(board.drop(&geometry, 2), None);
        assert!(!board.can_drop(&geometry, 2));
    }

    #[test]
    fn pop_shifts_both_players() {
        let geometry = Geometry::default();
        // first player at the bottom, second player above it
        let board = play(&geometry, &[0, 0, 1]);
        // second player to move owns no bottom disc in column 0
        assert_eq!(board.pop(&geometry, 0), None);

        let board = play(&geometry, &[0, 0]);
        let popped = board.pop(&geometry, 0).unwrap();
        // the second player's disc has fallen to the bottom
        assert_eq!(popped.current, geometry.bit(0, 0));
        assert_eq!(popped.other, 0);
        assert_eq!(popped.unpop(&geometry, 0), Some(board));
    }

    #[test]
    fn undrop_inverts_drop() {
        let geometry = Geometry::default();
        let board = play(&geometry, &[3, 3, 4]);
        for column in 0..geometry.width() {
            let next = board.drop(&geometry, column).unwrap();
            assert_eq!(next.undrop(&geometry, column), Some(board));
        }
        assert_eq!(BitBoard::default().undrop(&geometry, 0), None);
        assert_eq!(BitBoard::default().undrop(&geometry, 3), None);
    }

    #[test]
    fn unpop_refuses_overflow_and_won_predecessors() {
        let geometry = Geometry::new(4, 4).unwrap();
        let mut board = BitBoard::default();
        for _ in 0..4 {
            board = board.drop(&geometry, 0).unwrap();
        }
        // column 0 is full, nothing could have been popped out of it
        assert_eq!(board.unpop(&geometry, 0), None);
    }

    #[test]
    fn flip_mirrors_codes() {
        let geometry = Geometry::default();
        let board = play(&geometry, &[0, 1]);
        let mirrored = play(&geometry, &[6, 5]);
        assert_eq!(geometry.flip(geometry.code(board)), geometry.code(mirrored));

        let symmetric = play(&geometry, &[3, 3, 3]);
        let code = geometry.code(symmetric);
        assert_eq!(geometry.flip(code), code);
    }
}
