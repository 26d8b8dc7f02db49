use std::fmt;
use std::ops::{Deref, DerefMut};

use crate::bitboard::{BitBoard, Geometry};
use crate::error::{Error, IllegalMove, Result};

/// A single ply in variation notation
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Move {
    Drop(usize),
    Pop(usize),
    /// only legal on a full board
    Pass,
}

impl Move {
    /// Parses a token: `a` drops into the first column, `A` pops from it
    pub fn from_token(token: char, geometry: &Geometry) -> Option<Self> {
        let width = geometry.width() as u32;
        match token {
            'a'..='z' if (token as u32 - 'a' as u32) < width => {
                Some(Move::Drop((token as u32 - 'a' as u32) as usize))
            }
            'A'..='Z' if (token as u32 - 'A' as u32) < width => {
                Some(Move::Pop((token as u32 - 'A' as u32) as usize))
            }
            '.' => Some(Move::Pass),
            _ => None,
        }
    }

    pub fn token(self) -> char {
        match self {
            Move::Drop(column) => (b'a' + column as u8) as char,
            Move::Pop(column) => (b'A' + column as u8) as char,
            Move::Pass => '.',
        }
    }

    pub fn column(self) -> Option<usize> {
        match self {
            Move::Drop(column) | Move::Pop(column) => Some(column),
            Move::Pass => None,
        }
    }

    pub fn is_pop(self) -> bool {
        matches!(self, Move::Pop(_))
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// Which player, counted from the start of the game
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    First,
    Second,
}

impl Side {
    pub fn opponent(self) -> Self {
        match self {
            Side::First => Side::Second,
            Side::Second => Side::First,
        }
    }
}

/// A board together with the moves that led to it
#[derive(Clone, Debug)]
pub struct Game {
    geometry: Geometry,
    board: BitBoard,
    // discs per column
    heights: Vec<usize>,
    moves: Vec<Move>,
    // position code before the first move and after every move
    positions: Vec<u64>,
}

impl Game {
    pub fn new(geometry: Geometry) -> Self {
        let mut game = Self {
            geometry,
            board: BitBoard::default(),
            heights: vec![0; geometry.width()],
            moves: Vec::new(),
            positions: Vec::new(),
        };
        game.reset();
        game
    }

    pub fn from_variation(geometry: Geometry, variation: &str) -> Result<Self> {
        let mut game = Self::new(geometry);
        game.load_variation(variation)?;
        Ok(game)
    }

    pub fn reset(&mut self) {
        self.board = BitBoard::default();
        self.heights.iter_mut().for_each(|h| *h = 0);
        self.moves.clear();
        self.positions.clear();
        self.positions.push(self.geometry.code(self.board));
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn board(&self) -> BitBoard {
        self.board
    }

    pub fn ply(&self) -> usize {
        self.moves.len()
    }

    pub fn height(&self, column: usize) -> usize {
        self.heights[column]
    }

    pub fn side_to_move(&self) -> Side {
        if self.ply() % 2 == 0 {
            Side::First
        } else {
            Side::Second
        }
    }

    pub fn moves(&self) -> &[Move] {
        &self.moves
    }

    /// Position codes from the start of the game up to the current ply
    pub fn positions(&self) -> &[u64] {
        &self.positions
    }

    pub fn position_code(&self) -> u64 {
        self.geometry.code(self.board)
    }

    pub fn is_full(&self) -> bool {
        self.board.is_full(&self.geometry)
    }

    /// Whether either player has four in a row
    pub fn has_ended(&self) -> bool {
        self.geometry.has_won(self.board.current) || self.geometry.has_won(self.board.other)
    }

    /// Applies a move after checking it, leaving the game untouched on error
    pub fn play(&mut self, mv: Move) -> Result<()> {
        let illegal = |reason| Error::InvalidMove {
            token: mv.token(),
            reason,
        };
        if self.has_ended() {
            return Err(illegal(IllegalMove::GameOver));
        }
        let next = match mv {
            Move::Drop(column) if column < self.geometry.width() => self
                .board
                .drop(&self.geometry, column)
                .ok_or_else(|| illegal(IllegalMove::ColumnFull))?,
            Move::Pop(column) if column < self.geometry.width() => self
                .board
                .pop(&self.geometry, column)
                .ok_or_else(|| illegal(IllegalMove::NoOwnDisc))?,
            Move::Pass if self.is_full() => self.board.swapped(),
            Move::Pass => return Err(illegal(IllegalMove::BoardNotFull)),
            _ => return Err(illegal(IllegalMove::UnknownToken)),
        };
        self.push(mv, next);
        Ok(())
    }

    /// Parses and plays a single token of variation notation
    pub fn play_token(&mut self, token: char) -> Result<()> {
        let mv = Move::from_token(token, &self.geometry).ok_or(Error::InvalidMove {
            token,
            reason: IllegalMove::UnknownToken,
        })?;
        self.play(mv)
    }

    /// Resets the board and replays a variation, stopping at the first
    /// illegal token
    pub fn load_variation(&mut self, variation: &str) -> Result<()> {
        self.reset();
        for token in variation.chars() {
            self.play_token(token)?;
        }
        Ok(())
    }

    pub fn variation(&self) -> String {
        self.moves.iter().map(|mv| mv.token()).collect()
    }

    /// Takes back the last move, returning it
    pub fn undo(&mut self) -> Option<Move> {
        let mv = self.moves.pop()?;
        self.positions.pop();
        let previous = match mv {
            Move::Drop(column) => {
                self.heights[column] -= 1;
                self.board.undrop(&self.geometry, column)
            }
            Move::Pop(column) => {
                self.heights[column] += 1;
                self.board.unpop(&self.geometry, column)
            }
            Move::Pass => Some(self.board.swapped()),
        };
        let recorded = self.positions.last().copied().unwrap_or_default();
        debug_assert_eq!(previous.map(|b| self.geometry.code(b)), Some(recorded));
        // the recorded code is authoritative should the inverse disagree
        self.board = match previous {
            Some(board) if self.geometry.code(board) == recorded => board,
            _ => self.geometry.decode(recorded).unwrap_or(self.board),
        };
        debug_assert_eq!(self.board.current & self.board.other, 0);
        Some(mv)
    }

    /// Applies an already validated successor; the move is taken back when
    /// the returned guard goes out of scope
    pub fn enter(&mut self, mv: Move, next: BitBoard) -> Entered<'_> {
        self.push(mv, next);
        Entered { game: self }
    }

    fn push(&mut self, mv: Move, next: BitBoard) {
        match mv {
            Move::Drop(column) => self.heights[column] += 1,
            Move::Pop(column) => self.heights[column] -= 1,
            Move::Pass => {}
        }
        self.board = next;
        self.moves.push(mv);
        self.positions.push(self.geometry.code(next));
    }
}

/// Keeps a move applied to a [`Game`] for as long as it lives
pub struct Entered<'a> {
    game: &'a mut Game,
}

impl Deref for Entered<'_> {
    type Target = Game;

    fn deref(&self) -> &Game {
        self.game
    }
}

impl DerefMut for Entered<'_> {
    fn deref_mut(&mut self) -> &mut Game {
        self.game
    }
}

impl Drop for Entered<'_> {
    fn drop(&mut self) {
        self.game.undo();
    }
}

impl fmt::Display for Game {
    /// `X` for the first player, `O` for the second
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (first, second) = match self.side_to_move() {
            Side::First => (self.board.current, self.board.other),
            Side::Second => (self.board.other, self.board.current),
        };
        for row in (0..self.geometry.height()).rev() {
            for column in 0..self.geometry.width() {
                let bit = self.geometry.bit(column, row);
                let cell = if first & bit != 0 {
                    'X'
                } else if second & bit != 0 {
                    'O'
                } else {
                    '.'
                };
                write!(f, "{}", cell)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens() {
        let geometry = Geometry::default();
        assert_eq!(Move::from_token('a', &geometry), Some(Move::Drop(0)));
        assert_eq!(Move::from_token('G', &geometry), Some(Move::Pop(6)));
        assert_eq!(Move::from_token('h', &geometry), None);
        assert_eq!(Move::from_token('.', &geometry), Some(Move::Pass));
        assert_eq!(Move::Pop(2).token(), 'C');
    }

    #[test]
    fn variation_round_trip() -> Result<()> {
        let game = Game::from_variation(Geometry::default(), "dcdCe")?;
        assert_eq!(game.variation(), "dcdCe");
        assert_eq!(game.ply(), 5);
        assert_eq!(game.height(2), 0);
        assert_eq!(game.height(3), 2);
        assert_eq!(game.height(4), 1);
        Ok(())
    }

    #[test]
    fn illegal_token_stops_replay() {
        let mut game = Game::new(Geometry::default());
        let err = game.load_variation("ddB").unwrap_err();
        assert_eq!(
            err,
            Error::InvalidMove {
                token: 'B',
                reason: IllegalMove::NoOwnDisc
            }
        );
        assert_eq!(game.variation(), "dd");

        assert!(game.play_token('x').is_err());
        assert!(game.play_token('.').is_err());
        assert_eq!(game.variation(), "dd");
    }

    #[test]
    fn undo_restores_everything() -> Result<()> {
        let mut game = Game::from_variation(Geometry::default(), "adeeA")?;
        let before = (game.board(), game.height(0), game.height(3));
        game.play(Move::Drop(0))?;
        assert_eq!(game.undo(), Some(Move::Drop(0)));
        assert_eq!((game.board(), game.height(0), game.height(3)), before);

        assert_eq!(game.undo(), Some(Move::Pop(0)));
        assert_eq!(game.variation(), "adee");
        Ok(())
    }

    #[test]
    fn entered_guard_undoes_on_scope_exit() -> Result<()> {
        let mut game = Game::from_variation(Geometry::default(), "dd")?;
        let code = game.position_code();
        let next = game.board().drop(game.geometry(), 2).unwrap();
        {
            let entered = game.enter(Move::Drop(2), next);
            assert_eq!(entered.ply(), 3);
            assert_eq!(entered.height(2), 1);
        }
        assert_eq!(game.position_code(), code);
        assert_eq!(game.ply(), 2);
        Ok(())
    }

    #[test]
    fn no_moves_after_a_win() -> Result<()> {
        let mut game = Game::from_variation(Geometry::default(), "abababa")?;
        assert!(game.has_ended());
        assert_eq!(
            game.play_token('c').unwrap_err(),
            Error::InvalidMove {
                token: 'c',
                reason: IllegalMove::GameOver
            }
        );
        Ok(())
    }

    #[test]
    fn pass_on_full_board() -> Result<()> {
        let geometry = Geometry::new(4, 1)?;
        let mut game = Game::from_variation(geometry, "abdc")?;
        assert!(game.is_full());
        let board = game.board();
        game.play_token('.')?;
        assert_eq!(game.board(), board.swapped());
        assert_eq!(game.variation(), "abdc.");
        game.undo();
        assert_eq!(game.board(), board);
        Ok(())
    }
}
