//! Successor generation and the checks that settle a child without
//! searching it

use smallvec::SmallVec;

use crate::bitboard::BitBoard;
use crate::game::{Game, Move};
use crate::score::Score;
use crate::stats::Stats;

/// A legal move together with the position it leads to
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Successor {
    pub mv: Move,
    pub board: BitBoard,
    /// from the mover's point of view, UNKNOWN until settled
    pub score: Score,
}

pub type Successors = SmallVec<[Successor; 16]>;

impl Game {
    /// Every drop, then every pop if `popout` is set. When `symmetric_half`
    /// is set and the position is its own mirror image, only columns up to
    /// the middle are generated.
    pub fn successors(&self, popout: bool, symmetric_half: bool) -> Successors {
        let geometry = self.geometry();
        let board = self.board();

        let mut limit = geometry.width();
        if symmetric_half {
            let code = self.position_code();
            if geometry.flip(code) == code {
                limit = geometry.middle_column() + 1;
            }
        }

        let mut successors = Successors::new();
        for column in 0..limit {
            if let Some(next) = board.drop(geometry, column) {
                successors.push(Successor {
                    mv: Move::Drop(column),
                    board: next,
                    score: Score::UNKNOWN,
                });
            }
        }
        if popout {
            for column in 0..limit {
                if let Some(next) = board.pop(geometry, column) {
                    successors.push(Successor {
                        mv: Move::Pop(column),
                        board: next,
                        score: Score::UNKNOWN,
                    });
                }
            }
        }
        successors
    }

    /// Whether `board` already occurred with the same side to move, looking
    /// back from where it would land after the next move
    pub fn repeats(&self, board: BitBoard) -> bool {
        let code = self.geometry().code(board);
        let positions = self.positions();
        // the child lands at ply + 1; the same side moved at ply - 1, ply - 3, ..
        // but a position can't recur two plies later
        let ply = self.ply();
        if ply < 3 {
            return false;
        }
        (0..=ply - 3).rev().step_by(2).any(|j| positions[j] == code)
    }

    /// Settles whatever successors can be settled without searching them
    /// and returns the score the mover is guaranteed at least:
    ///
    /// - WIN as soon as a move completes a line for the mover
    /// - pops that complete a line for the opponent are marked LOSS
    /// - with `repetition`, a successor repeating an earlier position is a
    ///   draw that depends on how much history was scanned
    /// - on a full board the mover can always settle for a draw
    pub fn evaluate_terminals(
        &self,
        successors: &mut [Successor],
        repetition: bool,
        stats: &mut Stats,
    ) -> Score {
        let geometry = self.geometry();
        let mut best = Score::LOSS;

        for successor in successors.iter_mut() {
            debug_assert!(successor.score.is_unknown());
            // checked first: a pop completing both lines wins for the popper
            if geometry.has_won(successor.board.other) {
                stats.terminal += 1;
                successor.score = Score::WIN;
                return Score::WIN;
            }
            if successor.mv.is_pop() && geometry.has_won(successor.board.current) {
                stats.terminal += 1;
                successor.score = Score::LOSS;
            } else if repetition && self.repeats(successor.board) {
                stats.terminal += 1;
                successor.score = Score::DRAW.tainted();
                best = Score::DRAW.tainted();
            }
        }

        if self.is_full() {
            stats.terminal += 1;
            best = Score::DRAW;
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitboard::Geometry;
    use crate::error::Result;
    use crate::score::Outcome;

    #[test]
    fn drops_then_pops() -> Result<()> {
        let game = Game::from_variation(Geometry::default(), "ab")?;
        let tokens: String = game.successors(true, false).iter().map(|s| s.mv.token()).collect();
        assert_eq!(tokens, "abcdefgA");
        let tokens: String = game.successors(false, false).iter().map(|s| s.mv.token()).collect();
        assert_eq!(tokens, "abcdefg");
        Ok(())
    }

    #[test]
    fn symmetric_half() -> Result<()> {
        let game = Game::from_variation(Geometry::default(), "dd")?;
        let tokens: String = game.successors(true, true).iter().map(|s| s.mv.token()).collect();
        assert_eq!(tokens, "abcdD");

        let game = Game::from_variation(Geometry::default(), "de")?;
        assert_eq!(game.successors(true, true).len(), 8);
        Ok(())
    }

    #[test]
    fn immediate_win() -> Result<()> {
        let game = Game::from_variation(Geometry::default(), "ababab")?;
        let mut successors = game.successors(true, false);
        let mut stats = Stats::default();
        let score = game.evaluate_terminals(&mut successors, true, &mut stats);
        assert_eq!(score, Score::WIN);
        assert_eq!(stats.terminal, 1);
        assert!(successors.iter().any(|s| s.mv == Move::Drop(0) && s.score == Score::WIN));
        Ok(())
    }

    #[test]
    fn pop_completing_the_opponents_line_is_a_loss() -> Result<()> {
        // O holds a2 b1 c1 d1; popping a1 drops a2 into a line of four
        let game = Game::from_variation(Geometry::default(), "aaebecgd")?;
        let mut successors = game.successors(true, false);
        let score = game.evaluate_terminals(&mut successors, true, &mut Stats::default());
        assert_eq!(score, Score::LOSS);
        for successor in successors.iter() {
            if successor.mv == Move::Pop(0) {
                assert_eq!(successor.score, Score::LOSS);
            } else {
                assert!(successor.score.is_unknown());
            }
        }
        Ok(())
    }

    #[test]
    fn repetition_is_a_tainted_draw() -> Result<()> {
        // both sides pop their discs back out of column a
        let mut game = Game::from_variation(Geometry::default(), "aaAA")?;
        assert_eq!(game.position_code(), game.positions()[0]);
        game.undo();
        // with O about to pop, the empty board would recur with X to move
        let mut successors = game.successors(true, false);
        let mut stats = Stats::default();
        let score = game.evaluate_terminals(&mut successors, true, &mut stats);
        assert_eq!(score, Score::DRAW.tainted());
        let pop = successors.iter().find(|s| s.mv == Move::Pop(0)).unwrap();
        assert_eq!(pop.score, Score::DRAW.tainted());

        let mut successors = game.successors(true, false);
        assert_eq!(game.evaluate_terminals(&mut successors, false, &mut stats), Score::LOSS);
        Ok(())
    }

    #[test]
    fn full_board_draw_floor() -> Result<()> {
        let geometry = Geometry::new(4, 1)?;
        let game = Game::from_variation(geometry, "abdc")?;
        let mut successors = game.successors(true, false);
        let tokens: String = successors.iter().map(|s| s.mv.token()).collect();
        assert_eq!(tokens, "AD");
        let score = game.evaluate_terminals(&mut successors, false, &mut Stats::default());
        assert_eq!(score, Score::DRAW);
        assert!(successors.iter().all(|s| s.score.outcome == Outcome::Unknown));
        Ok(())
    }
}
