use std::cmp::Reverse;

use crate::bitboard::Geometry;
use crate::game::{Game, Move};
use crate::movegen::Successor;
use crate::score::Outcome;

/// Per-cell counters of how often a move into that cell caused a cutoff
#[derive(Clone, Debug)]
pub struct History {
    stride: usize,
    drops: Vec<u64>,
    pops: Vec<u64>,
}

impl History {
    pub fn new(geometry: &Geometry) -> Self {
        let cells = geometry.code_bits();
        let mut history = Self {
            stride: geometry.height() + 1,
            drops: vec![0; cells],
            pops: vec![0; cells],
        };
        history.reset(geometry);
        history
    }

    /// Seeds the counters so that central columns are tried first
    pub fn reset(&mut self, geometry: &Geometry) {
        let width = geometry.width();
        for column in 0..width {
            let bias = column.min(width - column - 1) as u64;
            let cells = column * self.stride..(column + 1) * self.stride;
            self.drops[cells.clone()].iter_mut().for_each(|c| *c = bias);
            self.pops[cells].iter_mut().for_each(|c| *c = bias);
        }
    }

    // drops are credited to the cell they land in, pops to the bottom cell
    fn counter(&mut self, game: &Game, mv: Move) -> Option<&mut u64> {
        match mv {
            Move::Drop(column) => self.drops.get_mut(column * self.stride + game.height(column)),
            Move::Pop(column) => self.pops.get_mut(column * self.stride),
            Move::Pass => None,
        }
    }

    pub fn score(&self, game: &Game, mv: Move) -> u64 {
        match mv {
            Move::Drop(column) => self.drops[column * self.stride + game.height(column)],
            Move::Pop(column) => self.pops[column * self.stride],
            Move::Pass => 0,
        }
    }

    /// Credits `mv` with `2^shift`
    pub fn reward(&mut self, game: &Game, mv: Move, shift: u32) {
        if let Some(counter) = self.counter(game, mv) {
            *counter = counter.saturating_add(1u64.checked_shl(shift).unwrap_or(u64::MAX));
        }
    }

    /// Sorts the drops by descending counter, keeping generation order on
    /// ties; pops stay behind them untouched.
    ///
    /// Returns the number of successors that still need searching.
    pub fn order(&self, game: &Game, successors: &mut [Successor]) -> usize {
        let drops = successors.iter().take_while(|s| !s.mv.is_pop()).count();
        successors[..drops].sort_by_key(|s| Reverse(self.score(game, s.mv)));
        successors
            .iter()
            .filter(|s| s.score.outcome == Outcome::Unknown)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_towards_the_centre() {
        let geometry = Geometry::default();
        let game = Game::new(geometry);
        let history = History::new(&geometry);
        let scores: Vec<u64> = (0..7).map(|c| history.score(&game, Move::Drop(c))).collect();
        assert_eq!(scores, vec![0, 1, 2, 3, 2, 1, 0]);
        assert_eq!(history.score(&game, Move::Pop(3)), 3);
    }

    #[test]
    fn rewards_reorder_drops_only() -> crate::error::Result<()> {
        let geometry = Geometry::default();
        let game = Game::from_variation(geometry, "aadd")?;
        let mut history = History::new(&geometry);
        history.reward(&game, Move::Drop(0), 4);
        history.reward(&game, Move::Pop(6), 10);

        let mut successors = game.successors(true, false);
        let unknown = history.order(&game, &mut successors);
        assert_eq!(unknown, successors.len());

        let order: String = successors.iter().map(|s| s.mv.token()).collect();
        // a:16, d:3, c=e:2, b=f:1, g:0 then the pops in column order
        assert_eq!(order, "adcebfgAD");
        Ok(())
    }

    #[test]
    fn reward_targets_the_landing_cell() -> crate::error::Result<()> {
        let geometry = Geometry::default();
        let mut game = Game::new(geometry);
        let mut history = History::new(&geometry);
        history.reward(&game, Move::Drop(2), 3);
        assert_eq!(history.score(&game, Move::Drop(2)), 2 + 8);
        game.play_token('c')?;
        // one cell higher the counter is untouched
        assert_eq!(history.score(&game, Move::Drop(2)), 2);
        Ok(())
    }
}
