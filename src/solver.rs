//! An agent to solve PopOut positions
//!
//! A [`Solver`] owns the game being analysed together with the state that
//! is worth keeping warm between searches: the transposition table, the
//! history heuristic and, once built, the retrograde table.

use std::ops::{ControlFlow, Deref};
use std::time::Instant;

use log::info;

use crate::alphabeta::AlphaBeta;
use crate::config::Config;
use crate::error::Result;
use crate::game::{Game, Move, Side};
use crate::handicap::Handicap;
use crate::history::History;
use crate::minimax::{Minimax, Strategy};
use crate::proof::ProofSearch;
use crate::retro::Retro;
use crate::score::{Outcome, Score};
use crate::stats::{Report, Reporter, Stats};
use crate::transposition_table::TranspositionTable;

/// Which question the proof-number search answers
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ProofTarget {
    /// can the first player force a win
    First,
    /// can the second player force a win
    Second,
    /// both of the above, combined into WIN, LOSS or DRAW
    Exact,
}

/// Runs the different solvers against a single game
///
/// # Notes
/// Every search leaves the game exactly as it found it, including searches
/// that fail or are cancelled through the reporter.
pub struct Solver {
    config: Config,
    game: Game,
    table: TranspositionTable,
    history: History,
    retro: Option<Retro>,
    stats: Stats,
    reporter: Option<Box<Reporter>>,
}

impl Solver {
    pub fn new(config: Config) -> Result<Self> {
        let geometry = config.geometry()?;
        Ok(Self {
            game: Game::new(geometry),
            table: TranspositionTable::new(config.table_size, &geometry)?,
            history: History::new(&geometry),
            retro: None,
            stats: Stats::default(),
            reporter: None,
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn game(&self) -> &Game {
        &self.game
    }

    /// Statistics of the most recent search
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Clears the board, keeping the cached results
    pub fn reset(&mut self) {
        self.game.reset();
    }

    /// Plays a single move token, leaving the game untouched if it is illegal
    pub fn play(&mut self, token: char) -> Result<()> {
        self.game.play_token(token)
    }

    pub fn undo(&mut self) -> Option<Move> {
        self.game.undo()
    }

    pub fn load_variation(&mut self, variation: &str) -> Result<()> {
        self.game.load_variation(variation)
    }

    /// Installs a progress callback; returning `ControlFlow::Break` from it
    /// cancels the running search
    pub fn set_reporter<F>(&mut self, reporter: F)
    where
        F: FnMut(&Report<'_>) -> ControlFlow<()> + 'static,
    {
        self.reporter = Some(Box::new(reporter));
    }

    pub fn clear_reporter(&mut self) {
        self.reporter = None;
    }

    /// Replaces the transposition table, 0 disables caching
    pub fn set_transposition_size(&mut self, size: usize) -> Result<()> {
        self.table = TranspositionTable::new(size, self.game.geometry())?;
        self.config.table_size = size;
        Ok(())
    }

    pub fn set_ply_limit(&mut self, ply_limit: usize) {
        self.config.ply_limit = Some(ply_limit);
    }

    /// `None` lets the favored side pop without limit
    pub fn set_pop_limit(&mut self, pop_limit: Option<u32>) {
        self.config.pop_limit = pop_limit;
    }

    fn search<S: Strategy>(&mut self, strategy: S, depth: u32, fresh_table: bool) -> Result<Score> {
        let geometry = *self.game.geometry();
        if fresh_table {
            self.table.reset();
        }
        self.history.reset(&geometry);
        self.stats.reset();

        let start = Instant::now();
        let result = Minimax::new(strategy, geometry, &mut self.table, &mut self.history, &mut self.stats)
            .with_popout(self.config.popout)
            .with_reporter(self.reporter.as_deref_mut(), self.config.report_interval)
            .run(&mut self.game, depth);
        self.stats.elapsed = start.elapsed();
        result
    }

    /// Searches the current position at most `depth` plies deep.
    ///
    /// Returns the exact outcome if one was found, or a bound (DRAW_OR_WIN,
    /// DRAW_OR_LOSS) or UNKNOWN when the depth ran out.
    pub fn run_alpha_beta(&mut self, depth: u32) -> Result<Score> {
        info!("alpha-beta to depth {} from \"{}\"", depth, self.game.variation());
        let score = self.search(AlphaBeta::new(self.config.history_window), depth, true)?;
        info!("{} in {:.3}s, {} nodes", score, self.stats.elapsed.as_secs_f64(), self.stats.interior);
        Ok(score)
    }

    /// Tries to prove a first player win under the configured ply and pop
    /// limits. WIN or LOSS when proven, UNKNOWN otherwise.
    pub fn run_handicap(&mut self) -> Result<Score> {
        self.run_handicap_for(Side::First)
    }

    /// Like [`Solver::run_handicap`] for either player
    pub fn run_handicap_for(&mut self, favored: Side) -> Result<Score> {
        let ply_limit = self.config.effective_ply_limit();
        info!(
            "handicap proof for the {:?} player within {} plies from \"{}\"",
            favored,
            ply_limit,
            self.game.variation()
        );
        let strategy = Handicap::new(ply_limit, self.config.pop_limit, self.config.history_window).favoring(favored);
        let depth = ply_limit.saturating_sub(self.game.ply()) as u32;
        let score = self.search(strategy, depth, true)?;
        info!("{} in {:.3}s, {} nodes", score, self.stats.elapsed.as_secs_f64(), self.stats.interior);
        Ok(score)
    }

    /// Proof-number search under the same limits as the handicap prover.
    ///
    /// Proofs are exact. Disproofs that depended on the ply limit, the pop
    /// budget or a repetition come back tainted.
    pub fn run_proof_number(&mut self, target: ProofTarget) -> Result<Score> {
        self.stats.reset();
        let start = Instant::now();
        let mut search = ProofSearch::new(
            &mut self.stats,
            self.config.effective_ply_limit(),
            self.config.pop_limit,
        )
        .with_popout(self.config.popout)
        .with_node_limit(self.config.node_limit)
        .with_reporter(self.reporter.as_deref_mut(), self.config.expansion_interval);

        let result = match target {
            ProofTarget::First => search.solve(&mut self.game, Side::First),
            ProofTarget::Second => search.solve(&mut self.game, Side::Second),
            ProofTarget::Exact => search.exact_solve(&mut self.game),
        };
        drop(search);
        self.stats.elapsed = start.elapsed();
        result
    }

    /// The retrograde table, built on first use
    pub fn retrograde(&mut self) -> Result<&Retro> {
        let retro = match self.retro.take() {
            Some(retro) => retro,
            None => {
                let start = Instant::now();
                let retro = Retro::new(*self.game.geometry(), self.config.popout)?;
                self.stats.elapsed = start.elapsed();
                retro
            }
        };
        Ok(self.retro.insert(retro))
    }

    /// The retrograde outcome of any position code for the side to move
    pub fn retrograde_score(&mut self, code: u64) -> Result<Outcome> {
        Ok(self.retrograde()?.score(code))
    }

    /// A move that wins within `depth` plies, if alpha-beta finds one
    pub fn best_move(&mut self, depth: u32) -> Result<Option<Move>> {
        if self.game.has_ended() {
            return Ok(None);
        }
        let geometry = *self.game.geometry();
        self.history.reset(&geometry);
        self.table.reset();

        let mut successors = self.game.successors(self.config.popout, false);
        let floor = self.game.evaluate_terminals(&mut successors, true, &mut self.stats);
        if floor == Score::WIN {
            return Ok(successors.iter().find(|s| s.score == Score::WIN).map(|s| s.mv));
        }
        self.history.order(&self.game, &mut successors);

        for successor in successors.iter().filter(|s| s.score.is_unknown()) {
            self.game.play(successor.mv)?;
            let result = self.search(AlphaBeta::new(self.config.history_window), depth, false);
            self.game.undo();
            if result? == Score::LOSS {
                return Ok(Some(successor.mv));
            }
        }
        Ok(None)
    }
}

impl Deref for Solver {
    type Target = Game;

    fn deref(&self) -> &Self::Target {
        &self.game
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitboard::Geometry;

    fn small(width: usize, height: usize) -> Config {
        Config {
            width,
            height,
            table_size: 1_000_003,
            ..Config::default()
        }
    }

    #[test]
    fn configuration_is_applied() -> anyhow::Result<()> {
        let mut solver = Solver::new(Config::default())?;
        solver.set_ply_limit(9);
        solver.set_pop_limit(None);
        solver.set_transposition_size(0)?;
        assert_eq!(solver.config().effective_ply_limit(), 9);
        assert_eq!(solver.config().pop_limit, None);
        assert_eq!(solver.config().table_size, 0);

        assert!(Solver::new(small(9, 7)).is_err());
        Ok(())
    }

    #[test]
    fn finds_the_winning_move() -> anyhow::Result<()> {
        let mut solver = Solver::new(Config::default())?;
        solver.load_variation("ababab")?;
        assert_eq!(solver.best_move(4)?, Some(Move::Drop(0)));
        assert_eq!(solver.variation(), "ababab");

        solver.play('a')?;
        assert!(solver.has_ended());
        assert_eq!(solver.best_move(4)?, None);
        Ok(())
    }

    #[test]
    fn retrograde_table_is_built_once() -> anyhow::Result<()> {
        let mut solver = Solver::new(small(4, 3))?;
        let empty = solver.position_code();
        let first = solver.retrograde_score(empty)?;
        let states = solver.retrograde()?.state_count();
        assert_ne!(first, Outcome::Unknown);
        assert_eq!(solver.retrograde_score(empty)?, first);
        assert_eq!(solver.retrograde()?.state_count(), states);
        assert_eq!(solver.retrograde()?.geometry(), &Geometry::new(4, 3)?);
        Ok(())
    }
}
