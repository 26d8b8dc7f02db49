//! Depth-first search skeleton shared by the alpha-beta solver and the
//! handicap prover
//!
//! Every node goes through the same steps: check the search budget,
//! canonicalise the position for the transposition table, probe it,
//! generate and pre-evaluate the successors, order them by the history
//! heuristic, recurse, and combine the children's scores. The steps that
//! differ between solvers are supplied by a [`Strategy`], which is
//! monomorphised into the recursion.

use std::ops::ControlFlow;

use log::trace;

use crate::bitboard::Geometry;
use crate::error::{Error, Result};
use crate::game::{Game, Move, Side};
use crate::history::History;
use crate::score::Score;
use crate::stats::{Report, Reporter, Stats};
use crate::transposition_table::TranspositionTable;

/// What a strategy needs to know about the node being searched
#[derive(Copy, Clone, Debug)]
pub struct Context {
    /// plies remaining before the depth limit
    pub depth: u32,
    /// absolute game ply
    pub ply: usize,
    /// whether the favored side is to move
    pub favored_to_move: bool,
    /// pops made by the favored side since the search started
    pub pop_count: u32,
}

/// Outcome of the transposition probe
pub enum Probe<N> {
    /// the node is settled without expanding it
    Done(Score),
    /// the node must be expanded with this state
    Open(N),
}

/// What to do after combining a child's score
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Cutoff,
}

/// The final result of a node
pub struct Verdict {
    pub score: Score,
    /// whether the score may be cached
    pub store: bool,
}

pub trait Strategy {
    /// The bounds passed down to a child
    type Window: Copy;
    /// Per-node bookkeeping
    type Node;

    fn root_window(&self) -> Self::Window;

    /// The side whose pops are counted
    fn favored(&self) -> Side {
        Side::First
    }

    /// Whether successors should be checked for repeated positions
    fn repetition(&self) -> bool;

    /// Called once before the root is searched
    fn begin(&mut self, _depth: u32) {}

    /// A score for nodes beyond the search budget
    fn limit(&self, ctx: &Context, stats: &mut Stats) -> Option<Score>;

    fn probe(
        &self,
        ctx: &Context,
        table: &TranspositionTable,
        key: u64,
        window: Self::Window,
        stats: &mut Stats,
    ) -> Probe<Self::Node>;

    /// Folds in the floor found by terminal evaluation, which is never WIN
    fn terminals(&self, ctx: &Context, node: &mut Self::Node, floor: Score) -> Option<Score>;

    fn child_window(&self, node: &Self::Node) -> Self::Window;

    /// Folds in a resolved child score, already from this node's side
    fn combine(&self, node: &mut Self::Node, score: Score) -> Flow;

    /// `2^shift` is credited to a move that caused a cutoff
    fn history_shift(&self, ctx: &Context) -> Option<u32>;

    /// `unresolved` counts the children whose score stayed unknown
    fn finish(&self, ctx: &Context, node: Self::Node, unresolved: usize, stats: &mut Stats) -> Verdict;

    /// Maps the root's score to the reported result
    fn conclude(&self, score: Score, game: &Game) -> Score;
}

/// A single search over a borrowed game, table and history
pub struct Minimax<'a, S> {
    strategy: S,
    geometry: Geometry,
    table: &'a mut TranspositionTable,
    history: &'a mut History,
    stats: &'a mut Stats,
    reporter: Option<&'a mut Reporter>,
    report_interval: u64,
    popout: bool,
    pop_count: u32,
}

impl<'a, S: Strategy> Minimax<'a, S> {
    pub fn new(
        strategy: S,
        geometry: Geometry,
        table: &'a mut TranspositionTable,
        history: &'a mut History,
        stats: &'a mut Stats,
    ) -> Self {
        Self {
            strategy,
            geometry,
            table,
            history,
            stats,
            reporter: None,
            report_interval: 200_000,
            popout: true,
            pop_count: 0,
        }
    }

    pub fn with_popout(mut self, popout: bool) -> Self {
        self.popout = popout;
        self
    }

    pub fn with_reporter(mut self, reporter: Option<&'a mut Reporter>, interval: u64) -> Self {
        self.reporter = reporter;
        self.report_interval = interval.max(1);
        self
    }

    /// Searches the game's current position at most `depth` plies deep
    pub fn run(mut self, game: &mut Game, depth: u32) -> Result<Score> {
        if self.geometry.has_won(game.board().other) {
            return Ok(Score::LOSS);
        }
        self.strategy.begin(depth);
        self.pop_count = 0;
        let window = self.strategy.root_window();
        let score = self.search(game, depth, window)?;
        Ok(self.strategy.conclude(score, game))
    }

    fn report(&mut self, game: &Game) -> Result<()> {
        if self.stats.interior % self.report_interval != 0 {
            return Ok(());
        }
        if let Some(reporter) = self.reporter.as_deref_mut() {
            let report = Report {
                stats: &*self.stats,
                game,
            };
            if let ControlFlow::Break(()) = reporter(&report) {
                return Err(Error::Cancelled);
            }
        }
        Ok(())
    }

    fn search(&mut self, game: &mut Game, depth: u32, window: S::Window) -> Result<Score> {
        self.stats.interior += 1;
        self.report(game)?;

        let ctx = Context {
            depth,
            ply: game.ply(),
            favored_to_move: game.side_to_move() == self.strategy.favored(),
            pop_count: self.pop_count,
        };
        if let Some(score) = self.strategy.limit(&ctx, self.stats) {
            return Ok(score);
        }

        let start_nodes = self.stats.interior;
        let code = game.position_code();
        let mirror = self.geometry.flip(code);
        let symmetric = mirror == code;
        let key = code.min(mirror);

        let mut node = match self.strategy.probe(&ctx, self.table, key, window, self.stats) {
            Probe::Done(score) => return Ok(score),
            Probe::Open(node) => node,
        };

        let mut successors = game.successors(self.popout, false);
        let floor = game.evaluate_terminals(&mut successors, self.strategy.repetition(), self.stats);
        if floor == Score::WIN {
            return Ok(Score::WIN);
        }
        if let Some(score) = self.strategy.terminals(&ctx, &mut node, floor) {
            return Ok(score);
        }

        let mut unresolved = self.history.order(game, &mut successors);
        let middle = self.geometry.middle_column();

        for successor in successors.iter() {
            if !successor.score.is_unknown() {
                continue;
            }
            let column = successor.mv.column().unwrap_or_default();
            if symmetric && column > middle {
                // the mirrored move is searched instead
                unresolved -= 1;
                continue;
            }

            let counted = successor.mv.is_pop() && ctx.favored_to_move;
            if counted {
                self.pop_count += 1;
            }
            let child_window = self.strategy.child_window(&node);
            let result = {
                let mut child = game.enter(successor.mv, successor.board);
                self.search(&mut child, depth.saturating_sub(1), child_window)
            };
            if counted {
                self.pop_count -= 1;
            }
            let score = result?;

            if score.is_unknown() {
                continue;
            }
            unresolved -= 1;

            if self.strategy.combine(&mut node, score.negate()) == Flow::Cutoff {
                self.reward(game, &ctx, successor.mv);
                break;
            }
        }

        let verdict = self.strategy.finish(&ctx, node, unresolved, self.stats);
        if verdict.store {
            debug_assert!(!verdict.score.tainted);
            let work = self.stats.interior - start_nodes;
            self.table.store(key, verdict.score.outcome, work);
        }
        Ok(verdict.score)
    }

    fn reward(&mut self, game: &Game, ctx: &Context, mv: Move) {
        if let Some(shift) = self.strategy.history_shift(ctx) {
            trace!("history bonus 2^{} for {} at ply {}", shift, mv, ctx.ply);
            self.history.reward(game, mv, shift);
        }
    }
}
