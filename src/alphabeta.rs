//! Exact full-window negamax over the outcome lattice
//!
//! Alpha is the least the side to move is already guaranteed somewhere in
//! the tree, beta the most the opponent will allow. With only three exact
//! outcomes a cutoff happens when both meet at DRAW or alpha reaches WIN.

use crate::game::Game;
use crate::minimax::{Context, Flow, Probe, Strategy, Verdict};
use crate::score::{Outcome, Score};
use crate::stats::Stats;
use crate::transposition_table::TranspositionTable;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Window {
    pub alpha: Outcome,
    pub beta: Outcome,
}

pub struct Node {
    alpha: Outcome,
    beta: Outcome,
    // the score of this node, never above alpha
    best: Outcome,
    tainted: bool,
    cached: Outcome,
}

pub struct AlphaBeta {
    history_window: u32,
    history_floor: u32,
}

impl AlphaBeta {
    pub fn new(history_window: u32) -> Self {
        Self {
            history_window,
            history_floor: 0,
        }
    }
}

impl Strategy for AlphaBeta {
    type Window = Window;
    type Node = Node;

    fn root_window(&self) -> Window {
        Window {
            alpha: Outcome::Loss,
            beta: Outcome::Win,
        }
    }

    fn repetition(&self) -> bool {
        true
    }

    fn begin(&mut self, depth: u32) {
        self.history_floor = depth.saturating_sub(self.history_window);
    }

    fn limit(&self, ctx: &Context, stats: &mut Stats) -> Option<Score> {
        if ctx.depth == 0 {
            stats.depth_cutoffs += 1;
            return Some(Score::UNKNOWN);
        }
        None
    }

    fn probe(
        &self,
        _ctx: &Context,
        table: &TranspositionTable,
        key: u64,
        window: Window,
        stats: &mut Stats,
    ) -> Probe<Node> {
        debug_assert_ne!(window.alpha, window.beta);
        let cached = table.fetch(key);
        let mut node = Node {
            alpha: window.alpha,
            beta: window.beta,
            best: Outcome::Loss,
            tainted: false,
            cached,
        };
        if cached.is_exact() {
            stats.exact_hits += 1;
            return Probe::Done(cached.into());
        }
        if cached != Outcome::Unknown {
            stats.inexact_hits += 1;
            // stored after a cutoff, one side of DRAW is settled
            match cached {
                Outcome::DrawOrWin => {
                    node.alpha = Outcome::Draw;
                    node.best = Outcome::Draw;
                }
                _ => {
                    debug_assert_eq!(cached, Outcome::DrawOrLoss);
                    node.beta = Outcome::Draw;
                }
            }
            if node.alpha >= node.beta {
                return Probe::Done(cached.into());
            }
        }
        Probe::Open(node)
    }

    fn terminals(&self, _ctx: &Context, node: &mut Node, floor: Score) -> Option<Score> {
        if floor.outcome == Outcome::Loss {
            return None;
        }
        node.tainted |= floor.tainted;
        if node.cached == Outcome::DrawOrLoss {
            // at most a draw from the table, at least a draw from here
            return Some(floor);
        }
        if node.beta == Outcome::Draw {
            return Some(Score::new(Outcome::DrawOrWin, node.tainted));
        }
        node.alpha = Outcome::Draw;
        node.best = Outcome::Draw;
        None
    }

    fn child_window(&self, node: &Node) -> Window {
        Window {
            alpha: node.beta.negate(),
            beta: node.alpha.negate(),
        }
    }

    fn combine(&self, node: &mut Node, score: Score) -> Flow {
        node.tainted |= score.tainted;
        if score.outcome <= node.best {
            return Flow::Continue;
        }
        match score.outcome {
            Outcome::Win => {
                node.alpha = Outcome::Win;
                node.best = Outcome::Win;
                node.tainted = score.tainted;
            }
            Outcome::Draw => {
                node.alpha = Outcome::Draw;
                node.best = Outcome::Draw;
            }
            Outcome::DrawOrWin => {
                // beta was DRAW or the depth ran out below
                node.best = Outcome::DrawOrWin;
                node.alpha = Outcome::Draw;
            }
            Outcome::DrawOrLoss => {
                node.best = Outcome::DrawOrLoss;
            }
            Outcome::Loss | Outcome::Unknown => {}
        }
        if node.alpha >= node.beta {
            Flow::Cutoff
        } else {
            Flow::Continue
        }
    }

    fn history_shift(&self, ctx: &Context) -> Option<u32> {
        if ctx.depth > self.history_floor {
            Some(ctx.depth - self.history_floor)
        } else {
            None
        }
    }

    fn finish(&self, _ctx: &Context, node: Node, unresolved: usize, stats: &mut Stats) -> Verdict {
        let mut best = node.best;
        // an unexplored child could only have raised the score
        if unresolved > 0 {
            if best == Outcome::Draw {
                best = Outcome::DrawOrWin;
            } else if best < Outcome::Draw {
                best = Outcome::Unknown;
            }
        }
        if best == Outcome::Unknown {
            return Verdict {
                score: Score::UNKNOWN,
                store: false,
            };
        }
        if node.tainted {
            stats.tainted += 1;
            return Verdict {
                score: Score::new(best, true),
                store: false,
            };
        }
        if node.cached == Outcome::DrawOrLoss && best >= Outcome::Draw {
            debug_assert_ne!(best, Outcome::Win);
            best = Outcome::Draw;
        }
        Verdict {
            score: best.into(),
            store: true,
        }
    }

    fn conclude(&self, score: Score, _game: &Game) -> Score {
        score.untainted()
    }
}
