//! Proves a win for one side under a handicap on its opponent
//!
//! The favored side has to win before the ply limit runs out, draws count
//! as failures, and it may only make a limited number of pops. Any result
//! that leaned on those limits is tainted and stays out of the
//! transposition table, so at the root only a WIN for the favored side (or
//! a LOSS for its opponent) is a real proof.

use crate::game::{Game, Side};
use crate::minimax::{Context, Flow, Probe, Strategy, Verdict};
use crate::score::{Outcome, Score};
use crate::stats::Stats;
use crate::transposition_table::TranspositionTable;

pub struct Node {
    best: Outcome,
    tainted: bool,
}

pub struct Handicap {
    ply_limit: usize,
    pop_limit: Option<u32>,
    favored: Side,
    history_window: u32,
}

impl Handicap {
    pub fn new(ply_limit: usize, pop_limit: Option<u32>, history_window: u32) -> Self {
        Self {
            ply_limit,
            pop_limit,
            favored: Side::First,
            history_window,
        }
    }

    pub fn favoring(mut self, side: Side) -> Self {
        self.favored = side;
        self
    }
}

impl Strategy for Handicap {
    type Window = ();
    type Node = Node;

    fn root_window(&self) {}

    fn favored(&self) -> Side {
        self.favored
    }

    // with no pops for the favored side, nothing can repeat that matters
    fn repetition(&self) -> bool {
        self.pop_limit != Some(0)
    }

    fn limit(&self, ctx: &Context, stats: &mut Stats) -> Option<Score> {
        if ctx.ply >= self.ply_limit {
            stats.depth_cutoffs += 1;
            return Some(if ctx.favored_to_move {
                Score::LOSS.tainted()
            } else {
                Score::WIN.tainted()
            });
        }
        match self.pop_limit {
            Some(limit) if ctx.pop_count > limit => {
                debug_assert!(!ctx.favored_to_move);
                Some(Score::WIN.tainted())
            }
            _ => None,
        }
    }

    fn probe(
        &self,
        ctx: &Context,
        table: &TranspositionTable,
        key: u64,
        _window: (),
        stats: &mut Stats,
    ) -> Probe<Node> {
        // positions reached through a favored pop may depend on the history
        if ctx.pop_count == 0 {
            let cached = table.fetch(key);
            if cached != Outcome::Unknown {
                stats.exact_hits += 1;
                return Probe::Done(cached.into());
            }
        }
        Probe::Open(Node {
            best: Outcome::Loss,
            tainted: false,
        })
    }

    fn terminals(&self, ctx: &Context, node: &mut Node, floor: Score) -> Option<Score> {
        match (floor.outcome, floor.tainted) {
            (Outcome::Draw, true) if ctx.favored_to_move => {
                node.tainted = true;
                None
            }
            (Outcome::Draw, true) => Some(Score::WIN.tainted()),
            // a draw is as good as a win for the opponent
            (Outcome::Draw, false) if !ctx.favored_to_move => Some(Score::WIN),
            _ => None,
        }
    }

    fn child_window(&self, _node: &Node) {}

    fn combine(&self, node: &mut Node, score: Score) -> Flow {
        node.tainted |= score.tainted;
        if score.outcome == Outcome::Win {
            node.best = Outcome::Win;
            node.tainted = score.tainted;
            return Flow::Cutoff;
        }
        debug_assert_eq!(score.outcome, Outcome::Loss);
        Flow::Continue
    }

    fn history_shift(&self, ctx: &Context) -> Option<u32> {
        (self.history_window as usize)
            .checked_sub(ctx.ply + 1)
            .map(|shift| shift as u32)
    }

    fn finish(&self, ctx: &Context, node: Node, _unresolved: usize, stats: &mut Stats) -> Verdict {
        if node.tainted || ctx.pop_count > 0 {
            stats.tainted += 1;
            return Verdict {
                score: Score::new(node.best, true),
                store: false,
            };
        }
        Verdict {
            score: node.best.into(),
            store: true,
        }
    }

    fn conclude(&self, score: Score, game: &Game) -> Score {
        let wanted = if game.side_to_move() == self.favored {
            Outcome::Win
        } else {
            Outcome::Loss
        };
        if score.outcome == wanted {
            wanted.into()
        } else {
            Score::UNKNOWN
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitboard::Geometry;

    fn ctx(ply: usize, favored_to_move: bool, pop_count: u32) -> Context {
        Context {
            depth: 0,
            ply,
            favored_to_move,
            pop_count,
        }
    }

    #[test]
    fn limits_are_tainted() {
        let handicap = Handicap::new(21, Some(1), 40);
        let mut stats = Stats::default();
        assert_eq!(handicap.limit(&ctx(21, true, 0), &mut stats), Some(Score::LOSS.tainted()));
        assert_eq!(handicap.limit(&ctx(22, false, 0), &mut stats), Some(Score::WIN.tainted()));
        assert_eq!(stats.depth_cutoffs, 2);

        assert_eq!(handicap.limit(&ctx(5, false, 1), &mut stats), None);
        assert_eq!(handicap.limit(&ctx(5, false, 2), &mut stats), Some(Score::WIN.tainted()));

        let unlimited = Handicap::new(21, None, 40);
        assert_eq!(unlimited.limit(&ctx(5, false, 100), &mut stats), None);
        assert!(unlimited.repetition());
        assert!(!Handicap::new(21, Some(0), 40).repetition());
    }

    #[test]
    fn draws_fail_the_favored_side() {
        let handicap = Handicap::new(21, Some(0), 40);
        let mut node = Node {
            best: Outcome::Loss,
            tainted: false,
        };
        assert_eq!(handicap.terminals(&ctx(3, false, 0), &mut node, Score::DRAW), Some(Score::WIN));
        assert_eq!(handicap.terminals(&ctx(3, true, 0), &mut node, Score::DRAW), None);
        assert_eq!(
            handicap.terminals(&ctx(3, false, 0), &mut node, Score::DRAW.tainted()),
            Some(Score::WIN.tainted())
        );
        assert!(!node.tainted);
        assert_eq!(handicap.terminals(&ctx(3, true, 0), &mut node, Score::DRAW.tainted()), None);
        assert!(node.tainted);
    }

    #[test]
    fn cache_skipped_after_favored_pops() {
        let handicap = Handicap::new(21, Some(2), 40);
        let mut table = TranspositionTable::new(101, &Geometry::default()).unwrap();
        table.store(7, Outcome::Win, 1);
        let mut stats = Stats::default();
        assert!(matches!(
            handicap.probe(&ctx(4, true, 0), &table, 7, (), &mut stats),
            Probe::Done(score) if score == Score::WIN
        ));
        assert!(matches!(handicap.probe(&ctx(4, true, 1), &table, 7, (), &mut stats), Probe::Open(_)));
        assert_eq!(stats.exact_hits, 1);

        let node = Node {
            best: Outcome::Win,
            tainted: false,
        };
        let verdict = handicap.finish(&ctx(4, true, 1), node, 0, &mut stats);
        assert_eq!(verdict.score, Score::WIN.tainted());
        assert!(!verdict.store);
    }

    #[test]
    fn history_bonus_fades_with_depth() {
        let handicap = Handicap::new(21, Some(0), 40);
        assert_eq!(handicap.history_shift(&ctx(0, true, 0)), Some(39));
        assert_eq!(handicap.history_shift(&ctx(39, true, 0)), Some(0));
        assert_eq!(handicap.history_shift(&ctx(40, true, 0)), None);
    }
}
