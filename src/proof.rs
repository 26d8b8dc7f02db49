//! Best-first proof-number search over an explicit AND/OR tree
//!
//! OR nodes are positions where the prover is to move, AND nodes those of
//! its opponent. The tree lives in an index arena; a node's subtree is
//! released as soon as the node is proven or disproven, and the slots are
//! recycled through a free list.

use std::ops::{ControlFlow, Deref, DerefMut, Range};

use log::{debug, info};
use static_assertions::const_assert;

use crate::bitboard::Geometry;
use crate::error::{Error, Result};
use crate::game::{Game, Move, Side};
use crate::movegen::Successor;
use crate::score::{Outcome, Score};
use crate::stats::{Report, Reporter, Stats};

/// Proof and disproof numbers saturate here
pub const INF: u32 = 100_000_000;

// parent of the root
const NONE: u32 = u32::MAX;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Value {
    Unknown,
    Proven,
    Disproven,
}

#[derive(Copy, Clone, Debug)]
struct Node {
    proof: u32,
    disproof: u32,
    parent: u32,
    // children occupy `first..first + count` in the arena
    first: u32,
    // pops made by the prover on the way here
    pops: u16,
    count: u8,
    // token of the move leading here, 0 at the root
    label: u8,
    value: Value,
    // prover to move
    or: bool,
    expanded: bool,
}

/// Bytes taken by one proof tree node
pub const NODE_SIZE: usize = std::mem::size_of::<Node>();

const_assert!(NODE_SIZE <= 24);

impl Node {
    fn leaf(value: Value, or: bool, mv: Option<Move>, pops: u16, parent: u32) -> Self {
        Self {
            proof: 1,
            disproof: 1,
            parent,
            first: 0,
            pops,
            count: 0,
            label: mv.map_or(0, |mv| mv.token() as u8),
            value,
            or,
            expanded: false,
        }
    }

    fn resolved(&self) -> bool {
        self.proof == 0 || self.disproof == 0
    }

    fn children(&self) -> Range<usize> {
        let first = self.first as usize;
        first..first + self.count as usize
    }

    fn mv(&self, geometry: &Geometry) -> Option<Move> {
        match self.label {
            0 => None,
            label => Move::from_token(label as char, geometry),
        }
    }
}

/// Node arena handing out contiguous blocks, one per expansion
#[derive(Default)]
struct Tree {
    nodes: Vec<Node>,
    // released blocks by length
    free: Vec<Vec<u32>>,
    live: usize,
    limit: Option<usize>,
}

impl Tree {
    fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            ..Self::default()
        }
    }

    fn node(&self, id: u32) -> &Node {
        &self.nodes[id as usize]
    }

    fn node_mut(&mut self, id: u32) -> &mut Node {
        &mut self.nodes[id as usize]
    }

    /// Reserves `len` adjacent slots and returns the first
    fn alloc(&mut self, len: usize) -> Result<u32> {
        if let Some(limit) = self.limit {
            if self.live + len > limit {
                return Err(Error::ResourceExhausted(format!("proof tree limited to {} nodes", limit)));
            }
        }
        let reused = self.free.get_mut(len).and_then(Vec::pop);
        let first = match reused {
            Some(first) => first,
            None => {
                let first = self.nodes.len();
                if first + len >= NONE as usize {
                    return Err(Error::ResourceExhausted(format!("proof tree of {} nodes", first)));
                }
                self.grow(len)?;
                let placeholder = Node::leaf(Value::Unknown, false, None, 0, NONE);
                self.nodes.resize(first + len, placeholder);
                first as u32
            }
        };
        self.live += len;
        Ok(first)
    }

    // doubles the arena, but never past the node limit
    fn grow(&mut self, len: usize) -> Result<()> {
        let needed = self.nodes.len() + len;
        if needed <= self.nodes.capacity() {
            return Ok(());
        }
        let mut target = (2 * self.nodes.capacity()).max(needed).max(1024);
        if let Some(limit) = self.limit {
            target = target.min(limit.max(needed));
        }
        self.nodes
            .try_reserve_exact(target - self.nodes.len())
            .map_err(|_| Error::ResourceExhausted(format!("proof tree of {} nodes", target)))
    }

    fn release_children(&mut self, id: u32) {
        let node = self.node_mut(id);
        let mut stack = vec![(node.first, node.count)];
        node.count = 0;
        while let Some((first, count)) = stack.pop() {
            if count == 0 {
                continue;
            }
            for child in first..first + u32::from(count) {
                let child = self.node_mut(child);
                if child.count > 0 {
                    stack.push((child.first, child.count));
                    child.count = 0;
                }
            }
            let len = usize::from(count);
            if self.free.len() <= len {
                self.free.resize_with(len + 1, Vec::new);
            }
            self.free[len].push(first);
            self.live -= len;
        }
    }

    /// Recomputes a node's numbers from its children, or from its value
    /// while unexpanded, and frees the subtree of a resolved node
    fn set_numbers(&mut self, id: u32) {
        let node = self.node(id);
        let (proof, disproof) = if node.expanded {
            let children = self.nodes[node.children()]
                .iter()
                .map(|child| (child.proof, child.disproof));
            if node.or {
                children.fold((INF, 0u32), |(p, d), (cp, cd)| (p.min(cp), d.saturating_add(cd).min(INF)))
            } else {
                children.fold((0u32, INF), |(p, d), (cp, cd)| (p.saturating_add(cp).min(INF), d.min(cd)))
            }
        } else {
            match node.value {
                Value::Proven => (0, INF),
                Value::Disproven => (INF, 0),
                Value::Unknown => (1, 1),
            }
        };

        let node = self.node_mut(id);
        node.proof = proof;
        node.disproof = disproof;
        if node.resolved() && node.expanded {
            // a resolved node is never revisited, keep only its value
            node.value = if proof == 0 { Value::Proven } else { Value::Disproven };
            node.expanded = false;
            self.release_children(id);
        }
    }
}

/// Restores a game to the ply it had when the guard was created
struct Rewind<'a> {
    game: &'a mut Game,
    ply: usize,
}

impl<'a> Rewind<'a> {
    fn new(game: &'a mut Game) -> Self {
        let ply = game.ply();
        Self { game, ply }
    }
}

impl Deref for Rewind<'_> {
    type Target = Game;

    fn deref(&self) -> &Game {
        self.game
    }
}

impl DerefMut for Rewind<'_> {
    fn deref_mut(&mut self) -> &mut Game {
        self.game
    }
}

impl Drop for Rewind<'_> {
    fn drop(&mut self) {
        while self.game.ply() > self.ply {
            self.game.undo();
        }
    }
}

pub struct ProofSearch<'a> {
    stats: &'a mut Stats,
    reporter: Option<&'a mut Reporter>,
    report_interval: u64,
    ply_limit: usize,
    pop_limit: Option<u32>,
    popout: bool,
    node_limit: Option<usize>,
    tree: Tree,
    prover: Side,
    // some leaf was disproven by the ply limit, the pop budget or a repetition
    bounded: bool,
}

impl<'a> ProofSearch<'a> {
    pub fn new(stats: &'a mut Stats, ply_limit: usize, pop_limit: Option<u32>) -> Self {
        Self {
            stats,
            reporter: None,
            report_interval: 100_000,
            ply_limit,
            pop_limit,
            popout: true,
            node_limit: None,
            tree: Tree::default(),
            prover: Side::First,
            bounded: false,
        }
    }

    pub fn with_popout(mut self, popout: bool) -> Self {
        self.popout = popout;
        self
    }

    pub fn with_node_limit(mut self, node_limit: Option<usize>) -> Self {
        self.node_limit = node_limit;
        self
    }

    pub fn with_reporter(mut self, reporter: Option<&'a mut Reporter>, interval: u64) -> Self {
        self.reporter = reporter;
        self.report_interval = interval.max(1);
        self
    }

    /// Tries to prove a win for `prover` from the current position.
    ///
    /// The result is from the point of view of the side to move: WIN or
    /// LOSS when proven, DRAW_OR_LOSS or DRAW_OR_WIN when disproven. A
    /// disproof is tainted when it leaned on the ply limit, the pop budget
    /// or a repetition. The game is back at its starting position when this
    /// returns, whether or not it succeeded.
    pub fn solve(&mut self, game: &mut Game, prover: Side) -> Result<Score> {
        let geometry = *game.geometry();
        let board = game.board();
        if geometry.has_won(board.other) {
            return Ok(Score::LOSS);
        }
        if geometry.has_won(board.current) {
            return Ok(Score::WIN);
        }

        let prover_moves = game.side_to_move() == prover;
        info!("proving a win for the {:?} player from \"{}\"", prover, game.variation());
        self.prover = prover;
        self.bounded = false;
        self.tree = Tree::new(self.node_limit);

        let result = self.search(&mut Rewind::new(game), prover_moves);
        debug!("proof tree peaked at {} slots", self.tree.nodes.len());
        self.tree = Tree::default();
        self.stats.live_nodes = 0;

        let proven = result?;
        let score = match (proven, prover_moves) {
            (true, true) => Score::WIN,
            (true, false) => Score::LOSS,
            (false, true) => Score::DRAW_OR_LOSS,
            (false, false) => Score::DRAW_OR_WIN,
        };
        let score = if !proven && self.bounded { score.tainted() } else { score };
        info!("{:?} player: {} after {} expansions", prover, score, self.stats.expansions);
        Ok(score)
    }

    /// Combines a proof attempt for each side into WIN, LOSS or DRAW
    pub fn exact_solve(&mut self, game: &mut Game) -> Result<Score> {
        let first = self.solve(game, Side::First)?;
        if first.outcome.is_exact() {
            return Ok(first);
        }
        let second = self.solve(game, Side::Second)?;
        if second.outcome.is_exact() {
            return Ok(second);
        }
        if first.is_unknown() || second.is_unknown() {
            return Ok(Score::UNKNOWN);
        }
        Ok(Score::new(Outcome::Draw, first.tainted || second.tainted))
    }

    fn search(&mut self, game: &mut Game, prover_moves: bool) -> Result<bool> {
        let root = self.tree.alloc(1)?;
        *self.tree.node_mut(root) = Node::leaf(Value::Unknown, prover_moves, None, 0, NONE);
        self.tree.set_numbers(root);

        let mut current = root;
        while !self.tree.node(root).resolved() {
            current = self.step(game, root, current)?;
        }
        Ok(self.tree.node(root).proof == 0)
    }

    /// One iteration: descend from `current` to the most proving node,
    /// expand it and climb back while the numbers keep changing. Returns
    /// the node the climb stopped at, which is where the game now is.
    fn step(&mut self, game: &mut Game, root: u32, current: u32) -> Result<u32> {
        let most_proving = self.select(game, current)?;
        self.expand(game, most_proving)?;
        let stop = self.update_ancestors(game, root, most_proving);
        self.stats.live_nodes = self.tree.live as u64;
        Ok(stop)
    }

    fn select(&mut self, game: &mut Game, mut id: u32) -> Result<u32> {
        let geometry = *game.geometry();
        loop {
            let node = self.tree.node(id);
            if !node.expanded {
                break;
            }
            let nodes = &self.tree.nodes;
            let next = if node.or {
                node.children().min_by_key(|&child| nodes[child].proof)
            } else {
                node.children().min_by_key(|&child| nodes[child].disproof)
            };
            let Some(next) = next else {
                break;
            };
            if let Some(mv) = nodes[next].mv(&geometry) {
                game.play(mv)?;
            }
            id = next as u32;
        }
        Ok(id)
    }

    fn report(&mut self, game: &Game) -> Result<()> {
        if self.stats.expansions % self.report_interval != 0 {
            return Ok(());
        }
        self.stats.live_nodes = self.tree.live as u64;
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

    fn evaluate(&mut self, game: &Game, successor: &Successor, prover_moves: bool, pops: u16) -> Value {
        let geometry = game.geometry();
        let (win, loss) = if prover_moves {
            (Value::Proven, Value::Disproven)
        } else {
            (Value::Disproven, Value::Proven)
        };
        // a pop completing both lines is won by the popper
        if geometry.has_won(successor.board.other) {
            return win;
        }
        if successor.mv.is_pop() {
            if geometry.has_won(successor.board.current) {
                return loss;
            }
            if prover_moves && self.pop_limit.is_some_and(|limit| u32::from(pops) >= limit) {
                self.bounded = true;
                return Value::Disproven;
            }
        }
        if game.ply() >= self.ply_limit || game.repeats(successor.board) {
            self.bounded = true;
            return Value::Disproven;
        }
        Value::Unknown
    }

    fn expand(&mut self, game: &Game, id: u32) -> Result<()> {
        self.stats.expansions += 1;
        self.report(game)?;

        let prover_moves = game.side_to_move() == self.prover;
        let pops = self.tree.node(id).pops;
        let or = !self.tree.node(id).or;
        let successors = game.successors(self.popout, false);
        let full = game.is_full();

        let count = successors.len() + usize::from(full);
        debug_assert!(count > 0 && count <= usize::from(u8::MAX));
        let first = self.tree.alloc(count)?;
        for (child, successor) in (first..).zip(successors.iter()) {
            let value = self.evaluate(game, successor, prover_moves, pops);
            if value != Value::Unknown {
                self.stats.terminal += 1;
            }
            let child_pops = pops.saturating_add(u16::from(successor.mv.is_pop() && prover_moves));
            *self.tree.node_mut(child) = Node::leaf(value, or, Some(successor.mv), child_pops, id);
            self.tree.set_numbers(child);
        }
        if full {
            // passing hands the opponent a draw it can always take
            let child = first + successors.len() as u32;
            *self.tree.node_mut(child) = Node::leaf(Value::Disproven, or, Some(Move::Pass), pops, id);
            self.tree.set_numbers(child);
        }

        let node = self.tree.node_mut(id);
        node.first = first;
        node.count = count as u8;
        node.expanded = true;
        Ok(())
    }

    fn update_ancestors(&mut self, game: &mut Game, root: u32, mut id: u32) -> u32 {
        while id != root {
            let before = (self.tree.node(id).proof, self.tree.node(id).disproof);
            self.tree.set_numbers(id);
            let node = self.tree.node(id);
            if (node.proof, node.disproof) == before || node.parent == NONE {
                return id;
            }
            id = node.parent;
            game.undo();
        }
        self.tree.set_numbers(root);
        root
    }
}
