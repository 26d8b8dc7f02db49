use std::fmt;
use std::ops::ControlFlow;
use std::time::Duration;

use crate::game::Game;

/// Counters gathered during a single search
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub interior: u64,
    pub terminal: u64,
    pub exact_hits: u64,
    pub inexact_hits: u64,
    pub tainted: u64,
    pub depth_cutoffs: u64,
    /// proof-number expansions
    pub expansions: u64,
    /// proof-number nodes currently allocated
    pub live_nodes: u64,
    pub elapsed: Duration,
}

impl Stats {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl fmt::Display for Stats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "interior nodes:  {}", self.interior)?;
        writeln!(f, "terminal nodes:  {}", self.terminal)?;
        writeln!(f, "exact reuses:    {}", self.exact_hits)?;
        writeln!(f, "inexact reuses:  {}", self.inexact_hits)?;
        writeln!(f, "tainted results: {}", self.tainted)?;
        writeln!(f, "depth cutoffs:   {}", self.depth_cutoffs)?;
        if self.expansions > 0 {
            writeln!(f, "expansions:      {}", self.expansions)?;
            writeln!(f, "live nodes:      {}", self.live_nodes)?;
        }
        write!(f, "elapsed:         {:.3}s", self.elapsed.as_secs_f64())
    }
}

/// What a progress callback gets to see
pub struct Report<'a> {
    pub stats: &'a Stats,
    /// the line currently being searched
    pub game: &'a Game,
}

/// Called every fixed number of nodes; breaking cancels the search
pub type Reporter = dyn FnMut(&Report<'_>) -> ControlFlow<()>;
