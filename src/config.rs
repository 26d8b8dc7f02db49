use crate::bitboard::Geometry;
use crate::error::Result;
use crate::proof::NODE_SIZE;
use crate::{HEIGHT, WIDTH};

/// Default number of transposition buckets
pub const DEFAULT_TABLE_SIZE: usize = (1 << 23) + 9; // prime value

/// Bytes the proof-number tree may grow to by default
pub const DEFAULT_PROOF_MEMORY: usize = 1 << 30;

/// Solver settings, shared by every search strategy
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub width: usize,
    pub height: usize,
    /// number of two-slot buckets, 0 disables caching
    pub table_size: usize,
    /// handicap ply limit, the geometry's default when `None`
    pub ply_limit: Option<usize>,
    /// non-winning pops allowed to the favored side, `None` for unlimited
    pub pop_limit: Option<u32>,
    /// whether pop moves are generated at all
    pub popout: bool,
    /// plies over which cutoffs feed the history heuristic
    pub history_window: u32,
    /// interior nodes between progress reports
    pub report_interval: u64,
    /// proof-number expansions between progress reports
    pub expansion_interval: u64,
    /// upper bound on live proof-number nodes, `None` for no bound
    pub node_limit: Option<usize>,
}

impl Config {
    pub fn geometry(&self) -> Result<Geometry> {
        Geometry::new(self.width, self.height)
    }

    /// The handicap ply limit after applying the board's default
    pub fn effective_ply_limit(&self) -> usize {
        self.ply_limit
            .unwrap_or_else(|| default_ply_limit(self.width, self.height))
    }
}

/// 21 plies on the standard board, the full board length elsewhere
pub fn default_ply_limit(width: usize, height: usize) -> usize {
    if (width, height) == (7, 6) {
        21
    } else {
        width * height
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            width: WIDTH,
            height: HEIGHT,
            table_size: DEFAULT_TABLE_SIZE,
            ply_limit: None,
            pop_limit: Some(0),
            popout: true,
            history_window: 40,
            report_interval: 200_000,
            expansion_interval: 100_000,
            node_limit: Some(DEFAULT_PROOF_MEMORY / NODE_SIZE),
        }
    }
}
