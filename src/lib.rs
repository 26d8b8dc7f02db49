//! Exact solvers for the board game 'PopOut', the Connect 4 variant where
//! a player may also remove one of their own discs from the bottom row
//!
//! Four searches share the same board model, move generator and caches:
//! an alpha-beta solver, a prover that looks for wins under a handicap,
//! proof-number search, and retrograde analysis of the whole game.
//!
//! # Basic Usage
//!
//! ```
//! use popout::{config::Config, score::Score, solver::Solver};
//!
//!# fn main() -> Result<(), popout::error::Error> {
//! let config = Config {
//!     table_size: 100_003,
//!     ..Config::default()
//! };
//! let mut solver = Solver::new(config)?;
//! solver.load_variation("ababab")?;
//!
//! assert_eq!(solver.run_alpha_beta(2)?, Score::WIN);
//!# Ok(())
//!# }
//! ```

use static_assertions::*;
pub use anyhow;

pub mod error;

pub mod score;

pub mod bitboard;

pub mod game;

pub mod movegen;

pub mod config;

pub mod stats;

pub mod transposition_table;

pub mod history;

pub mod minimax;

pub mod alphabeta;

pub mod handicap;

pub mod proof;

pub mod retro;

pub mod solver;


pub use error::{Error, Result};
pub use game::{Game, Move, Side};
pub use score::{Outcome, Score};
pub use solver::{ProofTarget, Solver};

/// The width of the standard game board in tiles
pub const WIDTH: usize = 7;

/// The height of the standard game board in tiles
pub const HEIGHT: usize = 6;

// ensure that the standard board, with a sentinel row, fits in a u64
const_assert!(WIDTH * (HEIGHT + 1) < 64);
