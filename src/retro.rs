//! Retrograde analysis of every reachable position
//!
//! One byte of state per position code. While a position is being worked
//! on, the low bits count the children that have not reported back yet;
//! once finished they hold its outcome.

use log::{debug, info};

use crate::bitboard::{BitBoard, Geometry};
use crate::error::{Error, Result};
use crate::score::Outcome;

const UNINITIALIZED: u8 = 128;
const FINISHED: u8 = 64;
const HAS_DRAW: u8 = 32;
const COUNT_MASK: u8 = 31;

/// Largest table, in bits of position code, we are willing to allocate
pub const MAX_CODE_BITS: usize = 40;

pub struct Retro {
    geometry: Geometry,
    popout: bool,
    states: Vec<u8>,
    state_count: u64,
    drop_states: u64,
    terminals: Vec<BitBoard>,
}

fn push(list: &mut Vec<BitBoard>, board: BitBoard) -> Result<()> {
    list.try_reserve(1)
        .map_err(|_| Error::ResourceExhausted(format!("retrograde work list of {} positions", list.len())))?;
    list.push(board);
    Ok(())
}

impl Retro {
    /// Solves every position reachable from the empty board
    pub fn new(geometry: Geometry, popout: bool) -> Result<Self> {
        let bits = geometry.code_bits();
        if bits > MAX_CODE_BITS {
            return Err(Error::ResourceExhausted(format!(
                "a retrograde table of 2^{} states",
                bits
            )));
        }
        if 2 * geometry.width() > COUNT_MASK as usize {
            return Err(Error::InvalidGeometry {
                width: geometry.width(),
                height: geometry.height(),
                reason: "too many moves per position for retrograde analysis",
            });
        }

        let size = usize::try_from(1u64 << bits)
            .map_err(|_| Error::ResourceExhausted(format!("a retrograde table of 2^{} states", bits)))?;
        let mut states = Vec::new();
        states
            .try_reserve_exact(size)
            .map_err(|_| Error::ResourceExhausted(format!("a retrograde table of {} bytes", size)))?;
        states.resize(size, UNINITIALIZED);

        let mut retro = Self {
            geometry,
            popout,
            states,
            state_count: 0,
            drop_states: 0,
            terminals: Vec::new(),
        };
        retro.enumerate()?;
        retro.propagate()?;
        retro.terminals = Vec::new();

        let root = retro.geometry.code(BitBoard::default());
        info!(
            "{}x{} solved by retrograde analysis: {}",
            geometry.width(),
            geometry.height(),
            retro.score(root)
        );
        Ok(retro)
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    /// Reachable positions
    pub fn state_count(&self) -> u64 {
        self.state_count
    }

    /// Positions reachable with drops alone
    pub fn drop_states(&self) -> u64 {
        self.drop_states
    }

    /// The outcome for the side to move. Reachable positions that never
    /// finished are draws by endless repetition; anything unreachable is
    /// UNKNOWN.
    pub fn score(&self, code: u64) -> Outcome {
        let Some(state) = self.state(code) else {
            return Outcome::Unknown;
        };
        if state & UNINITIALIZED != 0 {
            Outcome::Unknown
        } else if state & FINISHED != 0 {
            Outcome::from_bits(state & COUNT_MASK).unwrap_or(Outcome::Unknown)
        } else {
            Outcome::Draw
        }
    }

    fn state(&self, code: u64) -> Option<u8> {
        usize::try_from(code)
            .ok()
            .and_then(|index| self.states.get(index).copied())
    }

    fn finished(&self, board: BitBoard) -> Option<Outcome> {
        let state = self.state(self.geometry.code(board))?;
        if state & UNINITIALIZED == 0 && state & FINISHED != 0 {
            Outcome::from_bits(state & COUNT_MASK)
        } else {
            None
        }
    }

    fn children(&self, board: BitBoard) -> impl Iterator<Item = BitBoard> + '_ {
        let geometry = &self.geometry;
        (0..geometry.width()).flat_map(move |column| {
            let pop = if self.popout { board.pop(geometry, column) } else { None };
            board.drop(geometry, column).into_iter().chain(pop)
        })
    }

    /// Checks a finished position's outcome against its children's
    pub fn verify(&self, code: u64) -> bool {
        let Some(board) = self.geometry.decode(code) else {
            return false;
        };
        if self.geometry.has_won(board.other) {
            return self.score(code) == Outcome::Loss;
        }
        if self.geometry.has_won(board.current) {
            return self.score(code) == Outcome::Win;
        }
        let Some(outcome) = self.finished(board) else {
            return true;
        };

        let full = board.is_full(&self.geometry);
        let mut children = self.children(board).map(|child| self.finished(child));
        match outcome {
            Outcome::Win => children.any(|child| child == Some(Outcome::Loss)),
            Outcome::Loss => !full && children.all(|child| child == Some(Outcome::Win)),
            Outcome::Draw => {
                let children: Vec<_> = children.collect();
                !children.contains(&Some(Outcome::Loss)) && (full || children.contains(&Some(Outcome::Draw)))
            }
            _ => false,
        }
    }

    fn set(&mut self, board: BitBoard, state: u8) {
        let index = self.geometry.code(board) as usize;
        self.states[index] = state;
    }

    fn get(&self, board: BitBoard) -> u8 {
        self.states[self.geometry.code(board) as usize]
    }

    // drop-reachable positions first, then whatever needs a pop to reach
    fn enumerate(&mut self) -> Result<()> {
        let root = BitBoard::default();
        self.set(root, 0);
        let mut drops = vec![root];
        let mut pops = Vec::new();

        self.process(&mut drops, Some(&mut pops))?;
        self.drop_states = self.state_count;
        info!("{} drop states", self.drop_states);

        self.process(&mut pops, None)?;
        info!(
            "{} pop states, {} in total",
            self.state_count - self.drop_states,
            self.state_count
        );
        Ok(())
    }

    fn discover(&mut self, child: BitBoard, list: &mut Vec<BitBoard>) -> Result<()> {
        if self.get(child) == UNINITIALIZED {
            self.set(child, 0);
            push(list, child)?;
        }
        Ok(())
    }

    fn process(&mut self, pending: &mut Vec<BitBoard>, mut deferred: Option<&mut Vec<BitBoard>>) -> Result<()> {
        let geometry = self.geometry;
        while let Some(board) = pending.pop() {
            self.state_count += 1;

            if geometry.has_won(board.other) {
                self.set(board, FINISHED | Outcome::Loss.bits());
                push(&mut self.terminals, board)?;
                continue;
            }
            if geometry.has_won(board.current) {
                self.set(board, FINISHED | Outcome::Win.bits());
                push(&mut self.terminals, board)?;
                continue;
            }

            let mut count = 0;
            for column in 0..geometry.width() {
                if let Some(child) = board.drop(&geometry, column) {
                    self.discover(child, pending)?;
                    count += 1;
                }
                if !self.popout {
                    continue;
                }
                if let Some(child) = board.pop(&geometry, column) {
                    let list = match deferred.as_deref_mut() {
                        Some(list) => list,
                        None => &mut *pending,
                    };
                    self.discover(child, list)?;
                    count += 1;
                }
            }

            if board.is_full(&geometry) {
                if count == 0 {
                    self.set(board, FINISHED | Outcome::Draw.bits());
                    push(&mut self.terminals, board)?;
                } else {
                    self.set(board, count | HAS_DRAW);
                }
            } else {
                self.set(board, count);
            }
        }
        Ok(())
    }

    fn propagate(&mut self) -> Result<()> {
        let geometry = self.geometry;
        let mut resolved = 0u64;
        while let Some(board) = self.terminals.pop() {
            resolved += 1;
            let outcome = Outcome::from_bits(self.get(board) & COUNT_MASK).unwrap_or(Outcome::Unknown);
            debug_assert!(outcome.is_exact());
            for column in 0..geometry.width() {
                if let Some(parent) = board.undrop(&geometry, column) {
                    self.update_parent(outcome, parent)?;
                }
                if !self.popout {
                    continue;
                }
                if let Some(parent) = board.unpop(&geometry, column) {
                    self.update_parent(outcome, parent)?;
                }
            }
        }
        debug!("{} positions resolved backwards", resolved);
        Ok(())
    }

    fn update_parent(&mut self, child: Outcome, parent: BitBoard) -> Result<()> {
        let mut state = self.get(parent);
        if state & (UNINITIALIZED | FINISHED) != 0 {
            return Ok(());
        }

        if child == Outcome::Loss {
            self.set(parent, FINISHED | Outcome::Win.bits());
            return push(&mut self.terminals, parent);
        }
        if child == Outcome::Draw {
            state |= HAS_DRAW;
        }
        if state & COUNT_MASK == 0 {
            debug_assert!(false, "more children reported than were counted");
            return Ok(());
        }
        state -= 1;

        if state & COUNT_MASK == 0 {
            let outcome = if state & HAS_DRAW != 0 {
                Outcome::Draw
            } else {
                Outcome::Loss
            };
            self.set(parent, FINISHED | outcome.bits());
            push(&mut self.terminals, parent)
        } else {
            self.set(parent, state);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reachable(retro: &Retro) -> impl Iterator<Item = (u64, BitBoard)> + '_ {
        let size = 1u64 << retro.geometry().code_bits();
        (0..size).filter_map(move |code| {
            let board = retro.geometry().decode(code)?;
            (retro.score(code) != Outcome::Unknown).then_some((code, board))
        })
    }

    #[test]
    fn standard_board_is_too_large() {
        assert!(matches!(
            Retro::new(Geometry::default(), true),
            Err(Error::ResourceExhausted(_))
        ));
    }

    #[test]
    fn single_row() -> anyhow::Result<()> {
        let geometry = Geometry::new(4, 1)?;
        let retro = Retro::new(geometry, false)?;
        assert!(retro.state_count() > 0);
        assert_eq!(retro.drop_states(), retro.state_count());
        // no line fits two discs each, drops alone end in a draw
        assert_eq!(retro.score(geometry.code(BitBoard::default())), Outcome::Draw);
        assert_eq!(retro.score(0), Outcome::Unknown);
        Ok(())
    }

    #[test]
    fn lines_against_the_mover_are_losses() -> anyhow::Result<()> {
        let geometry = Geometry::new(4, 4)?;
        let retro = Retro::new(geometry, true)?;
        assert!(retro.state_count() > retro.drop_states());

        let mut losses = 0;
        for (code, board) in reachable(&retro) {
            if geometry.has_won(board.other) {
                assert_eq!(retro.score(code), Outcome::Loss);
                losses += 1;
            }
            assert!(retro.verify(code), "inconsistent position {:#x}", code);
        }
        assert!(losses > 0);
        Ok(())
    }

    #[test]
    fn drop_only_small_board() -> anyhow::Result<()> {
        let geometry = Geometry::new(4, 4)?;
        let retro = Retro::new(geometry, false)?;
        for (code, board) in reachable(&retro) {
            // without pops nothing repeats, so everything finishes
            assert!(retro.finished(board).is_some());
            assert!(retro.verify(code));
        }
        assert_eq!(retro.score(geometry.code(BitBoard::default())), Outcome::Draw);
        Ok(())
    }
}
