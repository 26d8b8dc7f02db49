use log::debug;

use crate::bitboard::Geometry;
use crate::error::{Error, Result};
use crate::score::Outcome;

const SCORE_BITS: u32 = 3;

/// A cache of search results keyed by position code
///
/// Every bucket holds two packed words: the low bits are the position code
/// with the bucket index removed, then three bits of outcome, then the
/// number of nodes it took to find the outcome. The table size doubles as
/// the hash function, so it should avoid small factors.
#[derive(Clone)]
pub struct TranspositionTable {
    entries: Vec<u64>,
    size: u64,
    index_bits: u32,
    key_bits: u32,
    key_mask: u64,
    score_mask: u64,
    max_work: u64,
    stored: u64,
}

impl TranspositionTable {
    /// Creates a table of `size` buckets, 0 disables caching
    pub fn new(size: usize, geometry: &Geometry) -> Result<Self> {
        let index_bits = if size == 0 {
            0
        } else {
            usize::BITS - 1 - size.leading_zeros()
        };
        let key_bits = (geometry.code_bits() as u32).saturating_sub(index_bits);
        let key_score_bits = key_bits + SCORE_BITS;
        if key_score_bits >= u64::BITS {
            return Err(Error::InvalidConfig(format!(
                "a table of {} buckets leaves no room to record work",
                size
            )));
        }

        let exhausted = || Error::ResourceExhausted(format!("transposition table of {} buckets", size));
        let len = size.checked_mul(2).ok_or_else(exhausted)?;
        let mut entries = Vec::new();
        entries.try_reserve_exact(len).map_err(|_| exhausted())?;
        entries.resize(len, 0);

        let key_mask = (1 << key_bits) - 1;
        Ok(Self {
            entries,
            size: size as u64,
            index_bits,
            key_bits,
            key_mask,
            score_mask: ((1 << key_score_bits) - 1) ^ key_mask,
            max_work: (1 << (u64::BITS - key_score_bits)) - 1,
            stored: 0,
        })
    }

    /// Number of buckets
    pub fn size(&self) -> usize {
        self.size as usize
    }

    /// Number of stores since the last reset
    pub fn stored(&self) -> u64 {
        self.stored
    }

    pub fn reset(&mut self) {
        self.entries.iter_mut().for_each(|entry| *entry = 0);
        self.stored = 0;
        debug!("transposition table cleared ({} buckets)", self.size);
    }

    fn locate(&self, position: u64) -> (usize, u64) {
        let index = (position % self.size) as usize * 2;
        (index, position >> self.index_bits)
    }

    fn outcome(&self, entry: u64) -> Outcome {
        Outcome::from_bits(((entry & self.score_mask) >> self.key_bits) as u8).unwrap_or(Outcome::Unknown)
    }

    fn work(&self, entry: u64) -> u64 {
        entry >> (self.key_bits + SCORE_BITS)
    }

    pub fn store(&mut self, position: u64, outcome: Outcome, work: u64) {
        debug_assert!(outcome != Outcome::Unknown);
        if self.size == 0 {
            return;
        }
        let work = if work > self.max_work {
            debug!("work {} exceeds the maximum of {}, clamping", work, self.max_work);
            self.max_work
        } else {
            work
        };
        self.stored += 1;

        let (index, key) = self.locate(position);
        let packed = key | ((outcome.bits() as u64) << self.key_bits) | (work << (self.key_bits + SCORE_BITS));
        debug_assert_eq!(self.outcome(packed), outcome);

        let first = self.entries[index];
        if first & self.key_mask == key {
            self.entries[index] = packed;
        } else if work >= self.work(first) {
            // keep whichever of the two was more expensive to find
            self.entries[index + 1] = first;
            self.entries[index] = packed;
        } else {
            self.entries[index + 1] = packed;
        }
    }

    pub fn fetch(&self, position: u64) -> Outcome {
        if self.size == 0 {
            return Outcome::Unknown;
        }
        let (index, key) = self.locate(position);
        self.entries[index..index + 2]
            .iter()
            .find(|&&entry| entry & self.key_mask == key)
            .map_or(Outcome::Unknown, |&entry| self.outcome(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(size: usize) -> TranspositionTable {
        TranspositionTable::new(size, &Geometry::default()).unwrap()
    }

    #[test]
    fn store_then_fetch() {
        let mut table = table(1_000_003);
        table.store(123_456_789, Outcome::Win, 10);
        table.store(987_654_321, Outcome::DrawOrLoss, 3);
        assert_eq!(table.fetch(123_456_789), Outcome::Win);
        assert_eq!(table.fetch(987_654_321), Outcome::DrawOrLoss);
        assert_eq!(table.fetch(42), Outcome::Unknown);
        assert_eq!(table.stored(), 2);

        table.reset();
        assert_eq!(table.fetch(123_456_789), Outcome::Unknown);
    }

    #[test]
    fn disabled_table() {
        let mut table = table(0);
        table.store(77, Outcome::Draw, 1);
        assert_eq!(table.fetch(77), Outcome::Unknown);
        assert_eq!(table.stored(), 0);
    }

    #[test]
    fn expensive_results_survive() {
        let mut table = table(5);
        let (a, b, c, d) = (3, 8, 13, 18);

        table.store(a, Outcome::Win, 10);
        // cheaper, goes to the second slot
        table.store(b, Outcome::Loss, 5);
        assert_eq!(table.fetch(a), Outcome::Win);
        assert_eq!(table.fetch(b), Outcome::Loss);

        // cheaper again, replaces b
        table.store(c, Outcome::Draw, 1);
        assert_eq!(table.fetch(a), Outcome::Win);
        assert_eq!(table.fetch(b), Outcome::Unknown);
        assert_eq!(table.fetch(c), Outcome::Draw);

        // more expensive, pushes a down and drops c
        table.store(d, Outcome::DrawOrWin, 100);
        assert_eq!(table.fetch(d), Outcome::DrawOrWin);
        assert_eq!(table.fetch(a), Outcome::Win);
        assert_eq!(table.fetch(c), Outcome::Unknown);

        // same key overwrites in place
        table.store(d, Outcome::Draw, 1);
        assert_eq!(table.fetch(d), Outcome::Draw);
        assert_eq!(table.fetch(a), Outcome::Win);
    }

    #[test]
    fn work_is_clamped() {
        let mut table = table(1);
        let position = (1 << 48) | 12345;
        table.store(position, Outcome::DrawOrWin, u64::MAX);
        assert_eq!(table.fetch(position), Outcome::DrawOrWin);
        assert_eq!(table.fetch(position ^ 1), Outcome::Unknown);
    }

    #[test]
    fn rejects_tables_without_room_for_work() {
        let geometry = Geometry::new(9, 6).unwrap();
        assert!(TranspositionTable::new(1, &geometry).is_err());
        assert!(TranspositionTable::new(1 << 20, &geometry).is_ok());
    }
}
