//! Search results
//!
//! Outcomes form the lattice `LOSS < DRAW_OR_LOSS < DRAW < DRAW_OR_WIN < WIN`.
//! Exact outcomes have the low bit set, and `CEILING - outcome` gives the
//! outcome for the opponent.

use std::fmt;

const CEILING: u8 = 6;

#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Outcome {
    Unknown = 0,
    Loss = 1,
    DrawOrLoss = 2,
    Draw = 3,
    DrawOrWin = 4,
    Win = 5,
}

impl Outcome {
    pub fn from_bits(bits: u8) -> Option<Self> {
        Some(match bits {
            0 => Outcome::Unknown,
            1 => Outcome::Loss,
            2 => Outcome::DrawOrLoss,
            3 => Outcome::Draw,
            4 => Outcome::DrawOrWin,
            5 => Outcome::Win,
            _ => return None,
        })
    }

    pub fn bits(self) -> u8 {
        self as u8
    }

    /// WIN, DRAW and LOSS are exact, the rest are bounds
    pub fn is_exact(self) -> bool {
        self.bits() & 1 == 1
    }

    /// The same result seen from the other side of the board
    pub fn negate(self) -> Self {
        match self {
            Outcome::Unknown => Outcome::Unknown,
            Outcome::Loss => Outcome::Win,
            Outcome::DrawOrLoss => Outcome::DrawOrWin,
            Outcome::Draw => Outcome::Draw,
            Outcome::DrawOrWin => Outcome::DrawOrLoss,
            Outcome::Win => Outcome::Loss,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Outcome::Unknown => "UNKNOWN",
            Outcome::Loss => "LOSS",
            Outcome::DrawOrLoss => "DRAW_OR_LOSS",
            Outcome::Draw => "DRAW",
            Outcome::DrawOrWin => "DRAW_OR_WIN",
            Outcome::Win => "WIN",
        })
    }
}

/// An outcome for the side to move plus a flag telling whether it was
/// proven only under an auxiliary bound (limited history, ply or pop budget)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Score {
    pub outcome: Outcome,
    pub tainted: bool,
}

impl Score {
    pub const UNKNOWN: Score = Score::exact(Outcome::Unknown);
    pub const LOSS: Score = Score::exact(Outcome::Loss);
    pub const DRAW_OR_LOSS: Score = Score::exact(Outcome::DrawOrLoss);
    pub const DRAW: Score = Score::exact(Outcome::Draw);
    pub const DRAW_OR_WIN: Score = Score::exact(Outcome::DrawOrWin);
    pub const WIN: Score = Score::exact(Outcome::Win);

    const fn exact(outcome: Outcome) -> Self {
        Self {
            outcome,
            tainted: false,
        }
    }

    pub fn new(outcome: Outcome, tainted: bool) -> Self {
        Self { outcome, tainted }
    }

    pub fn tainted(self) -> Self {
        Self {
            tainted: true,
            ..self
        }
    }

    pub fn untainted(self) -> Self {
        Self {
            tainted: false,
            ..self
        }
    }

    pub fn negate(self) -> Self {
        Self {
            outcome: self.outcome.negate(),
            ..self
        }
    }

    pub fn is_unknown(self) -> bool {
        self.outcome == Outcome::Unknown
    }
}

impl From<Outcome> for Score {
    fn from(outcome: Outcome) -> Self {
        Score::exact(outcome)
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.tainted {
            write!(f, "{} (tainted)", self.outcome)
        } else {
            write!(f, "{}", self.outcome)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negation_mirrors_the_lattice() {
        for bits in 1..=5 {
            let outcome = Outcome::from_bits(bits).unwrap();
            assert_eq!(outcome.negate().bits(), CEILING - bits);
            assert_eq!(outcome.negate().negate(), outcome);
        }
        assert_eq!(Outcome::Unknown.negate(), Outcome::Unknown);
    }

    #[test]
    fn exactness() {
        assert!(Outcome::Win.is_exact());
        assert!(Outcome::Draw.is_exact());
        assert!(Outcome::Loss.is_exact());
        assert!(!Outcome::DrawOrWin.is_exact());
        assert!(!Outcome::DrawOrLoss.is_exact());
        assert!(!Outcome::Unknown.is_exact());
    }

    #[test]
    fn taint_survives_negation() {
        let score = Score::DRAW_OR_WIN.tainted().negate();
        assert_eq!(score.outcome, Outcome::DrawOrLoss);
        assert!(score.tainted);
        assert_eq!(score.untainted(), Score::DRAW_OR_LOSS);
    }
}
