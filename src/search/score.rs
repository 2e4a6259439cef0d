use cozy_chess::Color;
use std::cmp::Ordering;
use std::fmt;

pub const VALUE_INFINITE: i32 = 999_999;
pub const VALUE_MATE: i32 = 100_000;
pub const VALUE_DRAW: i32 = 0;

/// A centipawn value, optionally tagged with the side it is good for.
/// When a perspective is attached, larger is always better for that side.
/// Values from different perspectives must never be compared field-wise;
/// use [`Score::compare`], which normalizes the other operand first.
#[derive(Clone, Copy, Debug)]
pub struct Score {
    cp: i32,
    pov: Option<Color>,
}

impl Score {
    pub fn cp(value: i32) -> Self {
        Self { cp: value, pov: None }
    }

    pub fn pov(value: i32, pov: Color) -> Self {
        Self { cp: value, pov: Some(pov) }
    }

    pub fn value(&self) -> i32 {
        self.cp
    }

    pub fn perspective(&self) -> Option<Color> {
        self.pov
    }

    /// Re-tag this score for `pov`, negating when the perspectives differ.
    /// An untagged score is assumed to already be relative to `pov`.
    pub fn to_pov(&self, pov: Color) -> Score {
        match self.pov {
            Some(p) if p != pov => Score::pov(-self.cp, pov),
            _ => Score::pov(self.cp, pov),
        }
    }

    pub fn compare(&self, other: &Score) -> Ordering {
        self.cp.cmp(&self.normalize(other))
    }

    /// Difference `self - other` with `other` brought into this score's perspective.
    pub fn gap(&self, other: &Score) -> i32 {
        self.cp - self.normalize(other)
    }

    fn normalize(&self, other: &Score) -> i32 {
        match (self.pov, other.pov) {
            (Some(a), Some(b)) if a != b => -other.cp,
            _ => other.cp,
        }
    }

    /// Fold a `score mate N` distance into the centipawn scale, matching the
    /// mate-score convention used for evaluator replies.
    pub fn from_mate_distance(plies: i32) -> i32 {
        if plies >= 0 {
            VALUE_MATE - plies
        } else {
            -(VALUE_MATE + plies)
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.cp)
    }
}
