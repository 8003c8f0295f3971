//! Signs along an axis: negative (left/down) or positive (right/up).

use serde::{Deserialize, Serialize};

/// An enumeration of axis signs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Hash, PartialEq, Eq)]
pub enum Sign {
    /// The negative sign: towards the left or bottom.
    Neg,
    /// The positive sign: towards the right or top.
    Pos,
}

impl Sign {
    /// Returns the other sign.
    pub const fn other(&self) -> Self {
        match *self {
            Self::Neg => Self::Pos,
            Self::Pos => Self::Neg,
        }
    }

    /// `+1` for [`Sign::Pos`], `-1` for [`Sign::Neg`].
    ///
    /// # Example
    ///
    /// ```
    /// # use geometry::prelude::*;
    /// assert_eq!(Sign::Pos.as_int(), 1);
    /// assert_eq!(Sign::Neg.as_int(), -1);
    /// ```
    pub const fn as_int(&self) -> i64 {
        match *self {
            Self::Neg => -1,
            Self::Pos => 1,
        }
    }
}

impl std::ops::Not for Sign {
    type Output = Self;
    fn not(self) -> Self::Output {
        self.other()
    }
}
