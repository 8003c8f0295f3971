//! Corner-stitched tile planes.
//!
//! A plane is a partition of the coordinate universe into non-overlapping
//! rectangular tiles, each carrying a [`TileKind`]. Every tile has four
//! neighbor links following the corner-stitched discipline:
//!
//! * `tr`: the rightward neighbor at the tile's top-right corner,
//! * `rt`: the upward neighbor at the tile's top-right corner,
//! * `bl`: the leftward neighbor at the tile's bottom-left corner,
//! * `lb`: the downward neighbor at the tile's bottom-left corner.
//!
//! Tiles store only their lower-left corner; the right and top edges are
//! derived from the `tr` and `rt` stitches. Tiles live in a slab indexed by
//! 32-bit [`TileId`]s, with freed slots recycled through a free list, so the
//! stitches are plain ids rather than references.
//!
//! A plane is kept maximal in its [`StripDir`]: a horizontal-strip plane
//! never has two horizontally adjacent tiles of the same kind, a
//! vertical-strip plane never has two vertically adjacent ones.
#![warn(missing_docs)]

pub mod numline;
pub mod plane;

pub use numline::NumberLine;
pub use plane::{Plane, StripDir, TileId};

use geometry::prelude::*;
use serde::{Deserialize, Serialize};

/// A tile type tag.
///
/// The meaning of each value is plane-specific; the plane itself only
/// distinguishes [`TileKind::SPACE`] (the background), [`TileKind::BORDER`]
/// (the four infinite boundary tiles), and [`TileKind::DEAD`] (a recycled
/// slab slot).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileKind(pub u8);

impl TileKind {
    /// The background kind every plane starts out filled with.
    pub const SPACE: TileKind = TileKind(0);
    /// The kind of the four infinite boundary tiles.
    pub const BORDER: TileKind = TileKind(u8::MAX);
    /// Marks a slab slot on the free list.
    pub(crate) const DEAD: TileKind = TileKind(u8::MAX - 1);
}

/// A painting rule table: `result(new, old)` is the kind left behind when
/// `new` is painted over a region of kind `old`.
///
/// The blockage builder relies on tables being monotone: painting a
/// higher-priority kind over the result of a lower-priority paint must give
/// the same kind as painting the higher-priority kind directly.
#[derive(Debug, Clone)]
pub struct PaintTable {
    rows: Vec<Vec<TileKind>>,
}

impl PaintTable {
    /// Builds a table from `rows[new][old]`.
    pub fn new(rows: Vec<Vec<TileKind>>) -> Self {
        Self { rows }
    }

    /// Builds the "higher value wins" table over `n` kinds.
    pub fn priority(n: u8) -> Self {
        let rows = (0..n)
            .map(|new| (0..n).map(|old| TileKind(new.max(old))).collect())
            .collect();
        Self { rows }
    }

    /// Builds the table that unconditionally replaces `old` with `new`.
    pub fn replace(n: u8) -> Self {
        let rows = (0..n)
            .map(|new| (0..n).map(|_| TileKind(new)).collect())
            .collect();
        Self { rows }
    }

    /// The kind left behind when `new` is painted over `old`.
    pub fn result(&self, new: TileKind, old: TileKind) -> TileKind {
        match self.rows.get(new.0 as usize).and_then(|r| r.get(old.0 as usize)) {
            Some(&k) => k,
            // Kinds outside the table (the border sentinel) are left alone.
            None => old,
        }
    }
}

/// The region of the universe tiles can be painted in. The four boundary
/// tiles occupy the one-unit frame between this rectangle and
/// `[NEG_INFINITY, INFINITY)`.
pub const UNIVERSE: Rect =
    Rect::from_bounds(NEG_INFINITY + 1, NEG_INFINITY + 1, INFINITY - 1, INFINITY - 1);
