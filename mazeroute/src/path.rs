//! Partial-path records and their arena.
//!
//! Paths form a linked back-chain. All records live in a page-based arena
//! owned by the router and are reclaimed in bulk by [`clean`], after the
//! winning path has been copied to caller-owned storage; back-pointers are
//! arena ids, never references.
//!
//! [`clean`]: crate::MazeRouter::clean

use geometry::prelude::*;
use serde::{Deserialize, Serialize};

/// Path costs. 64-bit signed with an explicit ceiling well below overflow.
pub type Cost = i64;

/// The cost ceiling: additions saturate here instead of overflowing.
pub const COST_MAX: Cost = i64::MAX >> 2;

/// Saturating cost addition, clamped to [`COST_MAX`].
#[inline]
pub fn cost_add(a: Cost, b: Cost) -> Cost {
    debug_assert!(a >= 0 && b >= 0);
    a.saturating_add(b).min(COST_MAX)
}

/// Saturating rate-times-distance, clamped to [`COST_MAX`].
#[inline]
pub fn cost_mul(rate: Cost, dist: i64) -> Cost {
    debug_assert!(rate >= 0 && dist >= 0);
    rate.saturating_mul(dist).min(COST_MAX)
}

/// How a partial path arrived at its endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orient {
    /// End of a horizontal segment.
    Horiz,
    /// End of a vertical segment.
    Vert,
    /// A contact drop found on the left-right contact plane.
    ContactLr,
    /// A contact drop found on the up-down contact plane.
    ContactUd,
    /// The first point of a path.
    Start,
}

impl Orient {
    /// The orientation recording arrival along `dir`.
    pub fn from_dir(dir: Dir) -> Orient {
        match dir {
            Dir::Horiz => Orient::Horiz,
            Dir::Vert => Orient::Vert,
        }
    }

    /// Whether this records a contact drop.
    pub fn is_contact(self) -> bool {
        matches!(self, Orient::ContactLr | Orient::ContactUd)
    }
}

/// The set of successors the extender may generate from a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExtendMask(pub u16);

impl ExtendMask {
    /// Extend rightward.
    pub const RIGHT: ExtendMask = ExtendMask(1 << 0);
    /// Extend leftward.
    pub const LEFT: ExtendMask = ExtendMask(1 << 1);
    /// Extend upward.
    pub const UP: ExtendMask = ExtendMask(1 << 2);
    /// Extend downward.
    pub const DOWN: ExtendMask = ExtendMask(1 << 3);
    /// Try contacts on the up-down contact planes.
    pub const UD_CONTACTS: ExtendMask = ExtendMask(1 << 4);
    /// Try contacts on the left-right contact planes.
    pub const LR_CONTACTS: ExtendMask = ExtendMask(1 << 5);
    /// Complete by walking right to the destination.
    pub const WALK_RIGHT: ExtendMask = ExtendMask(1 << 6);
    /// Complete by walking left.
    pub const WALK_LEFT: ExtendMask = ExtendMask(1 << 7);
    /// Complete by walking up.
    pub const WALK_UP: ExtendMask = ExtendMask(1 << 8);
    /// Complete by walking down.
    pub const WALK_DOWN: ExtendMask = ExtendMask(1 << 9);
    /// Complete by dropping a left-right contact.
    pub const WALK_LR_CONTACT: ExtendMask = ExtendMask(1 << 10);
    /// Complete by dropping an up-down contact.
    pub const WALK_UD_CONTACT: ExtendMask = ExtendMask(1 << 11);
    /// The path has reached a destination area.
    pub const COMPLETE: ExtendMask = ExtendMask(1 << 12);

    /// All four directions plus both contact planes; the mask of seed paths.
    pub const ALL: ExtendMask = ExtendMask(0x3f);

    /// The empty mask.
    pub const NONE: ExtendMask = ExtendMask(0);

    /// Whether every bit of `other` is set in `self`.
    pub fn contains(self, other: ExtendMask) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether any bit of `other` is set in `self`.
    pub fn intersects(self, other: ExtendMask) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether the path is finished.
    pub fn is_complete(self) -> bool {
        self.contains(Self::COMPLETE)
    }

    /// Whether the path sits inside a walk and must run walk completion.
    pub fn is_walk(self) -> bool {
        self.intersects(ExtendMask(0xfc0))
    }
}

impl std::ops::BitOr for ExtendMask {
    type Output = ExtendMask;
    fn bitor(self, rhs: ExtendMask) -> ExtendMask {
        ExtendMask(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for ExtendMask {
    fn bitor_assign(&mut self, rhs: ExtendMask) {
        self.0 |= rhs.0;
    }
}

/// Identifier of a path record in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathId(u32);

/// One partial-path record.
#[derive(Debug, Clone, Copy)]
pub struct RoutePath {
    /// The path's current endpoint.
    pub entry: Point,
    /// The route layer the endpoint is on.
    pub layer: usize,
    /// How the endpoint was reached.
    pub orient: Orient,
    /// Accumulated cost from the start.
    pub cost: Cost,
    /// Estimated cost to go.
    pub togo: Cost,
    /// Which successors the extender may generate.
    pub extend: ExtendMask,
    /// The previous record, if any.
    pub back: Option<PathId>,
}

impl RoutePath {
    /// Accumulated cost plus the estimate to completion.
    pub fn total(&self) -> Cost {
        cost_add(self.cost, self.togo)
    }
}

const PATHS_PER_PAGE: usize = 256;

/// A growing chain of fixed-size pages of path records.
#[derive(Debug, Default)]
pub struct PathArena {
    pages: Vec<Vec<RoutePath>>,
}

impl PathArena {
    /// An empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// The number of live records.
    pub fn len(&self) -> usize {
        match self.pages.last() {
            Some(last) => (self.pages.len() - 1) * PATHS_PER_PAGE + last.len(),
            None => 0,
        }
    }

    /// Whether the arena holds no records.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Stores a record, returning its id.
    pub fn push(&mut self, path: RoutePath) -> PathId {
        if self
            .pages
            .last()
            .map(|p| p.len() == PATHS_PER_PAGE)
            .unwrap_or(true)
        {
            self.pages.push(Vec::with_capacity(PATHS_PER_PAGE));
        }
        let page = self.pages.len() - 1;
        let last = self.pages.last_mut().unwrap();
        let id = PathId((page * PATHS_PER_PAGE + last.len()) as u32);
        last.push(path);
        id
    }

    /// Reads a record.
    pub fn get(&self, id: PathId) -> &RoutePath {
        let i = id.0 as usize;
        &self.pages[i / PATHS_PER_PAGE][i % PATHS_PER_PAGE]
    }

    /// Releases every record at once.
    pub fn reset(&mut self) {
        self.pages.clear();
    }

    /// Copies the back-chain ending at `id` into an owned vector, endpoint
    /// first.
    pub fn collect_chain(&self, id: PathId) -> Vec<RoutePath> {
        let mut out = Vec::new();
        let mut cur = Some(id);
        while let Some(i) = cur {
            let p = *self.get(i);
            cur = p.back;
            out.push(p);
        }
        out
    }
}

/// The deduplication key of the point hash: a path reaching the same point
/// on the same layer with the same orientation as a cheaper predecessor is
/// redundant. Orientation matters because horizontal and vertical arrivals
/// pay different future jog costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PointKey {
    /// The endpoint.
    pub point: Point,
    /// The route layer.
    pub layer: usize,
    /// The arrival orientation.
    pub orient: Orient,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arena_ids_are_stable_across_pages() {
        let mut arena = PathArena::new();
        let template = RoutePath {
            entry: Point::zero(),
            layer: 0,
            orient: Orient::Start,
            cost: 0,
            togo: 0,
            extend: ExtendMask::ALL,
            back: None,
        };
        let mut ids = Vec::new();
        for i in 0..1000 {
            let mut p = template;
            p.cost = i as Cost;
            ids.push(arena.push(p));
        }
        assert_eq!(arena.len(), 1000);
        for (i, id) in ids.iter().enumerate() {
            assert_eq!(arena.get(*id).cost, i as Cost);
        }
    }

    #[test]
    fn chain_collection_walks_back_pointers() {
        let mut arena = PathArena::new();
        let a = arena.push(RoutePath {
            entry: Point::new(0, 0),
            layer: 0,
            orient: Orient::Start,
            cost: 0,
            togo: 10,
            extend: ExtendMask::ALL,
            back: None,
        });
        let b = arena.push(RoutePath {
            entry: Point::new(5, 0),
            layer: 0,
            orient: Orient::Horiz,
            cost: 5,
            togo: 5,
            extend: ExtendMask::RIGHT,
            back: Some(a),
        });
        let chain = arena.collect_chain(b);
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].entry, Point::new(5, 0));
        assert_eq!(chain[1].entry, Point::new(0, 0));
    }

    #[test]
    fn cost_arithmetic_saturates() {
        assert_eq!(cost_add(COST_MAX, COST_MAX), COST_MAX);
        assert_eq!(cost_mul(COST_MAX, 3), COST_MAX);
        assert_eq!(cost_add(2, 3), 5);
    }

    #[test]
    fn walk_masks_are_detected() {
        assert!(ExtendMask::WALK_LEFT.is_walk());
        assert!(ExtendMask::WALK_UD_CONTACT.is_walk());
        assert!(!ExtendMask::ALL.is_walk());
        assert!((ExtendMask::RIGHT | ExtendMask::WALK_UP).is_walk());
        assert!(ExtendMask::COMPLETE.is_complete());
    }
}
