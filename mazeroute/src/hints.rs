//! Flattening of user-authored hints into the five global planes.
//!
//! One hierarchy walk paints magnet material into the H- and V-hint planes,
//! fence material into a single H-fence plane (fences become blockage later,
//! so no vertical version is needed), and rotate material into the H- and
//! V-rotate planes. H and V versions exist because the extenders need fast
//! next-tile queries in both orientations.

use geometry::prelude::*;
use tileplane::{PaintTable, Plane, StripDir, TileKind};

use crate::db::{CellDb, HintKind};

/// The solid kind on hint, fence, and rotate planes.
pub const HINT_SOLID: TileKind = TileKind(1);

/// The five global hint-derived planes.
#[derive(Debug)]
pub struct HintPlanes {
    /// Magnet regions, maximal horizontal strips.
    pub h_hint: Plane,
    /// Magnet regions, maximal vertical strips.
    pub v_hint: Plane,
    /// Fence regions.
    pub h_fence: Plane,
    /// Rotate regions, maximal horizontal strips.
    pub h_rotate: Plane,
    /// Rotate regions, maximal vertical strips.
    pub v_rotate: Plane,
}

impl HintPlanes {
    /// Empty planes.
    pub fn new() -> Self {
        Self {
            h_hint: Plane::new(StripDir::Horiz),
            v_hint: Plane::new(StripDir::Vert),
            h_fence: Plane::new(StripDir::Horiz),
            h_rotate: Plane::new(StripDir::Horiz),
            v_rotate: Plane::new(StripDir::Vert),
        }
    }

    /// Clears all five planes.
    pub fn clear(&mut self) {
        self.h_hint.clear();
        self.v_hint.clear();
        self.h_fence.clear();
        self.h_rotate.clear();
        self.v_rotate.clear();
    }

    /// Flattens the hint shapes of `db` over `area` into the global planes.
    pub fn build(&mut self, db: &CellDb, area: Rect, top_only: bool) {
        self.clear();
        let table = PaintTable::priority(2);
        let mut shapes = 0usize;
        db.for_each_hint(area, top_only, |h| {
            shapes += 1;
            let r = h.rect.intersection(area);
            match h.kind {
                HintKind::Magnet => {
                    self.h_hint.paint(r, HINT_SOLID, &table);
                    self.v_hint.paint(r, HINT_SOLID, &table);
                }
                HintKind::Fence => {
                    self.h_fence.paint(r, HINT_SOLID, &table);
                }
                HintKind::Rotate => {
                    self.h_rotate.paint(r, HINT_SOLID, &table);
                    self.v_rotate.paint(r, HINT_SOLID, &table);
                }
            }
        });
        tracing::debug!(shapes, top_only, "flattened hint planes");
    }
}

impl Default for HintPlanes {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{CellDb, Instance};

    #[test]
    fn hints_flatten_across_the_hierarchy() {
        let mut db = CellDb::new();
        let child = db.add_cell();
        db.cell_mut(child).hints.push(crate::db::HintShape {
            rect: Rect::new(0, 0, 4, 1),
            kind: HintKind::Magnet,
        });
        let root = db.root();
        db.cell_mut(root).instances.push(Instance {
            cell: child,
            offset: Point::new(10, 10),
            expanded: true,
            dest: false,
        });
        db.hint(Rect::new(0, 0, 2, 2), HintKind::Fence);

        let mut planes = HintPlanes::new();
        planes.build(&db, Rect::new(-50, -50, 50, 50), false);
        let t = planes.h_hint.point_locate(Point::new(11, 10));
        assert_eq!(planes.h_hint.kind(t), HINT_SOLID);
        let t = planes.h_fence.point_locate(Point::new(1, 1));
        assert_eq!(planes.h_fence.kind(t), HINT_SOLID);

        // Top-only mode ignores the child's magnet.
        planes.build(&db, Rect::new(-50, -50, 50, 50), true);
        let t = planes.h_hint.point_locate(Point::new(11, 10));
        assert_eq!(planes.h_hint.kind(t), TileKind::SPACE);
    }
}
