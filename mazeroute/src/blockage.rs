//! Construction of the per-route-type blockage planes.
//!
//! Each point in the interior of a SPACE tile of a blockage plane is a legal
//! position for the lower-left corner of a wire of that route type. Solid
//! layout is bloated by its spacing plus one less than the wire width to the
//! left and bottom, and by the spacing alone to the right and top, then
//! painted BLOCKED. Geometry of the route's own node instead paints the
//! SAMENODE reachable region: two overlapping rectangles whose union is the
//! tile extended left and bottom with the upper-right corner prohibited.
//!
//! Blockage is generated incrementally: the bounds planes record where
//! blockage is current (INBOUNDS) and where it still must be produced
//! (GENBLOCK), and the search extends them on demand around the point being
//! expanded.

use std::ops::ControlFlow;

use geometry::prelude::*;
use tileplane::{PaintTable, TileKind};

use crate::db::{DbType, SUBCELL};
use crate::hints::HINT_SOLID;
use crate::rtypes::{contact_walk_kind, BlockKind, RtRef};
use crate::{InitError, MazeRouter, Result};

/// Bounds-plane kind: blockage has never been requested here.
pub const BOUNDS_SPACE: TileKind = TileKind::SPACE;
/// Bounds-plane kind: blockage is current here.
pub const INBOUNDS: TileKind = TileKind(1);
/// Bounds-plane kind: blockage was requested here but not yet produced.
pub const GENBLOCK: TileKind = TileKind(2);

/// The bounds-plane paint table. GENBLOCK never downgrades a region that is
/// already INBOUNDS.
pub fn bounds_paint_table() -> PaintTable {
    PaintTable::new(vec![
        vec![TileKind(0), TileKind(1), TileKind(2)],
        vec![TileKind(1), TileKind(1), TileKind(1)],
        vec![TileKind(2), TileKind(1), TileKind(2)],
    ])
}

/// A generated walk, stored until every walk has been computed: painting
/// walks eagerly would change what later scans find.
struct Walk {
    target: RtRef,
    rect: Rect,
    kind: BlockKind,
}

impl MazeRouter<'_> {
    /// Paints blockage of kind `block` for a solid data rectangle `r` of
    /// type `ty` into every interacting route type's planes, clipped to
    /// `build_area`.
    pub(crate) fn paint_block_shape(
        &mut self,
        r: Rect,
        ty: DbType,
        build_area: Rect,
        block: BlockKind,
    ) {
        for r_ref in self.table.active_refs() {
            let rt = self.table.route_type(r_ref);
            let spacing = rt.spacing_to(ty);
            if spacing < 0 {
                continue;
            }
            let width = rt.width;
            let mut block = block;

            if block != BlockKind::SameNode {
                // Never bury a start or destination terminal: when the data
                // tile sits on SAMENODE, the blockage it would generate is
                // the node's own spacing rule, which does not apply.
                let here = BlockKind::from_tile(
                    rt.h_block.kind(rt.h_block.point_locate(r.lower_left())),
                );
                if here == Some(BlockKind::SameNode) {
                    match r_ref {
                        RtRef::Layer(_) => continue,
                        RtRef::Contact(ci) => {
                            // A SAMENODE on the contact plane only counts if
                            // the residue layer of this material agrees.
                            let c = &self.table.contacts[ci];
                            let mut residue_same = false;
                            for &li in &[c.layer1, c.layer2] {
                                let lrt = &self.table.layers[li].rt;
                                if lrt.db_type == ty {
                                    let k = BlockKind::from_tile(
                                        lrt.h_block
                                            .kind(lrt.h_block.point_locate(r.lower_left())),
                                    );
                                    if k == Some(BlockKind::SameNode) {
                                        residue_same = true;
                                    }
                                }
                            }
                            if residue_same {
                                continue;
                            }
                        }
                    }
                }
            } else if self.table.route_type(r_ref).db_type == ty
                && matches!(r_ref, RtRef::Contact(_))
            {
                // An existing contact of the same type: the region is part
                // of the node but a new contact dropped against it would
                // violate the cut spacing rule.
                block = BlockKind::SameNodeBlock;
            }

            let rects: [Rect; 2] = if block == BlockKind::SameNode {
                let w = width - 1;
                [
                    Rect::from_bounds(r.left() - w, r.bottom(), r.right(), r.top() - w),
                    Rect::from_bounds(r.left(), r.bottom() - w, r.right() - w, r.top()),
                ]
            } else {
                let bb = spacing + width - 1;
                let bt = spacing;
                let grown = Rect::from_bounds(
                    r.left() - bb,
                    r.bottom() - bb,
                    r.right() + bt,
                    r.top() + bt,
                );
                [grown, Rect::from_bounds(0, 0, 0, 0)]
            };

            let table = &self.block_table;
            let rt = self.table.route_type_mut(r_ref);
            for rect in rects {
                let clipped = rect.intersection(build_area);
                if clipped.is_empty() {
                    continue;
                }
                rt.h_block.paint(clipped, block.tile(), table);
                rt.v_block.paint(clipped, block.tile(), table);
            }
        }
    }

    /// Builds blockage from layout paint, terminals, and subcells in
    /// `build_area`.
    fn build_mask_data_blocks(&mut self, build_area: Rect) {
        let search_area = build_area.expand_all(self.context_radius);

        // Terminal geometry (start and destination nodes) paints the
        // SAMENODE reachable region first; the priority table lets real
        // blockage override it later where it must.
        let terms = self.term_shapes.clone();
        for s in &terms {
            if s.rect.overlaps(search_area) {
                self.paint_block_shape(s.rect, s.ty, build_area, BlockKind::SameNode);
            }
        }

        let db = self.db;
        let mut shapes = Vec::new();
        db.for_each_paint(search_area, |s| shapes.push(s));
        for s in shapes {
            self.paint_block_shape(s.rect, s.ty, build_area, BlockKind::Blocked);
        }

        let mut cells = Vec::new();
        db.for_each_unexpanded(search_area, |bbox, dest| cells.push((bbox, dest)));
        for (bbox, dest) in cells {
            let kind = if dest {
                BlockKind::SameNode
            } else {
                BlockKind::Blocked
            };
            self.paint_block_shape(bbox, SUBCELL, build_area, kind);
        }
    }

    /// Blocks the regions of the wrong fence parity in `build_area`. Fences
    /// block every active layer regardless of spacing tables.
    fn build_fence_blocks(&mut self, build_area: Rect) {
        let search_area = build_area.expand_all(self.context_radius);
        let want_space = self.inside_fence;
        let mut rects = Vec::new();
        let _ = self.hints.h_fence.for_each_in(search_area, |id| {
            let solid = self.hints.h_fence.kind(id) == HINT_SOLID;
            if solid != want_space {
                rects.push(self.hints.h_fence.rect(id));
            }
            ControlFlow::Continue(())
        });
        for r_ref in self.table.active_refs() {
            let d = self.table.route_type(r_ref).width - 1;
            let table = &self.block_table;
            let rt = self.table.route_type_mut(r_ref);
            for r in &rects {
                let adj = Rect::from_bounds(r.left() - d, r.bottom() - d, r.right(), r.top())
                    .intersection(build_area);
                if adj.is_empty() {
                    continue;
                }
                rt.h_block.paint(adj, BlockKind::Blocked.tile(), table);
                rt.v_block.paint(adj, BlockKind::Blocked.tile(), table);
            }
        }
    }

    /// Generates blockage around `rect` to a radius of twice the bounds
    /// increment, skipping regions already generated.
    pub(crate) fn extend_block_bounds_rect(&mut self, rect: Rect) {
        self.stats.block_gen_calls += 1;
        let inc = self.bounds_increment * 2;
        let area = rect.expand_all(inc);
        let table = bounds_paint_table();
        self.h_bounds.paint(area, GENBLOCK, &table);

        let mut gen = Vec::new();
        let _ = self.h_bounds.for_each_in(area, |id| {
            if self.h_bounds.kind(id) == GENBLOCK {
                gen.push(self.h_bounds.rect(id));
            }
            ControlFlow::Continue(())
        });
        for g in gen {
            if self.interrupted() {
                break;
            }
            // Grow by 2 units to wash out boundary conditions.
            let grown = g.expand_all(2);
            self.build_mask_data_blocks(grown);
            self.build_fence_blocks(grown);
            self.stats.block_gen_area += (g.width() as f64) * (g.height() as f64);
        }

        self.h_bounds.paint(area, INBOUNDS, &table);
        self.v_bounds.paint(area, INBOUNDS, &table);
    }

    /// Generates blockage around a single point.
    pub(crate) fn extend_block_bounds(&mut self, p: Point) {
        self.extend_block_bounds_rect(Rect::from_bounds(p.x, p.y, p.x, p.y));
    }

    /// Processes every destination area: generates blockage around it,
    /// paints the DEST_AREA region, records alignment coordinates, and
    /// paints the walks leading in.
    pub(crate) fn build_dest_area_blocks(&mut self) -> Result<()> {
        let shapes = self.dest_areas.clone();

        // First pass: blockage and the destination areas themselves.
        for s in &shapes {
            self.extend_block_bounds_rect(s.rect);
            let Some(r_ref) = self.table.rt_of_db_type(s.ty) else {
                return Err(InitError::NoRouteType {
                    name: self.registry.name(s.ty).clone(),
                });
            };
            let w = self.table.route_type(r_ref).width;
            let r = s.rect;
            // The upper-right corner, trimmed by the wire width on each
            // side, would DRC against the destination's own far edges.
            let d1 = Rect::from_bounds(r.left(), r.bottom() - w, r.right() - w, r.top());
            let d2 = Rect::from_bounds(r.left() - w, r.bottom(), r.right(), r.top() - w);
            let table = &self.block_table;
            let rt = self.table.route_type_mut(r_ref);
            for rect in [d1, d2] {
                if rect.is_empty() {
                    continue;
                }
                rt.h_block.paint(rect, BlockKind::DestArea.tile(), table);
                rt.v_block.paint(rect, BlockKind::DestArea.tile(), table);
            }
        }

        // Second pass: walks and alignments, over the painted DEST_AREA
        // tiles so partially blocked destinations are handled correctly.
        // Walks are deferred and painted only after every scan is done.
        let mut walks: Vec<Walk> = Vec::new();
        for s in &shapes {
            let r_ref = self.table.rt_of_db_type(s.ty).unwrap();
            self.collect_directional_walks(r_ref, s.rect, &mut walks);
            if let RtRef::Layer(li) = r_ref {
                self.collect_contact_walks(li, s.rect, &mut walks);
            }
        }

        let table = &self.block_table;
        for w in &walks {
            if matches!(w.kind, BlockKind::Blocked | BlockKind::Space) {
                tracing::warn!(rect = ?w.rect, "bad destination walk");
                continue;
            }
            let rt = self.table.route_type_mut(w.target);
            rt.h_block.paint(w.rect, w.kind.tile(), table);
            rt.v_block.paint(w.rect, w.kind.tile(), table);
        }
        Ok(())
    }

    /// Collects left/right/top/bottom walks around the DEST_AREA tiles under
    /// `area`, and the destination alignment coordinates.
    fn collect_directional_walks(&mut self, r_ref: RtRef, area: Rect, walks: &mut Vec<Walk>) {
        let max_walk = self.max_walk_length;
        let rt = self.table.route_type(r_ref);
        let mut dest_h = Vec::new();
        let _ = rt.h_block.for_each_in(area, |id| {
            if rt.h_block.kind(id) == BlockKind::DestArea.tile() {
                dest_h.push(id);
            }
            ControlFlow::Continue(())
        });
        for &t in &dest_h {
            let plane = &rt.h_block;
            let tr = plane.rect(t);
            self.x_align.insert(tr.left());
            self.x_align.insert(tr.right());

            // Walks entering from the left.
            let mut q = plane.next_left(t, tr.bottom());
            loop {
                if plane.kind(q) == BlockKind::SameNode.tile() {
                    let qr = plane.rect(q);
                    walks.push(Walk {
                        target: r_ref,
                        rect: Rect::from_bounds(
                            qr.left().max(qr.right() - max_walk),
                            tr.bottom().max(qr.bottom()),
                            qr.right(),
                            tr.top().min(qr.top()),
                        ),
                        kind: BlockKind::LeftWalk,
                    });
                }
                if plane.top(q) >= tr.top() {
                    break;
                }
                q = plane.next_left(t, plane.top(q));
            }

            // Walks entering from the right.
            let mut q = plane.next_right(t, tr.top() - 1);
            loop {
                if plane.kind(q) == BlockKind::SameNode.tile() {
                    let qr = plane.rect(q);
                    walks.push(Walk {
                        target: r_ref,
                        rect: Rect::from_bounds(
                            qr.left(),
                            tr.bottom().max(qr.bottom()),
                            qr.right().min(qr.left() + max_walk),
                            tr.top().min(qr.top()),
                        ),
                        kind: BlockKind::RightWalk,
                    });
                }
                if plane.bottom(q) <= tr.bottom() {
                    break;
                }
                q = plane.next_right(t, plane.bottom(q) - 1);
            }
        }

        let rt = self.table.route_type(r_ref);
        let mut dest_v = Vec::new();
        let _ = rt.v_block.for_each_in(area, |id| {
            if rt.v_block.kind(id) == BlockKind::DestArea.tile() {
                dest_v.push(id);
            }
            ControlFlow::Continue(())
        });
        for &t in &dest_v {
            let plane = &rt.v_block;
            let tr = plane.rect(t);
            self.y_align.insert(tr.bottom());
            self.y_align.insert(tr.top());

            // Walks entering from below.
            let mut q = plane.next_down(t, tr.left());
            loop {
                if plane.kind(q) == BlockKind::SameNode.tile() {
                    let qr = plane.rect(q);
                    walks.push(Walk {
                        target: r_ref,
                        rect: Rect::from_bounds(
                            tr.left().max(qr.left()),
                            qr.bottom().max(qr.top() - max_walk),
                            tr.right().min(qr.right()),
                            qr.top(),
                        ),
                        kind: BlockKind::BottomWalk,
                    });
                }
                if plane.right(q) >= tr.right() {
                    break;
                }
                q = plane.next_down(t, plane.right(q));
            }

            // Walks entering from above.
            let mut q = plane.next_up(t, tr.right() - 1);
            loop {
                if plane.kind(q) == BlockKind::SameNode.tile() {
                    let qr = plane.rect(q);
                    walks.push(Walk {
                        target: r_ref,
                        rect: Rect::from_bounds(
                            tr.left().max(qr.left()),
                            qr.bottom(),
                            tr.right().min(qr.right()),
                            qr.top().min(qr.bottom() + max_walk),
                        ),
                        kind: BlockKind::TopWalk,
                    });
                }
                if plane.left(q) <= tr.left() {
                    break;
                }
                q = plane.next_up(t, plane.left(q) - 1);
            }
        }
    }

    /// Collects contact walks: regions of the contact blockage planes inside
    /// the destination where a contact placement completes the route. The
    /// walk is painted into the planes of the contact's *other* residue.
    fn collect_contact_walks(&mut self, dest_layer: usize, area: Rect, walks: &mut Vec<Walk>) {
        let contact_ids = self.table.layers[dest_layer].contacts.clone();
        for ci in contact_ids {
            let c = &self.table.contacts[ci];
            if !c.rt.active {
                continue;
            }
            let dest_is_layer1 = c.layer1 == dest_layer;
            let other = c.other_layer(dest_layer);
            if !self.table.layers[other].rt.active {
                continue;
            }

            for (plane, scanned) in [
                (&c.rt.h_block, tileplane::StripDir::Horiz),
                (&c.rt.v_block, tileplane::StripDir::Vert),
            ] {
                let mut rects = Vec::new();
                let _ = plane.for_each_in(area, |id| {
                    if BlockKind::from_tile(plane.kind(id))
                        .map(BlockKind::passable)
                        .unwrap_or(false)
                    {
                        rects.push(plane.rect(id).intersection(area));
                    }
                    ControlFlow::Continue(())
                });
                let kind = contact_walk_kind(dest_is_layer1, scanned);
                for rect in rects {
                    if rect.is_empty() {
                        continue;
                    }
                    walks.push(Walk {
                        target: RtRef::Layer(other),
                        rect,
                        kind,
                    });
                }
            }
        }
    }
}
