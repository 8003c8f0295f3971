//! The estimation plane: an admissible lower-bound cost-to-go oracle.
//!
//! Built once per route, just before the search starts. Major obstacles
//! (opaque subcells, forbidden fence parity) become solid tiles; destination
//! areas become zero-cost tiles. Space tiles are split along extensions of
//! every solid-tile corner, so travel along tile edges from any corner is
//! unobstructed. Dijkstra over the tile-edge graph then yields the cheapest
//! edge-path cost from every tile corner to a destination, and each tile
//! gets a small set of linear estimators evaluated at query time.

use std::collections::BinaryHeap;
use std::ops::ControlFlow;
use std::sync::atomic::{AtomicBool, Ordering};

use geometry::prelude::*;
use geometry::is_finite_coord;
use rustc_hash::FxHashMap;
use tileplane::{PaintTable, Plane, StripDir, TileId, TileKind, UNIVERSE};

use crate::path::{cost_add, cost_mul, Cost, COST_MAX};
use crate::rtypes::BlockKind;
use crate::MazeRouter;

/// Estimation-plane tile kinds.
pub const EST_SPACE: TileKind = TileKind::SPACE;
/// An opaque unexpanded subcell.
pub const EST_SUBCELL: TileKind = TileKind(1);
/// A region the fence parity forbids.
pub const EST_FENCE: TileKind = TileKind(2);
/// A destination area.
pub const EST_DEST: TileKind = TileKind(3);

/// Per-unit rate marking an impassable tile.
const RATE_INF: Cost = COST_MAX;

/// The estimation-plane paint table: destination beats obstacles, and
/// painting SPACE cuts holes.
fn est_paint_table() -> PaintTable {
    PaintTable::new(vec![
        vec![TileKind(0), TileKind(0), TileKind(0), TileKind(0)],
        vec![TileKind(1), TileKind(1), TileKind(2), TileKind(3)],
        vec![TileKind(2), TileKind(2), TileKind(2), TileKind(3)],
        vec![TileKind(3), TileKind(3), TileKind(3), TileKind(3)],
    ])
}

/// A linear cost estimator:
/// `cost(x, y) = |x - x0| * h_cost + |y - y0| * v_cost + cost0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Estimator {
    x0: i64,
    y0: i64,
    cost0: Cost,
    h_cost: Cost,
    v_cost: Cost,
}

impl Estimator {
    fn eval(&self, p: Point) -> Cost {
        if self.h_cost >= RATE_INF || self.v_cost >= RATE_INF {
            return COST_MAX;
        }
        let h = cost_mul(self.h_cost, (p.x - self.x0).abs());
        let v = cost_mul(self.v_cost, (p.y - self.y0).abs());
        cost_add(cost_add(h, v), self.cost0)
    }
}

#[derive(Debug, Clone)]
struct TileCosts {
    h_cost: Cost,
    v_cost: Cost,
    estimates: Vec<Estimator>,
}

/// The estimation plane and its per-tile cost data.
#[derive(Debug)]
pub struct EstimatePlane {
    plane: Plane,
    costs: FxHashMap<TileId, TileCosts>,
    built: bool,
}

/// Min-heap holder for the Dijkstra frontier.
#[derive(PartialEq, Eq)]
struct Frontier {
    cost: Cost,
    at: Point,
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        other
            .cost
            .cmp(&self.cost)
            .then_with(|| other.at.cmp(&self.at))
    }
}

impl EstimatePlane {
    /// An unbuilt estimation plane.
    pub fn new() -> Self {
        Self {
            plane: Plane::new(StripDir::Horiz),
            costs: FxHashMap::default(),
            built: false,
        }
    }

    /// Whether [`EstimatePlane::build`] has run since the last clear.
    pub fn is_built(&self) -> bool {
        self.built
    }

    /// Drops all estimation state.
    pub fn clear(&mut self) {
        self.plane.clear();
        self.costs.clear();
        self.built = false;
    }

    /// Builds the plane from obstacle, destination, and walk-hole
    /// rectangles, with `space_h`/`space_v` the cheapest per-unit costs of
    /// any active layer.
    #[allow(clippy::too_many_arguments)]
    pub fn build(
        &mut self,
        subcells: &[Rect],
        fences: &[Rect],
        dest_tiles: &[Rect],
        walk_holes: &[Rect],
        space_h: Cost,
        space_v: Cost,
        interrupt: &AtomicBool,
    ) {
        self.clear();
        let table = est_paint_table();
        for r in subcells {
            self.plane.paint(*r, EST_SUBCELL, &table);
        }
        for r in fences {
            self.plane.paint(*r, EST_FENCE, &table);
        }
        for r in dest_tiles {
            self.plane.paint(*r, EST_DEST, &table);
        }
        for r in walk_holes {
            self.plane.paint(*r, EST_SPACE, &table);
        }

        // Extend cuts from every solid-tile corner.
        let solids: Vec<Rect> = {
            let mut v = Vec::new();
            let _ = self.plane.for_each_in(UNIVERSE, |id| {
                if self.plane.kind(id) != EST_SPACE && !self.plane.is_border(id) {
                    v.push(self.plane.rect(id));
                }
                ControlFlow::Continue(())
            });
            v
        };
        for r in &solids {
            self.split_from(Point::new(r.left(), r.bottom()));
            self.split_from(Point::new(r.left(), r.top()));
            self.split_from(Point::new(r.right(), r.top()));
            self.split_from(Point::new(r.right(), r.bottom()));
        }

        // Cost assignment.
        let ids = self.plane.tiles_in(UNIVERSE);
        for id in &ids {
            let (h_cost, v_cost) = match self.plane.kind(*id) {
                EST_DEST => (0, 0),
                EST_SPACE => (space_h, space_v),
                k if k == EST_SUBCELL || k == EST_FENCE => (RATE_INF, RATE_INF),
                _ => continue,
            };
            self.costs.insert(
                *id,
                TileCosts {
                    h_cost,
                    v_cost,
                    estimates: Vec::new(),
                },
            );
        }

        let corner_cost = self.assign_vertex_costs(&ids, interrupt);
        for id in &ids {
            if self.costs.contains_key(id) {
                self.build_corner_estimators(*id, &corner_cost);
                self.build_straight_shot_estimators(*id);
                self.trim_estimators(*id);
            }
        }
        self.built = true;
    }

    /// Splits SPACE tiles outward from `p` in all four directions until the
    /// next solid tile, then splits the tile containing `p` in four.
    fn split_from(&mut self, p: Point) {
        if !is_finite_coord(p.x) || !is_finite_coord(p.y) {
            return;
        }
        let origin = self.plane.point_locate(p);

        let mut t = self.plane.next_right(origin, p.y);
        while self.plane.kind(t) == EST_SPACE
            && !self.plane.is_border(t)
            && self.plane.bottom(t) != p.y
        {
            let u = self.plane.split_y(t, p.y);
            t = self.plane.next_right(u, p.y);
        }
        let mut t = self.plane.next_left(origin, p.y);
        while self.plane.kind(t) == EST_SPACE
            && !self.plane.is_border(t)
            && self.plane.bottom(t) != p.y
        {
            let u = self.plane.split_y(t, p.y);
            t = self.plane.next_left(u, p.y);
        }
        let mut t = self.plane.next_up(origin, p.x);
        while self.plane.kind(t) == EST_SPACE
            && !self.plane.is_border(t)
            && self.plane.left(t) != p.x
        {
            let right = self.plane.split_x(t, p.x);
            t = self.plane.next_up(right, p.x);
        }
        let mut t = self.plane.next_down(origin, p.x);
        while self.plane.kind(t) == EST_SPACE
            && !self.plane.is_border(t)
            && self.plane.left(t) != p.x
        {
            let right = self.plane.split_x(t, p.x);
            t = self.plane.next_down(right, p.x);
        }

        let t = self.plane.point_locate(p);
        if self.plane.kind(t) == EST_SPACE && !self.plane.is_border(t) {
            if p.x != self.plane.left(t) {
                let other = self.plane.split_x(t, p.x);
                if p.y != self.plane.bottom(other) {
                    self.plane.split_y(other, p.y);
                }
            }
            if p.y != self.plane.bottom(t) {
                self.plane.split_y(t, p.y);
            }
        }
    }

    fn rate(&self, id: TileId, dir: Dir) -> Cost {
        match self.costs.get(&id) {
            Some(tc) => match dir {
                Dir::Horiz => tc.h_cost,
                Dir::Vert => tc.v_cost,
            },
            None => RATE_INF,
        }
    }

    /// Dijkstra over the tile-edge graph, seeded with zero at the lower-left
    /// corner of every destination tile. Returns the cheapest edge-path cost
    /// per corner.
    fn assign_vertex_costs(
        &self,
        ids: &[TileId],
        interrupt: &AtomicBool,
    ) -> FxHashMap<Point, Cost> {
        let mut adj: FxHashMap<Point, Vec<(Point, Cost)>> = FxHashMap::default();
        let mut add_edge = |a: Point, b: Point, w: Cost| {
            adj.entry(a).or_default().push((b, w));
            adj.entry(b).or_default().push((a, w));
        };

        for &id in ids {
            if self.plane.is_border(id) {
                continue;
            }
            let r = self.plane.rect(id);
            // Vertical edge segments along the right edge.
            if is_finite_coord(r.right()) {
                let mut ys = vec![r.bottom(), r.top()];
                let mut q = self.plane.next_right(id, r.bottom());
                loop {
                    ys.push(self.plane.bottom(q).max(r.bottom()));
                    ys.push(self.plane.top(q).min(r.top()));
                    if self.plane.top(q) >= r.top() {
                        break;
                    }
                    q = self.plane.next_right(id, self.plane.top(q));
                }
                ys.retain(|&y| is_finite_coord(y));
                ys.sort_unstable();
                ys.dedup();
                for w in ys.windows(2) {
                    let (a, b) = (w[0], w[1]);
                    let q = self.plane.next_right(id, a);
                    let rate = self.rate(id, Dir::Vert).min(self.rate(q, Dir::Vert));
                    if rate < RATE_INF {
                        add_edge(
                            Point::new(r.right(), a),
                            Point::new(r.right(), b),
                            cost_mul(rate, b - a),
                        );
                    }
                }
            }
            // Horizontal edge segments along the top edge.
            if is_finite_coord(r.top()) {
                let mut xs = vec![r.left(), r.right()];
                let mut q = self.plane.next_up(id, r.left());
                loop {
                    xs.push(self.plane.left(q).max(r.left()));
                    xs.push(self.plane.right(q).min(r.right()));
                    if self.plane.right(q) >= r.right() {
                        break;
                    }
                    q = self.plane.next_up(id, self.plane.right(q));
                }
                xs.retain(|&x| is_finite_coord(x));
                xs.sort_unstable();
                xs.dedup();
                for w in xs.windows(2) {
                    let (a, b) = (w[0], w[1]);
                    let q = self.plane.next_up(id, a);
                    let rate = self.rate(id, Dir::Horiz).min(self.rate(q, Dir::Horiz));
                    if rate < RATE_INF {
                        add_edge(
                            Point::new(a, r.top()),
                            Point::new(b, r.top()),
                            cost_mul(rate, b - a),
                        );
                    }
                }
            }
        }

        let mut dist: FxHashMap<Point, Cost> = FxHashMap::default();
        let mut heap = BinaryHeap::new();
        for &id in ids {
            if self.plane.kind(id) == EST_DEST {
                let ll = Point::new(self.plane.left(id), self.plane.bottom(id));
                if is_finite_coord(ll.x) && is_finite_coord(ll.y) {
                    dist.insert(ll, 0);
                    heap.push(Frontier { cost: 0, at: ll });
                }
            }
        }
        let mut pops = 0usize;
        while let Some(Frontier { cost, at }) = heap.pop() {
            pops += 1;
            if pops % 1024 == 0 && interrupt.load(Ordering::Relaxed) {
                break;
            }
            if dist.get(&at).copied().unwrap_or(COST_MAX) < cost {
                continue;
            }
            let Some(edges) = adj.get(&at) else { continue };
            for &(next, w) in edges {
                let nc = cost_add(cost, w);
                if nc < dist.get(&next).copied().unwrap_or(COST_MAX) {
                    dist.insert(next, nc);
                    heap.push(Frontier { cost: nc, at: next });
                }
            }
        }
        dist
    }

    fn build_corner_estimators(&mut self, id: TileId, corner_cost: &FxHashMap<Point, Cost>) {
        let r = self.plane.rect(id);
        let tc = self.costs.get(&id).cloned().unwrap();
        let corners = [
            Point::new(r.left(), r.bottom()),
            Point::new(r.right(), r.bottom()),
            Point::new(r.left(), r.top()),
            Point::new(r.right(), r.top()),
        ];
        let ests = &mut self.costs.get_mut(&id).unwrap().estimates;
        for c in corners {
            if !is_finite_coord(c.x) || !is_finite_coord(c.y) {
                continue;
            }
            let cost0 = corner_cost.get(&c).copied().unwrap_or(COST_MAX);
            ests.push(Estimator {
                x0: c.x,
                y0: c.y,
                cost0,
                h_cost: tc.h_cost,
                v_cost: tc.v_cost,
            });
        }
    }

    fn build_straight_shot_estimators(&mut self, id: TileId) {
        let r = self.plane.rect(id);
        let tc = self.costs.get(&id).cloned().unwrap();
        let mut pending = Vec::new();

        let shot = |gap: i64, rate: Cost| -> Cost {
            if rate >= RATE_INF {
                COST_MAX
            } else {
                cost_mul(rate, gap.max(0))
            }
        };

        // Straight right, along the row at the tile's top edge.
        let mut s = id;
        while self.plane.kind(s) == EST_SPACE && !self.plane.is_border(s) {
            s = self.plane.next_right(s, r.top() - 1);
        }
        if self.plane.kind(s) == EST_DEST {
            pending.push(Estimator {
                x0: r.right(),
                y0: 0,
                cost0: shot(self.plane.left(s) - r.right(), tc.h_cost),
                h_cost: tc.h_cost,
                v_cost: 0,
            });
        }
        // Straight left, along the row at the tile's bottom edge.
        let mut s = id;
        while self.plane.kind(s) == EST_SPACE && !self.plane.is_border(s) {
            s = self.plane.next_left(s, r.bottom());
        }
        if self.plane.kind(s) == EST_DEST {
            pending.push(Estimator {
                x0: r.left(),
                y0: 0,
                cost0: shot(r.left() - self.plane.right(s), tc.h_cost),
                h_cost: tc.h_cost,
                v_cost: 0,
            });
        }
        // Straight up, along the column at the tile's right edge.
        let mut s = id;
        while self.plane.kind(s) == EST_SPACE && !self.plane.is_border(s) {
            s = self.plane.next_up(s, r.right() - 1);
        }
        if self.plane.kind(s) == EST_DEST {
            pending.push(Estimator {
                x0: 0,
                y0: r.top(),
                cost0: shot(self.plane.bottom(s) - r.top(), tc.v_cost),
                h_cost: 0,
                v_cost: tc.v_cost,
            });
        }
        // Straight down, along the column at the tile's left edge.
        let mut s = id;
        while self.plane.kind(s) == EST_SPACE && !self.plane.is_border(s) {
            s = self.plane.next_down(s, r.left());
        }
        if self.plane.kind(s) == EST_DEST {
            pending.push(Estimator {
                x0: 0,
                y0: r.bottom(),
                cost0: shot(r.bottom() - self.plane.top(s), tc.v_cost),
                h_cost: 0,
                v_cost: tc.v_cost,
            });
        }
        self.costs.get_mut(&id).unwrap().estimates.extend(pending);
    }

    /// `e1` dominates `e2` when `e1` is at most `e2` everywhere in the tile.
    /// Floating origins (zero coefficients) are replaced by the tile corner
    /// farthest from `e1`'s origin before comparison.
    fn always_as_good(e1: &Estimator, e2: &Estimator, r: Rect) -> bool {
        if e1.cost0 > e2.cost0 {
            return false;
        }
        if e1.h_cost >= RATE_INF || e1.v_cost >= RATE_INF {
            return false;
        }
        let x2 = if e2.h_cost == 0 {
            if (r.left() - e1.x0).abs() > (r.right() - e1.x0).abs() {
                r.left()
            } else {
                r.right()
            }
        } else {
            e2.x0
        };
        let y2 = if e2.v_cost == 0 {
            if (r.bottom() - e1.y0).abs() > (r.top() - e1.y0).abs() {
                r.bottom()
            } else {
                r.top()
            }
        } else {
            e2.y0
        };
        let cost = cost_add(
            cost_add(
                cost_mul(e1.h_cost, (x2 - e1.x0).abs()),
                cost_mul(e1.v_cost, (y2 - e1.y0).abs()),
            ),
            e1.cost0,
        );
        cost <= e2.cost0
    }

    fn trim_estimators(&mut self, id: TileId) {
        let r = self.plane.rect(id);
        let ests = std::mem::take(&mut self.costs.get_mut(&id).unwrap().estimates);
        let mut kept: Vec<Estimator> = Vec::new();
        for (i, e) in ests.iter().enumerate() {
            let dominated = kept.iter().any(|k| Self::always_as_good(k, e, r))
                || ests[i + 1..].iter().any(|k| Self::always_as_good(k, e, r));
            if !dominated {
                kept.push(*e);
            }
        }
        self.costs.get_mut(&id).unwrap().estimates = kept;
    }

    /// The admissible estimated cost-to-go from `p`, [`COST_MAX`] when every
    /// estimator saturates.
    pub fn estimated_cost(&self, p: Point) -> Cost {
        let id = self.plane.point_locate(p);
        let Some(tc) = self.costs.get(&id) else {
            return COST_MAX;
        };
        let mut best = COST_MAX;
        for e in &tc.estimates {
            best = best.min(e.eval(p));
        }
        best
    }
}

impl Default for EstimatePlane {
    fn default() -> Self {
        Self::new()
    }
}

impl MazeRouter<'_> {
    /// Populates the estimation plane.
    ///
    /// With the style's `estimate` flag off, obstacle solids are skipped and
    /// a degenerate plane (destination areas only) guides the search.
    pub fn build_estimate(&mut self) {
        let mut subcells = Vec::new();
        let mut fences = Vec::new();
        if self.params.estimate {
            if self.table.subcells_opaque() {
                let db = self.db;
                let bound = self.bounding_rect;
                db.for_each_unexpanded(bound, |b, dest| {
                    if !dest {
                        subcells.push(b);
                    }
                });
            }
            let want_space = self.inside_fence;
            let mut rects = Vec::new();
            let _ = self.hints.h_fence.for_each_in(self.bounding_rect, |id| {
                let solid = self.hints.h_fence.kind(id) != TileKind::SPACE;
                if solid != want_space {
                    rects.push(
                        self.hints
                            .h_fence
                            .rect(id)
                            .intersection(self.bounding_rect),
                    );
                }
                ControlFlow::Continue(())
            });
            fences = rects;
        }

        // Dest tiles and walk holes, read off the blockage planes so that
        // partially blocked destinations are seen as such.
        let mut dest_tiles = Vec::new();
        let mut walk_holes = Vec::new();
        let shapes = self.dest_areas.clone();
        for shape in &shapes {
            let Some(rt_ref) = self.table.rt_of_db_type(shape.ty) else {
                continue;
            };
            let grown = shape.rect.expand_all(self.max_walk_length);
            let plane = &self.table.route_type(rt_ref).h_block;
            let _ = plane.for_each_in(grown, |id| {
                match BlockKind::from_tile(plane.kind(id)) {
                    Some(BlockKind::DestArea) => {
                        dest_tiles.push(plane.rect(id));
                    }
                    Some(k) if k.directional_walk() => {
                        walk_holes.push(plane.rect(id));
                    }
                    _ => {}
                }
                ControlFlow::Continue(())
            });
        }

        let mut space_h = COST_MAX;
        let mut space_v = COST_MAX;
        for &i in &self.table.active_layers() {
            space_h = space_h.min(self.table.layers[i].h_cost);
            space_v = space_v.min(self.table.layers[i].v_cost);
        }

        let interrupt = self.interrupt.clone();
        self.estimate.build(
            &subcells,
            &fences,
            &dest_tiles,
            &walk_holes,
            space_h,
            space_v,
            &interrupt,
        );
        tracing::debug!(
            dest_tiles = dest_tiles.len(),
            subcells = subcells.len(),
            fences = fences.len(),
            "estimation plane built"
        );
    }

    /// The estimated cost-to-go from `p`.
    pub(crate) fn estimated_cost(&self, p: Point) -> Cost {
        self.estimate.estimated_cost(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;

    fn build(
        subcells: &[Rect],
        dest: &[Rect],
        space_h: Cost,
        space_v: Cost,
    ) -> EstimatePlane {
        let mut est = EstimatePlane::new();
        let flag = AtomicBool::new(false);
        est.build(subcells, &[], dest, &[], space_h, space_v, &flag);
        est
    }

    #[test]
    fn open_plane_estimate_is_scaled_manhattan() {
        let est = build(&[], &[Rect::new(100, 0, 104, 4)], 1, 2);
        // From the left, a straight shot at h cost 1.
        assert_eq!(est.estimated_cost(Point::new(90, 1)), 10);
        // Off-axis pays the vertical rate too.
        assert_eq!(est.estimated_cost(Point::new(90, 10)), 10 + 2 * (10 - 4));
        // Inside the destination the estimate is zero.
        assert_eq!(est.estimated_cost(Point::new(101, 1)), 0);
    }

    #[test]
    fn estimate_detours_around_obstacles() {
        // A wall with a gap forces the edge-graph path around it.
        let wall = Rect::new(50, -100, 52, 40);
        let est = build(&[wall], &[Rect::new(100, 0, 104, 4)], 1, 1);
        let direct = est.estimated_cost(Point::new(0, 1));
        // Straight-line distance is 100; the wall forces at least the detour
        // over y = 40.
        assert!(direct > 100, "estimate {direct} ignores the wall");
        // And the estimate stays a lower bound for the true around-path.
        let true_cost = 100 + 2 * (40 - 1);
        assert!(direct <= true_cost, "estimate {direct} exceeds {true_cost}");
    }

    #[test]
    fn solid_interior_saturates() {
        let wall = Rect::new(50, -100, 52, 100);
        let est = build(&[wall], &[Rect::new(100, 0, 104, 4)], 1, 1);
        assert_eq!(est.estimated_cost(Point::new(51, 0)), COST_MAX);
    }
}
