//! Interesting-point extension.
//!
//! A partial path is not grown one lattice unit at a time: each extension
//! jumps to the next point along the direction of travel where a decision
//! could matter. Candidate stopping points come from the current layer's
//! blockage plane (jogs and blocks), the other active layers' planes (a
//! contact would be useful), the contact blockage planes (first and last
//! placement opportunities), destination alignment coordinates, magnet-hint
//! edges, rotate-region boundaries, and the edge of the generated blockage
//! bounds. The nearest candidate wins; when several coincide their reasons
//! are combined, and the reason set decides which further extensions the new
//! path is allowed.

use geometry::prelude::*;
use tileplane::StripDir;

use crate::hints::HINT_SOLID;
use crate::path::{cost_add, cost_mul, Cost, ExtendMask, Orient, PathId};
use crate::rtypes::{BlockKind, RtRef};
use crate::MazeRouter;

/// Reasons an extension point is interesting.
pub(crate) mod reason {
    /// The routable strip ends, narrows, or widens on the current layer.
    pub const JOG: u32 = 1 << 0;
    /// Same, but on a different active layer.
    pub const ALIGN_OTHER: u32 = 1 << 1;
    /// First or last opportunity to drop a contact.
    pub const CONTACT: u32 = 1 << 2;
    /// Aligns with a destination-area boundary coordinate.
    pub const ALIGN_GOAL: u32 = 1 << 3;
    /// Aligns with a perpendicular magnet-hint edge.
    pub const HINT: u32 = 1 << 4;
    /// Enters or leaves a rotate region.
    pub const ROT_BEFORE: u32 = 1 << 5;
    /// Inside a rotate region.
    pub const ROT_INSIDE: u32 = 1 << 6;
    /// Reached the edge of the generated blockage bounds.
    pub const BOUNDS: u32 = 1 << 7;
    /// Entered a directional walk.
    pub const WALK: u32 = 1 << 8;
    /// Entered an up-down contact walk.
    pub const WALK_UDC: u32 = 1 << 9;
    /// Entered a left-right contact walk.
    pub const WALK_LRC: u32 = 1 << 10;
    /// Entered a destination area.
    pub const DONE: u32 = 1 << 11;
}

/// One of the four extension directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CardDir {
    Right,
    Left,
    Up,
    Down,
}

impl CardDir {
    /// The axis of motion.
    pub fn axis(self) -> Dir {
        match self {
            CardDir::Right | CardDir::Left => Dir::Horiz,
            CardDir::Up | CardDir::Down => Dir::Vert,
        }
    }

    /// The sign of motion along the axis.
    pub fn sign(self) -> Sign {
        match self {
            CardDir::Right | CardDir::Up => Sign::Pos,
            CardDir::Left | CardDir::Down => Sign::Neg,
        }
    }

    /// The directional walk kind that admits entry while moving this way.
    pub fn walk_entry(self) -> BlockKind {
        match self {
            CardDir::Right => BlockKind::LeftWalk,
            CardDir::Left => BlockKind::RightWalk,
            CardDir::Up => BlockKind::BottomWalk,
            CardDir::Down => BlockKind::TopWalk,
        }
    }

    /// The walk mask continuing in this direction.
    pub fn walk_mask(self) -> ExtendMask {
        match self {
            CardDir::Right => ExtendMask::WALK_RIGHT,
            CardDir::Left => ExtendMask::WALK_LEFT,
            CardDir::Up => ExtendMask::WALK_UP,
            CardDir::Down => ExtendMask::WALK_DOWN,
        }
    }

    /// The straight-ahead extension bit.
    pub fn ahead_mask(self) -> ExtendMask {
        match self {
            CardDir::Right => ExtendMask::RIGHT,
            CardDir::Left => ExtendMask::LEFT,
            CardDir::Up => ExtendMask::UP,
            CardDir::Down => ExtendMask::DOWN,
        }
    }

    /// The two sideways extension bits.
    pub fn sideways_mask(self) -> ExtendMask {
        match self.axis() {
            Dir::Horiz => ExtendMask::UP | ExtendMask::DOWN,
            Dir::Vert => ExtendMask::RIGHT | ExtendMask::LEFT,
        }
    }
}

/// Jog scans use the plane whose strips run perpendicular to the motion, so
/// strip boundaries are exact where the routable cross-section changes.
fn scan_strip(axis: Dir) -> StripDir {
    match axis {
        Dir::Horiz => StripDir::Vert,
        Dir::Vert => StripDir::Horiz,
    }
}

/// Takes the nearer of the current candidate and `cand` (minimum for
/// positive travel, maximum for negative), merging reasons on ties.
fn prune(cur: &mut i64, reasons: &mut u32, sign: Sign, cand: i64, reason: u32) {
    let better = match sign {
        Sign::Pos => cand < *cur,
        Sign::Neg => cand > *cur,
    };
    if better {
        *cur = cand;
        *reasons = reason;
    } else if cand == *cur {
        *reasons |= reason;
    }
}

/// Outcome of locating a blockage tile with bounds coverage.
enum Covered {
    /// The tile, fully covered by generated bounds along the scan.
    Tile(Rect, BlockKind),
    /// The generated bounds end before the tile does; trust nothing past
    /// the bounds edge.
    EdgeOfBounds,
    /// The routing call was interrupted mid-generation.
    Interrupted,
}

impl MazeRouter<'_> {
    /// The blockage tile of `r_ref`'s plane with strip direction `strip`
    /// containing `p`.
    pub(crate) fn block_tile(&self, r_ref: RtRef, strip: StripDir, p: Point) -> (Rect, BlockKind) {
        let plane = self.table.route_type(r_ref).block(strip);
        let id = plane.point_locate(p);
        let kind = BlockKind::from_tile(plane.kind(id)).unwrap_or(BlockKind::Blocked);
        (plane.rect(id), kind)
    }

    /// The bounds tile (on the plane with strip direction `strip`)
    /// containing `p`.
    fn bounds_tile(&self, strip: StripDir, p: Point) -> (Rect, tileplane::TileKind) {
        let plane = match strip {
            StripDir::Horiz => &self.h_bounds,
            StripDir::Vert => &self.v_bounds,
        };
        let id = plane.point_locate(p);
        (plane.rect(id), plane.kind(id))
    }

    /// Locates the blockage tile of `r_ref` under `p` for a scan along
    /// `(axis, sign)`, extending the generated bounds until the tile's
    /// cross-section is trustworthy.
    fn block_tile_covered(&mut self, r_ref: RtRef, axis: Dir, sign: Sign, p: Point) -> Covered {
        let perp = axis.other();
        loop {
            if self.interrupted() {
                return Covered::Interrupted;
            }
            let (trect, tkind) = self.block_tile(r_ref, scan_strip(axis), p);
            if !tkind.passable() {
                return Covered::Tile(trect, tkind);
            }
            // Scan the bounds plane across the tile's extent along the axis;
            // wherever the bounds stop short of the tile's cross-section,
            // more blockage must be generated before the edges can be
            // believed.
            let bounds_strip = scan_strip(axis);
            let mut regenerated = false;
            let (mut brect, mut bkind) = self.bounds_tile(bounds_strip, p);
            loop {
                let within = match sign {
                    Sign::Pos => {
                        brect.span(axis).lo() <= trect.span(axis).hi()
                            && brect.span(axis).lo() <= self.bounding_rect.span(axis).hi()
                    }
                    Sign::Neg => {
                        brect.span(axis).hi() >= trect.span(axis).lo()
                            && brect.span(axis).hi() >= self.bounding_rect.span(axis).lo()
                    }
                };
                if !within {
                    break;
                }
                if bkind != crate::blockage::INBOUNDS {
                    return Covered::EdgeOfBounds;
                }
                let bspan = brect.span(perp);
                let tspan = trect.span(perp);
                let clip = self.bounding_rect.span(perp);
                let along = match sign {
                    Sign::Pos => brect.span(axis).lo().max(p.coord(axis)),
                    Sign::Neg => (brect.span(axis).hi() - 1).min(p.coord(axis)),
                };
                if bspan.hi() < tspan.hi() && bspan.hi() <= clip.hi() {
                    self.extend_block_bounds(Point::from_dir_coords(axis, along, bspan.hi()));
                    if self.interrupted() {
                        return Covered::Interrupted;
                    }
                    regenerated = true;
                    break;
                }
                if bspan.lo() > tspan.lo() && bspan.lo() >= clip.lo() {
                    self.extend_block_bounds(Point::from_dir_coords(axis, along, bspan.lo()));
                    if self.interrupted() {
                        return Covered::Interrupted;
                    }
                    regenerated = true;
                    break;
                }
                let step = match sign {
                    Sign::Pos => Point::from_dir_coords(axis, brect.span(axis).hi(), p.coord(perp)),
                    Sign::Neg => {
                        Point::from_dir_coords(axis, brect.span(axis).lo() - 1, p.coord(perp))
                    }
                };
                let next = self.bounds_tile(bounds_strip, step);
                brect = next.0;
                bkind = next.1;
            }
            if !regenerated {
                return Covered::Tile(trect, tkind);
            }
        }
    }

    /// The tile one step past `trect` along `(axis, sign)` at the cross
    /// coordinate of `p`, on `r_ref`'s scan plane.
    fn next_block_tile(
        &self,
        r_ref: RtRef,
        axis: Dir,
        sign: Sign,
        trect: Rect,
        p: Point,
    ) -> (Rect, BlockKind) {
        let along = match sign {
            Sign::Pos => trect.span(axis).hi(),
            Sign::Neg => trect.span(axis).lo() - 1,
        };
        let q = Point::from_dir_coords(axis, along, p.coord(axis.other()));
        self.block_tile(r_ref, scan_strip(axis), q)
    }

    /// Finds the next interesting point from the endpoint of `id` in
    /// direction `d` and files the extended path.
    pub(crate) fn extend_dir(&mut self, id: PathId, d: CardDir) {
        let rp = *self.arena.get(id);
        let p_org = rp.entry;
        let axis = d.axis();
        let sign = d.sign();
        let perp = axis.other();
        let p_step = p_org.step(axis, sign);
        let layer = rp.layer;
        let cur_ref = RtRef::Layer(layer);

        if self.params.verbosity >= 2 {
            tracing::debug!(?p_org, ?d, layer, "extending");
        }

        // Start from the bounds edge: blockage beyond it does not exist yet.
        let (brect, _) = self.bounds_tile(
            match axis {
                Dir::Horiz => StripDir::Horiz,
                Dir::Vert => StripDir::Vert,
            },
            p_org,
        );
        let mut new_c = match sign {
            Sign::Pos => brect.span(axis).hi(),
            Sign::Neg => brect.span(axis).lo(),
        };
        let mut reasons = reason::BOUNDS;

        let mut entered_walk = false;
        // Crossing a region where a contact is blocked means crossing
        // another active layer's geometry: the over-route cost applies.
        let mut overroute = false;

        // The current layer: stop where the routable cross-section changes.
        match self.block_tile_covered(cur_ref, axis, sign, p_org) {
            Covered::Interrupted => return,
            Covered::EdgeOfBounds => {}
            Covered::Tile(trect, tkind) => {
                if !tkind.passable() {
                    // A path parked at the bounds edge can end up on a point
                    // that newly generated blockage reveals as unroutable;
                    // it simply has no successors.
                    if self.params.verbosity >= 2 {
                        tracing::debug!(?p_org, ?tkind, "extension origin not routable");
                    }
                    return;
                }
                let (nrect, nkind) = self.next_block_tile(cur_ref, axis, sign, trect, p_org);
                if !nkind.passable() {
                    let adjacent = match sign {
                        Sign::Pos => nrect.span(axis).lo() == p_step.coord(axis),
                        Sign::Neg => trect.span(axis).lo() == p_org.coord(axis),
                    };
                    if adjacent {
                        let r = if nkind == d.walk_entry() {
                            Some(reason::WALK)
                        } else if nkind.lr_contact_walk() {
                            Some(reason::WALK_LRC)
                        } else if nkind.ud_contact_walk() {
                            Some(reason::WALK_UDC)
                        } else if nkind == BlockKind::DestArea {
                            Some(reason::DONE)
                        } else {
                            None
                        };
                        match r {
                            Some(r) => {
                                new_c = p_step.coord(axis);
                                reasons = r;
                                entered_walk = true;
                            }
                            // Hard against a block: nothing to extend.
                            None => return,
                        }
                    } else {
                        let cand = match sign {
                            Sign::Pos => nrect.span(axis).lo() - 1,
                            Sign::Neg => trect.span(axis).lo(),
                        };
                        prune(&mut new_c, &mut reasons, sign, cand, reason::JOG);
                    }
                } else {
                    let constricting = (nrect.span(perp).hi() < trect.span(perp).hi()
                        || nrect.span(perp).lo() > trect.span(perp).lo())
                        && match sign {
                            Sign::Pos => trect.span(axis).hi() - 1 > p_org.coord(axis),
                            Sign::Neg => trect.span(axis).lo() < p_org.coord(axis),
                        };
                    let cand = match (constricting, sign) {
                        (true, Sign::Pos) => trect.span(axis).hi() - 1,
                        (true, Sign::Neg) => trect.span(axis).lo(),
                        (false, Sign::Pos) => trect.span(axis).hi(),
                        (false, Sign::Neg) => trect.span(axis).lo() - 1,
                    };
                    prune(&mut new_c, &mut reasons, sign, cand, reason::JOG);
                }
            }
        }

        // Other active layers: the same scan, flagged as a contact
        // opportunity instead of a jog.
        if !entered_walk {
            for li in self.table.active_layers() {
                if li == layer {
                    continue;
                }
                let r_ref = RtRef::Layer(li);
                let (_, here) = self.block_tile(r_ref, scan_strip(axis), p_org);
                if !here.passable() {
                    // Blocked at the origin on that layer; the contact
                    // extension handles reaching it elsewhere.
                    continue;
                }
                match self.block_tile_covered(r_ref, axis, sign, p_org) {
                    Covered::Interrupted => return,
                    Covered::EdgeOfBounds => continue,
                    Covered::Tile(trect, _) => {
                        let (nrect, nkind) = self.next_block_tile(r_ref, axis, sign, trect, p_org);
                        if !nkind.passable() {
                            let adjacent = match sign {
                                Sign::Pos => nrect.span(axis).lo() == p_step.coord(axis),
                                Sign::Neg => trect.span(axis).lo() == p_org.coord(axis),
                            };
                            if adjacent {
                                continue;
                            }
                            let cand = match sign {
                                Sign::Pos => nrect.span(axis).lo() - 1,
                                Sign::Neg => trect.span(axis).lo(),
                            };
                            prune(&mut new_c, &mut reasons, sign, cand, reason::ALIGN_OTHER);
                        } else {
                            let constricting = (nrect.span(perp).hi() < trect.span(perp).hi()
                                || nrect.span(perp).lo() > trect.span(perp).lo())
                                && match sign {
                                    Sign::Pos => trect.span(axis).hi() - 1 > p_org.coord(axis),
                                    Sign::Neg => trect.span(axis).lo() < p_org.coord(axis),
                                };
                            let cand = match (constricting, sign) {
                                (true, Sign::Pos) => trect.span(axis).hi() - 1,
                                (true, Sign::Neg) => trect.span(axis).lo(),
                                (false, Sign::Pos) => trect.span(axis).hi(),
                                (false, Sign::Neg) => trect.span(axis).lo() - 1,
                            };
                            prune(&mut new_c, &mut reasons, sign, cand, reason::ALIGN_OTHER);
                        }
                    }
                }
            }
        }

        if !entered_walk {
            // Alignment with a destination boundary coordinate.
            {
                let nl = match axis {
                    Dir::Horiz => &self.x_align,
                    Dir::Vert => &self.y_align,
                };
                let cand = match sign {
                    Sign::Pos => nl.next_above(p_org.coord(axis)),
                    Sign::Neg => nl.next_below(p_org.coord(axis)),
                };
                prune(&mut new_c, &mut reasons, sign, cand, reason::ALIGN_GOAL);
            }

            // Alignment with a perpendicular magnet-hint edge.
            {
                let plane = match axis {
                    Dir::Horiz => &self.hints.v_hint,
                    Dir::Vert => &self.hints.h_hint,
                };
                let probe = match sign {
                    Sign::Pos => p_org,
                    Sign::Neg => p_step,
                };
                let t = plane.point_locate(probe);
                let r = plane.rect(t);
                let cand = match sign {
                    Sign::Pos => r.span(axis).hi(),
                    Sign::Neg => r.span(axis).lo(),
                };
                prune(&mut new_c, &mut reasons, sign, cand, reason::HINT);
            }

            // Rotate-region boundaries: both entering one and jogging inside
            // one can change segment costs.
            {
                let plane = match axis {
                    Dir::Horiz => &self.hints.v_rotate,
                    Dir::Vert => &self.hints.h_rotate,
                };
                let t = plane.point_locate(p_step);
                let r = plane.rect(t);
                match sign {
                    Sign::Pos => {
                        if r.span(axis).lo() > p_org.coord(axis) {
                            prune(&mut new_c, &mut reasons, sign, r.span(axis).lo(), reason::ROT_BEFORE);
                        } else {
                            prune(
                                &mut new_c,
                                &mut reasons,
                                sign,
                                r.span(axis).hi() - 1,
                                reason::ROT_INSIDE,
                            );
                        }
                    }
                    Sign::Neg => {
                        if r.span(axis).hi() - 1 < p_org.coord(axis) {
                            prune(
                                &mut new_c,
                                &mut reasons,
                                sign,
                                r.span(axis).hi() - 1,
                                reason::ROT_BEFORE,
                            );
                        } else {
                            prune(&mut new_c, &mut reasons, sign, r.span(axis).lo(), reason::ROT_INSIDE);
                        }
                    }
                }
            }

            // First and last contact opportunities.
            for ci in self.table.layers[layer].contacts.clone() {
                if !self.table.contacts[ci].rt.active {
                    continue;
                }
                let (r, k) = self.block_tile(RtRef::Contact(ci), StripDir::Horiz, p_step);
                if k.passable() {
                    match sign {
                        Sign::Pos => {
                            if r.span(axis).lo() > p_org.coord(axis) {
                                prune(&mut new_c, &mut reasons, sign, r.span(axis).lo(), reason::CONTACT);
                            } else {
                                prune(
                                    &mut new_c,
                                    &mut reasons,
                                    sign,
                                    r.span(axis).hi() - 1,
                                    reason::CONTACT,
                                );
                            }
                        }
                        Sign::Neg => {
                            if r.span(axis).hi() - 1 < p_org.coord(axis) {
                                prune(
                                    &mut new_c,
                                    &mut reasons,
                                    sign,
                                    r.span(axis).hi() - 1,
                                    reason::CONTACT,
                                );
                            } else {
                                prune(&mut new_c, &mut reasons, sign, r.span(axis).lo(), reason::CONTACT);
                            }
                        }
                    }
                } else {
                    let cand = match sign {
                        Sign::Pos => r.span(axis).hi(),
                        Sign::Neg => r.span(axis).lo() - 1,
                    };
                    prune(&mut new_c, &mut reasons, sign, cand, reason::CONTACT);
                    if k == BlockKind::Blocked {
                        overroute = true;
                    }
                }
            }
        }

        // The pruned point decides which further extensions are worthwhile.
        let mask = if reasons & (reason::WALK | reason::WALK_LRC | reason::WALK_UDC | reason::DONE)
            != 0
        {
            if reasons & reason::WALK != 0 {
                d.walk_mask()
            } else if reasons & reason::WALK_LRC != 0 {
                ExtendMask::WALK_LR_CONTACT
            } else if reasons & reason::WALK_UDC != 0 {
                ExtendMask::WALK_UD_CONTACT
            } else {
                ExtendMask::COMPLETE
            }
        } else {
            let mut mask = d.ahead_mask();
            if reasons
                & (reason::ALIGN_OTHER
                    | reason::CONTACT
                    | reason::ALIGN_GOAL
                    | reason::HINT
                    | reason::ROT_INSIDE)
                != 0
            {
                mask |= ExtendMask::UD_CONTACTS | ExtendMask::LR_CONTACTS;
            }
            if reasons & (reason::JOG | reason::ALIGN_GOAL | reason::HINT | reason::ROT_INSIDE) != 0
            {
                mask |= d.sideways_mask();
            }
            mask
        };

        let p_new = p_org.with_coord(axis, new_c);

        // Landing inside SAMENODE while the path has not yet left the
        // starting node keeps the accumulated cost at zero.
        let (_, land_kind) = self.block_tile(cur_ref, scan_strip(axis), p_new);
        let in_samenode = land_kind == BlockKind::SameNode;

        let seg_cost = self.segment_cost(layer, axis, p_org, p_new, overroute);
        self.add_point(
            Some(id),
            p_new,
            layer,
            Orient::from_dir(axis),
            mask,
            seg_cost,
            in_samenode,
        );
    }

    /// Cost of the straight segment from `a` to `b` along `axis` on `layer`,
    /// including rotate-region substitution, over-route substitution, and
    /// hint-parallel cost.
    pub(crate) fn segment_cost(
        &self,
        layer: usize,
        axis: Dir,
        a: Point,
        b: Point,
        overroute: bool,
    ) -> Cost {
        let rl = &self.table.layers[layer];
        let len = (b.coord(axis) - a.coord(axis)).abs();
        let rotate_plane = match axis {
            Dir::Horiz => &self.hints.v_rotate,
            Dir::Vert => &self.hints.h_rotate,
        };
        let t = rotate_plane.point_locate(a);
        let rotated = rotate_plane.kind(t) == HINT_SOLID;
        let rate = if rotated {
            match axis {
                Dir::Horiz => rl.v_cost,
                Dir::Vert => rl.h_cost,
            }
        } else if overroute {
            rl.over_cost
        } else {
            match axis {
                Dir::Horiz => rl.h_cost,
                Dir::Vert => rl.v_cost,
            }
        };
        let mut cost = cost_mul(rate, len);
        cost = cost_add(cost, self.hint_parallel_cost(layer, axis, a, b));
        cost
    }

    /// The magnet-alignment cost accumulated along a segment: for every unit
    /// of travel outside a magnet, the distance to the nearest perpendicular
    /// magnet edge times the layer's hint cost.
    fn hint_parallel_cost(&self, layer: usize, axis: Dir, a: Point, b: Point) -> Cost {
        let hint_rate = self.table.layers[layer].hint_cost;
        if hint_rate == 0 {
            return 0;
        }
        let perp = axis.other();
        let plane = match axis {
            Dir::Horiz => &self.hints.v_hint,
            Dir::Vert => &self.hints.h_hint,
        };
        let lo_c = a.coord(axis).min(b.coord(axis));
        let hi_c = a.coord(axis).max(b.coord(axis));
        let cross = a.coord(perp);
        let mut cost: Cost = 0;
        let mut cur = lo_c;
        while cur < hi_c {
            let p = Point::from_dir_coords(axis, cur, cross);
            let t = plane.point_locate(p);
            let r = plane.rect(t);
            if plane.kind(t) != HINT_SOLID {
                let above = plane.next_toward(t, perp, Sign::Pos, cur);
                let below = plane.next_toward(t, perp, Sign::Neg, cur);
                let delta_up = if plane.kind(above) == HINT_SOLID {
                    r.span(perp).hi() - cross
                } else {
                    -1
                };
                let delta_down = if plane.kind(below) == HINT_SOLID {
                    cross - r.span(perp).lo()
                } else {
                    -1
                };
                let delta = match (delta_up >= 0, delta_down >= 0) {
                    (false, false) => 0,
                    (true, false) => delta_up,
                    (false, true) => delta_down,
                    (true, true) => delta_up.min(delta_down),
                };
                if delta > 0 {
                    let run = r.span(axis).hi().min(hi_c) - cur;
                    cost = cost_add(cost, cost_mul(cost_mul(hint_rate, run), delta));
                }
            }
            cur = r.span(axis).hi();
        }
        cost
    }

    /// Spreads from the endpoint of `id` to the layers reachable through
    /// contacts. `orient` selects which contact blockage plane is searched
    /// (and which fit direction applies); stacked contacts are allowed.
    pub(crate) fn extend_via_contacts(&mut self, id: PathId, orient: Orient) {
        debug_assert!(orient.is_contact());
        let rp = *self.arena.get(id);
        let p = rp.entry;
        let layer = rp.layer;
        let fit_dir = match orient {
            Orient::ContactLr => Dir::Horiz,
            _ => Dir::Vert,
        };
        let strip = match orient {
            Orient::ContactLr => StripDir::Horiz,
            _ => StripDir::Vert,
        };

        if self.params.verbosity >= 2 {
            tracing::debug!(?p, ?orient, "extending with contacts");
        }

        // The most recent contact of this orientation on the chain: two
        // contacts of the same type too close together violate the cut
        // spacing rule.
        let mut last_cpos: Option<Point> = None;
        let mut last_ctype = None;
        {
            let mut cur = Some(id);
            while let Some(i) = cur {
                let r = self.arena.get(i);
                if r.orient == orient && r.back.is_some() {
                    let b = self.arena.get(r.back.unwrap());
                    if let Some(ci) = self.table.contact_between(r.layer, b.layer) {
                        last_cpos = Some(r.entry);
                        last_ctype = Some(self.table.contacts[ci].rt.db_type);
                    }
                    break;
                }
                cur = r.back;
            }
        }

        // The most recent bend: a contact landing inside the spacing window
        // of a jog corner also violates spacing rules.
        let mut bend_dist: i64 = 0;
        match rp.orient {
            Orient::Vert => {
                let mut cur = rp.back;
                while let Some(i) = cur {
                    let r = self.arena.get(i);
                    if r.orient != Orient::Vert {
                        if r.orient == Orient::Horiz {
                            bend_dist = r.entry.y - p.y;
                            if bend_dist < 0 {
                                bend_dist += self.table.layers[layer].rt.width;
                            }
                        }
                        break;
                    }
                    cur = r.back;
                }
            }
            Orient::Horiz => {
                let mut cur = rp.back;
                while let Some(i) = cur {
                    let r = self.arena.get(i);
                    if r.orient != Orient::Horiz {
                        if r.orient == Orient::Vert {
                            bend_dist = r.entry.x - p.x;
                            if bend_dist < 0 {
                                bend_dist += self.table.layers[layer].rt.width;
                            }
                        }
                        break;
                    }
                    cur = r.back;
                }
            }
            _ => {}
        }

        for ci in self.table.layers[layer].contacts.clone() {
            let c = &self.table.contacts[ci];
            if !c.rt.active {
                continue;
            }
            let new_layer = c.other_layer(layer);
            if !self.table.layers[new_layer].rt.active {
                continue;
            }
            let con_cost = c.cost;
            let con_width = c.rt.width;
            let con_length = c.rt.length;
            let con_type = c.rt.db_type;
            let con_self_spacing = c.rt.spacing_to(con_type);
            let con_layer_spacing = c.rt.spacing_to(self.table.layers[layer].rt.db_type);

            let (crect, ckind) = self.block_tile(RtRef::Contact(ci), strip, p);
            if !ckind.passable() {
                continue;
            }
            // Non-square contacts need room along the fit direction.
            if crect.span(fit_dir).hi() - p.coord(fit_dir) <= con_length - con_width {
                continue;
            }
            if let (Some(cp), Some(ct)) = (last_cpos, last_ctype) {
                if ct == con_type && con_self_spacing >= 0 {
                    let cdist = con_self_spacing + con_width;
                    if (p.x - cp.x).abs() < cdist && (p.y - cp.y).abs() < cdist {
                        continue;
                    }
                }
            }
            if bend_dist != 0 && con_layer_spacing >= 0 {
                if bend_dist > con_width && bend_dist < con_width + con_layer_spacing {
                    continue;
                }
                if bend_dist < 0 && bend_dist > -con_layer_spacing {
                    continue;
                }
            }

            // Where does the new layer's plane put us?
            let (_, nk) = self.block_tile(RtRef::Layer(new_layer), strip, p);
            let mask = match nk {
                k if k.passable() => {
                    ExtendMask::RIGHT | ExtendMask::LEFT | ExtendMask::UP | ExtendMask::DOWN
                }
                BlockKind::LeftWalk => ExtendMask::WALK_RIGHT,
                BlockKind::RightWalk => ExtendMask::WALK_LEFT,
                BlockKind::TopWalk => ExtendMask::WALK_DOWN,
                BlockKind::BottomWalk => ExtendMask::WALK_UP,
                k if k.lr_contact_walk() => ExtendMask::WALK_LR_CONTACT,
                k if k.ud_contact_walk() => ExtendMask::WALK_UD_CONTACT,
                BlockKind::DestArea => ExtendMask::COMPLETE,
                _ => continue,
            };
            self.add_point(Some(id), p, new_layer, orient, mask, con_cost, false);
        }
    }
}
