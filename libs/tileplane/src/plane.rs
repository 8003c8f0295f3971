//! The corner-stitched plane itself: point location, area enumeration,
//! painting, and the split/merge helpers that keep the stitches consistent.

use std::cell::Cell;
use std::ops::ControlFlow;

use geometry::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{PaintTable, TileKind, UNIVERSE};

/// Identifier of a tile within its plane's slab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileId(u32);

impl TileId {
    const NIL: TileId = TileId(u32::MAX);

    #[inline]
    fn is_nil(self) -> bool {
        self == Self::NIL
    }

    #[inline]
    fn index(self) -> usize {
        self.0 as usize
    }
}

/// The strip direction a plane is kept maximal in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StripDir {
    /// Maximal horizontal strips: no two horizontally adjacent tiles share a
    /// kind.
    Horiz,
    /// Maximal vertical strips.
    Vert,
}

#[derive(Debug, Clone, Copy)]
struct Tile {
    /// Lower-left corner.
    x: i64,
    y: i64,
    kind: TileKind,
    /// Leftward neighbor at the bottom-left corner.
    bl: TileId,
    /// Downward neighbor at the bottom-left corner.
    lb: TileId,
    /// Rightward neighbor at the top-right corner.
    tr: TileId,
    /// Upward neighbor at the top-right corner.
    rt: TileId,
}

/// A corner-stitched tile plane.
#[derive(Debug)]
pub struct Plane {
    tiles: Vec<Tile>,
    free: Vec<u32>,
    strip: StripDir,
    hint: Cell<TileId>,
    bottom_border: TileId,
    left_border: TileId,
    right_border: TileId,
    top_border: TileId,
}

// Merge passes are bounded; real planes converge in a handful of rounds per
// affected tile.
const CANON_LIMIT_FACTOR: usize = 512;

impl Plane {
    /// Creates a plane whose universe is a single SPACE tile surrounded by
    /// four infinite border tiles.
    pub fn new(strip: StripDir) -> Self {
        let mut plane = Plane {
            tiles: Vec::with_capacity(8),
            free: Vec::new(),
            strip,
            hint: Cell::new(TileId(0)),
            bottom_border: TileId(0),
            left_border: TileId(1),
            right_border: TileId(3),
            top_border: TileId(4),
        };
        plane.init_tiles();
        plane
    }

    fn init_tiles(&mut self) {
        let nil = TileId::NIL;
        let lo = NEG_INFINITY;
        let ilo = NEG_INFINITY + 1;
        let ihi = INFINITY - 1;
        // 0: bottom border, full width.
        self.tiles.push(Tile {
            x: lo,
            y: lo,
            kind: TileKind::BORDER,
            bl: nil,
            lb: nil,
            tr: nil,
            rt: TileId(3),
        });
        // 1: left border.
        self.tiles.push(Tile {
            x: lo,
            y: ilo,
            kind: TileKind::BORDER,
            bl: nil,
            lb: TileId(0),
            tr: TileId(2),
            rt: TileId(4),
        });
        // 2: the interior SPACE tile.
        self.tiles.push(Tile {
            x: ilo,
            y: ilo,
            kind: TileKind::SPACE,
            bl: TileId(1),
            lb: TileId(0),
            tr: TileId(3),
            rt: TileId(4),
        });
        // 3: right border.
        self.tiles.push(Tile {
            x: ihi,
            y: ilo,
            kind: TileKind::BORDER,
            bl: TileId(2),
            lb: TileId(0),
            tr: nil,
            rt: TileId(4),
        });
        // 4: top border, full width.
        self.tiles.push(Tile {
            x: lo,
            y: ihi,
            kind: TileKind::BORDER,
            bl: nil,
            lb: TileId(1),
            tr: nil,
            rt: nil,
        });
    }

    /// Resets the plane to a single SPACE tile.
    pub fn clear(&mut self) {
        self.tiles.clear();
        self.free.clear();
        self.init_tiles();
        self.hint.set(TileId(2));
    }

    /// The strip direction this plane is kept maximal in.
    pub fn strip_dir(&self) -> StripDir {
        self.strip
    }

    #[inline]
    fn tile(&self, id: TileId) -> &Tile {
        &self.tiles[id.index()]
    }

    #[inline]
    fn tile_mut(&mut self, id: TileId) -> &mut Tile {
        &mut self.tiles[id.index()]
    }

    /// The kind of tile `id`.
    #[inline]
    pub fn kind(&self, id: TileId) -> TileKind {
        self.tile(id).kind
    }

    /// Whether `id` is one of the four infinite border tiles.
    #[inline]
    pub fn is_border(&self, id: TileId) -> bool {
        self.tile(id).kind == TileKind::BORDER
    }

    #[inline]
    fn is_dead(&self, id: TileId) -> bool {
        self.tile(id).kind == TileKind::DEAD
    }

    /// The left edge of tile `id`.
    #[inline]
    pub fn left(&self, id: TileId) -> i64 {
        self.tile(id).x
    }

    /// The bottom edge of tile `id`.
    #[inline]
    pub fn bottom(&self, id: TileId) -> i64 {
        self.tile(id).y
    }

    /// The right edge (exclusive) of tile `id`.
    #[inline]
    pub fn right(&self, id: TileId) -> i64 {
        let tr = self.tile(id).tr;
        if tr.is_nil() {
            INFINITY
        } else {
            self.tile(tr).x
        }
    }

    /// The top edge (exclusive) of tile `id`.
    #[inline]
    pub fn top(&self, id: TileId) -> i64 {
        let rt = self.tile(id).rt;
        if rt.is_nil() {
            INFINITY
        } else {
            self.tile(rt).y
        }
    }

    /// The rectangle covered by tile `id`.
    pub fn rect(&self, id: TileId) -> Rect {
        Rect::from_bounds(self.left(id), self.bottom(id), self.right(id), self.top(id))
    }

    /// The coordinate of tile `id`'s low edge along `dir`.
    pub fn lo_edge(&self, id: TileId, dir: Dir) -> i64 {
        match dir {
            Dir::Horiz => self.left(id),
            Dir::Vert => self.bottom(id),
        }
    }

    /// The coordinate of tile `id`'s high edge along `dir`.
    pub fn hi_edge(&self, id: TileId, dir: Dir) -> i64 {
        match dir {
            Dir::Horiz => self.right(id),
            Dir::Vert => self.top(id),
        }
    }

    fn contains(&self, id: TileId, p: Point) -> bool {
        p.x >= self.left(id) && p.x < self.right(id) && p.y >= self.bottom(id) && p.y < self.top(id)
    }

    /// Finds the tile containing `p`, starting the walk from the cached hint
    /// tile. Tiles own their left and bottom edges.
    pub fn point_locate(&self, p: Point) -> TileId {
        let mut start = self.hint.get();
        if start.index() >= self.tiles.len() || self.is_dead(start) {
            start = self.bottom_border;
        }
        let t = self.locate_from(start, p);
        self.hint.set(t);
        t
    }

    /// Finds the tile containing `p`, starting the walk from `start`.
    pub fn locate_from(&self, start: TileId, p: Point) -> TileId {
        let p = Point::new(
            p.x.clamp(NEG_INFINITY, INFINITY - 1),
            p.y.clamp(NEG_INFINITY, INFINITY - 1),
        );
        let mut t = start;
        loop {
            while p.y < self.bottom(t) {
                t = self.tile(t).lb;
            }
            while p.y >= self.top(t) {
                t = self.tile(t).rt;
            }
            let mut moved = false;
            while p.x < self.left(t) {
                t = self.tile(t).bl;
                moved = true;
            }
            while p.x >= self.right(t) {
                t = self.tile(t).tr;
                moved = true;
            }
            if !moved || (p.y >= self.bottom(t) && p.y < self.top(t)) {
                break;
            }
        }
        t
    }

    /// The tile adjacent to the right of `t` containing row `y`.
    pub fn next_right(&self, t: TileId, y: i64) -> TileId {
        let mut q = self.tile(t).tr;
        while self.bottom(q) > y {
            q = self.tile(q).lb;
        }
        q
    }

    /// The tile adjacent to the left of `t` containing row `y`.
    pub fn next_left(&self, t: TileId, y: i64) -> TileId {
        let mut q = self.tile(t).bl;
        while self.top(q) <= y {
            q = self.tile(q).rt;
        }
        q
    }

    /// The tile adjacent above `t` containing column `x`.
    pub fn next_up(&self, t: TileId, x: i64) -> TileId {
        let mut q = self.tile(t).rt;
        while self.left(q) > x {
            q = self.tile(q).bl;
        }
        q
    }

    /// The tile adjacent below `t` containing column `x`.
    pub fn next_down(&self, t: TileId, x: i64) -> TileId {
        let mut q = self.tile(t).lb;
        while self.right(q) <= x {
            q = self.tile(q).tr;
        }
        q
    }

    /// The neighbor of `t` one step along `(dir, sign)` at cross coordinate
    /// `cross`.
    pub fn next_toward(&self, t: TileId, dir: Dir, sign: Sign, cross: i64) -> TileId {
        match (dir, sign) {
            (Dir::Horiz, Sign::Pos) => self.next_right(t, cross),
            (Dir::Horiz, Sign::Neg) => self.next_left(t, cross),
            (Dir::Vert, Sign::Pos) => self.next_up(t, cross),
            (Dir::Vert, Sign::Neg) => self.next_down(t, cross),
        }
    }

    fn alloc(&mut self, tile: Tile) -> TileId {
        match self.free.pop() {
            Some(i) => {
                self.tiles[i as usize] = tile;
                TileId(i)
            }
            None => {
                let i = self.tiles.len() as u32;
                self.tiles.push(tile);
                TileId(i)
            }
        }
    }

    fn release(&mut self, id: TileId) {
        self.tile_mut(id).kind = TileKind::DEAD;
        self.free.push(id.0);
        if self.hint.get() == id {
            self.hint.set(self.bottom_border);
        }
    }

    /// Splits tile `t` at row `y`, which must lie strictly inside it.
    /// `t` keeps the lower part; the id of the new upper tile is returned.
    pub fn split_y(&mut self, t: TileId, y: i64) -> TileId {
        let xl = self.left(t);
        let yb = self.bottom(t);
        let right = self.right(t);
        let top_old = self.top(t);
        debug_assert!(yb < y && y < top_old, "split row outside tile");
        debug_assert!(!self.is_border(t));
        let Tile {
            kind,
            bl: old_bl,
            tr: old_tr,
            rt: old_rt,
            ..
        } = *self.tile(t);

        // The upper piece inherits the old top-right stitches.
        let u = self.alloc(Tile {
            x: xl,
            y,
            kind,
            bl: TileId::NIL,
            lb: t,
            tr: old_tr,
            rt: old_rt,
        });

        // u's bottom-left stitch: the left neighbor containing row y.
        let mut q = old_bl;
        while self.top(q) <= y {
            q = self.tile(q).rt;
        }
        self.tile_mut(u).bl = q;

        // Tiles above the old top edge now sit on u.
        let mut q = old_rt;
        loop {
            if self.tile(q).lb == t {
                self.tile_mut(q).lb = u;
            }
            if self.left(q) <= xl {
                break;
            }
            q = self.tile(q).bl;
        }

        // Right-side neighbors at or above the split row now stitch to u.
        let mut q = old_tr;
        while self.bottom(q) >= y {
            if self.tile(q).bl == t {
                self.tile_mut(q).bl = u;
            }
            q = self.tile(q).lb;
        }

        // Left-side neighbors whose top-right corner is at or above the split
        // row now stitch to u.
        let mut q = self.tile(u).bl;
        loop {
            if self.tile(q).tr == t {
                self.tile_mut(q).tr = u;
            }
            if self.top(q) >= top_old {
                break;
            }
            q = self.tile(q).rt;
        }

        // t's new top-right stitch: the right neighbor containing row y - 1.
        let mut ntr = old_tr;
        while self.bottom(ntr) > y - 1 {
            ntr = self.tile(ntr).lb;
        }
        let tt = self.tile_mut(t);
        tt.tr = ntr;
        tt.rt = u;
        let _ = right;
        u
    }

    /// Splits tile `t` at column `x`, which must lie strictly inside it.
    /// `t` keeps the left part; the id of the new right tile is returned.
    pub fn split_x(&mut self, t: TileId, x: i64) -> TileId {
        let xl = self.left(t);
        let yb = self.bottom(t);
        let right_old = self.right(t);
        let top = self.top(t);
        debug_assert!(xl < x && x < right_old, "split column outside tile");
        debug_assert!(!self.is_border(t));
        let Tile {
            kind,
            lb: old_lb,
            tr: old_tr,
            rt: old_rt,
            ..
        } = *self.tile(t);

        // The right piece inherits the old top-right stitches.
        let r = self.alloc(Tile {
            x,
            y: yb,
            kind,
            bl: t,
            lb: TileId::NIL,
            tr: old_tr,
            rt: old_rt,
        });

        // r's left-bottom stitch: the below neighbor containing column x.
        let mut q = old_lb;
        while self.right(q) <= x {
            q = self.tile(q).tr;
        }
        self.tile_mut(r).lb = q;

        // Tiles right of the old right edge now sit on r.
        let mut q = old_tr;
        loop {
            if self.tile(q).bl == t {
                self.tile_mut(q).bl = r;
            }
            if self.bottom(q) <= yb {
                break;
            }
            q = self.tile(q).lb;
        }

        // Top-side neighbors at or right of the split column now stitch to r.
        let mut q = old_rt;
        while self.left(q) >= x {
            if self.tile(q).lb == t {
                self.tile_mut(q).lb = r;
            }
            q = self.tile(q).bl;
        }

        // Bottom-side neighbors whose top-right corner is at or right of the
        // split column now stitch to r.
        let mut q = self.tile(r).lb;
        loop {
            if self.tile(q).rt == t {
                self.tile_mut(q).rt = r;
            }
            if self.right(q) >= right_old {
                break;
            }
            q = self.tile(q).tr;
        }

        // t's new top-right stitch upward: the above neighbor containing
        // column x - 1.
        let mut nrt = old_rt;
        while self.left(nrt) > x - 1 {
            nrt = self.tile(nrt).bl;
        }
        let tt = self.tile_mut(t);
        tt.rt = nrt;
        tt.tr = r;
        let _ = top;
        r
    }

    /// Merges tile `u`, directly above `t` with identical left/right edges
    /// and equal kind, into `t`.
    fn merge_vert(&mut self, t: TileId, u: TileId) {
        let xl = self.left(t);
        let yu = self.bottom(u);
        let top_u = self.top(u);
        debug_assert_eq!(self.top(t), yu);
        debug_assert_eq!(self.left(u), xl);
        debug_assert_eq!(self.right(u), self.right(t));
        debug_assert_eq!(self.kind(t), self.kind(u));
        let Tile {
            tr: u_tr, rt: u_rt, bl: u_bl, ..
        } = *self.tile(u);

        // Tiles above u now sit on t.
        let mut q = u_rt;
        loop {
            if self.tile(q).lb == u {
                self.tile_mut(q).lb = t;
            }
            if self.left(q) <= xl {
                break;
            }
            q = self.tile(q).bl;
        }

        // Right-side neighbors of u now stitch to t.
        let mut q = u_tr;
        while self.bottom(q) >= yu {
            if self.tile(q).bl == u {
                self.tile_mut(q).bl = t;
            }
            q = self.tile(q).lb;
        }

        // Left-side neighbors of u now stitch to t.
        let mut q = u_bl;
        loop {
            if self.tile(q).tr == u {
                self.tile_mut(q).tr = t;
            }
            if self.top(q) >= top_u {
                break;
            }
            q = self.tile(q).rt;
        }

        let tt = self.tile_mut(t);
        tt.tr = u_tr;
        tt.rt = u_rt;
        self.release(u);
    }

    /// Merges tile `r`, directly right of `t` with identical bottom/top edges
    /// and equal kind, into `t`.
    fn merge_horiz(&mut self, t: TileId, r: TileId) {
        let yb = self.bottom(t);
        let xr = self.left(r);
        let right_r = self.right(r);
        debug_assert_eq!(self.right(t), xr);
        debug_assert_eq!(self.bottom(r), yb);
        debug_assert_eq!(self.top(r), self.top(t));
        debug_assert_eq!(self.kind(t), self.kind(r));
        let Tile {
            tr: r_tr, rt: r_rt, lb: r_lb, ..
        } = *self.tile(r);

        // Right-side neighbors of r now stitch to t.
        let mut q = r_tr;
        loop {
            if self.tile(q).bl == r {
                self.tile_mut(q).bl = t;
            }
            if self.bottom(q) <= yb {
                break;
            }
            q = self.tile(q).lb;
        }

        // Top-side neighbors of r now sit on t.
        let mut q = r_rt;
        while self.left(q) >= xr {
            if self.tile(q).lb == r {
                self.tile_mut(q).lb = t;
            }
            q = self.tile(q).bl;
        }

        // Bottom-side neighbors of r now stitch to t.
        let mut q = r_lb;
        loop {
            if self.tile(q).rt == r {
                self.tile_mut(q).rt = t;
            }
            if self.right(q) >= right_r {
                break;
            }
            q = self.tile(q).tr;
        }

        let tt = self.tile_mut(t);
        tt.tr = r_tr;
        tt.rt = r_rt;
        self.release(r);
    }

    /// Enumerates every tile intersecting `area` exactly once, band by band
    /// from the top. The callback may abort the walk by returning
    /// [`ControlFlow::Break`]. The plane must not be mutated during the walk.
    pub fn for_each_in(
        &self,
        area: Rect,
        mut f: impl FnMut(TileId) -> ControlFlow<()>,
    ) -> ControlFlow<()> {
        let r = area.intersection(UNIVERSE);
        if r.is_empty() {
            return ControlFlow::Continue(());
        }
        let mut y = r.top();
        let mut first = true;
        while y > r.bottom() {
            let mut band_bottom = r.bottom();
            let mut t = self.point_locate(Point::new(r.left(), y - 1));
            loop {
                if first || self.top(t) == y {
                    f(t)?;
                }
                band_bottom = band_bottom.max(self.bottom(t).min(y - 1));
                if self.right(t) >= r.right() {
                    break;
                }
                t = self.next_right(t, y - 1);
            }
            band_bottom = band_bottom.max(r.bottom());
            y = band_bottom;
            first = false;
        }
        ControlFlow::Continue(())
    }

    /// Collects the ids of every tile intersecting `area`.
    pub fn tiles_in(&self, area: Rect) -> Vec<TileId> {
        let mut ids = Vec::new();
        let _ = self.for_each_in(area, |id| {
            ids.push(id);
            ControlFlow::Continue(())
        });
        ids
    }

    /// Ensures row `y` is a tile edge everywhere in `[x0, x1)`.
    fn cut_y(&mut self, y: i64, x0: i64, x1: i64) {
        if y <= UNIVERSE.bottom() || y >= UNIVERSE.top() {
            return;
        }
        let mut x = x0;
        while x < x1 {
            let t = self.point_locate(Point::new(x, y));
            if self.bottom(t) < y && !self.is_border(t) {
                self.split_y(t, y);
            }
            let t = self.point_locate(Point::new(x, y));
            x = self.right(t);
        }
    }

    /// Ensures column `x` is a tile edge everywhere in `[y0, y1)`.
    fn cut_x(&mut self, x: i64, y0: i64, y1: i64) {
        if x <= UNIVERSE.left() || x >= UNIVERSE.right() {
            return;
        }
        let mut y = y0;
        while y < y1 {
            let t = self.point_locate(Point::new(x, y));
            if self.left(t) < x && !self.is_border(t) {
                self.split_x(t, x);
            }
            let t = self.point_locate(Point::new(x, y));
            y = self.top(t);
        }
    }

    /// Paints `area` with `new` through `table`, splitting and merging tiles
    /// as needed to keep the plane maximal in its strip direction.
    pub fn paint(&mut self, area: Rect, new: TileKind, table: &PaintTable) {
        let r = area.intersection(UNIVERSE);
        if r.is_empty() {
            return;
        }
        // Shatter: make the painted rectangle an exact union of tiles.
        self.cut_y(r.top(), r.left(), r.right());
        self.cut_y(r.bottom(), r.left(), r.right());
        self.cut_x(r.left(), r.bottom(), r.top());
        self.cut_x(r.right(), r.bottom(), r.top());
        // Retype.
        let ids = self.tiles_in(r);
        for id in ids {
            debug_assert!(r.contains_rect(self.rect(id)));
            let old = self.kind(id);
            let nk = table.result(new, old);
            if nk != old {
                self.tile_mut(id).kind = nk;
            }
        }
        // Remerge around the painted area.
        self.canonicalize(r.expand_all(1));
    }

    fn canonicalize(&mut self, area: Rect) {
        let mut work = self.tiles_in(area);
        let limit = (work.len() + 8) * CANON_LIMIT_FACTOR;
        let mut steps = 0usize;
        while let Some(t) = work.pop() {
            steps += 1;
            if steps > limit {
                debug_assert!(false, "tile merge pass failed to converge");
                break;
            }
            if self.is_dead(t) || self.is_border(t) {
                continue;
            }
            match self.strip {
                StripDir::Horiz => self.canon_step_horiz(t, &mut work),
                StripDir::Vert => self.canon_step_vert(t, &mut work),
            }
        }
    }

    /// Aligns the spans of horizontally adjacent same-kind tiles `a` (left)
    /// and `b` (right) and merges them. Leftover split pieces are pushed onto
    /// the worklist.
    fn align_merge_horiz(&mut self, a: TileId, b: TileId, work: &mut Vec<TileId>) -> TileId {
        let lo = self.bottom(a).max(self.bottom(b));
        let hi = self.top(a).min(self.top(b));
        let mut a = a;
        let mut b = b;
        if self.bottom(a) < lo {
            let upper = self.split_y(a, lo);
            work.push(a);
            a = upper;
        }
        if self.top(a) > hi {
            let upper = self.split_y(a, hi);
            work.push(upper);
        }
        if self.bottom(b) < lo {
            let upper = self.split_y(b, lo);
            work.push(b);
            b = upper;
        }
        if self.top(b) > hi {
            let upper = self.split_y(b, hi);
            work.push(upper);
        }
        self.merge_horiz(a, b);
        a
    }

    /// Aligns the spans of vertically adjacent same-kind tiles `a` (lower)
    /// and `b` (upper) and merges them.
    fn align_merge_vert(&mut self, a: TileId, b: TileId, work: &mut Vec<TileId>) -> TileId {
        let lo = self.left(a).max(self.left(b));
        let hi = self.right(a).min(self.right(b));
        let mut a = a;
        let mut b = b;
        if self.left(a) < lo {
            let right = self.split_x(a, lo);
            work.push(a);
            a = right;
        }
        if self.right(a) > hi {
            let right = self.split_x(a, hi);
            work.push(right);
        }
        if self.left(b) < lo {
            let right = self.split_x(b, lo);
            work.push(b);
            b = right;
        }
        if self.right(b) > hi {
            let right = self.split_x(b, hi);
            work.push(right);
        }
        self.merge_vert(a, b);
        a
    }

    fn canon_step_horiz(&mut self, t: TileId, work: &mut Vec<TileId>) {
        let k = self.kind(t);
        // Same-kind neighbor across the right edge: merge, aligning spans.
        let mut q = self.tile(t).tr;
        loop {
            if self.kind(q) == k && !self.is_border(q) {
                let merged = self.align_merge_horiz(t, q, work);
                work.push(merged);
                return;
            }
            if self.bottom(q) <= self.bottom(t) {
                break;
            }
            q = self.tile(q).lb;
        }
        // Same-kind neighbor across the left edge.
        let mut q = self.tile(t).bl;
        loop {
            if self.kind(q) == k && !self.is_border(q) {
                let merged = self.align_merge_horiz(q, t, work);
                work.push(merged);
                return;
            }
            if self.top(q) >= self.top(t) {
                break;
            }
            q = self.tile(q).rt;
        }
        // Vertical merges only with exactly matching x-spans.
        let up = self.tile(t).rt;
        if !self.is_border(up)
            && self.kind(up) == k
            && self.left(up) == self.left(t)
            && self.right(up) == self.right(t)
        {
            self.merge_vert(t, up);
            work.push(t);
            return;
        }
        let down = self.tile(t).lb;
        if !self.is_border(down)
            && self.kind(down) == k
            && self.left(down) == self.left(t)
            && self.right(down) == self.right(t)
        {
            self.merge_vert(down, t);
            work.push(down);
        }
    }

    fn canon_step_vert(&mut self, t: TileId, work: &mut Vec<TileId>) {
        let k = self.kind(t);
        // Same-kind neighbor across the top edge: merge, aligning spans.
        let mut q = self.tile(t).rt;
        loop {
            if self.kind(q) == k && !self.is_border(q) {
                let merged = self.align_merge_vert(t, q, work);
                work.push(merged);
                return;
            }
            if self.left(q) <= self.left(t) {
                break;
            }
            q = self.tile(q).bl;
        }
        // Same-kind neighbor across the bottom edge.
        let mut q = self.tile(t).lb;
        loop {
            if self.kind(q) == k && !self.is_border(q) {
                let merged = self.align_merge_vert(q, t, work);
                work.push(merged);
                return;
            }
            if self.right(q) >= self.right(t) {
                break;
            }
            q = self.tile(q).tr;
        }
        // Horizontal merges only with exactly matching y-spans.
        let rgt = self.tile(t).tr;
        if !self.is_border(rgt)
            && self.kind(rgt) == k
            && self.bottom(rgt) == self.bottom(t)
            && self.top(rgt) == self.top(t)
        {
            self.merge_horiz(t, rgt);
            work.push(t);
            return;
        }
        let lft = self.tile(t).bl;
        if !self.is_border(lft)
            && self.kind(lft) == k
            && self.bottom(lft) == self.bottom(t)
            && self.top(lft) == self.top(t)
        {
            self.merge_horiz(lft, t);
            work.push(lft);
        }
    }

    /// Checks the corner-stitch discipline for every live tile, panicking on
    /// the first violation. Intended for tests.
    pub fn verify(&self) {
        for (i, tile) in self.tiles.iter().enumerate() {
            if tile.kind == TileKind::DEAD {
                continue;
            }
            let id = TileId(i as u32);
            let r = self.rect(id);
            assert!(r.left() < r.right(), "degenerate tile width: {r:?}");
            assert!(r.bottom() < r.top(), "degenerate tile height: {r:?}");
            if self.is_border(id) {
                continue;
            }
            let t = self.tile(id);
            assert!(
                self.contains(t.bl, Point::new(r.left() - 1, r.bottom())),
                "bad bl stitch on {r:?}"
            );
            assert!(
                self.contains(t.lb, Point::new(r.left(), r.bottom() - 1)),
                "bad lb stitch on {r:?}"
            );
            assert!(
                self.contains(t.tr, Point::new(r.right(), r.top() - 1)),
                "bad tr stitch on {r:?}"
            );
            assert!(
                self.contains(t.rt, Point::new(r.right() - 1, r.top())),
                "bad rt stitch on {r:?}"
            );
        }
    }

    /// Collects the `(rect, kind)` partition of `area`, with tile rectangles
    /// clipped to it. Intended for tests.
    pub fn partition(&self, area: Rect) -> Vec<(Rect, TileKind)> {
        let mut out = Vec::new();
        let _ = self.for_each_in(area, |id| {
            out.push((self.rect(id).intersection(area), self.kind(id)));
            ControlFlow::Continue(())
        });
        out.sort();
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const K1: TileKind = TileKind(1);
    const K2: TileKind = TileKind(2);

    fn table() -> PaintTable {
        PaintTable::priority(4)
    }

    fn area_of(parts: &[(Rect, TileKind)], k: TileKind) -> i64 {
        parts
            .iter()
            .filter(|(_, kind)| *kind == k)
            .map(|(r, _)| r.width() * r.height())
            .sum()
    }

    #[test]
    fn empty_plane_is_one_space_tile() {
        let p = Plane::new(StripDir::Horiz);
        p.verify();
        let t = p.point_locate(Point::new(0, 0));
        assert_eq!(p.kind(t), TileKind::SPACE);
        assert_eq!(p.rect(t), UNIVERSE);
    }

    #[test]
    fn locate_owns_left_and_bottom_edges() {
        let mut p = Plane::new(StripDir::Horiz);
        p.paint(Rect::new(0, 0, 10, 10), K1, &table());
        p.verify();
        let t = p.point_locate(Point::new(0, 0));
        assert_eq!(p.kind(t), K1);
        // The right and top edges belong to the neighbors.
        let t = p.point_locate(Point::new(10, 5));
        assert_eq!(p.kind(t), TileKind::SPACE);
        let t = p.point_locate(Point::new(5, 10));
        assert_eq!(p.kind(t), TileKind::SPACE);
        let t = p.point_locate(Point::new(9, 9));
        assert_eq!(p.kind(t), K1);
    }

    #[test]
    fn paint_is_idempotent() {
        let mut p = Plane::new(StripDir::Horiz);
        let probe = Rect::new(-20, -20, 40, 40);
        p.paint(Rect::new(0, 0, 10, 10), K1, &table());
        let once = p.partition(probe);
        p.paint(Rect::new(0, 0, 10, 10), K1, &table());
        let twice = p.partition(probe);
        p.verify();
        assert_eq!(once, twice);
    }

    #[test]
    fn priority_table_keeps_higher_kind() {
        let mut p = Plane::new(StripDir::Horiz);
        p.paint(Rect::new(0, 0, 10, 10), K2, &table());
        p.paint(Rect::new(0, 0, 10, 10), K1, &table());
        p.verify();
        assert_eq!(p.kind(p.point_locate(Point::new(5, 5))), K2);
    }

    #[test]
    fn overlapping_paints_partition_exactly() {
        let mut p = Plane::new(StripDir::Horiz);
        p.paint(Rect::new(0, 0, 10, 4), K1, &table());
        p.paint(Rect::new(5, 2, 15, 8), K2, &table());
        p.verify();
        let probe = Rect::new(-5, -5, 20, 12);
        let parts = p.partition(probe);
        let total: i64 = parts.iter().map(|(r, _)| r.width() * r.height()).sum();
        assert_eq!(total, probe.width() * probe.height());
        assert_eq!(area_of(&parts, K2), 10 * 6);
        // K1 keeps only the region K2 did not overwrite.
        assert_eq!(area_of(&parts, K1), 10 * 4 - 5 * 2);
    }

    #[test]
    fn horiz_strips_are_maximal() {
        let mut p = Plane::new(StripDir::Horiz);
        // Two abutting same-kind paints must merge into one strip.
        p.paint(Rect::new(0, 0, 5, 4), K1, &table());
        p.paint(Rect::new(5, 0, 12, 4), K1, &table());
        p.verify();
        let t = p.point_locate(Point::new(1, 1));
        assert_eq!(p.rect(t), Rect::new(0, 0, 12, 4));
    }

    #[test]
    fn vert_strips_are_maximal() {
        let mut p = Plane::new(StripDir::Vert);
        p.paint(Rect::new(0, 0, 4, 5), K1, &table());
        p.paint(Rect::new(0, 5, 4, 11), K1, &table());
        p.verify();
        let t = p.point_locate(Point::new(1, 1));
        assert_eq!(p.rect(t), Rect::new(0, 0, 4, 11));
    }

    #[test]
    fn l_shape_splits_into_aligned_strips() {
        let mut p = Plane::new(StripDir::Horiz);
        p.paint(Rect::new(0, 0, 4, 8), K1, &table());
        p.paint(Rect::new(4, 0, 10, 4), K1, &table());
        p.verify();
        // The lower band merges into a single 10-wide strip.
        let t = p.point_locate(Point::new(1, 1));
        assert_eq!(p.rect(t), Rect::new(0, 0, 10, 4));
        // The upper band stays a 4-wide strip.
        let t = p.point_locate(Point::new(1, 6));
        assert_eq!(p.rect(t), Rect::new(0, 4, 4, 8));
    }

    #[test]
    fn enumerate_yields_each_tile_once() {
        let mut p = Plane::new(StripDir::Horiz);
        p.paint(Rect::new(0, 0, 6, 6), K1, &table());
        p.paint(Rect::new(10, 2, 16, 9), K2, &table());
        p.paint(Rect::new(3, -8, 9, -2), K1, &table());
        p.verify();
        let probe = Rect::new(-30, -30, 30, 30);
        let ids = p.tiles_in(probe);
        let mut seen = std::collections::HashSet::new();
        for id in &ids {
            assert!(seen.insert(*id), "tile enumerated twice");
        }
        let total: i64 = ids
            .iter()
            .map(|&id| {
                let r = p.rect(id).intersection(probe);
                r.width() * r.height()
            })
            .sum();
        assert_eq!(total, probe.width() * probe.height());
    }

    #[test]
    fn enumerate_early_abort() {
        let mut p = Plane::new(StripDir::Horiz);
        p.paint(Rect::new(0, 0, 6, 6), K1, &table());
        let mut n = 0;
        let flow = p.for_each_in(Rect::new(-10, -10, 10, 10), |_| {
            n += 1;
            ControlFlow::Break(())
        });
        assert_eq!(flow, ControlFlow::Break(()));
        assert_eq!(n, 1);
    }

    #[test]
    fn split_and_walk_neighbors() {
        let mut p = Plane::new(StripDir::Horiz);
        p.paint(Rect::new(0, 0, 10, 10), K1, &table());
        let t = p.point_locate(Point::new(5, 5));
        let r = p.next_right(t, 5);
        assert_eq!(p.left(r), 10);
        let l = p.next_left(t, 5);
        assert_eq!(p.right(l), 0);
        let u = p.next_up(t, 5);
        assert_eq!(p.bottom(u), 10);
        let d = p.next_down(t, 5);
        assert_eq!(p.top(d), 0);
    }

    #[test]
    fn clear_resets_to_space() {
        let mut p = Plane::new(StripDir::Vert);
        p.paint(Rect::new(0, 0, 6, 6), K2, &table());
        p.clear();
        p.verify();
        let t = p.point_locate(Point::new(3, 3));
        assert_eq!(p.kind(t), TileKind::SPACE);
        assert_eq!(p.rect(t), UNIVERSE);
    }

    #[test]
    fn repaint_after_clear_matches_first_build() {
        let mut p = Plane::new(StripDir::Horiz);
        let probe = Rect::new(-10, -10, 30, 30);
        p.paint(Rect::new(0, 0, 10, 4), K1, &table());
        p.paint(Rect::new(2, 2, 8, 12), K2, &table());
        let first = p.partition(probe);
        p.clear();
        p.paint(Rect::new(0, 0, 10, 4), K1, &table());
        p.paint(Rect::new(2, 2, 8, 12), K2, &table());
        assert_eq!(first, p.partition(probe));
    }
}
