//! The painted-cell view the router consumes.
//!
//! The router never owns layout data; it reads solid paint, routing hints,
//! and subcell outlines through this module and emits nothing back into it.
//! Cells form a hierarchy through translation-only instances; an instance is
//! either expanded (its paint is visible) or unexpanded (only its bounding
//! box matters, as an obstacle or as a destination).

use arcstr::ArcStr;
use geometry::prelude::*;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Identifier of a database paint type, issued by [`DbTypeRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DbType(pub u16);

/// The reserved pseudo-type standing for unexpanded subcells in spacing
/// tables.
pub const SUBCELL: DbType = DbType(0);

/// Name <-> id registry for database paint types.
///
/// Id 0 is always the `subcell` pseudo-type.
#[derive(Debug, Clone, Default)]
pub struct DbTypeRegistry {
    names: IndexMap<ArcStr, DbType>,
}

impl DbTypeRegistry {
    /// Creates a registry holding only the `subcell` pseudo-type.
    pub fn new() -> Self {
        let mut r = Self {
            names: IndexMap::new(),
        };
        r.names.insert(arcstr::literal!("subcell"), SUBCELL);
        r
    }

    /// Registers `name`, returning its id. Registering an existing name
    /// returns the existing id.
    pub fn intern(&mut self, name: &str) -> DbType {
        if let Some(&ty) = self.names.get(name) {
            return ty;
        }
        let ty = DbType(self.names.len() as u16);
        self.names.insert(ArcStr::from(name), ty);
        ty
    }

    /// Looks up a registered name.
    pub fn get(&self, name: &str) -> Option<DbType> {
        self.names.get(name).copied()
    }

    /// The name of `ty`.
    pub fn name(&self, ty: DbType) -> &ArcStr {
        self.names
            .get_index(ty.0 as usize)
            .map(|(name, _)| name)
            .expect("unregistered DbType")
    }

    /// The number of registered types, the pseudo-types included.
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether only the built-in pseudo-types are registered.
    pub fn is_empty(&self) -> bool {
        self.names.len() <= 1
    }
}

/// A solid painted rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaintShape {
    /// The painted area.
    pub rect: Rect,
    /// Its paint type.
    pub ty: DbType,
}

/// The kind of a routing-hint shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HintKind {
    /// A magnet region paths are attracted to.
    Magnet,
    /// A fence region that confines or excludes routing.
    Fence,
    /// A region where horizontal and vertical costs are swapped.
    Rotate,
}

/// A user-authored hint shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintShape {
    /// The hinted area.
    pub rect: Rect,
    /// What kind of hint it is.
    pub kind: HintKind,
}

/// Identifier of a cell within a [`CellDb`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellId(pub usize);

/// An instance of a child cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    /// The instantiated cell.
    pub cell: CellId,
    /// Translation applied to the child's coordinates.
    pub offset: Point,
    /// Whether the instance is expanded (paint visible) or an opaque box.
    pub expanded: bool,
    /// Whether an unexpanded instance covers part of the destination node.
    pub dest: bool,
}

/// A painted cell definition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CellDef {
    /// Solid paint.
    pub paint: Vec<PaintShape>,
    /// Routing hints.
    pub hints: Vec<HintShape>,
    /// Child instances.
    pub instances: Vec<Instance>,
}

/// A cell database: a set of cell definitions and a designated root.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CellDb {
    cells: Vec<CellDef>,
    root: CellId,
}

impl CellDb {
    /// Creates a database holding one empty root cell.
    pub fn new() -> Self {
        Self {
            cells: vec![CellDef::default()],
            root: CellId(0),
        }
    }

    /// The root cell.
    pub fn root(&self) -> CellId {
        self.root
    }

    /// Adds a new empty cell and returns its id.
    pub fn add_cell(&mut self) -> CellId {
        self.cells.push(CellDef::default());
        CellId(self.cells.len() - 1)
    }

    /// Mutable access to a cell definition.
    pub fn cell_mut(&mut self, id: CellId) -> &mut CellDef {
        &mut self.cells[id.0]
    }

    /// Read access to a cell definition.
    pub fn cell(&self, id: CellId) -> &CellDef {
        &self.cells[id.0]
    }

    /// Paints a rectangle into the root cell.
    pub fn paint(&mut self, rect: Rect, ty: DbType) {
        let root = self.root;
        self.cell_mut(root).paint.push(PaintShape { rect, ty });
    }

    /// Adds a hint shape to the root cell.
    pub fn hint(&mut self, rect: Rect, kind: HintKind) {
        let root = self.root;
        self.cell_mut(root).hints.push(HintShape { rect, kind });
    }

    /// The bounding box of a cell's own and descendant geometry.
    pub fn bbox(&self, id: CellId) -> Rect {
        let mut b = Rect::from_bounds(0, 0, 0, 0);
        let cell = self.cell(id);
        for s in &cell.paint {
            b = b.union(s.rect);
        }
        for h in &cell.hints {
            b = b.union(h.rect);
        }
        for inst in &cell.instances {
            let child = self.bbox(inst.cell);
            if !child.is_empty() {
                b = b.union(child.translate(inst.offset));
            }
        }
        b
    }

    /// Visits every visible solid shape of the root hierarchy intersecting
    /// `area`, in root coordinates. Unexpanded instances are not entered.
    pub fn for_each_paint(&self, area: Rect, mut f: impl FnMut(PaintShape)) {
        self.paint_rec(self.root, Point::zero(), area, &mut f);
    }

    fn paint_rec(&self, id: CellId, offset: Point, area: Rect, f: &mut impl FnMut(PaintShape)) {
        let cell = self.cell(id);
        for s in &cell.paint {
            let r = s.rect.translate(offset);
            if r.overlaps(area) {
                f(PaintShape { rect: r, ty: s.ty });
            }
        }
        for inst in &cell.instances {
            if inst.expanded {
                self.paint_rec(inst.cell, offset + inst.offset, area, f);
            }
        }
    }

    /// Visits every unexpanded instance of the root hierarchy whose bounding
    /// box intersects `area`. The callback receives the box in root
    /// coordinates and the instance's destination flag.
    pub fn for_each_unexpanded(&self, area: Rect, mut f: impl FnMut(Rect, bool)) {
        self.unexpanded_rec(self.root, Point::zero(), area, &mut f);
    }

    fn unexpanded_rec(
        &self,
        id: CellId,
        offset: Point,
        area: Rect,
        f: &mut impl FnMut(Rect, bool),
    ) {
        for inst in &self.cell(id).instances {
            let child_off = offset + inst.offset;
            if inst.expanded {
                self.unexpanded_rec(inst.cell, child_off, area, f);
            } else {
                let b = self.bbox(inst.cell).translate(child_off);
                if !b.is_empty() && b.overlaps(area) {
                    f(b, inst.dest);
                }
            }
        }
    }

    /// Visits every hint shape, flattened to root coordinates. With
    /// `top_only` set, only the root cell's own hints are visited.
    pub fn for_each_hint(&self, area: Rect, top_only: bool, mut f: impl FnMut(HintShape)) {
        self.hint_rec(self.root, Point::zero(), area, top_only, &mut f);
    }

    fn hint_rec(
        &self,
        id: CellId,
        offset: Point,
        area: Rect,
        top_only: bool,
        f: &mut impl FnMut(HintShape),
    ) {
        let cell = self.cell(id);
        for h in &cell.hints {
            let r = h.rect.translate(offset);
            if r.overlaps(area) {
                f(HintShape {
                    rect: r,
                    kind: h.kind,
                });
            }
        }
        if top_only {
            return;
        }
        for inst in &cell.instances {
            if inst.expanded {
                self.hint_rec(inst.cell, offset + inst.offset, area, top_only, f);
            }
        }
    }

    /// Expands a set of seed shapes to every visible shape electrically
    /// connected to them.
    ///
    /// Two shapes of the same type connect when they touch or overlap. A
    /// shape of a type listed in `bridges` connects its two bridged types
    /// wherever it touches them.
    pub fn expand_connected(
        &self,
        seeds: &[PaintShape],
        area: Rect,
        bridges: &[(DbType, DbType, DbType)],
    ) -> Vec<PaintShape> {
        let mut all: Vec<PaintShape> = Vec::new();
        self.for_each_paint(area, |s| all.push(s));

        let connected = |a: &PaintShape, b: &PaintShape| -> bool {
            if !a.rect.touches(b.rect) {
                return false;
            }
            if a.ty == b.ty {
                return true;
            }
            bridges.iter().any(|&(cut, l1, l2)| {
                (a.ty == cut && (b.ty == l1 || b.ty == l2 || b.ty == cut))
                    || (b.ty == cut && (a.ty == l1 || a.ty == l2))
            })
        };

        let mut in_net = vec![false; all.len()];
        let mut frontier: Vec<PaintShape> = seeds.to_vec();
        let mut out: Vec<PaintShape> = seeds.to_vec();
        while let Some(cur) = frontier.pop() {
            for (i, cand) in all.iter().enumerate() {
                if !in_net[i] && connected(&cur, cand) {
                    in_net[i] = true;
                    frontier.push(*cand);
                    out.push(*cand);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(reg: &mut DbTypeRegistry, name: &str) -> DbType {
        reg.intern(name)
    }

    #[test]
    fn registry_reserves_subcell() {
        let mut reg = DbTypeRegistry::new();
        assert_eq!(reg.get("subcell"), Some(SUBCELL));
        let m1 = ty(&mut reg, "m1");
        assert_eq!(m1, DbType(1));
        assert_eq!(ty(&mut reg, "m1"), m1);
    }

    #[test]
    fn paint_flattening_respects_expansion() {
        let mut reg = DbTypeRegistry::new();
        let m1 = ty(&mut reg, "m1");
        let mut db = CellDb::new();
        let child = db.add_cell();
        db.cell_mut(child).paint.push(PaintShape {
            rect: Rect::new(0, 0, 2, 2),
            ty: m1,
        });
        let root = db.root();
        db.cell_mut(root).instances.push(Instance {
            cell: child,
            offset: Point::new(10, 0),
            expanded: true,
            dest: false,
        });
        db.cell_mut(root).instances.push(Instance {
            cell: child,
            offset: Point::new(20, 0),
            expanded: false,
            dest: false,
        });
        let mut seen = Vec::new();
        db.for_each_paint(Rect::new(-100, -100, 100, 100), |s| seen.push(s.rect));
        assert_eq!(seen, vec![Rect::new(10, 0, 12, 2)]);
        let mut boxes = Vec::new();
        db.for_each_unexpanded(Rect::new(-100, -100, 100, 100), |b, _| boxes.push(b));
        assert_eq!(boxes, vec![Rect::new(20, 0, 22, 2)]);
    }

    #[test]
    fn connectivity_walks_touching_shapes_and_contacts() {
        let mut reg = DbTypeRegistry::new();
        let m1 = ty(&mut reg, "m1");
        let m2 = ty(&mut reg, "m2");
        let via = ty(&mut reg, "via");
        let mut db = CellDb::new();
        db.paint(Rect::new(0, 0, 4, 2), m1);
        db.paint(Rect::new(4, 0, 8, 2), m1); // abuts the first shape
        db.paint(Rect::new(6, 0, 8, 2), via); // bridges to m2
        db.paint(Rect::new(6, 0, 12, 2), m2);
        db.paint(Rect::new(50, 50, 60, 52), m1); // unrelated
        let seeds = [PaintShape {
            rect: Rect::new(0, 0, 4, 2),
            ty: m1,
        }];
        let net = db.expand_connected(&seeds, Rect::new(-100, -100, 100, 100), &[(via, m1, m2)]);
        let rects: Vec<Rect> = net.iter().map(|s| s.rect).collect();
        assert!(rects.contains(&Rect::new(4, 0, 8, 2)));
        assert!(rects.contains(&Rect::new(6, 0, 12, 2)));
        assert!(!rects.contains(&Rect::new(50, 50, 60, 52)));
    }
}
