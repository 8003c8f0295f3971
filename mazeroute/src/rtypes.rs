//! Route layers, route contacts, and their per-type blockage planes.

use arcstr::ArcStr;
use geometry::prelude::*;
use tileplane::{PaintTable, Plane, StripDir, TileKind};

use crate::db::{DbType, DbTypeRegistry, SUBCELL};
use crate::style::{MazeStyle, StyleError};

/// Tile kinds of the blockage planes. Higher values always win when two
/// kinds are painted into the same region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum BlockKind {
    /// Legal position for the lower-left corner of a wire.
    Space = 0,
    /// Covered by the route's own electrical node; enterable at zero cost.
    SameNode = 1,
    /// Blockage caused by the route's own node.
    SameNodeBlock = 2,
    /// Drop an up-down contact here to reach the destination above.
    AboveUdWalk = 3,
    /// Drop an up-down contact here to reach the destination below.
    BelowUdWalk = 4,
    /// Drop a left-right contact here to reach the destination above.
    AboveLrWalk = 5,
    /// Drop a left-right contact here to reach the destination below.
    BelowLrWalk = 6,
    /// Entering here, a straight leg to the right reaches the destination.
    LeftWalk = 7,
    /// Entering here, a straight leg to the left reaches the destination.
    RightWalk = 8,
    /// Entering here, a straight leg downward reaches the destination.
    TopWalk = 9,
    /// Entering here, a straight leg upward reaches the destination.
    BottomWalk = 10,
    /// The destination itself.
    DestArea = 11,
    /// Not routable.
    Blocked = 12,
}

/// Number of blockage tile kinds.
pub const BLOCK_KINDS: u8 = 13;

impl BlockKind {
    /// Converts a plane tile kind back into a blockage kind.
    pub fn from_tile(k: TileKind) -> Option<BlockKind> {
        use BlockKind::*;
        Some(match k.0 {
            0 => Space,
            1 => SameNode,
            2 => SameNodeBlock,
            3 => AboveUdWalk,
            4 => BelowUdWalk,
            5 => AboveLrWalk,
            6 => BelowLrWalk,
            7 => LeftWalk,
            8 => RightWalk,
            9 => TopWalk,
            10 => BottomWalk,
            11 => DestArea,
            12 => Blocked,
            _ => return None,
        })
    }

    /// The plane tile kind for this blockage kind.
    pub fn tile(self) -> TileKind {
        TileKind(self as u8)
    }

    /// Whether a wire corner may sit here.
    pub fn passable(self) -> bool {
        matches!(self, BlockKind::Space | BlockKind::SameNode)
    }

    /// Whether this is one of the four directional walks.
    pub fn directional_walk(self) -> bool {
        matches!(
            self,
            BlockKind::LeftWalk | BlockKind::RightWalk | BlockKind::TopWalk | BlockKind::BottomWalk
        )
    }

    /// Whether this is a contact walk on the left-right contact plane.
    pub fn lr_contact_walk(self) -> bool {
        matches!(self, BlockKind::AboveLrWalk | BlockKind::BelowLrWalk)
    }

    /// Whether this is a contact walk on the up-down contact plane.
    pub fn ud_contact_walk(self) -> bool {
        matches!(self, BlockKind::AboveUdWalk | BlockKind::BelowUdWalk)
    }
}

/// The priority paint table shared by all blockage planes.
pub fn block_paint_table() -> PaintTable {
    PaintTable::priority(BLOCK_KINDS)
}

/// A reference to a route type: either a layer's or a contact's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RtRef {
    /// The route type of layer `i`.
    Layer(usize),
    /// The route type of contact `i`.
    Contact(usize),
}

/// The physical record shared by layers and contacts: width, spacing rules,
/// and the pair of blockage planes.
#[derive(Debug)]
pub struct RouteType {
    /// Material name.
    pub name: ArcStr,
    /// The database paint type this route type corresponds to.
    pub db_type: DbType,
    /// Wire (or contact cut) width.
    pub width: i64,
    /// Contact length, for non-square contacts. Equals `width` for wires.
    pub length: i64,
    /// Whether the type participates in the current route.
    pub active: bool,
    /// Spacing to each database type, indexed by [`DbType`]; `-1` means no
    /// interaction.
    pub spacing: Vec<i64>,
    /// Blockage plane kept in maximal horizontal strips.
    pub h_block: Plane,
    /// Blockage plane kept in maximal vertical strips.
    pub v_block: Plane,
}

impl RouteType {
    fn new(name: ArcStr, db_type: DbType, n_types: usize) -> Self {
        Self {
            name,
            db_type,
            width: 1,
            length: 1,
            active: true,
            spacing: vec![-1; n_types],
            h_block: Plane::new(StripDir::Horiz),
            v_block: Plane::new(StripDir::Vert),
        }
    }

    /// Spacing to database type `t`, `-1` when the types do not interact.
    pub fn spacing_to(&self, t: DbType) -> i64 {
        self.spacing.get(t.0 as usize).copied().unwrap_or(-1)
    }

    /// Left/bottom bloat distance against database type `t`.
    pub fn bloat_bot(&self, t: DbType) -> i64 {
        self.spacing_to(t) + self.width - 1
    }

    /// Right/top bloat distance against database type `t`.
    pub fn bloat_top(&self, t: DbType) -> i64 {
        self.spacing_to(t)
    }

    /// The blockage plane kept in maximal strips along `dir`.
    pub fn block(&self, dir: StripDir) -> &Plane {
        match dir {
            StripDir::Horiz => &self.h_block,
            StripDir::Vert => &self.v_block,
        }
    }

    /// Mutable access to the blockage plane along `dir`.
    pub fn block_mut(&mut self, dir: StripDir) -> &mut Plane {
        match dir {
            StripDir::Horiz => &mut self.h_block,
            StripDir::Vert => &mut self.v_block,
        }
    }
}

/// A routable material with per-direction wire costs.
#[derive(Debug)]
pub struct RouteLayer {
    /// The layer's physical record.
    pub rt: RouteType,
    /// Cost per unit of horizontal travel.
    pub h_cost: i64,
    /// Cost per unit of vertical travel.
    pub v_cost: i64,
    /// Cost added when the path orientation changes on this layer.
    pub jog_cost: i64,
    /// Cost per unit of travel per unit of distance from the nearest magnet
    /// hint.
    pub hint_cost: i64,
    /// Substitute per-unit cost when crossing another active layer.
    pub over_cost: i64,
    /// Contacts incident to this layer.
    pub contacts: Vec<usize>,
}

/// A vertical connection joining two route layers.
#[derive(Debug)]
pub struct RouteContact {
    /// The contact's physical record.
    pub rt: RouteType,
    /// The lower of the joined layers.
    pub layer1: usize,
    /// The upper of the joined layers.
    pub layer2: usize,
    /// Cost of placing one contact.
    pub cost: i64,
}

impl RouteContact {
    /// The layer reached from `from` through this contact.
    pub fn other_layer(&self, from: usize) -> usize {
        if self.layer1 == from {
            self.layer2
        } else {
            debug_assert_eq!(self.layer2, from);
            self.layer1
        }
    }

    /// Whether the contact joins `layer`.
    pub fn joins(&self, layer: usize) -> bool {
        self.layer1 == layer || self.layer2 == layer
    }
}

/// The full set of route layers and contacts for one routing style.
#[derive(Debug)]
pub struct RouteTable {
    /// All route layers.
    pub layers: Vec<RouteLayer>,
    /// All route contacts.
    pub contacts: Vec<RouteContact>,
}

impl RouteTable {
    /// Builds the table from a parsed style, validating the configuration.
    pub fn from_style(
        style: &MazeStyle,
        registry: &mut DbTypeRegistry,
    ) -> Result<RouteTable, StyleError> {
        // Register every material first so spacing tables can be full-size.
        for l in &style.layers {
            registry.intern(&l.name);
        }
        for c in &style.contacts {
            registry.intern(&c.name);
        }
        let n_types = registry.len();

        let mut layers = Vec::new();
        for l in &style.layers {
            let db_type = registry.get(&l.name).unwrap();
            let mut rt = RouteType::new(l.name.clone(), db_type, n_types);
            rt.width = style.width_of(&l.name).unwrap_or(1);
            rt.length = style.length_of(&l.name).unwrap_or(rt.width);
            layers.push(RouteLayer {
                rt,
                h_cost: l.h_cost,
                v_cost: l.v_cost,
                jog_cost: l.jog_cost,
                hint_cost: l.hint_cost,
                over_cost: l.over_cost,
                contacts: Vec::new(),
            });
        }

        let mut contacts = Vec::new();
        for c in &style.contacts {
            let find = |name: &str| {
                layers
                    .iter()
                    .position(|l| l.rt.name.as_str() == name)
                    .ok_or_else(|| StyleError::UnknownLayer {
                        name: name.to_string(),
                    })
            };
            let layer1 = find(&c.layer1)?;
            let layer2 = find(&c.layer2)?;
            if layer1 == layer2 {
                return Err(StyleError::BadContact {
                    name: c.name.to_string(),
                });
            }
            let db_type = registry.get(&c.name).unwrap();
            let mut rt = RouteType::new(c.name.clone(), db_type, n_types);
            rt.width = style.width_of(&c.name).unwrap_or(1);
            rt.length = style.length_of(&c.name).unwrap_or(rt.width);
            let idx = contacts.len();
            layers[layer1].contacts.push(idx);
            layers[layer2].contacts.push(idx);
            contacts.push(RouteContact {
                rt,
                layer1,
                layer2,
                cost: c.cost,
            });
        }

        let mut table = RouteTable { layers, contacts };

        // Apply spacing entries to every route type whose name matches side A,
        // against the database type named by side B.
        for (a, b, dist) in &style.spacings {
            let tb = registry
                .get(b)
                .ok_or_else(|| StyleError::UnknownLayer { name: b.clone() })?;
            let mut matched = false;
            for r in table.all_refs() {
                let rt = table.route_type_mut(r);
                if rt.name.as_str() == a {
                    rt.spacing[tb.0 as usize] = *dist;
                    matched = true;
                }
            }
            if !matched {
                return Err(StyleError::UnknownLayer { name: a.clone() });
            }
        }

        Ok(table)
    }

    /// Every route-type reference, layers first.
    pub fn all_refs(&self) -> Vec<RtRef> {
        let mut v: Vec<RtRef> = (0..self.layers.len()).map(RtRef::Layer).collect();
        v.extend((0..self.contacts.len()).map(RtRef::Contact));
        v
    }

    /// Every active route-type reference.
    pub fn active_refs(&self) -> Vec<RtRef> {
        self.all_refs()
            .into_iter()
            .filter(|&r| self.route_type(r).active)
            .collect()
    }

    /// Indices of active layers.
    pub fn active_layers(&self) -> Vec<usize> {
        (0..self.layers.len())
            .filter(|&i| self.layers[i].rt.active)
            .collect()
    }

    /// The route type behind a reference.
    pub fn route_type(&self, r: RtRef) -> &RouteType {
        match r {
            RtRef::Layer(i) => &self.layers[i].rt,
            RtRef::Contact(i) => &self.contacts[i].rt,
        }
    }

    /// Mutable access to the route type behind a reference.
    pub fn route_type_mut(&mut self, r: RtRef) -> &mut RouteType {
        match r {
            RtRef::Layer(i) => &mut self.layers[i].rt,
            RtRef::Contact(i) => &mut self.contacts[i].rt,
        }
    }

    /// The active layer whose material matches `ty`.
    pub fn layer_of_db_type(&self, ty: DbType) -> Option<usize> {
        (0..self.layers.len()).find(|&i| self.layers[i].rt.active && self.layers[i].rt.db_type == ty)
    }

    /// The active route type (layer or contact) whose material matches `ty`.
    pub fn rt_of_db_type(&self, ty: DbType) -> Option<RtRef> {
        self.active_refs()
            .into_iter()
            .find(|&r| self.route_type(r).db_type == ty)
    }

    /// The contact joining two shapes' layers, used to recover which contact
    /// a path record dropped.
    pub fn contact_between(&self, a: usize, b: usize) -> Option<usize> {
        (0..self.contacts.len()).find(|&i| {
            let c = &self.contacts[i];
            c.rt.active && ((c.layer1 == a && c.layer2 == b) || (c.layer1 == b && c.layer2 == a))
        })
    }

    /// The largest design-rule interaction distance over active route types,
    /// used as the context radius for incremental blockage generation.
    pub fn context_radius(&self) -> i64 {
        let mut radius = 1;
        for r in self.active_refs() {
            let rt = self.route_type(r);
            for &s in &rt.spacing {
                if s >= 0 {
                    radius = radius.max(s + rt.width);
                }
            }
        }
        radius
    }

    /// Whether no active layer can route across an unexpanded subcell.
    pub fn subcells_opaque(&self) -> bool {
        self.active_layers()
            .iter()
            .all(|&i| self.layers[i].rt.spacing_to(SUBCELL) >= 0)
    }
}

/// The walk kind painted into the *other* residue's planes when a contact
/// can drop onto a destination area. `scanned` is the contact blockage plane
/// the fit was found on (horizontal-strip scans produce left-right walks).
///
/// When the destination sits on the contact's first (lower) layer the walk
/// lives on the second layer, above it.
pub fn contact_walk_kind(dest_is_layer1: bool, scanned: StripDir) -> BlockKind {
    match (scanned, dest_is_layer1) {
        (StripDir::Horiz, true) => BlockKind::AboveLrWalk,
        (StripDir::Horiz, false) => BlockKind::BelowLrWalk,
        (StripDir::Vert, true) => BlockKind::AboveUdWalk,
        (StripDir::Vert, false) => BlockKind::BelowUdWalk,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paint_table_is_monotone() {
        let table = block_paint_table();
        for hi in 0..BLOCK_KINDS {
            for lo in 0..hi {
                for t in 0..BLOCK_KINDS {
                    let once = table.result(TileKind(hi), TileKind(t));
                    let twice = table.result(TileKind(hi), table.result(TileKind(lo), TileKind(t)));
                    assert_eq!(once, twice, "table not monotone at {hi}/{lo}/{t}");
                }
            }
        }
    }

    #[test]
    fn block_kind_roundtrip() {
        for v in 0..BLOCK_KINDS {
            let k = BlockKind::from_tile(TileKind(v)).unwrap();
            assert_eq!(k.tile(), TileKind(v));
        }
        assert_eq!(BlockKind::from_tile(TileKind(200)), None);
    }
}
