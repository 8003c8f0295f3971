//! Cost-driven hierarchical maze routing over corner-stitched blockage
//! planes.
//!
//! The router connects one net at a time: given start shapes, destination
//! shapes, and a bounding rectangle over a painted cell database, it runs a
//! windowed best-first search with local bloom focus and returns the best
//! complete path found within its budget, as a linked chain of points from
//! the destination back to a start.
//!
//! # Usage
//!
//! ```
//! use std::sync::atomic::AtomicBool;
//! use std::sync::Arc;
//! use geometry::prelude::*;
//! use mazeroute::{CellDb, MazeRouter, MazeStyle, RouteStatus, TermShape};
//!
//! let style = MazeStyle::parse(
//!     "demo",
//!     "layer m1 1 1 2 0 10\nspacing m1 m1 1\nwRate 20\nwWidth 200\nverbosity 0",
//! )
//! .unwrap();
//! let mut db = CellDb::new();
//! let m1 = db.registry_probe(&style, "m1");
//! db.paint(Rect::new(0, 0, 2, 2), m1);
//! db.paint(Rect::new(30, 0, 34, 4), m1);
//! let starts = [TermShape::new(Rect::new(0, 0, 2, 2), "m1")];
//! let dests = [TermShape::new(Rect::new(30, 0, 34, 4), "m1")];
//! let mut router = MazeRouter::initialise(
//!     &db,
//!     &starts,
//!     &dests,
//!     Rect::new(-20, -20, 60, 20),
//!     &style,
//!     Arc::new(AtomicBool::new(false)),
//! )
//! .unwrap();
//! router.build_estimate();
//! let (status, path) = router.route();
//! assert_eq!(status, RouteStatus::Success);
//! assert!(!path.unwrap().is_empty());
//! ```
#![warn(missing_docs)]

pub mod blockage;
pub mod db;
pub mod estimate;
pub mod extend;
pub mod hints;
pub mod path;
pub mod rtypes;
pub mod search;
pub mod style;
pub mod walk;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arcstr::ArcStr;
use geometry::prelude::*;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::ops::ControlFlow;
use tileplane::{NumberLine, PaintTable, Plane, StripDir};

pub use db::{CellDb, CellDef, CellId, DbType, DbTypeRegistry, HintKind, PaintShape};
pub use path::{Cost, ExtendMask, Orient, COST_MAX};
pub use rtypes::{BlockKind, RouteContact, RouteLayer, RouteTable, RouteType, RtRef};
pub use style::{MazeParams, MazeStyle, StyleError};

use estimate::EstimatePlane;
use hints::HintPlanes;
use path::{PathArena, PathId, PointKey};
use rtypes::block_paint_table;
use search::{PathSource, SearchQueues};

/// A start or destination terminal: a rectangle and the material it
/// connects on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermShape {
    /// The terminal's area.
    pub rect: Rect,
    /// The material name, as declared in the style.
    pub layer: ArcStr,
}

impl TermShape {
    /// Creates a terminal shape.
    pub fn new(rect: Rect, layer: &str) -> Self {
        Self {
            rect,
            layer: ArcStr::from(layer),
        }
    }
}

/// Outcome of a routing call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RouteStatus {
    /// A complete route was found.
    Success,
    /// Interrupted, but a complete route had already been found.
    CurrentBest,
    /// Interrupted before any complete route was found.
    Interrupted,
    /// No route exists within the search budget.
    Failure,
}

/// One node of a returned route, from the destination back to the start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteNode {
    /// The node's position.
    pub point: Point,
    /// The route layer the node is on.
    pub layer: ArcStr,
    /// How the node was reached.
    pub orient: Orient,
    /// Accumulated cost from the start.
    pub cost: Cost,
}

/// A result type returning router configuration errors.
pub type Result<T> = std::result::Result<T, InitError>;

/// Errors surfaced from [`MazeRouter::initialise`]; routing does not start
/// on a bad configuration.
#[derive(thiserror::Error, Debug)]
pub enum InitError {
    /// The style failed to parse or validate.
    #[error(transparent)]
    Style(#[from] StyleError),
    /// A terminal names a material the style does not declare.
    #[error("terminal references undeclared material `{name}`")]
    UnknownTerminalLayer {
        /// The undeclared name.
        name: ArcStr,
    },
    /// A destination sits on a material no active route type covers.
    #[error("no active route type for destination material `{name}`")]
    NoRouteType {
        /// The uncovered material.
        name: ArcStr,
    },
}

/// Search statistics, reported per the style's verbosity.
#[derive(Debug, Clone, Copy, Default)]
pub struct RouterStats {
    /// Blooms started.
    pub num_blooms: u32,
    /// Blooms seeded from beyond the window.
    pub num_outside_blooms: u32,
    /// Complete paths found.
    pub num_complete: u32,
    /// Partial paths generated.
    pub paths_gened: u64,
    /// Partial paths expanded.
    pub paths_processed: u64,
    /// Calls into the blockage generator.
    pub block_gen_calls: u64,
    /// Total area over which blockage was generated.
    pub block_gen_area: f64,
}

/// The maze router: all state of one routing call.
///
/// Lifecycle: [`MazeRouter::initialise`], [`MazeRouter::build_estimate`],
/// [`MazeRouter::route`], [`MazeRouter::clean`]. A router borrows the cell
/// database read-only for its whole life; the caller must not run two
/// routing calls concurrently against the same database.
#[derive(Debug)]
pub struct MazeRouter<'a> {
    pub(crate) db: &'a CellDb,
    pub(crate) registry: DbTypeRegistry,
    pub(crate) params: MazeParams,
    pub(crate) table: RouteTable,
    pub(crate) hints: HintPlanes,
    pub(crate) h_bounds: Plane,
    pub(crate) v_bounds: Plane,
    pub(crate) block_table: PaintTable,
    pub(crate) bounding_rect: Rect,
    pub(crate) inside_fence: bool,
    /// Start and destination node geometry; sources of SAMENODE paint.
    pub(crate) term_shapes: Vec<PaintShape>,
    pub(crate) dest_areas: Vec<PaintShape>,
    pub(crate) start_terms: Vec<PaintShape>,
    pub(crate) start_points: Vec<(Point, usize)>,
    pub(crate) x_align: NumberLine,
    pub(crate) y_align: NumberLine,
    pub(crate) context_radius: i64,
    pub(crate) bounds_increment: i64,
    pub(crate) max_walk_length: i64,
    pub(crate) estimate: EstimatePlane,

    pub(crate) arena: PathArena,
    pub(crate) hash: FxHashMap<PointKey, PathId>,
    pub(crate) queues: SearchQueues,
    pub(crate) source: PathSource,
    pub(crate) min_initial_cost: Cost,
    pub(crate) initial_estimate: Cost,
    pub(crate) w_initial_min_togo: Cost,
    pub(crate) w_initial_max_togo: Cost,
    pub(crate) window_min_togo: Cost,
    pub(crate) window_max_togo: Cost,
    pub(crate) bloom_max_cost: Cost,
    pub(crate) stats: RouterStats,
    pub(crate) failed: bool,
    pub(crate) interrupt: Arc<AtomicBool>,
}

impl<'a> MazeRouter<'a> {
    /// Binds a routing style to a cell database and a net: flattens the
    /// hint planes, builds the destination areas and their walks, and runs
    /// the initial expansion of the start shapes.
    pub fn initialise(
        db: &'a CellDb,
        starts: &[TermShape],
        dests: &[TermShape],
        bounding_rect: Rect,
        style: &MazeStyle,
        interrupt: Arc<AtomicBool>,
    ) -> Result<MazeRouter<'a>> {
        let mut registry = DbTypeRegistry::new();
        let table = RouteTable::from_style(style, &mut registry)?;
        let params = style.params.clone();

        let resolve = |shapes: &[TermShape]| -> Result<Vec<PaintShape>> {
            shapes
                .iter()
                .map(|s| {
                    registry
                        .get(&s.layer)
                        .map(|ty| PaintShape { rect: s.rect, ty })
                        .ok_or_else(|| InitError::UnknownTerminalLayer {
                            name: s.layer.clone(),
                        })
                })
                .collect()
        };
        let start_seeds = resolve(starts)?;
        let dest_seeds = resolve(dests)?;

        let context_radius = table.context_radius();
        let bounds_increment = if params.bounds_increment < 0 {
            (context_radius * 4).max(10)
        } else {
            params.bounds_increment.max(1)
        };
        let max_walk_length = if params.max_walk_length < 0 {
            context_radius
        } else {
            params.max_walk_length
        };

        let bridges: Vec<(DbType, DbType, DbType)> = table
            .contacts
            .iter()
            .map(|c| {
                (
                    c.rt.db_type,
                    table.layers[c.layer1].rt.db_type,
                    table.layers[c.layer2].rt.db_type,
                )
            })
            .collect();
        let reach = bounding_rect.expand_all(context_radius);
        let (start_terms, dest_areas) = if params.expand_endpoints {
            (
                db.expand_connected(&start_seeds, reach, &bridges),
                db.expand_connected(&dest_seeds, reach, &bridges),
            )
        } else {
            (start_seeds, dest_seeds)
        };
        let mut term_shapes = start_terms.clone();
        term_shapes.extend(dest_areas.iter().copied());

        let mut router = MazeRouter {
            db,
            registry,
            params,
            table,
            hints: HintPlanes::new(),
            h_bounds: Plane::new(StripDir::Horiz),
            v_bounds: Plane::new(StripDir::Vert),
            block_table: block_paint_table(),
            bounding_rect,
            inside_fence: false,
            term_shapes,
            dest_areas,
            start_terms,
            start_points: Vec::new(),
            x_align: NumberLine::new(),
            y_align: NumberLine::new(),
            context_radius,
            bounds_increment,
            max_walk_length,
            estimate: EstimatePlane::new(),
            arena: PathArena::new(),
            hash: FxHashMap::default(),
            queues: SearchQueues::default(),
            source: PathSource::Init,
            min_initial_cost: COST_MAX,
            initial_estimate: COST_MAX,
            w_initial_min_togo: 0,
            w_initial_max_togo: 0,
            window_min_togo: 0,
            window_max_togo: 0,
            bloom_max_cost: 0,
            stats: RouterStats::default(),
            failed: false,
            interrupt,
        };

        router.hints.build(
            db,
            bounding_rect.expand_all(context_radius + 1),
            router.params.top_hints_only,
        );
        router.inside_fence = router
            .dest_areas
            .first()
            .map(|s| {
                let t = router.hints.h_fence.point_locate(s.rect.lower_left());
                router.hints.h_fence.kind(t) == hints::HINT_SOLID
            })
            .unwrap_or(false);

        router.build_dest_area_blocks()?;
        router.collect_start_points();

        if router.params.verbosity >= 1 {
            tracing::info!(
                style = %style.name,
                layers = router.table.layers.len(),
                contacts = router.table.contacts.len(),
                starts = router.start_points.len(),
                dests = router.dest_areas.len(),
                "router initialised"
            );
        }
        Ok(router)
    }

    /// Candidate initial points: every routable position inside a start
    /// terminal, on every active layer of the terminal's material.
    fn collect_start_points(&mut self) {
        let shapes = self.start_terms.clone();
        let mut out: Vec<(Point, usize)> = Vec::new();
        for s in &shapes {
            self.extend_block_bounds_rect(s.rect);
            for li in self.table.active_layers() {
                if self.table.layers[li].rt.db_type != s.ty {
                    continue;
                }
                let plane = &self.table.layers[li].rt.h_block;
                let _ = plane.for_each_in(s.rect, |id| {
                    if BlockKind::from_tile(plane.kind(id))
                        .map(BlockKind::passable)
                        .unwrap_or(false)
                    {
                        let r = plane.rect(id).intersection(s.rect);
                        if !r.is_empty() {
                            out.push((r.lower_left(), li));
                        }
                    }
                    ControlFlow::Continue(())
                });
            }
        }
        out.sort();
        out.dedup();
        self.start_points = out;
    }

    /// Whether the caller has signalled cancellation.
    pub(crate) fn interrupted(&self) -> bool {
        self.interrupt.load(Ordering::Relaxed)
    }

    /// Runs the search.
    ///
    /// Builds the estimation plane first if [`MazeRouter::build_estimate`]
    /// was not called, then seeds the initial paths and drives the windowed
    /// search. The returned path runs from the destination back to a start.
    pub fn route(&mut self) -> (RouteStatus, Option<Vec<RouteNode>>) {
        if !self.estimate.is_built() {
            self.build_estimate();
        }
        if self.arena.is_empty() {
            self.seed_initial_paths();
        }
        let (status, best) = self.search();
        let nodes = best.map(|id| {
            debug_assert!(self.endpoint_in_dest(id), "returned path misses destination");
            self.copy_path(id)
        });
        (status, nodes)
    }

    fn copy_path(&self, id: PathId) -> Vec<RouteNode> {
        self.arena
            .collect_chain(id)
            .into_iter()
            .map(|p| RouteNode {
                point: p.entry,
                layer: self.table.layers[p.layer].rt.name.clone(),
                orient: p.orient,
                cost: p.cost,
            })
            .collect()
    }

    /// Releases the arena and clears every plane and queue. The style
    /// binding survives; everything derived from the routed net is dropped.
    pub fn clean(&mut self) {
        self.arena.reset();
        self.hash.clear();
        self.queues.clear();
        self.hints.clear();
        self.h_bounds.clear();
        self.v_bounds.clear();
        for r in self.table.all_refs() {
            let rt = self.table.route_type_mut(r);
            rt.h_block.clear();
            rt.v_block.clear();
        }
        self.estimate.clear();
        self.x_align.clear();
        self.y_align.clear();
        self.start_points.clear();
        self.term_shapes.clear();
        self.dest_areas.clear();
        self.start_terms.clear();
        self.stats = RouterStats::default();
        self.failed = false;
        self.min_initial_cost = COST_MAX;
    }

    /// Read access to the search statistics.
    pub fn stats(&self) -> &RouterStats {
        &self.stats
    }
}

impl CellDb {
    /// Convenience for examples and tests: the database type a style would
    /// assign to `name`.
    ///
    /// Paint types are interned in declaration order (layers first, then
    /// contacts), after the reserved `subcell` pseudo-type.
    pub fn registry_probe(&self, style: &MazeStyle, name: &str) -> DbType {
        let mut registry = DbTypeRegistry::new();
        for l in &style.layers {
            registry.intern(&l.name);
        }
        for c in &style.contacts {
            registry.intern(&c.name);
        }
        registry.get(name).expect("material not declared in style")
    }
}
