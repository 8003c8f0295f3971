//! The windowed best-first search driver.
//!
//! Partial paths are expanded one interesting point at a time. The window
//! defines a band on the distance-to-go axis that slides from the start
//! toward the goal as blooming proceeds:
//!
//! * `max_togo` heap: paths nearer the goal than the window, waiting;
//! * `min_cost` heap: paths inside the window, expanded cheapest first;
//! * `min_adj_cost` heap: paths beyond the window, ordered by cost plus a
//!   penalty proportional to their distance behind the trailing edge;
//! * `min_cost_complete` heap: finished paths.
//!
//! Four stacks give the search local focus: a bloom seeds a burst of
//! expansions; straight runs continue in the preferred direction while the
//! bloom budget lasts; downhill runs follow while the estimated total does
//! not increase; walk paths always finish first.

use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;

use geometry::prelude::*;

use crate::path::{cost_add, Cost, ExtendMask, Orient, PathId, PointKey, RoutePath, COST_MAX};
use crate::rtypes::BlockKind;
use crate::{MazeRouter, RouteStatus};

/// Where the path currently being extended came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PathSource {
    /// Initial expansion of the start terminals.
    Init,
    /// The bloom stack.
    Bloom,
    /// The straight stack.
    Straight,
    /// The downhill stack.
    Downhill,
    /// The walk stack.
    Walk,
}

/// A heap entry keyed by a cost; the comparator makes `BinaryHeap` pop the
/// smallest key.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct MinEntry {
    pub key: Cost,
    pub id: PathId,
}

impl PartialOrd for MinEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for MinEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        other.key.cmp(&self.key)
    }
}

/// A heap entry popping the largest key first.
#[derive(Debug, PartialEq, Eq)]
pub(crate) struct MaxEntry {
    pub key: Cost,
    pub id: PathId,
}

impl PartialOrd for MaxEntry {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for MaxEntry {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        self.key.cmp(&other.key)
    }
}

/// The heaps, stacks, and point hash of one routing call.
#[derive(Debug, Default)]
pub(crate) struct SearchQueues {
    pub max_togo: BinaryHeap<MaxEntry>,
    pub min_cost: BinaryHeap<MinEntry>,
    pub min_adj_cost: BinaryHeap<MinEntry>,
    pub complete: BinaryHeap<MinEntry>,
    pub bloom: Vec<PathId>,
    pub straight: Vec<PathId>,
    pub downhill: Vec<PathId>,
    pub walk: Vec<PathId>,
}

impl SearchQueues {
    pub fn clear(&mut self) {
        self.max_togo.clear();
        self.min_cost.clear();
        self.min_adj_cost.clear();
        self.complete.clear();
        self.bloom.clear();
        self.straight.clear();
        self.downhill.clear();
        self.walk.clear();
    }
}

impl MazeRouter<'_> {
    fn penalty(&self, v: Cost) -> Cost {
        let v = v.clamp(0, COST_MAX);
        (v.saturating_mul(self.params.penalty_mantissa) >> self.params.penalty_nexp).min(COST_MAX)
    }

    /// Seeds the search with the initial expansion of the start terminals.
    pub(crate) fn seed_initial_paths(&mut self) {
        self.source = PathSource::Init;
        self.min_initial_cost = COST_MAX;
        for (p, layer) in self.start_points.clone() {
            self.add_point(None, p, layer, Orient::Start, ExtendMask::ALL, 0, true);
        }
        self.initial_estimate = self.min_initial_cost;
        self.w_initial_min_togo = self.min_initial_cost;
        self.w_initial_max_togo = cost_add(self.min_initial_cost, self.params.window_width);
        self.window_min_togo = self.w_initial_min_togo;
        self.window_max_togo = self.w_initial_max_togo;
        if self.params.verbosity >= 1 {
            tracing::info!(
                seeds = self.start_points.len(),
                initial_estimate = self.initial_estimate,
                "initial expansion done"
            );
        }
    }

    /// Processes one interesting point: links it to `back`, costs it,
    /// deduplicates it through the point hash, and files it on the
    /// appropriate queue or stack.
    ///
    /// `seg_cost` is the incremental cost of the new leg. With
    /// `in_samenode` set, the accumulated cost resets to zero as long as the
    /// predecessor had not yet left the starting node (its cost was zero).
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn add_point(
        &mut self,
        back: Option<PathId>,
        p: Point,
        layer: usize,
        orient: Orient,
        extend: ExtendMask,
        seg_cost: Cost,
        in_samenode: bool,
    ) {
        debug_assert!(seg_cost >= 0);
        if !self.bounding_rect.contains(p) {
            return;
        }

        let togo = if extend.is_complete() {
            0
        } else {
            self.estimated_cost(p)
        };

        let mut cost = seg_cost;
        if let Some(b) = back {
            let bp = self.arena.get(b);
            if bp.layer == layer
                && !bp.orient.is_contact()
                && bp.orient != Orient::Start
                && bp.orient != orient
                && !orient.is_contact()
            {
                cost = cost_add(cost, self.table.layers[layer].jog_cost);
            }
            cost = cost_add(cost, bp.cost);
        }
        if in_samenode && back.map(|b| self.arena.get(b).cost == 0).unwrap_or(true) {
            cost = 0;
        }
        let total = cost_add(cost, togo);

        let key = PointKey {
            point: p,
            layer,
            orient,
        };
        if let Some(&old) = self.hash.get(&key) {
            if self.arena.get(old).total() <= total {
                if self.params.verbosity >= 2 {
                    tracing::debug!(?p, layer, "discarded: cheaper path to point exists");
                }
                return;
            }
        }

        if self.source == PathSource::Init && total < self.min_initial_cost {
            self.min_initial_cost = total;
        }

        let id = self.arena.push(RoutePath {
            entry: p,
            layer,
            orient,
            cost,
            togo,
            extend,
            back,
        });
        self.hash.insert(key, id);
        self.stats.paths_gened += 1;

        if extend.is_complete() {
            self.queues.complete.push(MinEntry { key: total, id });
            self.stats.num_complete += 1;
            if self.params.verbosity >= 1 {
                tracing::info!(
                    number = self.stats.num_complete,
                    cost = total,
                    initial_estimate = self.initial_estimate,
                    "complete path found"
                );
            }
            return;
        }
        if extend.is_walk() {
            self.queues.walk.push(id);
            return;
        }
        match self.source {
            PathSource::Bloom => {
                let rl = &self.table.layers[layer];
                if orient == Orient::ContactLr {
                    // Just changing layers; stay in the local focus.
                    self.queues.bloom.push(id);
                } else if (orient == Orient::Horiz && rl.h_cost <= rl.v_cost)
                    || (orient == Orient::Vert && rl.v_cost <= rl.h_cost)
                {
                    self.queues.straight.push(id);
                } else {
                    self.queues.max_togo.push(MaxEntry { key: togo, id });
                }
            }
            PathSource::Straight => {
                let keep_going = back
                    .map(|b| self.arena.get(b).orient == orient)
                    .unwrap_or(false)
                    && total < self.bloom_max_cost;
                if keep_going {
                    self.queues.straight.push(id);
                } else {
                    self.queues.downhill.push(id);
                }
            }
            PathSource::Downhill => {
                let downhill = back
                    .map(|b| total < cost_add(self.arena.get(b).total(), 1))
                    .unwrap_or(false);
                if downhill {
                    self.queues.downhill.push(id);
                } else {
                    self.queues.max_togo.push(MaxEntry { key: togo, id });
                }
            }
            PathSource::Init | PathSource::Walk => {
                self.queues.max_togo.push(MaxEntry { key: togo, id });
            }
        }
    }

    fn bloom_init(&mut self, id: PathId) {
        debug_assert!(self.queues.bloom.is_empty());
        self.bloom_max_cost = cost_add(self.arena.get(id).total(), self.params.bloom_delta_cost);
        self.queues.bloom.push(id);
        self.stats.num_blooms += 1;
    }

    /// Runs every extension the path's mask allows.
    fn extend_path(&mut self, id: PathId) {
        let extend = self.arena.get(id).extend;
        if extend.contains(ExtendMask::RIGHT) {
            self.extend_dir(id, crate::extend::CardDir::Right);
        }
        if extend.contains(ExtendMask::LEFT) {
            self.extend_dir(id, crate::extend::CardDir::Left);
        }
        if extend.contains(ExtendMask::UP) {
            self.extend_dir(id, crate::extend::CardDir::Up);
        }
        if extend.contains(ExtendMask::DOWN) {
            self.extend_dir(id, crate::extend::CardDir::Down);
        }
        if extend.contains(ExtendMask::UD_CONTACTS) {
            self.extend_via_contacts(id, Orient::ContactUd);
        }
        if extend.contains(ExtendMask::LR_CONTACTS) {
            self.extend_via_contacts(id, Orient::ContactLr);
        }
        if extend.is_walk() {
            if extend.contains(ExtendMask::WALK_RIGHT) {
                self.walk_dir(id, crate::extend::CardDir::Right);
            } else if extend.contains(ExtendMask::WALK_LEFT) {
                self.walk_dir(id, crate::extend::CardDir::Left);
            } else if extend.contains(ExtendMask::WALK_UP) {
                self.walk_dir(id, crate::extend::CardDir::Up);
            } else if extend.contains(ExtendMask::WALK_DOWN) {
                self.walk_dir(id, crate::extend::CardDir::Down);
            } else if extend.contains(ExtendMask::WALK_LR_CONTACT) {
                self.walk_contact(id, Orient::ContactLr);
            } else if extend.contains(ExtendMask::WALK_UD_CONTACT) {
                self.walk_contact(id, Orient::ContactUd);
            }
        }
    }

    /// Whether the path's endpoint sits at the edge of the generated
    /// blockage bounds.
    fn near_bounds_edge(&self, p: Point) -> bool {
        let ht = self.h_bounds.point_locate(p);
        if self.h_bounds.kind(ht) != crate::blockage::INBOUNDS
            || p.x == self.h_bounds.left(ht)
            || p.x == self.h_bounds.right(ht) - 1
        {
            return true;
        }
        let vt = self.v_bounds.point_locate(p);
        self.v_bounds.kind(vt) != crate::blockage::INBOUNDS
            || p.y == self.v_bounds.bottom(vt)
            || p.y == self.v_bounds.top(vt) - 1
    }

    /// The driver loop. Returns the best complete path found, if any.
    pub(crate) fn search(&mut self) -> (RouteStatus, Option<PathId>) {
        let mut more_partial_paths = true;
        let mut bloom_limit_hit = false;
        let mut sweep_done = false;

        while more_partial_paths && !sweep_done && !bloom_limit_hit && !self.interrupted() {
            if self.failed {
                break;
            }
            // Stack priority: walk, downhill, straight, bloom.
            let popped = if let Some(id) = self.queues.walk.pop() {
                Some((PathSource::Walk, id))
            } else if let Some(id) = self.queues.downhill.pop() {
                Some((PathSource::Downhill, id))
            } else if let Some(id) = self.queues.straight.pop() {
                Some((PathSource::Straight, id))
            } else if let Some(id) = self.queues.bloom.pop() {
                Some((PathSource::Bloom, id))
            } else {
                None
            };

            if let Some((source, id)) = popped {
                self.source = source;
                let rp = *self.arena.get(id);
                let key = PointKey {
                    point: rp.entry,
                    layer: rp.layer,
                    orient: rp.orient,
                };
                if self.hash.get(&key) != Some(&id) {
                    // A cheaper path to this point was found meanwhile.
                    continue;
                }
                if self.near_bounds_edge(rp.entry) {
                    self.extend_block_bounds(rp.entry);
                    if self.interrupted() {
                        continue;
                    }
                }
                self.extend_path(id);
                self.stats.paths_processed += 1;
            } else {
                // Stacks empty: pick a new bloom focus from the heaps.
                if self.params.bloom_limit > 0 && self.stats.num_blooms > self.params.bloom_limit {
                    if self.params.verbosity >= 1 {
                        tracing::info!(limit = self.params.bloom_limit, "bloom limit hit");
                    }
                    bloom_limit_hit = true;
                    continue;
                }

                // Shift the window.
                let offset = self
                    .params
                    .window_rate
                    .saturating_mul(self.stats.num_blooms as Cost);
                self.window_min_togo = (self.w_initial_min_togo - offset).max(0);
                self.window_max_togo = (self.w_initial_max_togo - offset).max(0);

                if self.window_max_togo == 0 && !self.queues.complete.is_empty() {
                    sweep_done = true;
                    continue;
                }

                // Paths now at or behind the leading edge enter the window.
                while let Some(top) = self.queues.max_togo.peek() {
                    if top.key < self.window_min_togo {
                        break;
                    }
                    let id = self.queues.max_togo.pop().unwrap().id;
                    let key = self.arena.get(id).total();
                    self.queues.min_cost.push(MinEntry { key, id });
                }

                // Paths the trailing edge has passed move to the penalised
                // heap, keyed at the reference window position.
                while let Some(top) = self.queues.min_cost.peek() {
                    let togo = self.arena.get(top.id).togo;
                    if togo <= self.window_max_togo {
                        break;
                    }
                    let entry = self.queues.min_cost.pop().unwrap();
                    let adj = cost_add(entry.key, self.penalty(togo));
                    self.queues.min_adj_cost.push(MinEntry { key: adj, id: entry.id });
                }

                let in_window = self.queues.min_cost.peek().map(|e| e.key);
                let beyond = self.queues.min_adj_cost.peek().map(|e| {
                    let rp = self.arena.get(e.id);
                    cost_add(rp.total(), self.penalty(rp.togo - self.window_max_togo))
                });

                match (in_window, beyond) {
                    (Some(wc), Some(bc)) => {
                        if wc <= bc {
                            let id = self.queues.min_cost.pop().unwrap().id;
                            self.bloom_init(id);
                        } else {
                            let id = self.queues.min_adj_cost.pop().unwrap().id;
                            self.bloom_init(id);
                            self.stats.num_outside_blooms += 1;
                        }
                    }
                    (Some(_), None) => {
                        let id = self.queues.min_cost.pop().unwrap().id;
                        self.bloom_init(id);
                    }
                    (None, Some(_)) => {
                        let id = self.queues.min_adj_cost.pop().unwrap().id;
                        self.bloom_init(id);
                        self.stats.num_outside_blooms += 1;
                    }
                    (None, None) => {
                        if let Some(entry) = self.queues.max_togo.pop() {
                            self.bloom_init(entry.id);
                            self.stats.num_outside_blooms += 1;
                        } else {
                            more_partial_paths = false;
                        }
                    }
                }
            }
        }

        self.report_stats();

        let best = self.queues.complete.pop().map(|e| e.id);
        let status = match (&best, self.interrupted() || self.failed) {
            (Some(_), false) => RouteStatus::Success,
            (Some(_), true) => RouteStatus::CurrentBest,
            (None, true) => RouteStatus::Interrupted,
            (None, false) => RouteStatus::Failure,
        };
        (status, best)
    }

    fn report_stats(&self) {
        if self.params.verbosity < 1 {
            return;
        }
        tracing::info!(
            blooms = self.stats.num_blooms,
            outside_blooms = self.stats.num_outside_blooms,
            window_max_togo = self.window_max_togo,
            paths_processed = self.stats.paths_processed,
            paths_generated = self.stats.paths_gened,
            complete = self.stats.num_complete,
            block_gen_calls = self.stats.block_gen_calls,
            block_gen_area = self.stats.block_gen_area,
            "search statistics"
        );
    }

    /// Whether the endpoint of `id` sits inside a destination area on its
    /// layer's blockage plane. Used by tests and assertions.
    pub(crate) fn endpoint_in_dest(&self, id: PathId) -> bool {
        let rp = self.arena.get(id);
        let rt = &self.table.layers[rp.layer].rt;
        let t = rt.h_block.point_locate(rp.entry);
        BlockKind::from_tile(rt.h_block.kind(t)) == Some(BlockKind::DestArea)
    }
}
