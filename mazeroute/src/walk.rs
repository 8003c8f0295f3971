//! Walk completion: the deterministic final legs.
//!
//! A path whose mask is a single walk bit sits inside blockage adjacent to a
//! destination area. No further search is needed; the completion either
//! paints a straight leg across the walk tile into the destination, or drops
//! the one contact whose residues join the current layer to the destination.

use geometry::prelude::*;
use tileplane::StripDir;

use crate::extend::CardDir;
use crate::path::{ExtendMask, Orient, PathId};
use crate::rtypes::{BlockKind, RtRef};
use crate::MazeRouter;

impl MazeRouter<'_> {
    /// Completes a path inside a directional walk by running straight
    /// through it to the destination edge.
    pub(crate) fn walk_dir(&mut self, id: PathId, d: CardDir) {
        let rp = *self.arena.get(id);
        let p_org = rp.entry;
        let axis = d.axis();
        let layer = rp.layer;
        // Walk distances must be exact along the axis of travel, so the
        // plane striped along that axis is consulted.
        let strip = match axis {
            Dir::Horiz => StripDir::Horiz,
            Dir::Vert => StripDir::Vert,
        };
        let (trect, tkind) = self.block_tile(RtRef::Layer(layer), strip, p_org);
        if tkind != d.walk_entry() {
            debug_assert!(false, "walk path not inside its walk tile");
            tracing::warn!(?p_org, ?tkind, "walk completion on unexpected tile");
            self.failed = true;
            return;
        }
        if self.params.verbosity >= 2 {
            tracing::debug!(?p_org, ?d, "walking home");
        }
        let new_c = match d {
            CardDir::Right => trect.right(),
            CardDir::Left => trect.left() - 1,
            CardDir::Up => trect.top(),
            CardDir::Down => trect.bottom() - 1,
        };
        let p_new = p_org.with_coord(axis, new_c);
        let seg_cost = self.segment_cost(layer, axis, p_org, p_new, false);
        self.add_point(
            Some(id),
            p_new,
            layer,
            Orient::from_dir(axis),
            ExtendMask::COMPLETE,
            seg_cost,
            false,
        );
    }

    /// Completes a path inside a contact walk by dropping the contact whose
    /// residue matches the current layer, re-verifying that the contact is
    /// unblocked and fits at this exact point (a stacked placement that no
    /// longer fits is skipped and the next matching contact type is tried).
    pub(crate) fn walk_contact(&mut self, id: PathId, orient: Orient) {
        debug_assert!(orient.is_contact());
        let rp = *self.arena.get(id);
        let p_org = rp.entry;
        let layer = rp.layer;
        let (strip, fit_dir) = match orient {
            Orient::ContactLr => (StripDir::Horiz, Dir::Horiz),
            _ => (StripDir::Vert, Dir::Vert),
        };
        let (trect, tkind) = self.block_tile(RtRef::Layer(layer), strip, p_org);
        let above = match orient {
            Orient::ContactLr => tkind == BlockKind::AboveLrWalk,
            _ => tkind == BlockKind::AboveUdWalk,
        };
        let below = match orient {
            Orient::ContactLr => tkind == BlockKind::BelowLrWalk,
            _ => tkind == BlockKind::BelowUdWalk,
        };
        if !above && !below {
            debug_assert!(false, "contact-walk path not inside a contact walk");
            tracing::warn!(?p_org, ?tkind, "contact walk on unexpected tile");
            self.failed = true;
            return;
        }
        if self.params.verbosity >= 2 {
            tracing::debug!(?p_org, ?orient, "walking home via contact");
        }

        for ci in 0..self.table.contacts.len() {
            let c = &self.table.contacts[ci];
            if !c.rt.active {
                continue;
            }
            // An "above" walk sits on the contact's upper residue; the
            // destination is its lower residue, and vice versa.
            if above && c.layer2 != layer {
                continue;
            }
            if below && c.layer1 != layer {
                continue;
            }
            if !c.joins(layer) {
                continue;
            }
            let con_length = c.rt.length;
            let con_width = c.rt.width;
            let (_, ckind) = self.block_tile(RtRef::Contact(ci), strip, p_org);
            if !ckind.passable() {
                continue;
            }
            if trect.span(fit_dir).hi() - p_org.coord(fit_dir) <= con_length - con_width {
                continue;
            }
            let c = &self.table.contacts[ci];
            let new_layer = c.other_layer(layer);
            let cost = c.cost;
            self.add_point(
                Some(id),
                p_org,
                new_layer,
                orient,
                ExtendMask::COMPLETE,
                cost,
                false,
            );
            return;
        }
        tracing::warn!(?p_org, "no contact type completes this contact walk");
    }
}
