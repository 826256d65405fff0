// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Ownership graph: parts, rigid bodies and physicals.
//!
//! A *physical* is a rigid body plus child physicals hanging off it through
//! hard constraints. The root of such a tree is *motorized*: it carries the
//! motion and total mass properties of the whole structure. Every other
//! physical is *connected* to its parent through a
//! [`HardPhysicalConnection`].
//!
//! The graph is an arena: parts and physicals live in generational slot
//! maps and refer to each other by handle. Back-references (`part.parent`,
//! `physical.main_physical`, the connected parent) are non-owning and kept
//! consistent by the operations below.

use p3d_geom::{CFrame, GlobalCFrame};
use slotmap::SlotMap;
use tracing::{debug, warn};

use crate::constraint::{HardConstraint, HardPhysicalConnection};
use crate::error::InvariantViolation;
use crate::ident::{LayerId, PartId, PhysicalId};
use crate::inertia::MassProperties;
use crate::motion::Motion;
use crate::part::{Part, PartProperties};
use crate::rigid_body::{AttachedPart, RigidBody};
use crate::shape::Shape;

/// State owned by the root of a structure.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MotorizedState {
    /// Motion of the structure's centre of mass.
    pub motion: Motion,
    pub(crate) total: MassProperties,
    pub(crate) in_world: bool,
    pub(crate) anchored: bool,
}

impl MotorizedState {
    fn with_motion(motion: Motion) -> Self {
        Self { motion, ..Self::default() }
    }

    /// Mass properties of the whole structure in the root main part's frame.
    pub fn total_mass_properties(&self) -> &MassProperties {
        &self.total
    }

    /// Whether the structure is indexed by a world.
    pub fn in_world(&self) -> bool {
        self.in_world
    }

    /// Whether the structure is pinned in place. Anchored structures keep a
    /// zero motion.
    pub fn anchored(&self) -> bool {
        self.anchored
    }
}

/// Root or non-root role of a physical.
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicalKind {
    /// Root of a structure.
    Motorized(MotorizedState),
    /// Child hanging off `parent`.
    Connected {
        /// Owning physical.
        parent: PhysicalId,
        /// Link to the parent.
        connection: HardPhysicalConnection,
    },
}

/// A rigid body with its connected children.
#[derive(Debug, Clone, PartialEq)]
pub struct Physical {
    pub(crate) rigid_body: RigidBody,
    pub(crate) children: Vec<PhysicalId>,
    pub(crate) main_physical: PhysicalId,
    pub(crate) kind: PhysicalKind,
}

impl Physical {
    /// Welded parts of this physical.
    pub fn rigid_body(&self) -> &RigidBody {
        &self.rigid_body
    }

    /// Connected children.
    pub fn children(&self) -> &[PhysicalId] {
        &self.children
    }

    /// Root of the structure.
    pub fn main_physical(&self) -> PhysicalId {
        self.main_physical
    }

    /// Root or connected role.
    pub fn kind(&self) -> &PhysicalKind {
        &self.kind
    }

    /// Whether this physical is the root of its structure.
    pub fn is_motorized(&self) -> bool {
        matches!(self.kind, PhysicalKind::Motorized(_))
    }

    /// Root state, for motorized physicals.
    pub fn motorized(&self) -> Option<&MotorizedState> {
        match &self.kind {
            PhysicalKind::Motorized(state) => Some(state),
            PhysicalKind::Connected { .. } => None,
        }
    }

    /// Parent physical, for connected physicals.
    pub fn parent(&self) -> Option<PhysicalId> {
        match &self.kind {
            PhysicalKind::Motorized(_) => None,
            PhysicalKind::Connected { parent, .. } => Some(*parent),
        }
    }

    /// Link to the parent, for connected physicals.
    pub fn connection(&self) -> Option<&HardPhysicalConnection> {
        match &self.kind {
            PhysicalKind::Motorized(_) => None,
            PhysicalKind::Connected { connection, .. } => Some(connection),
        }
    }

    fn motorized_mut(&mut self) -> Option<&mut MotorizedState> {
        match &mut self.kind {
            PhysicalKind::Motorized(state) => Some(state),
            PhysicalKind::Connected { .. } => None,
        }
    }
}

/// Arena of parts and physicals.
#[derive(Debug, Clone, Default)]
pub struct PhysicalGraph {
    parts: SlotMap<PartId, Part>,
    physicals: SlotMap<PhysicalId, Physical>,
}

impl PhysicalGraph {
    /// Empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Part lookup.
    pub fn part(&self, id: PartId) -> Option<&Part> {
        self.parts.get(id)
    }

    /// Physical lookup.
    pub fn physical(&self, id: PhysicalId) -> Option<&Physical> {
        self.physicals.get(id)
    }

    /// Every part.
    pub fn parts(&self) -> impl Iterator<Item = (PartId, &Part)> {
        self.parts.iter()
    }

    /// Every physical.
    pub fn physicals(&self) -> impl Iterator<Item = (PhysicalId, &Physical)> {
        self.physicals.iter()
    }

    /// Number of parts in the arena.
    pub fn part_count(&self) -> usize {
        self.parts.len()
    }

    /// Number of physicals in the arena.
    pub fn physical_count(&self) -> usize {
        self.physicals.len()
    }

    /// Creates a free part.
    pub fn create_part(&mut self, shape: Shape, cframe: GlobalCFrame, properties: PartProperties) -> PartId {
        self.insert_part(Part::new(shape, cframe, properties))
    }

    pub(crate) fn insert_part(&mut self, mut part: Part) -> PartId {
        part.parent = None;
        self.parts.insert(part)
    }

    pub(crate) fn part_mut(&mut self, id: PartId) -> Option<&mut Part> {
        self.parts.get_mut(id)
    }

    /// Drops a free part from the arena.
    pub fn remove_free_part(&mut self, id: PartId) -> Option<Part> {
        let part = self.parts.get(id)?;
        if part.parent.is_some() {
            warn!(?id, "cannot drop a part that still belongs to a physical");
            return None;
        }
        self.parts.remove(id)
    }

    /// Root physical of the structure containing `physical`.
    pub fn root_of(&self, physical: PhysicalId) -> Option<PhysicalId> {
        self.physicals.get(physical).map(|p| p.main_physical)
    }

    /// Root physical of the structure containing `part`.
    pub fn root_of_part(&self, part: PartId) -> Option<PhysicalId> {
        self.parts.get(part).and_then(|p| p.parent).and_then(|p| self.root_of(p))
    }

    /// Physicals of the structure under `root`, depth-first pre-order.
    pub fn structure_physicals(&self, root: PhysicalId) -> Vec<PhysicalId> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let Some(phys) = self.physicals.get(id) else { continue };
            out.push(id);
            stack.extend(phys.children.iter().rev().copied());
        }
        out
    }

    /// Parts of the structure under `root`, in physical pre-order, main part
    /// of each physical first.
    pub fn structure_parts(&self, root: PhysicalId) -> Vec<PartId> {
        self.structure_physicals(root)
            .into_iter()
            .flat_map(|id| self.physicals[id].rigid_body.part_ids().collect::<Vec<_>>())
            .collect()
    }

    /// Number of parts in the structure under `root`.
    pub fn structure_part_count(&self, root: PhysicalId) -> usize {
        self.structure_physicals(root).iter().map(|&id| self.physicals[id].rigid_body.part_count()).sum()
    }

    /// Motion of a root physical.
    pub fn motion(&self, root: PhysicalId) -> Option<&Motion> {
        self.physicals.get(root).and_then(Physical::motorized).map(|s| &s.motion)
    }

    /// Sets the motion of a root physical. Rejected for anchored roots.
    pub fn set_motion(&mut self, root: PhysicalId, motion: Motion) -> bool {
        match self.physicals.get_mut(root).and_then(Physical::motorized_mut) {
            Some(state) if state.anchored => {
                warn!(?root, "cannot set the motion of an anchored physical");
                false
            }
            Some(state) => {
                state.motion = motion;
                true
            }
            None => {
                warn!(?root, "motion can only be set on a motorized physical");
                false
            }
        }
    }

    /// Pins or releases a root physical; pinning clears its motion.
    pub fn set_anchored(&mut self, root: PhysicalId, anchored: bool) -> bool {
        let Some(state) = self.physicals.get_mut(root).and_then(Physical::motorized_mut) else {
            warn!(?root, "only motorized physicals can be anchored");
            return false;
        };
        state.anchored = anchored;
        if anchored {
            state.motion = Motion::default();
        }
        true
    }

    pub(crate) fn set_in_world(&mut self, root: PhysicalId, in_world: bool) {
        if let Some(state) = self.physicals.get_mut(root).and_then(Physical::motorized_mut) {
            state.in_world = in_world;
        }
    }

    pub(crate) fn is_in_world(&self, root: PhysicalId) -> bool {
        self.physicals.get(root).and_then(Physical::motorized).is_some_and(|s| s.in_world)
    }

    /// Gives a free part a fresh motorized physical; returns the part's
    /// physical either way. `None` for unknown or terrain parts.
    pub fn ensure_has_parent(&mut self, part: PartId) -> Option<PhysicalId> {
        let p = self.parts.get(part)?;
        if p.is_terrain {
            warn!(?part, "terrain parts never belong to a physical");
            return None;
        }
        if let Some(parent) = p.parent {
            return Some(parent);
        }
        let id = self.physicals.insert_with_key(|id| Physical {
            rigid_body: RigidBody::new(part),
            children: Vec::new(),
            main_physical: id,
            kind: PhysicalKind::Motorized(MotorizedState::default()),
        });
        self.parts[part].parent = Some(id);
        self.refresh_physical_properties(id);
        Some(id)
    }

    /// Every rejection of an attach, checked before anything is mutated.
    fn check_attachable(&self, existing: PartId, new: PartId) -> bool {
        if existing == new {
            warn!(?existing, "cannot attach a part to itself");
            return false;
        }
        match (self.parts.get(existing), self.parts.get(new)) {
            (Some(a), Some(b)) if a.is_terrain || b.is_terrain => {
                warn!(?existing, ?new, "terrain parts cannot be attached");
                false
            }
            (Some(a), Some(b)) => {
                let root = a.parent.and_then(|p| self.root_of(p));
                let Some(q) = b.parent else { return true };
                if root.is_some() && self.root_of(q) == root {
                    warn!(?existing, ?new, "part is already in this structure");
                    return false;
                }
                if !self.physicals.get(q).is_some_and(Physical::is_motorized) {
                    warn!(?new, "part belongs to a connected physical; detach it first");
                    return false;
                }
                true
            }
            _ => {
                warn!(?existing, ?new, "attach with unknown part handle");
                false
            }
        }
    }

    /// Welds `new` to `existing` at `relative` (the frame of `new` relative
    /// to `existing`). If `new` already heads a structure, that structure is
    /// merged into `existing`'s rigid body and children.
    pub fn attach_fixed(&mut self, existing: PartId, new: PartId, relative: CFrame) -> bool {
        if !self.check_attachable(existing, new) {
            return false;
        }
        let Some(p) = self.ensure_has_parent(existing) else { return false };
        let root = self.physicals[p].main_physical;
        let Some(existing_attachment) = self.physicals[p].rigid_body.attachment_of(existing) else {
            return false;
        };
        let attachment = existing_attachment.local_to_global_cframe(&relative);
        match self.parts[new].parent {
            None => {
                self.physicals[p].rigid_body.parts.push(AttachedPart { attachment, part: new });
                self.parts[new].parent = Some(p);
            }
            Some(q) => {
                self.make_main_part(new);
                self.merge_into(p, q, attachment, root);
            }
        }
        self.update_positions_from(p);
        self.refresh_physical_properties(root);
        debug!(?existing, ?new, "attached part");
        true
    }

    /// Moves every part and child of root `q` into `p`; `attachment` places
    /// `q`'s main part relative to `p`'s main part.
    fn merge_into(&mut self, p: PhysicalId, q: PhysicalId, attachment: CFrame, root: PhysicalId) {
        let Some(merged) = self.physicals.remove(q) else { return };
        for (part, relative) in merged.rigid_body.parts_with_attachments() {
            let moved = AttachedPart { attachment: attachment.local_to_global_cframe(&relative), part };
            self.physicals[p].rigid_body.parts.push(moved);
            self.parts[part].parent = Some(p);
        }
        for child in merged.children {
            if let PhysicalKind::Connected { parent, connection } = &mut self.physicals[child].kind {
                *parent = p;
                connection.attach_on_parent = attachment.local_to_global_cframe(&connection.attach_on_parent);
            }
            self.physicals[p].children.push(child);
            self.set_main_physical_recursive(child, root);
        }
    }

    /// Connects `new`'s structure below `existing` through `constraint`.
    ///
    /// `attach_to_existing` and `attach_to_new` are the attachment frames on
    /// each part.
    pub fn attach_with_constraint(
        &mut self,
        existing: PartId,
        new: PartId,
        constraint: HardConstraint,
        attach_to_existing: CFrame,
        attach_to_new: CFrame,
    ) -> bool {
        if !self.check_attachable(existing, new) {
            return false;
        }
        let Some(p) = self.ensure_has_parent(existing) else { return false };
        let root = self.physicals[p].main_physical;
        let Some(existing_attachment) = self.physicals[p].rigid_body.attachment_of(existing) else {
            return false;
        };
        let Some(q) = self.ensure_has_parent(new) else { return false };
        self.make_main_part(new);
        let connection = HardPhysicalConnection {
            attach_on_child: attach_to_new,
            attach_on_parent: existing_attachment.local_to_global_cframe(&attach_to_existing),
            constraint,
        };
        self.connect_child(p, q, connection);
        self.update_positions_from(p);
        self.refresh_physical_properties(root);
        debug!(?existing, ?new, constraint = constraint.name(), "attached part with constraint");
        true
    }

    /// Turns root `child` into a connected child of `parent`.
    pub(crate) fn connect_child(&mut self, parent: PhysicalId, child: PhysicalId, connection: HardPhysicalConnection) {
        let root = self.physicals[parent].main_physical;
        self.physicals[child].kind = PhysicalKind::Connected { parent, connection };
        self.physicals[parent].children.push(child);
        self.set_main_physical_recursive(child, root);
    }

    /// Welds a free `part` into `physical` at `attachment`.
    pub(crate) fn weld(&mut self, physical: PhysicalId, part: PartId, attachment: CFrame) {
        self.physicals[physical].rigid_body.parts.push(AttachedPart { attachment, part });
        self.parts[part].parent = Some(physical);
    }

    fn set_main_physical_recursive(&mut self, physical: PhysicalId, root: PhysicalId) {
        let mut stack = vec![physical];
        while let Some(id) = stack.pop() {
            let phys = &mut self.physicals[id];
            phys.main_physical = root;
            stack.extend(phys.children.iter().copied());
        }
    }

    /// Makes `part` the main part of its physical. Attachments, child
    /// connections and the physical's own connection are re-expressed
    /// around it; nothing moves in world space.
    pub fn make_main_part(&mut self, part: PartId) -> bool {
        let Some(p) = self.parts.get(part).and_then(|p| p.parent) else {
            warn!(?part, "only attached parts can become main parts");
            return false;
        };
        if self.physicals[p].rigid_body.main_part == part {
            return true;
        }
        let Some(to_new) = self.physicals[p].rigid_body.set_main_part(part) else {
            return false;
        };
        let children = self.physicals[p].children.clone();
        for child in children {
            if let PhysicalKind::Connected { connection, .. } = &mut self.physicals[child].kind {
                connection.attach_on_parent = to_new.local_to_global_cframe(&connection.attach_on_parent);
            }
        }
        if let PhysicalKind::Connected { connection, .. } = &mut self.physicals[p].kind {
            connection.attach_on_child = to_new.local_to_global_cframe(&connection.attach_on_child);
        }
        let root = self.physicals[p].main_physical;
        self.refresh_physical_properties(root);
        true
    }

    /// Removes `part` from its structure; it ends up as the only part of a
    /// motorized physical, which is returned. Children left without a parent
    /// become roots of their own.
    pub fn detach(&mut self, part: PartId) -> Option<PhysicalId> {
        let Some(p) = self.parts.get(part).map(|p| p.parent) else {
            warn!(?part, "detach of unknown part");
            return None;
        };
        let Some(p) = p else {
            warn!(?part, "detaching a part that is not attached to anything");
            return None;
        };
        let old_root = self.physicals[p].main_physical;
        let motion = self.motion(old_root).copied().unwrap_or_default();

        if self.physicals[p].rigid_body.part_count() == 1 {
            let orphans = core::mem::take(&mut self.physicals[p].children);
            for orphan in &orphans {
                self.make_root(*orphan, motion);
            }
            if let Some(parent) = self.physicals[p].parent() {
                self.physicals[parent].children.retain(|&c| c != p);
                self.make_root(p, motion);
                self.refresh_physical_properties(old_root);
            } else {
                self.refresh_physical_properties(p);
            }
            debug!(?part, orphans = orphans.len(), "detached sole part of physical");
            return Some(p);
        }

        if self.physicals[p].rigid_body.main_part == part {
            let successor = self.physicals[p].rigid_body.parts[0].part;
            self.make_main_part(successor);
        }
        self.physicals[p].rigid_body.remove_attached(part);
        let id = self.physicals.insert_with_key(|id| Physical {
            rigid_body: RigidBody::new(part),
            children: Vec::new(),
            main_physical: id,
            kind: PhysicalKind::Motorized(MotorizedState::with_motion(motion)),
        });
        self.parts[part].parent = Some(id);
        self.refresh_physical_properties(id);
        self.refresh_physical_properties(old_root);
        debug!(?part, "detached part");
        Some(id)
    }

    fn make_root(&mut self, physical: PhysicalId, motion: Motion) {
        self.physicals[physical].kind = PhysicalKind::Motorized(MotorizedState::with_motion(motion));
        self.set_main_physical_recursive(physical, physical);
        self.refresh_physical_properties(physical);
    }

    /// Removes every physical of the structure under `root`; its parts stay
    /// in the arena as free parts.
    pub(crate) fn dissolve(&mut self, root: PhysicalId) -> Vec<PartId> {
        let parts = self.structure_parts(root);
        for id in self.structure_physicals(root) {
            self.physicals.remove(id);
        }
        for &part in &parts {
            self.parts[part].parent = None;
        }
        parts
    }

    /// Places `part` at `cframe`, moving its whole structure rigidly.
    pub fn set_part_cframe(&mut self, part: PartId, cframe: GlobalCFrame) -> bool {
        let Some(p) = self.parts.get(part) else {
            warn!(?part, "set_part_cframe on unknown part");
            return false;
        };
        let Some(mut current) = p.parent else {
            self.parts[part].cframe = cframe;
            return true;
        };
        let attachment = self.physicals[current].rigid_body.attachment_of(part).unwrap_or_default();
        let mut main_cframe = cframe.local_to_global_cframe(&attachment.inverse());
        while let PhysicalKind::Connected { parent, connection } = &self.physicals[current].kind {
            main_cframe = main_cframe.local_to_global_cframe(&connection.relative_cframe_to_parent().inverse());
            current = *parent;
        }
        let main_part = self.physicals[current].rigid_body.main_part;
        self.parts[main_part].cframe = main_cframe;
        self.update_positions_from(current);
        true
    }

    /// Replaces a part's shape and refreshes mass properties.
    pub fn set_part_shape(&mut self, part: PartId, shape: Shape) -> bool {
        let Some(p) = self.parts.get_mut(part) else { return false };
        p.shape = shape;
        if let Some(root) = self.root_of_part(part) {
            self.refresh_physical_properties(root);
        }
        true
    }

    pub(crate) fn set_part_layer(&mut self, part: PartId, layer: LayerId) {
        if let Some(p) = self.parts.get_mut(part) {
            p.layer = layer;
        }
    }

    pub(crate) fn set_part_terrain(&mut self, part: PartId, is_terrain: bool) {
        if let Some(p) = self.parts.get_mut(part) {
            p.is_terrain = is_terrain;
        }
    }

    /// Recomputes the world frames of every part below `physical` from
    /// `physical`'s main part.
    pub(crate) fn update_positions_from(&mut self, physical: PhysicalId) {
        let mut stack = vec![physical];
        while let Some(id) = stack.pop() {
            let phys = &self.physicals[id];
            let main_cframe = self.parts[phys.rigid_body.main_part].cframe;
            for attached in &phys.rigid_body.parts {
                self.parts[attached.part].cframe = main_cframe.local_to_global_cframe(&attached.attachment);
            }
            for &child in &phys.children {
                let child_phys = &self.physicals[child];
                if let PhysicalKind::Connected { connection, .. } = &child_phys.kind {
                    let child_cframe = main_cframe.local_to_global_cframe(&connection.relative_cframe_to_parent());
                    self.parts[child_phys.rigid_body.main_part].cframe = child_cframe;
                }
                stack.push(child);
            }
        }
    }

    /// Recomputes every rigid body's mass properties below `root` and the
    /// structure totals.
    pub fn refresh_physical_properties(&mut self, root: PhysicalId) {
        let members = self.structure_physicals(root);
        for &id in &members {
            self.physicals[id].rigid_body.refresh_mass(&self.parts);
        }
        let Some(root_phys) = self.physicals.get(root) else { return };
        let root_cframe = self.parts[root_phys.rigid_body.main_part].cframe;
        let mut total = MassProperties::ZERO;
        for &id in &members {
            let rb = &self.physicals[id].rigid_body;
            let relative = root_cframe.global_to_local_cframe(&self.parts[rb.main_part].cframe);
            total = total.combine(&rb.mass.transformed(&relative));
        }
        if let Some(state) = self.physicals[root].motorized_mut() {
            state.total = total;
        }
    }

    /// Advances every animated hard constraint by `dt` and repositions the
    /// affected structures. Returns their roots.
    pub fn advance_hard_constraints(&mut self, dt: f64) -> Vec<PhysicalId> {
        let mut roots = Vec::new();
        for (_, phys) in &mut self.physicals {
            if let PhysicalKind::Connected { connection, .. } = &mut phys.kind {
                if connection.constraint.is_animated() {
                    connection.constraint.advance(dt);
                    if !roots.contains(&phys.main_physical) {
                        roots.push(phys.main_physical);
                    }
                }
            }
        }
        for &root in &roots {
            self.update_positions_from(root);
            self.refresh_physical_properties(root);
        }
        roots
    }

    /// Checks the back-references of the structure under `root`.
    pub fn validate_structure(&self, root: PhysicalId) -> Result<(), InvariantViolation> {
        for id in self.structure_physicals(root) {
            let phys = &self.physicals[id];
            if phys.main_physical != root {
                return Err(InvariantViolation::MainPhysicalMismatch { physical: id });
            }
            for part in phys.rigid_body.part_ids() {
                match self.parts.get(part) {
                    Some(p) if p.parent == Some(id) => {}
                    Some(_) => return Err(InvariantViolation::ParentMismatch { part }),
                    None => return Err(InvariantViolation::DanglingHandle),
                }
            }
            for &child in &phys.children {
                match self.physicals.get(child).and_then(Physical::parent) {
                    Some(parent) if parent == id => {}
                    Some(_) | None => return Err(InvariantViolation::ChildParentMismatch { physical: id }),
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use p3d_geom::{Position, Rotation, Vec3};

    fn cube(graph: &mut PhysicalGraph, x: f64) -> PartId {
        graph.create_part(
            Shape::cuboid(1.0, 1.0, 1.0),
            GlobalCFrame::from_position(Position::new(x, 0.0, 0.0)),
            PartProperties::default(),
        )
    }

    #[test]
    fn welding_two_cubes_combines_mass() {
        let mut g = PhysicalGraph::new();
        let a = cube(&mut g, 0.0);
        let b = cube(&mut g, 5.0);
        assert!(g.attach_fixed(a, b, CFrame::from_translation(Vec3::new(1.0, 0.0, 0.0))));
        let root = g.root_of_part(a).unwrap();
        let total = *g.physical(root).unwrap().motorized().unwrap().total_mass_properties();
        assert_relative_eq!(total.mass, 2.0);
        assert_relative_eq!(total.center_of_mass.x(), 0.5);
        assert_relative_eq!(g.part(b).unwrap().position().x(), 1.0);
        g.validate_structure(root).unwrap();
    }

    #[test]
    fn attaching_to_itself_is_rejected() {
        let mut g = PhysicalGraph::new();
        let a = cube(&mut g, 0.0);
        let b = cube(&mut g, 1.0);
        assert!(!g.attach_fixed(a, a, CFrame::IDENTITY));
        assert!(g.attach_fixed(a, b, CFrame::IDENTITY));
        assert!(!g.attach_fixed(b, a, CFrame::IDENTITY));
    }

    #[test]
    fn rejected_attach_leaves_free_part_untouched() {
        let mut g = PhysicalGraph::new();
        let a = cube(&mut g, 0.0);
        let b = cube(&mut g, 1.0);
        let c = cube(&mut g, 2.0);
        assert!(g.attach_with_constraint(a, b, HardConstraint::Fixed, CFrame::IDENTITY, CFrame::IDENTITY));
        let physicals = g.physical_count();
        assert!(!g.attach_fixed(c, b, CFrame::IDENTITY));
        assert!(!g.attach_with_constraint(c, b, HardConstraint::Fixed, CFrame::IDENTITY, CFrame::IDENTITY));
        assert_eq!(g.part(c).unwrap().parent(), None);
        assert_eq!(g.physical_count(), physicals);
        assert!(!g.attach_with_constraint(b, a, HardConstraint::Fixed, CFrame::IDENTITY, CFrame::IDENTITY));
    }

    #[test]
    fn merging_structures_keeps_world_frames() {
        let mut g = PhysicalGraph::new();
        let a = cube(&mut g, 0.0);
        let b = cube(&mut g, 10.0);
        let c = cube(&mut g, 11.0);
        g.attach_fixed(b, c, CFrame::from_translation(Vec3::new(1.0, 0.0, 0.0)));
        // Weld c (not b's main part) next to a; b must follow rigidly.
        assert!(g.attach_fixed(a, c, CFrame::from_translation(Vec3::new(0.0, 2.0, 0.0))));
        assert_eq!(g.physical_count(), 1);
        assert_relative_eq!(g.part(c).unwrap().position().y(), 2.0, epsilon = 1e-12);
        assert_relative_eq!(g.part(b).unwrap().position().x(), -1.0, epsilon = 1e-12);
        assert_relative_eq!(g.part(b).unwrap().position().y(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn make_main_part_preserves_positions_and_mass() {
        let mut g = PhysicalGraph::new();
        let a = cube(&mut g, 0.0);
        let b = cube(&mut g, 0.0);
        g.attach_fixed(a, b, CFrame::new(Vec3::new(2.0, 0.0, 0.0), Rotation::rot_y(0.3)));
        let before: Vec<_> = [a, b].iter().map(|&p| *g.part(p).unwrap().cframe()).collect();
        assert!(g.make_main_part(b));
        let root = g.root_of_part(a).unwrap();
        assert_eq!(g.physical(root).unwrap().rigid_body().main_part(), b);
        g.update_positions_from(root);
        for (p, old) in [a, b].iter().zip(before) {
            let now = g.part(*p).unwrap().cframe();
            assert!((now.position - old.position).length() < 1e-9);
        }
        let total = g.physical(root).unwrap().motorized().unwrap().total_mass_properties().mass;
        assert_relative_eq!(total, 2.0);
    }

    #[test]
    fn detach_orphans_children_as_roots() {
        let mut g = PhysicalGraph::new();
        let a = cube(&mut g, 0.0);
        let b = cube(&mut g, 0.0);
        let c = cube(&mut g, 0.0);
        g.attach_with_constraint(a, b, HardConstraint::Fixed, CFrame::IDENTITY, CFrame::IDENTITY);
        g.attach_with_constraint(b, c, HardConstraint::Fixed, CFrame::IDENTITY, CFrame::IDENTITY);
        let b_phys = g.part(b).unwrap().parent().unwrap();
        let c_phys = g.part(c).unwrap().parent().unwrap();
        assert_eq!(g.root_of(c_phys), g.root_of_part(a));

        assert_eq!(g.detach(b), Some(b_phys));
        assert!(g.physical(b_phys).unwrap().is_motorized());
        assert!(g.physical(c_phys).unwrap().is_motorized());
        assert_eq!(g.root_of(c_phys), Some(c_phys));
        let a_root = g.root_of_part(a).unwrap();
        assert!(g.physical(a_root).unwrap().children().is_empty());
        for root in [a_root, b_phys, c_phys] {
            g.validate_structure(root).unwrap();
        }
    }

    #[test]
    fn piston_moves_child_structure() {
        let mut g = PhysicalGraph::new();
        let a = cube(&mut g, 0.0);
        let b = cube(&mut g, 0.0);
        let piston = HardConstraint::SinusoidalPiston {
            min_value: 0.0,
            max_value: 2.0,
            period: 4.0,
            current_step_in_period: 0.0,
        };
        g.attach_with_constraint(a, b, piston, CFrame::IDENTITY, CFrame::IDENTITY);
        assert_relative_eq!(g.part(b).unwrap().position().z(), 1.0, epsilon = 1e-12);
        let roots = g.advance_hard_constraints(1.0);
        assert_eq!(roots.len(), 1);
        assert_relative_eq!(g.part(b).unwrap().position().z(), 2.0, epsilon = 1e-12);
    }

    #[test]
    fn set_part_cframe_moves_the_whole_structure() {
        let mut g = PhysicalGraph::new();
        let a = cube(&mut g, 0.0);
        let b = cube(&mut g, 0.0);
        g.attach_with_constraint(
            a,
            b,
            HardConstraint::Fixed,
            CFrame::from_translation(Vec3::new(1.0, 0.0, 0.0)),
            CFrame::IDENTITY,
        );
        assert!(g.set_part_cframe(b, GlobalCFrame::from_position(Position::new(10.0, 5.0, 0.0))));
        assert_relative_eq!(g.part(a).unwrap().position().x(), 9.0, epsilon = 1e-12);
        assert_relative_eq!(g.part(a).unwrap().position().y(), 5.0, epsilon = 1e-12);
    }
}
