// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! The world: physical graph plus per-layer spatial indices kept in sync.
//!
//! Every structural mutation goes through [`World`], which removes the
//! affected structures from the trees, lets the [`PhysicalGraph`] rewire
//! ownership, and re-indexes whatever structures result. Usage errors
//! (re-adding a part, detaching a free part, ...) are logged and reported as
//! `false`/`None`. Broken invariants are logged at error level and the
//! first one is kept for [`World::invariant_violation`].

mod layer;
mod sync;

use std::collections::BTreeMap;

use p3d_geom::{Bounds, CFrame, GlobalCFrame};
use slotmap::{SecondaryMap, SlotMap};
use tracing::{debug, error, warn};

pub use layer::{CollisionLayer, LayerMatrix};
pub use sync::SynchronizedWorld;

use crate::bounds_tree::BoundsTree;
use crate::config::WorldConfig;
use crate::constraint::{ConstraintGroup, HardConstraint, PhysicalConstraint};
use crate::error::InvariantViolation;
use crate::filter::SpatialFilter;
use crate::force::ExternalForce;
use crate::ident::{ForceId, LayerId, PartId, PhysicalId};
use crate::motion::Motion;
use crate::part::{Part, PartProperties};
use crate::physical::{Physical, PhysicalGraph};
use crate::shape::Shape;

/// Which trees a part query visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartsFilter {
    /// Parts of in-world physicals.
    Free,
    /// Terrain parts.
    Terrain,
    /// Both.
    All,
}

impl PartsFilter {
    fn free(self) -> bool {
        matches!(self, Self::Free | Self::All)
    }

    fn terrain(self) -> bool {
        matches!(self, Self::Terrain | Self::All)
    }
}

/// Owner of parts, physicals, collision layers, constraints and forces.
#[derive(Debug, Clone)]
pub struct World {
    graph: PhysicalGraph,
    roots: Vec<PhysicalId>,
    layers: Vec<CollisionLayer>,
    collide: LayerMatrix,
    leaf_bounds: SecondaryMap<PartId, Bounds>,
    constraint_groups: Vec<ConstraintGroup>,
    forces: SlotMap<ForceId, ExternalForce>,
    age: u64,
    config: WorldConfig,
    violation: Option<InvariantViolation>,
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl World {
    /// World with the default layer plus the layers named in `config`.
    pub fn new(config: WorldConfig) -> Self {
        let mut world = Self {
            graph: PhysicalGraph::new(),
            roots: Vec::new(),
            layers: Vec::new(),
            collide: LayerMatrix::default(),
            leaf_bounds: SecondaryMap::new(),
            constraint_groups: Vec::new(),
            forces: SlotMap::with_key(),
            age: 0,
            config: WorldConfig::default(),
            violation: None,
        };
        world.layers.push(CollisionLayer::named("default"));
        world.collide.push(true, true);
        for layer in &config.layers {
            let id = world.create_layer(layer.collides_internally, layer.collides_with_others);
            world.layers[id.index()].name.clone_from(&layer.name);
        }
        world.config = config;
        world
    }

    /// Active configuration.
    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    /// Ownership graph (read-only).
    pub fn graph(&self) -> &PhysicalGraph {
        &self.graph
    }

    pub(crate) fn graph_mut(&mut self) -> &mut PhysicalGraph {
        &mut self.graph
    }

    /// Part lookup.
    pub fn part(&self, id: PartId) -> Option<&Part> {
        self.graph.part(id)
    }

    /// Physical lookup.
    pub fn physical(&self, id: PhysicalId) -> Option<&Physical> {
        self.graph.physical(id)
    }

    /// Roots of the structures in the world, in insertion order.
    pub fn physicals(&self) -> &[PhysicalId] {
        &self.roots
    }

    /// Simulation tick counter.
    pub fn age(&self) -> u64 {
        self.age
    }

    /// Advances the tick counter.
    pub fn advance_age(&mut self, ticks: u64) {
        self.age = self.age.wrapping_add(ticks);
    }

    pub(crate) fn set_age(&mut self, age: u64) {
        self.age = age;
    }

    // ---- layers -------------------------------------------------------

    /// Appends a collision layer.
    pub fn create_layer(&mut self, collides_internally: bool, collides_with_others: bool) -> LayerId {
        let id = LayerId(self.layers.len() as u32);
        self.layers.push(CollisionLayer::named(format!("layer {}", id.0)));
        self.collide.push(collides_internally, collides_with_others);
        debug!(layer = id.0, collides_internally, collides_with_others, "created layer");
        id
    }

    /// Number of layers.
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// Layer lookup.
    pub fn layer(&self, id: LayerId) -> Option<&CollisionLayer> {
        self.layers.get(id.index())
    }

    /// Every layer with its id, in creation order.
    pub fn layers(&self) -> impl Iterator<Item = (LayerId, &CollisionLayer)> {
        self.layers.iter().enumerate().map(|(i, layer)| (LayerId(i as u32), layer))
    }

    /// Whether parts of layers `a` and `b` are tested against each other.
    /// `false` if either layer is unknown.
    pub fn layers_collide(&self, a: LayerId, b: LayerId) -> bool {
        if !self.has_layer(a) || !self.has_layer(b) {
            warn!(?a, ?b, "layers_collide with unknown layer");
            return false;
        }
        self.collide.get(a.index(), b.index())
    }

    /// Sets the collision flag for `(a, b)` and `(b, a)`. Unknown layers are
    /// ignored.
    pub fn set_layers_collide(&mut self, a: LayerId, b: LayerId, collides: bool) {
        if !self.has_layer(a) || !self.has_layer(b) {
            warn!(?a, ?b, "set_layers_collide with unknown layer");
            return;
        }
        self.collide.set(a.index(), b.index(), collides);
    }

    /// The layer collision matrix.
    pub fn layer_matrix(&self) -> &LayerMatrix {
        &self.collide
    }

    pub(crate) fn replace_layer_matrix(&mut self, matrix: LayerMatrix) {
        while self.layers.len() < matrix.len() {
            let name = format!("layer {}", self.layers.len());
            self.layers.push(CollisionLayer::named(name));
        }
        self.collide = matrix;
    }

    fn has_layer(&self, layer: LayerId) -> bool {
        layer.index() < self.layers.len()
    }

    // ---- parts --------------------------------------------------------

    /// Creates a free part (not yet in the world).
    pub fn create_part(&mut self, shape: Shape, cframe: GlobalCFrame, properties: PartProperties) -> PartId {
        self.graph.create_part(shape, cframe, properties)
    }

    /// Adds `part`'s whole structure to the world, each part in its own
    /// layer.
    pub fn add_part(&mut self, part: PartId) -> bool {
        let Some(p) = self.graph.part(part) else {
            warn!(?part, "add_part with unknown part");
            return false;
        };
        if p.is_terrain() {
            warn!(?part, "part is already terrain");
            return false;
        }
        let Some(physical) = self.graph.ensure_has_parent(part) else { return false };
        let root = self.graph.root_of(physical).unwrap_or(physical);
        if self.graph.is_in_world(root) {
            warn!(?part, "attempting to re-add part to world");
            return false;
        }
        if let Some(bad) = self.graph.structure_parts(root).into_iter().find(|&q| !self.part_layer_is_valid(q)) {
            warn!(part = ?bad, "part refers to a layer this world does not have");
            return false;
        }
        self.index_structure(root);
        debug!(?root, parts = self.graph.structure_part_count(root), "added physical to world");
        self.after_mutation();
        true
    }

    /// Adds `part`'s structure like [`Self::add_part`] and pins it in place.
    pub fn add_anchored_part(&mut self, part: PartId) -> bool {
        self.add_part(part) && self.set_anchored(part, true)
    }

    /// Pins or releases the structure containing `part`.
    pub fn set_anchored(&mut self, part: PartId, anchored: bool) -> bool {
        let Some(root) = self.graph.root_of_part(part) else {
            warn!(?part, "set_anchored on a part without a physical");
            return false;
        };
        debug!(?root, anchored, "set anchored");
        self.graph.set_anchored(root, anchored)
    }

    /// Moves a free part to `layer`, then adds it like [`Self::add_part`].
    pub fn add_part_to_layer(&mut self, part: PartId, layer: LayerId) -> bool {
        if !self.has_layer(layer) {
            warn!(?layer, "unknown layer");
            return false;
        }
        if self.graph.root_of_part(part).is_some_and(|r| self.graph.is_in_world(r)) {
            warn!(?part, "attempting to re-add part to world");
            return false;
        }
        self.graph.set_part_layer(part, layer);
        self.add_part(part)
    }

    /// Adds a free part as terrain in the default layer.
    pub fn add_terrain_part(&mut self, part: PartId) -> bool {
        self.add_terrain_part_to_layer(part, LayerId::DEFAULT)
    }

    /// Adds a free part as terrain in `layer`.
    pub fn add_terrain_part_to_layer(&mut self, part: PartId, layer: LayerId) -> bool {
        if !self.has_layer(layer) {
            warn!(?layer, "unknown layer");
            return false;
        }
        let Some(p) = self.graph.part(part) else {
            warn!(?part, "add_terrain_part with unknown part");
            return false;
        };
        if p.is_terrain() || p.parent().is_some() {
            warn!(?part, "only free parts can become terrain");
            return false;
        }
        let bounds = p.bounds();
        self.graph.set_part_layer(part, layer);
        self.graph.set_part_terrain(part, true);
        self.layers[layer.index()].terrain.add(part, bounds);
        self.leaf_bounds.insert(part, bounds);
        self.after_mutation();
        true
    }

    /// Takes `part` out of the world. Attached parts are detached first;
    /// the part stays in the arena as a free part.
    pub fn remove_part(&mut self, part: PartId) -> bool {
        let Some(p) = self.graph.part(part) else {
            warn!(?part, "remove_part with unknown part");
            return false;
        };
        if p.is_terrain() {
            let layer = p.layer();
            if let Some(bounds) = self.leaf_bounds.remove(part) {
                let removed = self.layers[layer.index()].terrain.remove(part, &bounds);
                self.record(removed);
            }
            self.graph.set_part_terrain(part, false);
            self.after_mutation();
            return true;
        }
        if p.parent().is_none() {
            warn!(?part, "removing a part that is not in the world");
            return false;
        }
        self.restructure(&[part], |graph| graph.detach(part).is_some());
        if let Some(own) = self.graph.root_of_part(part) {
            if self.graph.is_in_world(own) {
                self.unindex_structure(own);
            }
            self.graph.dissolve(own);
        }
        self.prune_constraint_groups();
        self.after_mutation();
        true
    }

    /// Removes `part` from the world and drops it from the arena.
    pub fn destroy_part(&mut self, part: PartId) -> Option<Part> {
        let p = self.graph.part(part)?;
        if p.is_terrain() || p.parent().is_some() {
            self.remove_part(part);
        }
        self.graph.remove_free_part(part)
    }

    /// Takes the structure rooted at `root` out of the world; its parts stay
    /// attached.
    pub fn remove_physical(&mut self, root: PhysicalId) -> bool {
        if !self.graph.is_in_world(root) {
            warn!(?root, "physical is not a root in this world");
            return false;
        }
        self.unindex_structure(root);
        self.prune_constraint_groups();
        debug!(?root, "removed physical from world");
        self.after_mutation();
        true
    }

    /// Welds `new` to `existing`; see [`PhysicalGraph::attach_fixed`].
    pub fn attach_part(&mut self, existing: PartId, new: PartId, relative: CFrame) -> bool {
        let done = self.restructure(&[existing, new], |graph| graph.attach_fixed(existing, new, relative));
        self.after_mutation();
        done
    }

    /// Connects `new` below `existing`; see
    /// [`PhysicalGraph::attach_with_constraint`].
    pub fn attach_part_with_constraint(
        &mut self,
        existing: PartId,
        new: PartId,
        constraint: HardConstraint,
        attach_to_existing: CFrame,
        attach_to_new: CFrame,
    ) -> bool {
        let done = self.restructure(&[existing, new], |graph| {
            graph.attach_with_constraint(existing, new, constraint, attach_to_existing, attach_to_new)
        });
        self.after_mutation();
        done
    }

    /// Splits `part` off into its own physical, which stays in the world.
    pub fn detach_part(&mut self, part: PartId) -> bool {
        let done = self.restructure(&[part], |graph| graph.detach(part).is_some());
        self.after_mutation();
        done
    }

    /// Places `part` at `cframe`, moving its whole structure.
    pub fn set_part_cframe(&mut self, part: PartId, cframe: GlobalCFrame) -> bool {
        if !self.graph.set_part_cframe(part, cframe) {
            return false;
        }
        self.refresh_bounds_of_part(part);
        self.after_mutation();
        true
    }

    /// Replaces the shape of `part`.
    pub fn set_part_shape(&mut self, part: PartId, shape: Shape) -> bool {
        if !self.graph.set_part_shape(part, shape) {
            return false;
        }
        self.refresh_bounds_of_part(part);
        self.after_mutation();
        true
    }

    /// Sets the motion of a root physical.
    pub fn set_motion(&mut self, root: PhysicalId, motion: Motion) -> bool {
        self.graph.set_motion(root, motion)
    }

    /// Advances animated hard constraints and refreshes the moved structures'
    /// tree bounds.
    pub fn advance_hard_constraints(&mut self, dt: f64) {
        for root in self.graph.advance_hard_constraints(dt) {
            if self.graph.is_in_world(root) {
                self.refresh_structure_bounds(root);
            }
        }
        self.after_mutation();
    }

    /// Runs the configured number of `improve_structure` passes over every
    /// terrain tree.
    pub fn optimize_terrain(&mut self) {
        let passes = self.config.terrain_optimization_passes;
        for layer in &mut self.layers {
            let before = layer.terrain.total_cost();
            for _ in 0..passes {
                layer.terrain.improve_structure();
            }
            debug!(layer = %layer.name, passes, before, after = layer.terrain.total_cost(), "optimized terrain");
        }
        self.after_mutation();
    }

    // ---- constraints and forces --------------------------------------

    /// Registers soft constraints between in-world physicals.
    pub fn add_constraint_group(&mut self, constraints: Vec<PhysicalConstraint>) -> bool {
        for c in &constraints {
            for phys in [c.phys_a, c.phys_b] {
                let in_world = self.graph.root_of(phys).is_some_and(|r| self.graph.is_in_world(r));
                if !in_world {
                    warn!(?phys, "constraint references a physical outside the world");
                    return false;
                }
            }
        }
        self.constraint_groups.push(ConstraintGroup::new(constraints));
        true
    }

    /// Soft-constraint groups.
    pub fn constraint_groups(&self) -> &[ConstraintGroup] {
        &self.constraint_groups
    }

    fn prune_constraint_groups(&mut self) {
        let graph = &self.graph;
        let alive = |phys: PhysicalId| graph.root_of(phys).is_some_and(|r| graph.is_in_world(r));
        for group in &mut self.constraint_groups {
            group.constraints.retain(|c| alive(c.phys_a) && alive(c.phys_b));
        }
        self.constraint_groups.retain(|g| !g.constraints.is_empty());
    }

    /// Registers a world-wide force.
    pub fn add_external_force(&mut self, force: ExternalForce) -> ForceId {
        self.forces.insert(force)
    }

    /// Unregisters a force.
    pub fn remove_external_force(&mut self, id: ForceId) -> Option<ExternalForce> {
        let removed = self.forces.remove(id);
        if removed.is_none() {
            warn!(?id, "removing an external force that is not present");
        }
        removed
    }

    /// Registered forces.
    pub fn external_forces(&self) -> impl Iterator<Item = (ForceId, &ExternalForce)> {
        self.forces.iter()
    }

    // ---- queries ------------------------------------------------------

    /// Every indexed part selected by `filter`, layer by layer.
    pub fn iter_parts(&self, filter: PartsFilter) -> impl Iterator<Item = PartId> + '_ {
        self.layers.iter().flat_map(move |layer| {
            let free = filter.free().then(|| layer.free.iter()).into_iter().flatten();
            let terrain = filter.terrain().then(|| layer.terrain.iter()).into_iter().flatten();
            free.chain(terrain).map(|(part, _)| part)
        })
    }

    /// Calls `f` for every indexed part whose bounds pass `filter`.
    pub fn for_each_part_filtered(&self, filter: &impl SpatialFilter, mut f: impl FnMut(PartId, &Part)) {
        for layer in &self.layers {
            for tree in [&layer.free, &layer.terrain] {
                tree.for_each_filtered(filter, |id, _| {
                    if let Some(part) = self.graph.part(id) {
                        f(id, part);
                    }
                });
            }
        }
    }

    /// Calls `f` for every indexed part whose position passes `filter`;
    /// subtrees are pruned on their bounds first.
    pub fn for_each_part_centered_in(&self, filter: &impl SpatialFilter, mut f: impl FnMut(PartId, &Part)) {
        self.for_each_part_filtered(filter, |id, part| {
            if filter.test_point(&part.position()) {
                f(id, part);
            }
        });
    }

    /// Calls `f` for every pair of parts with intersecting bounds that may
    /// collide: never two parts of one structure, never terrain against
    /// terrain, and only across layers the matrix lets collide.
    pub fn for_each_colliding_pair(&self, mut f: impl FnMut(PartId, PartId)) {
        let root = |p: PartId| self.graph.root_of_part(p);
        let mut emit = |a: PartId, b: PartId| {
            if root(a).is_none() || root(a) != root(b) {
                f(a, b);
            }
        };
        for (i, li) in self.layers.iter().enumerate() {
            if self.collide.get(i, i) {
                li.free.for_each_colliding_pair(&mut emit);
                li.free.for_each_colliding_pair_between(&li.terrain, &mut emit);
            }
            for (j, lj) in self.layers.iter().enumerate().take(i) {
                if !self.collide.get(i, j) {
                    continue;
                }
                li.free.for_each_colliding_pair_between(&lj.free, &mut emit);
                li.free.for_each_colliding_pair_between(&lj.terrain, &mut emit);
                li.terrain.for_each_colliding_pair_between(&lj.free, &mut emit);
            }
        }
    }

    // ---- indexing -----------------------------------------------------

    fn part_layer_is_valid(&self, part: PartId) -> bool {
        self.graph.part(part).is_some_and(|p| self.has_layer(p.layer()))
    }

    /// Parts of a structure bucketed by layer, in structure order.
    fn parts_by_layer(&self, root: PhysicalId) -> BTreeMap<LayerId, Vec<PartId>> {
        let mut buckets: BTreeMap<LayerId, Vec<PartId>> = BTreeMap::new();
        for part in self.graph.structure_parts(root) {
            if let Some(p) = self.graph.part(part) {
                buckets.entry(p.layer()).or_default().push(part);
            }
        }
        buckets
    }

    /// Inserts one group per layer for the structure and marks it in-world.
    fn index_structure(&mut self, root: PhysicalId) {
        for (layer, parts) in self.parts_by_layer(root) {
            let members: Vec<(PartId, Bounds)> =
                parts.iter().filter_map(|&p| self.graph.part(p).map(|part| (p, part.bounds()))).collect();
            for &(p, bounds) in &members {
                self.leaf_bounds.insert(p, bounds);
            }
            if let Some(group) = BoundsTree::<PartId>::build_group(members) {
                self.layers[layer.index()].free.add_group(group);
            }
        }
        self.graph.set_in_world(root, true);
        if !self.roots.contains(&root) {
            self.roots.push(root);
        }
    }

    /// Removes the structure's groups and marks it out of the world.
    fn unindex_structure(&mut self, root: PhysicalId) {
        for (layer, parts) in self.parts_by_layer(root) {
            let Some(&member) = parts.first() else { continue };
            let Some(bounds) = self.leaf_bounds.get(member).copied() else { continue };
            let removed = self.layers[layer.index()].free.remove_group(member, &bounds).map(drop);
            self.record(removed);
            for p in parts {
                self.leaf_bounds.remove(p);
            }
        }
        self.graph.set_in_world(root, false);
        self.roots.retain(|&r| r != root);
    }

    /// Runs a graph mutation touching `parts`, taking every affected in-world
    /// structure out of the trees first and indexing whatever structures
    /// result afterwards.
    fn restructure(&mut self, parts: &[PartId], op: impl FnOnce(&mut PhysicalGraph) -> bool) -> bool {
        let mut old_roots: Vec<PhysicalId> = Vec::new();
        for &p in parts {
            if let Some(r) = self.graph.root_of_part(p) {
                if !old_roots.contains(&r) {
                    old_roots.push(r);
                }
            }
        }
        let in_world: Vec<PhysicalId> = old_roots.iter().copied().filter(|&r| self.graph.is_in_world(r)).collect();
        let mut touched: Vec<PartId> = in_world.iter().flat_map(|&r| self.graph.structure_parts(r)).collect();
        for &r in &in_world {
            self.unindex_structure(r);
        }

        let done = op(&mut self.graph);

        if !in_world.is_empty() {
            if done {
                touched.extend_from_slice(parts);
            }
            let mut new_roots: Vec<PhysicalId> = Vec::new();
            for p in touched {
                if let Some(r) = self.graph.root_of_part(p) {
                    if !new_roots.contains(&r) {
                        new_roots.push(r);
                    }
                }
            }
            for r in new_roots {
                self.index_structure(r);
            }
        }
        self.prune_constraint_groups();
        done
    }

    fn refresh_bounds_of_part(&mut self, part: PartId) {
        let Some(p) = self.graph.part(part) else { return };
        if p.is_terrain() {
            let new_bounds = p.bounds();
            let layer = p.layer().index();
            if let Some(old) = self.leaf_bounds.insert(part, new_bounds) {
                let updated = self.layers[layer].terrain.update_object_bounds(part, &old, new_bounds);
                self.record(updated);
            }
        } else if let Some(root) = self.graph.root_of_part(part) {
            if self.graph.is_in_world(root) {
                self.refresh_structure_bounds(root);
            }
        }
    }

    /// Re-reads the bounds of every part of an in-world structure.
    fn refresh_structure_bounds(&mut self, root: PhysicalId) {
        for (layer, parts) in self.parts_by_layer(root) {
            let Some(&member) = parts.first() else { continue };
            let Some(old) = self.leaf_bounds.get(member).copied() else { continue };
            let graph = &self.graph;
            let updated = self.layers[layer.index()]
                .free
                .update_group_bounds(member, &old, |p| graph.part(p).map(Part::bounds).unwrap_or(old));
            self.record(updated);
            for p in parts {
                if let Some(part) = self.graph.part(p) {
                    self.leaf_bounds.insert(p, part.bounds());
                }
            }
        }
    }

    // ---- validity -----------------------------------------------------

    /// Checks every tree and the world-level invariants.
    pub fn validate(&self) -> Result<(), InvariantViolation> {
        for layer in &self.layers {
            layer.free.validate()?;
            layer.terrain.validate()?;
        }
        let mut indexed_free = 0;
        for &root in &self.roots {
            if !self.graph.is_in_world(root) {
                return Err(InvariantViolation::MainPhysicalMismatch { physical: root });
            }
            self.graph.validate_structure(root)?;
            for (layer, parts) in self.parts_by_layer(root) {
                let Some(tree) = self.layers.get(layer.index()).map(|l| &l.free) else {
                    return Err(InvariantViolation::UnknownLayer { part: parts[0], layer });
                };
                let mut head = None;
                for &part in &parts {
                    let cached = self.leaf_bounds.get(part).ok_or(InvariantViolation::PartNotInTree { part, layer })?;
                    let stack = tree.find(part, cached).ok_or(InvariantViolation::PartNotInTree { part, layer })?;
                    if self.graph.part(part).map(Part::bounds) != Some(*cached) {
                        return Err(InvariantViolation::StaleLeafBounds { part });
                    }
                    let this_head = tree.group_head_of(&stack);
                    if let Some(first) = &head {
                        if *first != this_head {
                            return Err(InvariantViolation::GroupSplit { physical: root, layer });
                        }
                    } else {
                        head = Some(this_head);
                    }
                }
                indexed_free += parts.len();
            }
        }
        for (index, layer) in self.layers.iter().enumerate() {
            let layer_id = LayerId(index as u32);
            for (part, _) in layer.terrain.iter() {
                let ok = self.graph.part(part).is_some_and(|p| p.is_terrain() && p.layer() == layer_id);
                if !ok {
                    return Err(InvariantViolation::UnexpectedLeaf { part, layer: layer_id });
                }
            }
            for (part, _) in layer.free.iter() {
                let ok = self.graph.part(part).is_some_and(|p| !p.is_terrain() && p.layer() == layer_id)
                    && self.graph.root_of_part(part).is_some_and(|r| self.graph.is_in_world(r));
                if !ok {
                    return Err(InvariantViolation::UnexpectedLeaf { part, layer: layer_id });
                }
            }
        }
        let total_free: usize = self.layers.iter().map(|l| l.free.len()).sum();
        if total_free != indexed_free {
            return Err(InvariantViolation::ObjectCountMismatch { cached: total_free, actual: indexed_free });
        }
        Ok(())
    }

    /// First invariant violation seen by a mutation, if any. Checked after
    /// every structural operation when `validate_after_mutation` is set.
    pub fn invariant_violation(&self) -> Option<&InvariantViolation> {
        self.violation.as_ref()
    }

    fn record(&mut self, result: Result<(), InvariantViolation>) {
        if let Err(violation) = result {
            error!(%violation, "world invariant violated");
            self.violation.get_or_insert(violation);
        }
    }

    fn after_mutation(&mut self) {
        if self.config.validate_after_mutation && self.violation.is_none() {
            let checked = self.validate();
            self.record(checked);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::filter::BoundsFilter;
    use p3d_geom::{Position, Vec3};

    fn world() -> World {
        World::new(WorldConfig { validate_after_mutation: true, ..WorldConfig::default() })
    }

    fn cube_at(world: &mut World, x: f64) -> PartId {
        world.create_part(
            Shape::cuboid(1.0, 1.0, 1.0),
            GlobalCFrame::from_position(Position::new(x, 0.0, 0.0)),
            PartProperties::default(),
        )
    }

    #[test]
    fn adding_twice_is_a_usage_error() {
        let mut w = world();
        let a = cube_at(&mut w, 0.0);
        assert!(w.add_part(a));
        assert!(!w.add_part(a));
        assert_eq!(w.physicals().len(), 1);
        assert_eq!(w.iter_parts(PartsFilter::Free).count(), 1);
    }

    #[test]
    fn attaching_into_world_indexes_the_new_part() {
        let mut w = world();
        let a = cube_at(&mut w, 0.0);
        let b = cube_at(&mut w, 9.0);
        w.add_part(a);
        assert!(w.attach_part(a, b, CFrame::from_translation(Vec3::new(1.0, 0.0, 0.0))));
        assert_eq!(w.iter_parts(PartsFilter::All).count(), 2);
        assert_eq!(w.physicals().len(), 1);
        w.validate().unwrap();
    }

    #[test]
    fn detach_keeps_part_in_world_and_remove_frees_it() {
        let mut w = world();
        let a = cube_at(&mut w, 0.0);
        let b = cube_at(&mut w, 0.0);
        w.add_part(a);
        w.attach_part(a, b, CFrame::from_translation(Vec3::new(1.0, 0.0, 0.0)));
        assert!(w.detach_part(b));
        assert_eq!(w.physicals().len(), 2);
        assert!(w.remove_part(b));
        assert_eq!(w.physicals().len(), 1);
        assert!(w.part(b).unwrap().parent().is_none());
        assert!(!w.remove_part(b));
        assert!(w.destroy_part(b).is_some());
        assert!(w.part(b).is_none());
        assert!(w.invariant_violation().is_none());
    }

    #[test]
    fn colliding_pairs_skip_own_structure_and_terrain_pairs() {
        let mut w = world();
        let a = cube_at(&mut w, 0.0);
        let b = cube_at(&mut w, 0.0);
        w.add_part(a);
        w.attach_part(a, b, CFrame::from_translation(Vec3::new(0.5, 0.0, 0.0)));
        let c = cube_at(&mut w, 1.2);
        w.add_part(c);
        let t1 = cube_at(&mut w, -0.5);
        let t2 = cube_at(&mut w, -0.6);
        w.add_terrain_part(t1);
        w.add_terrain_part(t2);

        let mut pairs = Vec::new();
        w.for_each_colliding_pair(|x, y| pairs.push((x, y)));
        let has = |x: PartId, y: PartId| pairs.iter().any(|&(p, q)| (p, q) == (x, y) || (p, q) == (y, x));
        assert!(!has(a, b));
        assert!(has(b, c));
        assert!(has(a, t1));
        assert!(!has(t1, t2));
        assert!(w.invariant_violation().is_none());
    }

    #[test]
    fn stale_leaf_bounds_are_latched_not_fatal() {
        let mut w = world();
        let t = cube_at(&mut w, 0.0);
        assert!(w.add_terrain_part(t));
        w.leaf_bounds.insert(t, Bounds::new(Position::new(7.0, 7.0, 7.0), Position::new(8.0, 8.0, 8.0)));
        assert!(w.remove_part(t));
        assert_eq!(w.invariant_violation(), Some(&InvariantViolation::ObjectNotInTree));
        assert!(w.validate().is_err());
    }

    #[test]
    fn layer_matrix_gates_cross_layer_pairs() {
        let mut w = world();
        let ghost = w.create_layer(false, false);
        let a = cube_at(&mut w, 0.0);
        let b = cube_at(&mut w, 0.5);
        w.add_part(a);
        w.add_part_to_layer(b, ghost);
        let mut count = 0;
        w.for_each_colliding_pair(|_, _| count += 1);
        assert_eq!(count, 0);
        w.set_layers_collide(ghost, LayerId::DEFAULT, true);
        w.for_each_colliding_pair(|_, _| count += 1);
        assert_eq!(count, 1);
    }

    #[test]
    fn moving_a_part_refreshes_tree_bounds() {
        let mut w = world();
        let a = cube_at(&mut w, 0.0);
        w.add_part(a);
        w.set_part_cframe(a, GlobalCFrame::from_position(Position::new(50.0, 0.0, 0.0)));
        let filter = BoundsFilter::new(Bounds::new(Position::new(49.0, -1.0, -1.0), Position::new(51.0, 1.0, 1.0)));
        let mut hits = Vec::new();
        w.for_each_part_filtered(&filter, |id, _| hits.push(id));
        assert_eq!(hits, vec![a]);
    }

    #[test]
    fn constraint_groups_are_pruned_with_their_physicals() {
        let mut w = world();
        let a = cube_at(&mut w, 0.0);
        let b = cube_at(&mut w, 3.0);
        w.add_part(a);
        w.add_part(b);
        let pa = w.part(a).unwrap().parent().unwrap();
        let pb = w.part(b).unwrap().parent().unwrap();
        let constraint = crate::constraint::Constraint::Ball { attach_a: Vec3::ZERO, attach_b: Vec3::ZERO };
        assert!(w.add_constraint_group(vec![PhysicalConstraint { phys_a: pa, phys_b: pb, constraint }]));
        assert_eq!(w.constraint_groups().len(), 1);
        w.remove_physical(pb);
        assert!(w.constraint_groups().is_empty());
    }

    #[test]
    fn anchored_structures_refuse_motion() {
        let mut w = world();
        let a = cube_at(&mut w, 0.0);
        let b = cube_at(&mut w, 4.0);
        assert!(w.add_anchored_part(a));
        w.attach_part(a, b, CFrame::from_translation(Vec3::new(1.0, 0.0, 0.0)));
        let root = w.part(b).unwrap().parent().unwrap();
        assert!(w.physical(root).unwrap().motorized().unwrap().anchored());
        let spin = Motion { angular_velocity: Vec3::new(0.0, 1.0, 0.0), ..Motion::default() };
        assert!(!w.set_motion(root, spin));
        assert!(w.set_anchored(b, false));
        assert!(w.set_motion(root, spin));
        assert!(w.set_anchored(a, true));
        assert_eq!(w.physical(root).unwrap().motorized().unwrap().motion, Motion::default());
        let free = cube_at(&mut w, 9.0);
        assert!(!w.set_anchored(free, true));
    }

    #[test]
    fn forces_are_registered_and_removed() {
        let mut w = world();
        let id = w.add_external_force(ExternalForce::earth_gravity());
        assert_eq!(w.external_forces().count(), 1);
        assert!(w.remove_external_force(id).is_some());
        assert!(w.remove_external_force(id).is_none());
    }
}
