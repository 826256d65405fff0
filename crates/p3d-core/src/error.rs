// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Structural invariant violations reported by the validity checks.

use p3d_geom::Bounds;
use thiserror::Error;

use crate::ident::{LayerId, PartId, PhysicalId};

/// A broken structural invariant of a tree or world.
///
/// Mutation paths treat these as fatal; `validate` reports them so tests and
/// tooling can inspect what went wrong.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InvariantViolation {
    /// A group head was found inside another group.
    #[error("nested group head at depth {depth}")]
    NestedGroupHead {
        /// Depth of the offending node.
        depth: usize,
    },
    /// An internal node with fewer than two children.
    #[error("internal node at depth {depth} has {children} children")]
    DegenerateNode {
        /// Depth of the offending node.
        depth: usize,
        /// Its child count.
        children: usize,
    },
    /// An internal node with more children than the branching factor.
    #[error("node at depth {depth} has {children} children (capacity {capacity})")]
    BranchOverflow {
        /// Depth of the offending node.
        depth: usize,
        /// Its child count.
        children: usize,
        /// Branching factor of the tree.
        capacity: usize,
    },
    /// Cached bounds differ from the union of the children.
    #[error("stale bounds at depth {depth}: cached {cached:?}, recomputed {recomputed:?}")]
    StaleBounds {
        /// Depth of the offending node.
        depth: usize,
        /// Bounds stored in the node.
        cached: Bounds,
        /// Union of the children's bounds.
        recomputed: Bounds,
    },
    /// The tree's object counter disagrees with its leaves.
    #[error("tree object count {cached} does not match {actual} leaves")]
    ObjectCountMismatch {
        /// Stored counter.
        cached: usize,
        /// Leaves actually present.
        actual: usize,
    },
    /// A tree operation needed a root but the tree is empty.
    #[error("operation requires a non-empty tree")]
    EmptyTree,
    /// A tree operation named an object that is not stored with the given
    /// bounds.
    #[error("object not found in tree")]
    ObjectNotInTree,
    /// A group operation named an object stored outside every group.
    #[error("object is not part of a group")]
    NotInGroup,
    /// A part that should be indexed has no leaf in its layer's tree.
    #[error("part {part:?} missing from layer {layer:?}")]
    PartNotInTree {
        /// The missing part.
        part: PartId,
        /// Layer whose tree was searched.
        layer: LayerId,
    },
    /// A part's leaf bounds differ from its current world bounds.
    #[error("leaf bounds of part {part:?} are stale")]
    StaleLeafBounds {
        /// The part.
        part: PartId,
    },
    /// A tree leaf refers to a part the world does not index there.
    #[error("tree of layer {layer:?} holds unexpected part {part:?}")]
    UnexpectedLeaf {
        /// The part.
        part: PartId,
        /// Layer of the tree.
        layer: LayerId,
    },
    /// The parts of one physical in one layer are spread over several groups.
    #[error("parts of physical {physical:?} in layer {layer:?} are not in one group")]
    GroupSplit {
        /// The physical's root.
        physical: PhysicalId,
        /// The layer.
        layer: LayerId,
    },
    /// A part refers to a layer the world does not have.
    #[error("part {part:?} refers to unknown layer {layer:?}")]
    UnknownLayer {
        /// The part.
        part: PartId,
        /// Its layer.
        layer: LayerId,
    },
    /// `part.parent` does not own the part.
    #[error("parent of part {part:?} does not own it")]
    ParentMismatch {
        /// The part.
        part: PartId,
    },
    /// A physical's child does not point back at it.
    #[error("child of physical {physical:?} does not point back to it")]
    ChildParentMismatch {
        /// The parent physical.
        physical: PhysicalId,
    },
    /// A physical's `main_physical` is not the root of its structure.
    #[error("physical {physical:?} caches the wrong main physical")]
    MainPhysicalMismatch {
        /// The physical.
        physical: PhysicalId,
    },
    /// A handle stored in the structure no longer resolves.
    #[error("dangling handle in the physical graph")]
    DanglingHandle,
}
