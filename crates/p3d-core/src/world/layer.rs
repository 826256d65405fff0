// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Collision layers and the symmetric layer-collision matrix.

use crate::bounds_tree::BoundsTree;
use crate::ident::PartId;

/// Spatial indices of one collision layer.
#[derive(Debug, Clone, Default)]
pub struct CollisionLayer {
    pub(crate) name: String,
    /// Parts of in-world physicals, one group per physical structure.
    pub(crate) free: BoundsTree<PartId>,
    /// Static terrain parts, ungrouped.
    pub(crate) terrain: BoundsTree<PartId>,
}

impl CollisionLayer {
    pub(crate) fn named(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Index of the parts of in-world physicals.
    pub fn free_tree(&self) -> &BoundsTree<PartId> {
        &self.free
    }

    /// Index of terrain parts.
    pub fn terrain_tree(&self) -> &BoundsTree<PartId> {
        &self.terrain
    }
}

/// Lower-triangular storage of a symmetric `n × n` boolean matrix.
///
/// Entry `(i, j)` with `j ≤ i` lives at `i (i + 1) / 2 + j`, which is also
/// the order the flags are written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LayerMatrix {
    size: usize,
    flags: Vec<bool>,
}

impl LayerMatrix {
    fn index(i: usize, j: usize) -> usize {
        let (hi, lo) = if i >= j { (i, j) } else { (j, i) };
        hi * (hi + 1) / 2 + lo
    }

    /// Number of layers.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the matrix has no layers.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    fn contains(&self, i: usize, j: usize) -> bool {
        i < self.size && j < self.size
    }

    /// Whether layers `i` and `j` collide; `false` when either index is out
    /// of range.
    pub fn get(&self, i: usize, j: usize) -> bool {
        self.contains(i, j) && self.flags[Self::index(i, j)]
    }

    /// Sets the flag for both `(i, j)` and `(j, i)`. Returns `false`, leaving
    /// the matrix unchanged, when either index is out of range.
    pub fn set(&mut self, i: usize, j: usize, collides: bool) -> bool {
        if !self.contains(i, j) {
            return false;
        }
        self.flags[Self::index(i, j)] = collides;
        true
    }

    /// Appends a layer: `collides_with_others` against every existing layer,
    /// `collides_internally` against itself.
    pub fn push(&mut self, collides_internally: bool, collides_with_others: bool) {
        self.flags.extend(core::iter::repeat_n(collides_with_others, self.size));
        self.flags.push(collides_internally);
        self.size += 1;
    }

    /// Flags in storage order (`i ∈ 0..n`, `j ∈ 0..=i`).
    pub fn flags(&self) -> &[bool] {
        &self.flags
    }

    /// Rebuilds a matrix from flags in storage order.
    pub(crate) fn from_flags(size: usize, flags: Vec<bool>) -> Option<Self> {
        (flags.len() == size * (size + 1) / 2).then_some(Self { size, flags })
    }
}
