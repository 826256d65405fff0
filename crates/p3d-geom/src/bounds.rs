// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Axis-aligned boxes in world space ([`Bounds`]) and local space
//! ([`BoundingBox`]).

use crate::math::{GlobalCFrame, Position, Vec3};

/// Axis-aligned bounding box in world coordinates.
///
/// Invariants:
/// - `min` components are less than or equal to `max` components.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Bounds {
    min: Position,
    max: Position,
}

impl Bounds {
    /// Constructs bounds from their minimum and maximum corners.
    ///
    /// # Panics
    /// Panics if any component of `min` is greater than its counterpart in `max`.
    #[must_use]
    pub fn new(min: Position, max: Position) -> Self {
        assert!(min.all_le(&max), "invalid bounds: min > max ({min:?} / {max:?})");
        Self { min, max }
    }

    /// Degenerate bounds around a single point.
    #[must_use]
    pub const fn from_point(p: Position) -> Self {
        Self { min: p, max: p }
    }

    /// Builds bounds centred at `center` with half-extents `half`.
    #[must_use]
    pub fn from_center_half_extents(center: Position, half: Vec3) -> Self {
        let half = Vec3::new(half.x().abs(), half.y().abs(), half.z().abs());
        Self { min: center - half, max: center + half }
    }

    /// Builds the minimal bounds that contain all `points`.
    ///
    /// # Panics
    /// Panics if `points` is empty.
    #[must_use]
    pub fn from_points(points: &[Position]) -> Self {
        assert!(!points.is_empty(), "from_points requires at least one point");
        let mut bounds = Self::from_point(points[0]);
        for p in &points[1..] {
            bounds = bounds.union_point(p);
        }
        bounds
    }

    /// Returns the minimum corner.
    #[must_use]
    pub const fn min(&self) -> Position {
        self.min
    }

    /// Returns the maximum corner.
    #[must_use]
    pub const fn max(&self) -> Position {
        self.max
    }

    /// Vector from `min` to `max`.
    #[must_use]
    pub fn diagonal(&self) -> Vec3 {
        self.max - self.min
    }

    /// Midpoint of the box.
    #[must_use]
    pub fn center(&self) -> Position {
        self.min + self.diagonal() * 0.5
    }

    /// Tree-quality metric: the sum of the extents along each axis.
    ///
    /// Only meaningful for comparing candidate layouts against each other.
    #[must_use]
    pub fn cost(&self) -> f64 {
        self.diagonal().component_sum()
    }

    /// Tightest box containing both inputs.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self { min: self.min.min(&other.min), max: self.max.max(&other.max) }
    }

    /// Tightest box containing `self` and `p`.
    #[must_use]
    pub fn union_point(&self, p: &Position) -> Self {
        Self { min: self.min.min(p), max: self.max.max(p) }
    }

    /// Returns `true` if the boxes overlap (inclusive on faces).
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        // Touching faces count as overlap for broad-phase pairing.
        self.min.all_le(&other.max) && other.min.all_le(&self.max)
    }

    /// Returns `true` if `other` lies entirely within `self` (inclusive).
    #[must_use]
    pub fn contains(&self, other: &Self) -> bool {
        self.min.all_le(&other.min) && other.max.all_le(&self.max)
    }

    /// Returns `true` if `p` lies within `self` (inclusive).
    #[must_use]
    pub fn contains_point(&self, p: &Position) -> bool {
        self.min.all_le(p) && p.all_le(&self.max)
    }

    /// Grows the box by `margin` on every side.
    ///
    /// # Panics
    /// Panics if a negative margin would invert the box.
    #[must_use]
    pub fn expanded(&self, margin: f64) -> Self {
        let delta = Vec3::splat(margin);
        Self::new(self.min - delta, self.max + delta)
    }

    /// Returns the box translated by `offset`.
    #[must_use]
    pub fn translated(&self, offset: Vec3) -> Self {
        Self { min: self.min + offset, max: self.max + offset }
    }
}

/// Axis-aligned box in a part's local frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BoundingBox {
    min: Vec3,
    max: Vec3,
}

impl BoundingBox {
    /// Constructs a local box from its corners.
    ///
    /// # Panics
    /// Panics if any component of `min` is greater than its counterpart in `max`.
    #[must_use]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        assert!(
            min.x() <= max.x() && min.y() <= max.y() && min.z() <= max.z(),
            "invalid bounding box: min > max"
        );
        Self { min, max }
    }

    /// Box spanning `[-half, half]` on each axis.
    #[must_use]
    pub fn from_half_extents(half: Vec3) -> Self {
        let half = Vec3::new(half.x().abs(), half.y().abs(), half.z().abs());
        Self { min: -half, max: half }
    }

    /// Minimum corner.
    #[must_use]
    pub const fn min(&self) -> Vec3 {
        self.min
    }

    /// Maximum corner.
    #[must_use]
    pub const fn max(&self) -> Vec3 {
        self.max
    }

    /// The eight corners of the box.
    #[must_use]
    pub fn corners(&self) -> [Vec3; 8] {
        let [minx, miny, minz] = self.min.to_array();
        let [maxx, maxy, maxz] = self.max.to_array();
        [
            Vec3::new(minx, miny, minz),
            Vec3::new(minx, miny, maxz),
            Vec3::new(minx, maxy, minz),
            Vec3::new(minx, maxy, maxz),
            Vec3::new(maxx, miny, minz),
            Vec3::new(maxx, miny, maxz),
            Vec3::new(maxx, maxy, minz),
            Vec3::new(maxx, maxy, maxz),
        ]
    }

    /// World-space bounds of this box placed at `cframe`.
    ///
    /// Evaluates the eight corners under the frame and builds the axis-aligned
    /// box containing them.
    #[must_use]
    pub fn transformed(&self, cframe: &GlobalCFrame) -> Bounds {
        let corners = self.corners();
        let mut bounds = Bounds::from_point(cframe.local_to_global(&corners[0]));
        for c in &corners[1..] {
            bounds = bounds.union_point(&cframe.local_to_global(c));
        }
        bounds
    }
}
