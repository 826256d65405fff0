// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Spatial predicates used to prune tree traversals.

use p3d_geom::{Bounds, Position, Vec3};

/// Conservative spatial predicate.
///
/// `test_bounds` may accept boxes that contain nothing of interest, but must
/// never reject a box that does: traversals skip whole subtrees on `false`.
pub trait SpatialFilter {
    /// Whether anything inside `bounds` may pass.
    fn test_bounds(&self, bounds: &Bounds) -> bool;
    /// Whether `point` passes.
    fn test_point(&self, point: &Position) -> bool;
}

/// Accepts everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl SpatialFilter for AcceptAll {
    fn test_bounds(&self, _bounds: &Bounds) -> bool {
        true
    }

    fn test_point(&self, _point: &Position) -> bool {
        true
    }
}

/// Accepts whatever touches a fixed box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundsFilter {
    /// Query region.
    pub bounds: Bounds,
}

impl BoundsFilter {
    /// Filter over `bounds`.
    pub fn new(bounds: Bounds) -> Self {
        Self { bounds }
    }
}

impl SpatialFilter for BoundsFilter {
    fn test_bounds(&self, bounds: &Bounds) -> bool {
        self.bounds.intersects(bounds)
    }

    fn test_point(&self, point: &Position) -> bool {
        self.bounds.contains_point(point)
    }
}

/// View frustum: four side planes through `origin` plus a far plane at
/// `max_depth` along `forward`.
///
/// Plane normals point outward; a point is outside when its offset from
/// `origin` projects positively past the plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisibilityFilter {
    origin: Position,
    up: Vec3,
    down: Vec3,
    left: Vec3,
    right: Vec3,
    forward: Vec3,
    max_depth: f64,
}

impl VisibilityFilter {
    /// Frustum from explicit outward plane normals.
    pub fn from_normals(origin: Position, [up, down, left, right, forward]: [Vec3; 5], max_depth: f64) -> Self {
        Self { origin, up, down, left, right, forward, max_depth }
    }

    /// Frustum whose edges pass through `forward ± up` and `forward ± right`.
    pub fn from_steps(origin: Position, forward: Vec3, up: Vec3, right: Vec3, max_depth: f64) -> Self {
        Self::from_sub_steps(origin, forward, up, right, max_depth, [-1.0, 1.0, -1.0, 1.0])
    }

    /// Frustum over a sub-rectangle of the window given in normalised
    /// `[left, right, down, up]` coordinates (`-1..=1` spans the full window).
    pub fn from_sub_steps(
        origin: Position,
        forward: Vec3,
        up: Vec3,
        right: Vec3,
        max_depth: f64,
        [l, r, d, u]: [f64; 4],
    ) -> Self {
        let up_normal = (forward + up * u).cross(&right);
        let down_normal = -(forward + up * d).cross(&right);
        let left_normal = -(forward - right * l).cross(&up);
        let right_normal = (forward - right * r).cross(&up);
        Self::from_normals(origin, [up_normal, down_normal, left_normal, right_normal, forward], max_depth)
    }

    /// Frustum of a camera at `origin` with vertical field of view `fov`
    /// (radians) and `aspect` = width / height.
    pub fn for_window(origin: Position, camera_forward: Vec3, camera_up: Vec3, fov: f64, aspect: f64, max_depth: f64) -> Self {
        let (forward, up, right) = camera_steps(camera_forward, camera_up, fov, aspect);
        Self::from_steps(origin, forward, up, right, max_depth)
    }

    /// Like [`Self::for_window`] restricted to a sub-rectangle, in normalised
    /// `[left, right, down, up]` window coordinates.
    #[allow(clippy::too_many_arguments)]
    pub fn for_sub_window(
        origin: Position,
        camera_forward: Vec3,
        camera_up: Vec3,
        fov: f64,
        aspect: f64,
        max_depth: f64,
        window: [f64; 4],
    ) -> Self {
        let (forward, up, right) = camera_steps(camera_forward, camera_up, fov, aspect);
        Self::from_sub_steps(origin, forward, up, right, max_depth, window)
    }

    fn planes(&self) -> [(Vec3, f64); 5] {
        [
            (self.up, 0.0),
            (self.down, 0.0),
            (self.left, 0.0),
            (self.right, 0.0),
            (self.forward, self.max_depth),
        ]
    }
}

fn camera_steps(camera_forward: Vec3, camera_up: Vec3, fov: f64, aspect: f64) -> (Vec3, Vec3, Vec3) {
    let tan_fov = (fov / 2.0).tan();
    let forward = camera_forward.normalize();
    let up = camera_up.normalize() * tan_fov;
    let right = camera_up.cross(&camera_forward).normalize() * (tan_fov * aspect);
    (forward, up, right)
}

impl SpatialFilter for VisibilityFilter {
    fn test_bounds(&self, bounds: &Bounds) -> bool {
        let (min, max) = (bounds.min(), bounds.max());
        self.planes().iter().all(|(normal, offset)| {
            // Corner furthest along -normal: if even it is outside, the box is.
            let corner = Position::new(
                if normal.x() >= 0.0 { min.x() } else { max.x() },
                if normal.y() >= 0.0 { min.y() } else { max.y() },
                if normal.z() >= 0.0 { min.z() } else { max.z() },
            );
            (corner - self.origin).dot(normal) <= *offset
        })
    }

    fn test_point(&self, point: &Position) -> bool {
        let relative = *point - self.origin;
        self.planes().iter().all(|(normal, offset)| relative.dot(normal) <= *offset)
    }
}
