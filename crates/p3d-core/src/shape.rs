// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Part geometry: shape classes and their scaled instances.
//!
//! Every class describes a unit instance that spans `[-1, 1]` on each axis
//! (polyhedra use their own vertex coordinates). A [`Shape`] scales that
//! instance to `width × height × depth`, so the scale factor per axis is half
//! the corresponding dimension.

use std::f64::consts::PI;
use std::sync::Arc;

use p3d_geom::{BoundingBox, Mat3, Vec3};
use thiserror::Error;

/// Triangle-mesh solid. Triangles are wound counter-clockwise seen from
/// outside.
#[derive(Debug, Clone, PartialEq)]
pub struct PolyhedronShape {
    vertices: Vec<[f32; 3]>,
    triangles: Vec<[u32; 3]>,
}

/// Rejected polyhedron mesh.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolyhedronError {
    /// No triangles or no vertices.
    #[error("polyhedron needs at least one triangle")]
    Empty,
    /// A triangle refers past the vertex list.
    #[error("triangle {triangle} uses vertex {index} but only {vertex_count} vertices exist")]
    IndexOutOfRange {
        /// Offending triangle.
        triangle: usize,
        /// Its bad index.
        index: u32,
        /// Number of vertices.
        vertex_count: usize,
    },
}

impl PolyhedronShape {
    /// Builds a polyhedron after checking every triangle index.
    pub fn new(vertices: Vec<[f32; 3]>, triangles: Vec<[u32; 3]>) -> Result<Self, PolyhedronError> {
        if vertices.is_empty() || triangles.is_empty() {
            return Err(PolyhedronError::Empty);
        }
        for (triangle, tri) in triangles.iter().enumerate() {
            for &index in tri {
                if index as usize >= vertices.len() {
                    return Err(PolyhedronError::IndexOutOfRange { triangle, index, vertex_count: vertices.len() });
                }
            }
        }
        Ok(Self { vertices, triangles })
    }

    /// Right-angled wedge filling half of `[-1, 1]³` (the half below the
    /// plane `y = -z`).
    pub fn wedge() -> Self {
        let vertices = vec![
            [-1.0, -1.0, -1.0],
            [1.0, -1.0, -1.0],
            [1.0, -1.0, 1.0],
            [-1.0, -1.0, 1.0],
            [-1.0, 1.0, -1.0],
            [1.0, 1.0, -1.0],
        ];
        let triangles = vec![
            [0, 1, 2],
            [0, 2, 3],
            [0, 4, 5],
            [0, 5, 1],
            [0, 3, 4],
            [1, 5, 2],
            [2, 5, 4],
            [2, 4, 3],
        ];
        Self { vertices, triangles }
    }

    /// Vertex coordinates.
    pub fn vertices(&self) -> &[[f32; 3]] {
        &self.vertices
    }

    /// Vertex index triples.
    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    fn vertex(&self, index: u32) -> Vec3 {
        Vec3::from(self.vertices[index as usize])
    }

    /// Signed tetrahedra `(origin, a, b, c)` fanned over every triangle.
    fn tetrahedra(&self) -> impl Iterator<Item = (Vec3, Vec3, Vec3, f64)> + '_ {
        self.triangles.iter().map(|&[a, b, c]| {
            let (a, b, c) = (self.vertex(a), self.vertex(b), self.vertex(c));
            let volume = a.dot(&b.cross(&c)) / 6.0;
            (a, b, c, volume)
        })
    }

    fn volume(&self) -> f64 {
        self.tetrahedra().map(|(.., v)| v).sum()
    }

    fn center_of_mass(&self) -> Vec3 {
        let volume = self.volume();
        if volume.abs() < f64::EPSILON {
            return Vec3::ZERO;
        }
        let weighted = self.tetrahedra().fold(Vec3::ZERO, |acc, (a, b, c, v)| acc + (a + b + c) * (v / 4.0));
        weighted / volume
    }

    /// `∫ r rᵀ dV` around the local origin.
    fn second_moment(&self) -> Mat3 {
        self.tetrahedra().fold(Mat3::ZERO, |acc, (a, b, c, v)| {
            let s = a + b + c;
            let sum = Mat3::outer(&a, &a) + Mat3::outer(&b, &b) + Mat3::outer(&c, &c) + Mat3::outer(&s, &s);
            acc + sum * (v / 20.0)
        })
    }

    fn local_bounds(&self) -> BoundingBox {
        let mut min = Vec3::splat(f64::INFINITY);
        let mut max = Vec3::splat(f64::NEG_INFINITY);
        for &v in &self.vertices {
            let v = Vec3::from(v);
            min = min.min(&v);
            max = max.max(&v);
        }
        BoundingBox::new(min, max)
    }
}

/// Closed set of shape classes.
///
/// The three builtin classes are implicitly known to every serialization
/// session; polyhedra travel through the shared-object registry.
#[derive(Debug, Clone, PartialEq)]
pub enum ShapeClass {
    /// Axis-aligned box.
    Box,
    /// Ellipsoid inscribed in the unit box.
    Sphere,
    /// Elliptic cylinder along local Z.
    Cylinder,
    /// Arbitrary closed triangle mesh.
    Polyhedron(Arc<PolyhedronShape>),
}

impl ShapeClass {
    /// Short human-readable class name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Box => "box",
            Self::Sphere => "sphere",
            Self::Cylinder => "cylinder",
            Self::Polyhedron(_) => "polyhedron",
        }
    }

    /// Volume of the unit instance.
    pub fn unit_volume(&self) -> f64 {
        match self {
            Self::Box => 8.0,
            Self::Sphere => 4.0 / 3.0 * PI,
            Self::Cylinder => 2.0 * PI,
            Self::Polyhedron(p) => p.volume(),
        }
    }

    /// Centre of mass of the unit instance.
    pub fn unit_center_of_mass(&self) -> Vec3 {
        match self {
            Self::Box | Self::Sphere | Self::Cylinder => Vec3::ZERO,
            Self::Polyhedron(p) => p.center_of_mass(),
        }
    }

    /// `∫ r rᵀ dV` of the unit instance around its local origin.
    pub fn unit_second_moment(&self) -> Mat3 {
        match self {
            Self::Box => Mat3::from_diagonal(8.0 / 3.0, 8.0 / 3.0, 8.0 / 3.0),
            Self::Sphere => {
                let m = 4.0 * PI / 15.0;
                Mat3::from_diagonal(m, m, m)
            }
            Self::Cylinder => Mat3::from_diagonal(PI / 2.0, PI / 2.0, 2.0 * PI / 3.0),
            Self::Polyhedron(p) => p.second_moment(),
        }
    }

    /// Local bounding box of the unit instance.
    pub fn unit_bounds(&self) -> BoundingBox {
        match self {
            Self::Box | Self::Sphere | Self::Cylinder => BoundingBox::from_half_extents(Vec3::splat(1.0)),
            Self::Polyhedron(p) => p.local_bounds(),
        }
    }

    fn unit_max_radius(&self, scale: &Vec3) -> f64 {
        match self {
            Self::Box => scale.length(),
            Self::Sphere => scale.x().max(scale.y()).max(scale.z()),
            Self::Cylinder => scale.x().max(scale.y()).hypot(scale.z()),
            Self::Polyhedron(p) => p
                .vertices
                .iter()
                .map(|&v| Vec3::from(v).mul_elementwise(scale).length())
                .fold(0.0, f64::max),
        }
    }
}

/// A shape class scaled to concrete dimensions.
#[derive(Debug, Clone, PartialEq)]
pub struct Shape {
    /// Geometry class.
    pub class: ShapeClass,
    /// Extent along local X.
    pub width: f64,
    /// Extent along local Y.
    pub height: f64,
    /// Extent along local Z.
    pub depth: f64,
}

impl Shape {
    /// Shape of `class` with the given dimensions.
    pub fn new(class: ShapeClass, width: f64, height: f64, depth: f64) -> Self {
        Self { class, width, height, depth }
    }

    /// Box of the given dimensions.
    pub fn cuboid(width: f64, height: f64, depth: f64) -> Self {
        Self::new(ShapeClass::Box, width, height, depth)
    }

    /// Sphere of the given radius.
    pub fn sphere(radius: f64) -> Self {
        Self::new(ShapeClass::Sphere, radius * 2.0, radius * 2.0, radius * 2.0)
    }

    /// Cylinder along Z.
    pub fn cylinder(radius: f64, height: f64) -> Self {
        Self::new(ShapeClass::Cylinder, radius * 2.0, radius * 2.0, height)
    }

    /// Per-axis factor applied to the unit instance.
    pub fn scale(&self) -> Vec3 {
        Vec3::new(self.width / 2.0, self.height / 2.0, self.depth / 2.0)
    }

    /// Volume.
    pub fn volume(&self) -> f64 {
        let s = self.scale();
        self.class.unit_volume() * s.x() * s.y() * s.z()
    }

    /// Centre of mass in the shape's local frame.
    pub fn center_of_mass(&self) -> Vec3 {
        self.class.unit_center_of_mass().mul_elementwise(&self.scale())
    }

    /// Inertia at unit density around the centre of mass, local axes.
    pub fn inertia(&self) -> Mat3 {
        let s = self.scale();
        let det = s.x() * s.y() * s.z();
        let scale = Mat3::from_diagonal(s.x(), s.y(), s.z());
        let moment = scale * self.class.unit_second_moment() * scale * det;
        let around_origin = Mat3::IDENTITY * moment.trace() - moment;
        // Shift from the local origin to the centre of mass.
        around_origin + Mat3::skew_symmetric_squared(&self.center_of_mass()) * self.volume()
    }

    /// Local bounding box.
    pub fn local_bounds(&self) -> BoundingBox {
        let s = self.scale();
        let unit = self.class.unit_bounds();
        BoundingBox::new(unit.min().mul_elementwise(&s), unit.max().mul_elementwise(&s))
    }

    /// Largest distance from the local origin to any point of the shape.
    pub fn max_radius(&self) -> f64 {
        self.class.unit_max_radius(&self.scale())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn unit_cube_mass_properties() {
        let cube = Shape::cuboid(1.0, 1.0, 1.0);
        assert_relative_eq!(cube.volume(), 1.0);
        let inertia = cube.inertia();
        for i in 0..3 {
            assert_relative_eq!(inertia.get(i, i), 1.0 / 6.0, epsilon = 1e-12);
        }
        assert_relative_eq!(inertia.get(0, 1), 0.0);
    }

    #[test]
    fn sphere_and_cylinder_match_closed_forms() {
        let r = 0.5;
        let sphere = Shape::sphere(r);
        assert_relative_eq!(sphere.volume(), 4.0 / 3.0 * PI * r * r * r, epsilon = 1e-12);
        let m = sphere.volume();
        assert_relative_eq!(sphere.inertia().get(0, 0), 0.4 * m * r * r, epsilon = 1e-12);

        let cyl = Shape::cylinder(1.0, 2.0);
        let m = cyl.volume();
        assert_relative_eq!(m, 2.0 * PI, epsilon = 1e-12);
        assert_relative_eq!(cyl.inertia().get(2, 2), 0.5 * m, epsilon = 1e-12);
        assert_relative_eq!(cyl.inertia().get(0, 0), m * (3.0 + 4.0) / 12.0, epsilon = 1e-12);
    }

    #[test]
    fn polyhedron_cube_matches_builtin_box() {
        let vertices = vec![
            [-1.0, -1.0, -1.0],
            [1.0, -1.0, -1.0],
            [1.0, 1.0, -1.0],
            [-1.0, 1.0, -1.0],
            [-1.0, -1.0, 1.0],
            [1.0, -1.0, 1.0],
            [1.0, 1.0, 1.0],
            [-1.0, 1.0, 1.0],
        ];
        let triangles = vec![
            [0, 2, 1],
            [0, 3, 2],
            [4, 5, 6],
            [4, 6, 7],
            [0, 1, 5],
            [0, 5, 4],
            [3, 7, 6],
            [3, 6, 2],
            [0, 4, 7],
            [0, 7, 3],
            [1, 2, 6],
            [1, 6, 5],
        ];
        let poly = Shape::new(ShapeClass::Polyhedron(Arc::new(PolyhedronShape::new(vertices, triangles).unwrap())), 3.0, 2.0, 1.0);
        let cube = Shape::cuboid(3.0, 2.0, 1.0);
        assert_relative_eq!(poly.volume(), cube.volume(), epsilon = 1e-9);
        assert!(poly.center_of_mass().length() < 1e-9);
        assert!(poly.inertia().max_abs_diff(&cube.inertia()) < 1e-9);
    }

    #[test]
    fn wedge_has_half_the_box_volume_and_offset_centroid() {
        let wedge = Shape::new(ShapeClass::Polyhedron(Arc::new(PolyhedronShape::wedge())), 2.0, 2.0, 2.0);
        assert_relative_eq!(wedge.volume(), 4.0, epsilon = 1e-9);
        let com = wedge.center_of_mass();
        assert_relative_eq!(com.y(), -1.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(com.z(), -1.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn bad_triangle_index_is_rejected() {
        let err = PolyhedronShape::new(vec![[0.0; 3]; 3], vec![[0, 1, 3]]).unwrap_err();
        assert_eq!(err, PolyhedronError::IndexOutOfRange { triangle: 0, index: 3, vertex_count: 3 });
    }
}
