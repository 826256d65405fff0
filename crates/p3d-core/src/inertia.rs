// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Mass, centre of mass and inertia of composite bodies.

use p3d_geom::{CFrame, Mat3, Vec3};

/// Mass properties of a body in some reference frame.
///
/// `inertia` is taken around `center_of_mass`, with the axes of the
/// reference frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MassProperties {
    /// Total mass.
    pub mass: f64,
    /// Centre of mass in the reference frame.
    pub center_of_mass: Vec3,
    /// Inertia tensor around the centre of mass.
    pub inertia: Mat3,
}

impl Default for MassProperties {
    fn default() -> Self {
        Self::ZERO
    }
}

impl MassProperties {
    /// No mass anywhere.
    pub const ZERO: Self = Self { mass: 0.0, center_of_mass: Vec3::ZERO, inertia: Mat3::ZERO };

    /// Re-expresses properties given in a child frame in the frame where the
    /// child sits at `cframe`.
    #[must_use]
    pub fn transformed(&self, cframe: &CFrame) -> Self {
        Self {
            mass: self.mass,
            center_of_mass: cframe.local_to_global(&self.center_of_mass),
            inertia: cframe.rotation.local_to_global_tensor(&self.inertia),
        }
    }

    /// Properties of the union of two bodies expressed in the same frame.
    ///
    /// Each inertia is moved to the common centre of mass with the parallel
    /// axis term `-m · skew(offset)²`. Associative and commutative up to
    /// rounding.
    #[must_use]
    pub fn combine(&self, other: &Self) -> Self {
        let mass = self.mass + other.mass;
        if mass <= 0.0 {
            let center_of_mass = (self.center_of_mass + other.center_of_mass) / 2.0;
            return Self { mass, center_of_mass, inertia: self.inertia + other.inertia };
        }
        let center_of_mass = (self.center_of_mass * self.mass + other.center_of_mass * other.mass) / mass;
        let inertia = self.inertia_around(&center_of_mass) + other.inertia_around(&center_of_mass);
        Self { mass, center_of_mass, inertia }
    }

    /// Inertia around an arbitrary `point` of the reference frame.
    pub fn inertia_around(&self, point: &Vec3) -> Mat3 {
        let offset = self.center_of_mass - *point;
        self.inertia - Mat3::skew_symmetric_squared(&offset) * self.mass
    }

    /// Sum of a sequence of bodies.
    pub fn sum<'a>(items: impl IntoIterator<Item = &'a Self>) -> Self {
        items.into_iter().fold(Self::ZERO, |acc, m| acc.combine(m))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use p3d_geom::Rotation;

    fn unit_cube_at(x: f64) -> MassProperties {
        let i = 1.0 / 6.0;
        MassProperties { mass: 1.0, center_of_mass: Vec3::new(x, 0.0, 0.0), inertia: Mat3::from_diagonal(i, i, i) }
    }

    #[test]
    fn two_cubes_side_by_side() {
        let total = unit_cube_at(0.0).combine(&unit_cube_at(1.0));
        assert_relative_eq!(total.mass, 2.0);
        assert_relative_eq!(total.center_of_mass.x(), 0.5);
        // Box 2x1x1 of mass 2: Iyy = m (w² + d²) / 12.
        assert_relative_eq!(total.inertia.get(1, 1), 2.0 * (4.0 + 1.0) / 12.0, epsilon = 1e-12);
        assert_relative_eq!(total.inertia.get(0, 0), 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn transform_rotates_inertia_and_moves_centre() {
        let rod = MassProperties { mass: 2.0, center_of_mass: Vec3::ZERO, inertia: Mat3::from_diagonal(0.1, 1.0, 1.0) };
        let frame = CFrame::new(Vec3::new(0.0, 3.0, 0.0), Rotation::rot_z(core::f64::consts::FRAC_PI_2));
        let placed = rod.transformed(&frame);
        assert_relative_eq!(placed.center_of_mass.y(), 3.0);
        assert_relative_eq!(placed.inertia.get(0, 0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(placed.inertia.get(1, 1), 0.1, epsilon = 1e-12);
    }

    #[test]
    fn empty_is_identity_for_combine() {
        let cube = unit_cube_at(4.0);
        assert_eq!(MassProperties::ZERO.combine(&cube), cube);
    }
}
