// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! World-wide external forces.

use p3d_geom::Vec3;

/// Force field applied to every free physical by the external integrator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ExternalForce {
    /// Uniform acceleration field.
    DirectionalGravity {
        /// Acceleration vector.
        gravity: Vec3,
    },
}

impl ExternalForce {
    /// Earth-like gravity along −Y.
    pub fn earth_gravity() -> Self {
        Self::DirectionalGravity { gravity: Vec3::new(0.0, -9.81, 0.0) }
    }

    /// Force the field exerts on a body of `mass`, applied at its centre of
    /// mass.
    pub fn force_on(&self, mass: f64) -> Vec3 {
        match self {
            Self::DirectionalGravity { gravity } => *gravity * mass,
        }
    }

    /// Short human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DirectionalGravity { .. } => "directional gravity",
        }
    }
}
