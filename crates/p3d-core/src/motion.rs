// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Kinematic state of a motorized physical's centre of mass.

use p3d_geom::Vec3;

/// Linear and angular velocity plus their first derivatives.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Motion {
    /// Linear velocity.
    pub velocity: Vec3,
    /// Linear acceleration.
    pub acceleration: Vec3,
    /// Angular velocity (axis × rad/s).
    pub angular_velocity: Vec3,
    /// Angular acceleration.
    pub angular_acceleration: Vec3,
}

impl Motion {
    /// Pure translation at `velocity`.
    pub fn with_velocity(velocity: Vec3) -> Self {
        Self { velocity, ..Self::default() }
    }

    /// Velocity of a point at `offset` from the centre of mass.
    pub fn velocity_of_point(&self, offset: &Vec3) -> Vec3 {
        self.velocity + self.angular_velocity.cross(offset)
    }
}
