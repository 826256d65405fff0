// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Hard (kinematic) and soft (solver-enforced) constraints.

use core::f64::consts::{PI, TAU};

use p3d_geom::{CFrame, Rotation, Vec3};

use crate::ident::PhysicalId;

/// Kinematic relation between a connected physical and its parent.
///
/// The constraint produces a relative frame that is inserted between the
/// parent's and the child's attachment frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HardConstraint {
    /// Rigid weld.
    Fixed,
    /// Rotation about Z at a constant angular speed.
    ConstantSpeedMotor {
        /// Radians per second.
        speed: f64,
        /// Current angle, kept in `[0, 2π)`.
        current_angle: f64,
    },
    /// Translation along Z oscillating between `min_value` and `max_value`.
    SinusoidalPiston {
        /// Lowest extension.
        min_value: f64,
        /// Highest extension.
        max_value: f64,
        /// Seconds per cycle.
        period: f64,
        /// Time into the current cycle.
        current_step_in_period: f64,
    },
    /// Rotation about Z oscillating between `min_value` and `max_value`.
    SinusoidalMotor {
        /// Lowest angle.
        min_value: f64,
        /// Highest angle.
        max_value: f64,
        /// Seconds per cycle.
        period: f64,
        /// Time into the current cycle.
        current_step_in_period: f64,
    },
}

fn sinusoid(min_value: f64, max_value: f64, period: f64, step: f64) -> f64 {
    if period <= 0.0 {
        return min_value;
    }
    let phase = step / period * TAU;
    min_value + (max_value - min_value) * (1.0 + phase.sin()) / 2.0
}

fn wrap_step(step: f64, period: f64) -> f64 {
    if period > 0.0 {
        step.rem_euclid(period)
    } else {
        0.0
    }
}

impl HardConstraint {
    /// Short human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Fixed => "fixed",
            Self::ConstantSpeedMotor { .. } => "motor",
            Self::SinusoidalPiston { .. } => "piston",
            Self::SinusoidalMotor { .. } => "sinusoidal motor",
        }
    }

    /// Whether the relative frame changes over time.
    pub fn is_animated(&self) -> bool {
        !matches!(self, Self::Fixed)
    }

    /// Advances internal time by `dt` seconds.
    pub fn advance(&mut self, dt: f64) {
        match self {
            Self::Fixed => {}
            Self::ConstantSpeedMotor { speed, current_angle } => {
                *current_angle = (*current_angle + *speed * dt).rem_euclid(2.0 * PI);
            }
            Self::SinusoidalPiston { period, current_step_in_period, .. }
            | Self::SinusoidalMotor { period, current_step_in_period, .. } => {
                *current_step_in_period = wrap_step(*current_step_in_period + dt, *period);
            }
        }
    }

    /// Current frame of the child attachment relative to the parent
    /// attachment.
    pub fn relative_cframe(&self) -> CFrame {
        match *self {
            Self::Fixed => CFrame::IDENTITY,
            Self::ConstantSpeedMotor { current_angle, .. } => CFrame::from_rotation(Rotation::rot_z(current_angle)),
            Self::SinusoidalPiston { min_value, max_value, period, current_step_in_period } => {
                let z = sinusoid(min_value, max_value, period, current_step_in_period);
                CFrame::from_translation(Vec3::new(0.0, 0.0, z))
            }
            Self::SinusoidalMotor { min_value, max_value, period, current_step_in_period } => {
                let angle = sinusoid(min_value, max_value, period, current_step_in_period);
                CFrame::from_rotation(Rotation::rot_z(angle))
            }
        }
    }
}

/// Link between a connected physical and its parent physical.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HardPhysicalConnection {
    /// Attachment point on the child, relative to the child's main part.
    pub attach_on_child: CFrame,
    /// Attachment point on the parent, relative to the parent's main part.
    pub attach_on_parent: CFrame,
    /// Relation between the two attachment points.
    pub constraint: HardConstraint,
}

impl HardPhysicalConnection {
    /// Frame of the child's main part relative to the parent's main part:
    /// `attach_on_parent ∘ constraint ∘ attach_on_child⁻¹`.
    pub fn relative_cframe_to_parent(&self) -> CFrame {
        self.attach_on_parent
            .local_to_global_cframe(&self.constraint.relative_cframe())
            .local_to_global_cframe(&self.attach_on_child.inverse())
    }
}

/// Soft constraint between two physicals, enforced by the external solver.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Constraint {
    /// Coincident points.
    Ball {
        /// Point on A, relative to A's main part.
        attach_a: Vec3,
        /// Point on B, relative to B's main part.
        attach_b: Vec3,
    },
    /// Coincident points with aligned axes.
    Hinge {
        /// Point on A.
        attach_a: Vec3,
        /// Hinge axis on A.
        axis_a: Vec3,
        /// Point on B.
        attach_b: Vec3,
        /// Hinge axis on B.
        axis_b: Vec3,
    },
    /// Points kept at a fixed distance.
    Bar {
        /// Point on A.
        attach_a: Vec3,
        /// Point on B.
        attach_b: Vec3,
        /// Rest length.
        length: f64,
    },
}

impl Constraint {
    /// Short human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ball { .. } => "ball",
            Self::Hinge { .. } => "hinge",
            Self::Bar { .. } => "bar",
        }
    }
}

/// A soft constraint bound to two physicals.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalConstraint {
    /// First physical.
    pub phys_a: PhysicalId,
    /// Second physical.
    pub phys_b: PhysicalId,
    /// The constraint.
    pub constraint: Constraint,
}

/// Constraints solved together.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstraintGroup {
    /// Members.
    pub constraints: Vec<PhysicalConstraint>,
}

impl ConstraintGroup {
    /// Group over `constraints`.
    pub fn new(constraints: Vec<PhysicalConstraint>) -> Self {
        Self { constraints }
    }

    /// Whether any member references `physical`.
    pub fn references(&self, physical: PhysicalId) -> bool {
        self.constraints.iter().any(|c| c.phys_a == physical || c.phys_b == physical)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn motor_angle_wraps() {
        let mut motor = HardConstraint::ConstantSpeedMotor { speed: PI, current_angle: 0.0 };
        motor.advance(2.5);
        let HardConstraint::ConstantSpeedMotor { current_angle, .. } = motor else { unreachable!() };
        assert_relative_eq!(current_angle, 0.5 * PI, epsilon = 1e-12);
    }

    #[test]
    fn piston_oscillates_between_limits() {
        let mut piston = HardConstraint::SinusoidalPiston {
            min_value: 1.0,
            max_value: 3.0,
            period: 4.0,
            current_step_in_period: 0.0,
        };
        assert_relative_eq!(piston.relative_cframe().position.z(), 2.0, epsilon = 1e-12);
        piston.advance(1.0);
        assert_relative_eq!(piston.relative_cframe().position.z(), 3.0, epsilon = 1e-12);
        piston.advance(2.0);
        assert_relative_eq!(piston.relative_cframe().position.z(), 1.0, epsilon = 1e-12);
        piston.advance(5.0);
        let HardConstraint::SinusoidalPiston { current_step_in_period, .. } = piston else { unreachable!() };
        assert_relative_eq!(current_step_in_period, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn connection_composes_attachments() {
        let conn = HardPhysicalConnection {
            attach_on_child: CFrame::from_translation(Vec3::new(0.0, 0.0, -1.0)),
            attach_on_parent: CFrame::from_translation(Vec3::new(2.0, 0.0, 0.0)),
            constraint: HardConstraint::Fixed,
        };
        let rel = conn.relative_cframe_to_parent();
        assert_relative_eq!(rel.position.x(), 2.0);
        assert_relative_eq!(rel.position.z(), 1.0);
    }
}
