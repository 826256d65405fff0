// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Double-precision math primitives: vectors, 3×3 matrices, rotations, and
//! the relative/absolute coordinate frames used by the physics core.

use std::f64::consts::TAU;

mod cframe;
mod mat3;
mod position;
mod rotation;
mod vec3;

pub use cframe::{CFrame, GlobalCFrame};
pub use mat3::Mat3;
pub use position::Position;
pub use rotation::Rotation;
pub use vec3::Vec3;

/// Global epsilon used by math routines when detecting degenerate values.
pub const EPSILON: f64 = 1e-9;

/// Converts degrees to radians.
pub fn deg_to_rad(value: f64) -> f64 {
    value * (TAU / 360.0)
}

/// Converts radians to degrees.
pub fn rad_to_deg(value: f64) -> f64 {
    value * (360.0 / TAU)
}
