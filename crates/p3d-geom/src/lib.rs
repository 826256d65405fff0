// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![doc = r"Geometry primitives for the P3D physics core.

This crate provides:
- Double-precision vectors, 3×3 matrices, and rotations (`math`).
- Relative (`CFrame`) and absolute (`GlobalCFrame`) coordinate frames.
- World-space axis-aligned bounds (`Bounds`) with the cost metric used to
  compare bounding-volume-tree layouts, and local-space boxes (`BoundingBox`).

Design notes:
- `Position` and `Vec3` are distinct types: absolute locations and relative
  offsets cannot be mixed without an explicit subtraction.
- No ambient state; every operation is a pure function of its inputs.
"]

/// Axis-aligned boxes.
pub mod bounds;
/// Vectors, matrices, rotations, and coordinate frames.
pub mod math;

pub use bounds::{BoundingBox, Bounds};
pub use math::{CFrame, GlobalCFrame, Mat3, Position, Rotation, Vec3};
