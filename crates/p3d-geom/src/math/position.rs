// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use core::ops::{Add, AddAssign, Sub};

use crate::math::Vec3;

/// Absolute world-space location.
///
/// Subtracting two positions yields a relative [`Vec3`]; positions can be
/// offset by vectors but never added to each other.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Position {
    data: [f64; 3],
}

impl Position {
    /// The world origin.
    pub const ORIGIN: Self = Self::new(0.0, 0.0, 0.0);

    /// Creates a position from coordinates.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { data: [x, y, z] }
    }

    /// Coordinates as an array.
    pub const fn to_array(self) -> [f64; 3] {
        self.data
    }

    /// X coordinate.
    pub const fn x(&self) -> f64 {
        self.data[0]
    }

    /// Y coordinate.
    pub const fn y(&self) -> f64 {
        self.data[1]
    }

    /// Z coordinate.
    pub const fn z(&self) -> f64 {
        self.data[2]
    }

    /// Offset of this position from the origin.
    pub const fn to_vec(self) -> Vec3 {
        Vec3::new(self.data[0], self.data[1], self.data[2])
    }

    /// Componentwise minimum.
    pub fn min(&self, other: &Self) -> Self {
        Self::new(self.x().min(other.x()), self.y().min(other.y()), self.z().min(other.z()))
    }

    /// Componentwise maximum.
    pub fn max(&self, other: &Self) -> Self {
        Self::new(self.x().max(other.x()), self.y().max(other.y()), self.z().max(other.z()))
    }

    /// Returns `true` when every component of `self` is `<=` the one in `other`.
    pub fn all_le(&self, other: &Self) -> bool {
        self.x() <= other.x() && self.y() <= other.y() && self.z() <= other.z()
    }
}

impl From<Vec3> for Position {
    fn from(v: Vec3) -> Self {
        Self::new(v.x(), v.y(), v.z())
    }
}

impl From<[f64; 3]> for Position {
    fn from(value: [f64; 3]) -> Self {
        Self { data: value }
    }
}

impl Sub for Position {
    type Output = Vec3;
    fn sub(self, rhs: Self) -> Vec3 {
        Vec3::new(self.x() - rhs.x(), self.y() - rhs.y(), self.z() - rhs.z())
    }
}

impl Add<Vec3> for Position {
    type Output = Self;
    fn add(self, rhs: Vec3) -> Self {
        Self::new(self.x() + rhs.x(), self.y() + rhs.y(), self.z() + rhs.z())
    }
}

impl AddAssign<Vec3> for Position {
    fn add_assign(&mut self, rhs: Vec3) {
        *self = *self + rhs;
    }
}

impl Sub<Vec3> for Position {
    type Output = Self;
    fn sub(self, rhs: Vec3) -> Self {
        self + (-rhs)
    }
}
