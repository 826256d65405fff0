// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use core::ops::Mul;

use crate::math::{Mat3, Vec3, EPSILON};

/// Orientation stored as an orthonormal 3×3 matrix.
///
/// `local_to_global` maps vectors expressed in the rotated frame into the
/// parent frame; `global_to_local` is its inverse (the transpose).
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Rotation {
    matrix: Mat3,
}

impl Default for Rotation {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Rotation {
    /// The identity rotation.
    pub const IDENTITY: Self = Self { matrix: Mat3::IDENTITY };

    /// Wraps a matrix that the caller guarantees is orthonormal.
    ///
    /// Used by decoders that read back a matrix produced by [`Self::as_mat3`].
    pub const fn from_matrix_unchecked(matrix: Mat3) -> Self {
        Self { matrix }
    }

    /// Rotation of `angle` radians around `axis` (Rodrigues' formula).
    ///
    /// A degenerate axis yields the identity.
    pub fn from_axis_angle(axis: Vec3, angle: f64) -> Self {
        let axis = axis.normalize();
        if axis == Vec3::ZERO {
            return Self::IDENTITY;
        }
        let (s, c) = angle.sin_cos();
        let [x, y, z] = axis.to_array();
        let t = 1.0 - c;
        Self {
            matrix: Mat3::from_rows([
                [t * x * x + c, t * x * y - s * z, t * x * z + s * y],
                [t * x * y + s * z, t * y * y + c, t * y * z - s * x],
                [t * x * z - s * y, t * y * z + s * x, t * z * z + c],
            ]),
        }
    }

    /// Rotation around the X axis.
    pub fn rot_x(angle: f64) -> Self {
        Self::from_axis_angle(Vec3::UNIT_X, angle)
    }

    /// Rotation around the Y axis.
    pub fn rot_y(angle: f64) -> Self {
        Self::from_axis_angle(Vec3::UNIT_Y, angle)
    }

    /// Rotation around the Z axis.
    pub fn rot_z(angle: f64) -> Self {
        Self::from_axis_angle(Vec3::UNIT_Z, angle)
    }

    /// The underlying matrix.
    pub const fn as_mat3(&self) -> Mat3 {
        self.matrix
    }

    /// Maps a local vector into the parent frame.
    pub fn local_to_global(&self, v: &Vec3) -> Vec3 {
        self.matrix.mul_vec(v)
    }

    /// Maps a parent-frame vector into the local frame.
    pub fn global_to_local(&self, v: &Vec3) -> Vec3 {
        self.matrix.transpose().mul_vec(v)
    }

    /// Composes `self ∘ local`.
    pub fn local_to_global_rotation(&self, local: &Self) -> Self {
        Self { matrix: self.matrix * local.matrix }
    }

    /// Expresses `global` relative to `self`.
    pub fn global_to_local_rotation(&self, global: &Self) -> Self {
        Self { matrix: self.matrix.transpose() * global.matrix }
    }

    /// Rotates a symmetric tensor into the parent frame: `R·I·Rᵗ`.
    pub fn local_to_global_tensor(&self, tensor: &Mat3) -> Mat3 {
        self.matrix * *tensor * self.matrix.transpose()
    }

    /// Inverse rotation.
    pub fn inverse(&self) -> Self {
        Self { matrix: self.matrix.transpose() }
    }

    /// Returns `true` if the matrix is orthonormal with determinant +1 within
    /// `tolerance`.
    pub fn is_orthonormal(&self, tolerance: f64) -> bool {
        let should_be_identity = self.matrix * self.matrix.transpose();
        should_be_identity.max_abs_diff(&Mat3::IDENTITY) <= tolerance
            && (self.matrix.determinant() - 1.0).abs() <= tolerance.max(EPSILON)
    }
}

impl Mul for Rotation {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        self.local_to_global_rotation(&rhs)
    }
}

impl Mul<Vec3> for Rotation {
    type Output = Vec3;
    fn mul(self, rhs: Vec3) -> Vec3 {
        self.local_to_global(&rhs)
    }
}
