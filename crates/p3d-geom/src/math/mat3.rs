// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
use core::ops::{Add, AddAssign, Mul, Neg, Sub};

use crate::math::Vec3;

/// Row-major 3×3 matrix.
///
/// Used both for general linear maps (rotation matrices) and for symmetric
/// tensors such as inertia. Symmetric helpers ([`Mat3::skew_symmetric_squared`],
/// [`Mat3::outer`]) produce symmetric results when given vectors.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Mat3 {
    rows: [[f64; 3]; 3],
}

impl Mat3 {
    /// The zero matrix.
    pub const ZERO: Self = Self { rows: [[0.0; 3]; 3] };

    /// The identity matrix.
    pub const IDENTITY: Self = Self::from_diagonal(1.0, 1.0, 1.0);

    /// Builds a matrix from rows.
    pub const fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        Self { rows }
    }

    /// Builds a diagonal matrix.
    pub const fn from_diagonal(x: f64, y: f64, z: f64) -> Self {
        Self { rows: [[x, 0.0, 0.0], [0.0, y, 0.0], [0.0, 0.0, z]] }
    }

    /// Builds a matrix whose columns are the given vectors.
    pub fn from_columns(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self {
            rows: [
                [a.x(), b.x(), c.x()],
                [a.y(), b.y(), c.y()],
                [a.z(), b.z(), c.z()],
            ],
        }
    }

    /// Returns the rows.
    pub const fn rows(&self) -> [[f64; 3]; 3] {
        self.rows
    }

    /// Element at `(row, col)`.
    pub const fn get(&self, row: usize, col: usize) -> f64 {
        self.rows[row][col]
    }

    /// Column `idx` as a vector.
    pub fn column(&self, idx: usize) -> Vec3 {
        Vec3::new(self.rows[0][idx], self.rows[1][idx], self.rows[2][idx])
    }

    /// Transposed matrix.
    pub fn transpose(&self) -> Self {
        let r = &self.rows;
        Self {
            rows: [
                [r[0][0], r[1][0], r[2][0]],
                [r[0][1], r[1][1], r[2][1]],
                [r[0][2], r[1][2], r[2][2]],
            ],
        }
    }

    /// Sum of the diagonal.
    pub fn trace(&self) -> f64 {
        self.rows[0][0] + self.rows[1][1] + self.rows[2][2]
    }

    /// Determinant.
    pub fn determinant(&self) -> f64 {
        let r = &self.rows;
        r[0][0] * (r[1][1] * r[2][2] - r[1][2] * r[2][1])
            - r[0][1] * (r[1][0] * r[2][2] - r[1][2] * r[2][0])
            + r[0][2] * (r[1][0] * r[2][1] - r[1][1] * r[2][0])
    }

    /// Matrix-vector product.
    pub fn mul_vec(&self, v: &Vec3) -> Vec3 {
        let row = |i: usize| {
            self.rows[i][0] * v.component(0)
                + self.rows[i][1] * v.component(1)
                + self.rows[i][2] * v.component(2)
        };
        Vec3::new(row(0), row(1), row(2))
    }

    /// Outer product `a·bᵗ`.
    pub fn outer(a: &Vec3, b: &Vec3) -> Self {
        let mut rows = [[0.0; 3]; 3];
        for (i, row) in rows.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = a.component(i) * b.component(j);
            }
        }
        Self { rows }
    }

    /// Square of the skew-symmetric cross-product matrix of `v`.
    ///
    /// `skew(v)² = v·vᵗ − |v|²·I`, so `−m·skew(v)²` is the parallel-axis
    /// correction for a point mass `m` at offset `v`.
    pub fn skew_symmetric_squared(v: &Vec3) -> Self {
        Self::outer(v, v) - Self::IDENTITY * v.length_squared()
    }

    /// Largest absolute elementwise difference to `other`.
    pub fn max_abs_diff(&self, other: &Self) -> f64 {
        let mut worst = 0.0_f64;
        for i in 0..3 {
            for j in 0..3 {
                worst = worst.max((self.rows[i][j] - other.rows[i][j]).abs());
            }
        }
        worst
    }

    /// Returns `true` when every element is finite.
    pub fn is_finite(&self) -> bool {
        self.rows.iter().flatten().all(|c| c.is_finite())
    }
}

impl Add for Mat3 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        let mut rows = self.rows;
        for (row, rhs_row) in rows.iter_mut().zip(rhs.rows) {
            for (cell, r) in row.iter_mut().zip(rhs_row) {
                *cell += r;
            }
        }
        Self { rows }
    }
}

impl AddAssign for Mat3 {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Mat3 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self + (-rhs)
    }
}

impl Neg for Mat3 {
    type Output = Self;
    fn neg(self) -> Self {
        self * -1.0
    }
}

impl Mul<f64> for Mat3 {
    type Output = Self;
    fn mul(self, rhs: f64) -> Self {
        let mut rows = self.rows;
        for cell in rows.iter_mut().flatten() {
            *cell *= rhs;
        }
        Self { rows }
    }
}

impl Mul for Mat3 {
    type Output = Self;
    fn mul(self, rhs: Self) -> Self {
        let mut rows = [[0.0; 3]; 3];
        for (i, row) in rows.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().enumerate() {
                *cell = (0..3).map(|k| self.rows[i][k] * rhs.rows[k][j]).sum();
            }
        }
        Self { rows }
    }
}

impl Mul<Vec3> for Mat3 {
    type Output = Vec3;
    fn mul(self, rhs: Vec3) -> Vec3 {
        self.mul_vec(&rhs)
    }
}
