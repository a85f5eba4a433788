//! Linear algebra type system for the inertial tracker
//!
//! `Vec3` is the plain nalgebra vector used for samples, biases and the
//! integrated state. `Matrix3` is the fixed 3×3 matrix the Kalman filter runs
//! on: fallible construction, bounds-checked entry access, cofactor
//! determinant and adjugate inverse.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::error::{Result, TrackerError};

// ===== Dimensions =====
pub const DIM: usize = 3;

/// Determinants smaller than this are treated as singular.
pub const SINGULARITY_EPSILON: f64 = 1e-10;

pub type Vec3 = nalgebra::Vector3<f64>;

/// Tuple form of a vector, used by serializable snapshots.
pub fn vec3_tuple(v: &Vec3) -> (f64, f64, f64) {
    (v.x, v.y, v.z)
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Vec<f64>>", into = "Vec<Vec<f64>>")]
pub struct Matrix3 {
    data: nalgebra::Matrix3<f64>,
}

impl Matrix3 {
    /// Build from 9 values in row-major order.
    pub fn from_flat(values: &[f64]) -> Result<Self> {
        if values.len() != DIM * DIM {
            return Err(TrackerError::InvalidDimension(format!(
                "expected {} elements, found {}",
                DIM * DIM,
                values.len()
            )));
        }
        Ok(Self {
            data: nalgebra::Matrix3::from_row_slice(values),
        })
    }

    /// Build from three rows of three values.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Result<Self> {
        if rows.len() != DIM {
            return Err(TrackerError::InvalidDimension(format!(
                "expected {} rows, found {}",
                DIM,
                rows.len()
            )));
        }
        let mut data = nalgebra::Matrix3::zeros();
        for (i, row) in rows.iter().enumerate() {
            let row = row.as_ref();
            if row.len() != DIM {
                return Err(TrackerError::InvalidDimension(format!(
                    "row {} has {} columns, expected {}",
                    i,
                    row.len(),
                    DIM
                )));
            }
            for (j, value) in row.iter().enumerate() {
                data[(i, j)] = *value;
            }
        }
        Ok(Self { data })
    }

    pub fn identity() -> Self {
        Self {
            data: nalgebra::Matrix3::identity(),
        }
    }

    pub fn zeros() -> Self {
        Self {
            data: nalgebra::Matrix3::zeros(),
        }
    }

    pub fn from_diagonal(diag: &Vec3) -> Self {
        Self {
            data: nalgebra::Matrix3::from_diagonal(diag),
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Result<f64> {
        Self::check_index(row, col)?;
        Ok(self.data[(row, col)])
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) -> Result<()> {
        Self::check_index(row, col)?;
        self.data[(row, col)] = value;
        Ok(())
    }

    pub fn multiply(&self, other: &Matrix3) -> Matrix3 {
        Matrix3 {
            data: self.data * other.data,
        }
    }

    pub fn add(&self, other: &Matrix3) -> Matrix3 {
        Matrix3 {
            data: self.data + other.data,
        }
    }

    pub fn subtract(&self, other: &Matrix3) -> Matrix3 {
        Matrix3 {
            data: self.data - other.data,
        }
    }

    pub fn transpose(&self) -> Matrix3 {
        Matrix3 {
            data: self.data.transpose(),
        }
    }

    pub fn scale(&self, factor: f64) -> Matrix3 {
        Matrix3 {
            data: self.data * factor,
        }
    }

    /// Cofactor expansion along the first row.
    pub fn determinant(&self) -> f64 {
        (0..DIM).map(|j| self.data[(0, j)] * self.cofactor(0, j)).sum()
    }

    pub fn cofactor_matrix(&self) -> Matrix3 {
        Matrix3 {
            data: nalgebra::Matrix3::from_fn(|i, j| self.cofactor(i, j)),
        }
    }

    /// Adjugate divided by the determinant.
    pub fn inverse(&self) -> Result<Matrix3> {
        let determinant = self.determinant();
        if determinant.abs() < SINGULARITY_EPSILON {
            return Err(TrackerError::SingularMatrix { determinant });
        }
        let adjugate = self.cofactor_matrix().transpose();
        Ok(Matrix3 {
            data: adjugate.data.map(|v| v / determinant),
        })
    }

    pub fn column(&self, col: usize) -> Result<Vec3> {
        Self::check_index(0, col)?;
        Ok(self.data.column(col).into_owned())
    }

    pub fn diagonal(&self) -> Vec3 {
        self.data.diagonal()
    }

    fn cofactor(&self, row: usize, col: usize) -> f64 {
        let sign = if (row + col) % 2 == 0 { 1.0 } else { -1.0 };
        sign * self.minor(row, col)
    }

    fn minor(&self, row: usize, col: usize) -> f64 {
        let r = remaining(row);
        let c = remaining(col);
        let m = &self.data;
        m[(r[0], c[0])] * m[(r[1], c[1])] - m[(r[0], c[1])] * m[(r[1], c[0])]
    }

    fn check_index(row: usize, col: usize) -> Result<()> {
        if row >= DIM || col >= DIM {
            return Err(TrackerError::IndexOutOfRange { row, col });
        }
        Ok(())
    }
}

/// The two indices other than `index`.
fn remaining(index: usize) -> [usize; 2] {
    match index {
        0 => [1, 2],
        1 => [0, 2],
        _ => [0, 1],
    }
}

impl Default for Matrix3 {
    fn default() -> Self {
        Self::zeros()
    }
}

impl<'a> Add<&'a Matrix3> for &'a Matrix3 {
    type Output = Matrix3;

    fn add(self, rhs: &'a Matrix3) -> Matrix3 {
        Matrix3::add(self, rhs)
    }
}

impl<'a> Sub<&'a Matrix3> for &'a Matrix3 {
    type Output = Matrix3;

    fn sub(self, rhs: &'a Matrix3) -> Matrix3 {
        self.subtract(rhs)
    }
}

impl<'a> Mul<&'a Matrix3> for &'a Matrix3 {
    type Output = Matrix3;

    fn mul(self, rhs: &'a Matrix3) -> Matrix3 {
        self.multiply(rhs)
    }
}

impl TryFrom<Vec<Vec<f64>>> for Matrix3 {
    type Error = TrackerError;

    fn try_from(rows: Vec<Vec<f64>>) -> Result<Self> {
        Self::from_rows(&rows)
    }
}

impl From<Matrix3> for Vec<Vec<f64>> {
    fn from(m: Matrix3) -> Self {
        m.data
            .row_iter()
            .map(|row| row.iter().copied().collect())
            .collect()
    }
}
