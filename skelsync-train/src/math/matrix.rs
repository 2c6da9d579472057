//! Dense row-major `f32` matrix

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use thiserror::Error;

/// Errors raised by matrix operations. A failing operation never returns a
/// partially built matrix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MatrixError {
    #[error("Dimension mismatch in {op}: {left:?} vs {right:?}")]
    DimensionMismatch {
        op: &'static str,
        left: (usize, usize),
        right: (usize, usize),
    },

    #[error("Expected a column vector, found a {rows}x{cols} matrix")]
    NotColumnVector { rows: usize, cols: usize },

    #[error("Cannot initialise {rows} rows from {len} values")]
    InitOverflow { rows: usize, len: usize },

    #[error("Expected {expected} elements for a {rows}x{cols} matrix, found {found}")]
    DataLength {
        rows: usize,
        cols: usize,
        expected: usize,
        found: usize,
    },
}

/// A fixed-size dense matrix with value semantics.
///
/// Dimensions never change implicitly; [`Matrix::resize`] returns a new matrix.
/// Equality is exact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl Matrix {
    /// A `rows` x `cols` matrix of zeros.
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, 0.0)
    }

    pub fn filled(rows: usize, cols: usize, value: f32) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Build from row-major data.
    pub fn from_vec(rows: usize, cols: usize, data: Vec<f32>) -> Result<Self, MatrixError> {
        if data.len() != rows * cols {
            return Err(MatrixError::DataLength {
                rows,
                cols,
                expected: rows * cols,
                found: data.len(),
            });
        }
        Ok(Self { rows, cols, data })
    }

    /// Column vector holding `values`.
    pub fn column(values: &[f32]) -> Self {
        Self {
            rows: values.len(),
            cols: 1,
            data: values.to_vec(),
        }
    }

    /// Ones on the main diagonal, zeros elsewhere.
    pub fn identity(rows: usize, cols: usize) -> Self {
        let mut m = Self::zeros(rows, cols);
        for i in 0..rows.min(cols) {
            m[(i, i)] = 1.0;
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        (row < self.rows && col < self.cols).then(|| self.data[row * self.cols + col])
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }

    /// Overwrite the first `values.len()` entries of a column vector.
    pub fn init(&mut self, values: &[f32]) -> Result<(), MatrixError> {
        if self.cols != 1 {
            return Err(MatrixError::NotColumnVector {
                rows: self.rows,
                cols: self.cols,
            });
        }
        if values.len() > self.rows {
            return Err(MatrixError::InitOverflow {
                rows: self.rows,
                len: values.len(),
            });
        }
        self.data[..values.len()].copy_from_slice(values);
        Ok(())
    }

    pub fn add(&self, other: &Matrix) -> Result<Matrix, MatrixError> {
        self.zip_map(other, |a, b| a + b)
            .map_err(|_| self.mismatch("add", other))
    }

    pub fn sub(&self, other: &Matrix) -> Result<Matrix, MatrixError> {
        self.zip_map(other, |a, b| a - b)
            .map_err(|_| self.mismatch("sub", other))
    }

    /// Element-wise product.
    pub fn hadamard(&self, other: &Matrix) -> Result<Matrix, MatrixError> {
        self.zip_map(other, |a, b| a * b)
            .map_err(|_| self.mismatch("hadamard", other))
    }

    /// In-place `self += other`.
    pub fn add_assign(&mut self, other: &Matrix) -> Result<(), MatrixError> {
        if self.shape() != other.shape() {
            return Err(self.mismatch("add_assign", other));
        }
        for (a, b) in self.data.iter_mut().zip(&other.data) {
            *a += *b;
        }
        Ok(())
    }

    /// Matrix product `self * other`.
    pub fn mul(&self, other: &Matrix) -> Result<Matrix, MatrixError> {
        if self.cols != other.rows {
            return Err(self.mismatch("mul", other));
        }

        let mut result = Matrix::zeros(self.rows, other.cols);
        for i in 0..self.rows {
            let lhs_row = &self.data[i * self.cols..(i + 1) * self.cols];
            let out_row = &mut result.data[i * other.cols..(i + 1) * other.cols];
            for (k, &a) in lhs_row.iter().enumerate() {
                let rhs_row = &other.data[k * other.cols..(k + 1) * other.cols];
                for (out, &b) in out_row.iter_mut().zip(rhs_row) {
                    *out += a * b;
                }
            }
        }
        Ok(result)
    }

    /// Multiply every element by `scalar`.
    pub fn scale(&self, scalar: f32) -> Matrix {
        self.map(|x| x * scalar)
    }

    pub fn transpose(&self) -> Matrix {
        let mut result = Matrix::zeros(self.cols, self.rows);
        for i in 0..self.rows {
            for j in 0..self.cols {
                result.data[j * self.rows + i] = self.data[i * self.cols + j];
            }
        }
        result
    }

    /// Apply `f` to every element.
    pub fn map(&self, f: impl Fn(f32) -> f32) -> Matrix {
        Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }

    /// Combine two same-shaped matrices element by element.
    pub fn zip_map(&self, other: &Matrix, f: impl Fn(f32, f32) -> f32) -> Result<Matrix, MatrixError> {
        if self.shape() != other.shape() {
            return Err(self.mismatch("zip_map", other));
        }
        Ok(Matrix {
            rows: self.rows,
            cols: self.cols,
            data: self
                .data
                .iter()
                .zip(&other.data)
                .map(|(&a, &b)| f(a, b))
                .collect(),
        })
    }

    /// Copy into a `new_rows` x `new_cols` matrix, keeping the overlapping
    /// region and filling the rest with `pad`. Shrinking crops.
    pub fn resize(&self, new_rows: usize, new_cols: usize, pad: f32) -> Matrix {
        let mut result = Matrix::filled(new_rows, new_cols, pad);
        let keep_rows = self.rows.min(new_rows);
        let keep_cols = self.cols.min(new_cols);
        for i in 0..keep_rows {
            let src = &self.data[i * self.cols..i * self.cols + keep_cols];
            result.data[i * new_cols..i * new_cols + keep_cols].copy_from_slice(src);
        }
        result
    }

    /// True when no element is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    fn mismatch(&self, op: &'static str, other: &Matrix) -> MatrixError {
        MatrixError::DimensionMismatch {
            op,
            left: self.shape(),
            right: other.shape(),
        }
    }
}

impl Index<(usize, usize)> for Matrix {
    type Output = f32;

    fn index(&self, (row, col): (usize, usize)) -> &f32 {
        assert!(row < self.rows && col < self.cols, "matrix index out of bounds");
        &self.data[row * self.cols + col]
    }
}

impl IndexMut<(usize, usize)> for Matrix {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut f32 {
        assert!(row < self.rows && col < self.cols, "matrix index out of bounds");
        &mut self.data[row * self.cols + col]
    }
}

impl fmt::Display for Matrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in 0..self.rows {
            let row = &self.data[i * self.cols..(i + 1) * self.cols];
            writeln!(f, "{:?}", row)?;
        }
        Ok(())
    }
}
