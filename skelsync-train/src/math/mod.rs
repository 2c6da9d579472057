//! Dense linear algebra used by the calibration networks

mod matrix;

pub use matrix::{Matrix, MatrixError};
