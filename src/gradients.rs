//! Diffusion gradient tables.
//!
//! A [GradientTable] holds one b-vector / b-value pair per acquired volume, in acquisition order.

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GradientError {
    #[error("gradient table has {n_vecs} b-vectors but {n_vals} b-values")]
    LengthMismatch { n_vecs: usize, n_vals: usize },
    #[error("b-value {value} at index {index} is negative or not finite")]
    InvalidBValue { index: usize, value: f32 },
    #[error("expected a 4 x N gradient matrix (x, y, z, b), got {rows} x {cols}")]
    MatrixShape { rows: usize, cols: usize },
    #[error("gradient index {index} out of range for table with {len} entries")]
    IndexOutOfRange { index: usize, len: usize },
}

/// A single row of a gradient table. Direction-only queries carry no b-value.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gradient {
    pub bvec: [f32; 3],
    pub bval: Option<f32>,
}

impl Gradient {
    pub fn new(bvec: [f32; 3], bval: f32) -> Self {
        Self { bvec, bval: Some(bval) }
    }

    pub fn direction(bvec: [f32; 3]) -> Self {
        Self { bvec, bval: None }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientTable {
    bvecs: Vec<[f32; 3]>,
    bvals: Vec<f32>,
}

impl GradientTable {
    pub fn new(bvecs: Vec<[f32; 3]>, bvals: Vec<f32>) -> Result<Self, GradientError> {
        if bvecs.len() != bvals.len() {
            return Err(GradientError::LengthMismatch { n_vecs: bvecs.len(), n_vals: bvals.len() });
        }
        if let Some((index, &value)) = bvals.iter().enumerate().find(|(_, b)| !b.is_finite() || **b < 0.) {
            return Err(GradientError::InvalidBValue { index, value });
        }
        Ok(Self { bvecs, bvals })
    }

    /// builds a table from a 4 x N matrix where the first three rows are the b-vector components
    /// and the last row holds the b-values
    pub fn from_matrix(gtab: ArrayView2<f32>) -> Result<Self, GradientError> {
        let (rows, cols) = gtab.dim();
        if rows != 4 {
            return Err(GradientError::MatrixShape { rows, cols });
        }
        let bvecs = gtab.axis_iter(Axis(1))
            .map(|col| [col[0], col[1], col[2]])
            .collect::<Vec<_>>();
        let bvals = gtab.row(3).to_vec();
        Self::new(bvecs, bvals)
    }

    /// the 4 x N matrix representation, see [GradientTable::from_matrix]
    pub fn to_matrix(&self) -> Array2<f32> {
        Array2::from_shape_fn((4, self.len()), |(r, c)| {
            if r < 3 { self.bvecs[c][r] } else { self.bvals[c] }
        })
    }

    pub fn len(&self) -> usize {
        self.bvals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bvals.is_empty()
    }

    pub fn bvals(&self) -> &[f32] {
        &self.bvals
    }

    pub fn bvecs(&self) -> &[[f32; 3]] {
        &self.bvecs
    }

    pub fn max_bval(&self) -> Option<f32> {
        self.bvals.iter().copied().reduce(f32::max)
    }

    pub fn gradient(&self, index: usize) -> Result<Gradient, GradientError> {
        if index >= self.len() {
            return Err(GradientError::IndexOutOfRange { index, len: self.len() });
        }
        Ok(Gradient::new(self.bvecs[index], self.bvals[index]))
    }

    /// return an index mask of low-b (b0) volumes: entries with a b-value below the threshold
    pub fn b0_mask(&self, threshold: f32) -> Vec<bool> {
        self.bvals.iter().map(|&b| b < threshold).collect()
    }

    /// a new table holding the rows at `indices`, in the given order
    pub fn select(&self, indices: &[usize]) -> Result<Self, GradientError> {
        let len = self.len();
        if let Some(&index) = indices.iter().find(|&&i| i >= len) {
            return Err(GradientError::IndexOutOfRange { index, len });
        }
        Ok(Self {
            bvecs: indices.iter().map(|&i| self.bvecs[i]).collect(),
            bvals: indices.iter().map(|&i| self.bvals[i]).collect(),
        })
    }
}
