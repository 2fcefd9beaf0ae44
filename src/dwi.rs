//! Diffusion-weighted imaging data sets and leave-one-gradient-out splitting.

use crate::array_utils::median_last_axis;
use crate::gradients::{Gradient, GradientError, GradientTable};
use ndarray::{Array3, Array4, Axis};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("{what} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch { what: &'static str, expected: Vec<usize>, found: Vec<usize> },
    #[error("split index {index} out of range for data set with {len} volumes")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("no volumes with b-value below {threshold} to estimate a b0 reference from")]
    NoLowBVolumes { threshold: f32 },
    #[error(transparent)]
    Gradients(#[from] GradientError),
    #[error("failed to access {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to decode data set container {path}: {source}")]
    Container { path: PathBuf, source: serde_json::Error },
}

/// Volumes and gradient rows used for fitting a model
#[derive(Debug, Clone, PartialEq)]
pub struct TrainSet {
    pub data: Array4<f32>,
    pub gradients: GradientTable,
}

/// The held-out volume and its gradient row
#[derive(Debug, Clone, PartialEq)]
pub struct TestSet {
    pub data: Array3<f32>,
    pub gradient: Gradient,
}

/// A 4-D diffusion-weighted data set. The last axis of `dataobj` follows the ordering of
/// `gradients`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dwi {
    dataobj: Array4<f32>,
    gradients: GradientTable,
    #[serde(default)]
    brainmask: Option<Array3<bool>>,
    #[serde(default)]
    bzero: Option<Array3<f32>>,
    #[serde(default)]
    affine: Option<[[f64; 4]; 4]>,
}

impl Dwi {
    pub fn new(dataobj: Array4<f32>, gradients: GradientTable) -> Result<Self, DatasetError> {
        let n_vols = dataobj.len_of(Axis(3));
        if n_vols != gradients.len() {
            let (nx, ny, nz, _) = dataobj.dim();
            return Err(DatasetError::ShapeMismatch {
                what: "dwi data",
                expected: vec![nx, ny, nz, gradients.len()],
                found: dataobj.shape().to_vec(),
            });
        }
        Ok(Self { dataobj, gradients, brainmask: None, bzero: None, affine: None })
    }

    pub fn with_brainmask(mut self, mask: Array3<bool>) -> Result<Self, DatasetError> {
        self.check_spatial("brain mask", mask.shape())?;
        self.brainmask = Some(mask);
        Ok(self)
    }

    pub fn with_bzero(mut self, bzero: Array3<f32>) -> Result<Self, DatasetError> {
        self.check_spatial("b0 reference", bzero.shape())?;
        self.bzero = Some(bzero);
        Ok(self)
    }

    pub fn with_affine(mut self, affine: [[f64; 4]; 4]) -> Self {
        self.affine = Some(affine);
        self
    }

    /// estimates the b0 reference as the voxelwise median over all volumes with a b-value below
    /// `threshold`
    pub fn estimate_bzero(&self, threshold: f32) -> Result<Array3<f32>, DatasetError> {
        let indices = self.gradients.b0_mask(threshold).iter().enumerate()
            .filter(|(_, is_b0)| **is_b0)
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();
        if indices.is_empty() {
            return Err(DatasetError::NoLowBVolumes { threshold });
        }
        tracing::debug!(n_b0 = indices.len(), threshold, "estimating b0 reference");
        let b0s = self.dataobj.select(Axis(3), &indices);
        Ok(median_last_axis(b0s.view()))
    }

    pub fn dataobj(&self) -> &Array4<f32> {
        &self.dataobj
    }

    pub fn gradients(&self) -> &GradientTable {
        &self.gradients
    }

    pub fn brainmask(&self) -> Option<&Array3<bool>> {
        self.brainmask.as_ref()
    }

    pub fn bzero(&self) -> Option<&Array3<f32>> {
        self.bzero.as_ref()
    }

    pub fn affine(&self) -> Option<&[[f64; 4]; 4]> {
        self.affine.as_ref()
    }

    /// number of diffusion volumes
    pub fn len(&self) -> usize {
        self.gradients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gradients.is_empty()
    }

    pub fn spatial_shape(&self) -> [usize; 3] {
        let (nx, ny, nz, _) = self.dataobj.dim();
        [nx, ny, nz]
    }

    /// leave-one-gradient-out split. The test set holds the volume at `index` and its gradient
    /// row, the train set holds every other volume in acquisition order. Both are owned copies.
    pub fn logo_split(&self, index: usize) -> Result<(TrainSet, TestSet), DatasetError> {
        let len = self.len();
        if index >= len {
            return Err(DatasetError::IndexOutOfRange { index, len });
        }
        let train_indices = (0..len).filter(|&i| i != index).collect::<Vec<_>>();
        let train = TrainSet {
            data: self.dataobj.select(Axis(3), &train_indices),
            gradients: self.gradients.select(&train_indices)?,
        };
        let test = TestSet {
            data: self.dataobj.index_axis(Axis(3), index).to_owned(),
            gradient: self.gradients.gradient(index)?,
        };
        Ok((train, test))
    }

    /// every leave-one-gradient-out split, in index order
    pub fn logo_splits(&self) -> impl Iterator<Item = Result<(TrainSet, TestSet), DatasetError>> + '_ {
        (0..self.len()).map(|i| self.logo_split(i))
    }

    /// load a data set from a JSON container written by [Dwi::to_filename]
    pub fn from_filename(path: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|source| DatasetError::Io { path: path.to_path_buf(), source })?;
        let dwi: Dwi = serde_json::from_reader(BufReader::new(f))
            .map_err(|source| DatasetError::Container { path: path.to_path_buf(), source })?;
        // re-validate invariants, the container may have been edited by hand
        let Dwi { dataobj, gradients, brainmask, bzero, affine } = dwi;
        let mut checked = Dwi::new(dataobj, gradients)?;
        if let Some(mask) = brainmask {
            checked = checked.with_brainmask(mask)?;
        }
        if let Some(b0) = bzero {
            checked = checked.with_bzero(b0)?;
        }
        checked.affine = affine;
        tracing::debug!(path = %path.display(), n_vols = checked.len(), "loaded dwi data set");
        Ok(checked)
    }

    pub fn to_filename(&self, path: impl AsRef<Path>) -> Result<(), DatasetError> {
        let path = path.as_ref();
        let f = File::create(path).map_err(|source| DatasetError::Io { path: path.to_path_buf(), source })?;
        let mut writer = BufWriter::new(f);
        serde_json::to_writer(&mut writer, self)
            .map_err(|source| DatasetError::Container { path: path.to_path_buf(), source })?;
        writer.flush().map_err(|source| DatasetError::Io { path: path.to_path_buf(), source })
    }

    fn check_spatial(&self, what: &'static str, shape: &[usize]) -> Result<(), DatasetError> {
        let expected = self.spatial_shape();
        if shape != expected {
            return Err(DatasetError::ShapeMismatch { what, expected: expected.to_vec(), found: shape.to_vec() });
        }
        Ok(())
    }
}
