//! Leave-one-gradient-out cross-validation of prediction models.

use crate::config::ModelConfig;
use crate::dwi::{DatasetError, Dwi};
use crate::gradients::Gradient;
use crate::model::{DiffusionModel, ModelError};
use ndarray::{Array3, Zip};
use rayon::prelude::*;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error(transparent)]
    Dataset(#[from] DatasetError),
    #[error("fold {index}: {source}")]
    Model { index: usize, source: ModelError },
}

/// Prediction error for one held-out gradient
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FoldScore {
    pub index: usize,
    pub gradient: Gradient,
    pub rmse: f32,
}

/// fits one model per held-out gradient and scores its prediction against the held-out volume.
/// Folds are independent and run in parallel; scores are returned in gradient order.
pub fn logo_cross_validate(dwi: &Dwi, config: &ModelConfig) -> Result<Vec<FoldScore>, ValidationError> {
    tracing::info!(model = %config.model, n_folds = dwi.len(), "running leave-one-gradient-out validation");
    let scores = (0..dwi.len()).into_par_iter().map(|index| -> Result<FoldScore, ValidationError> {
        let (train, test) = dwi.logo_split(index)?;
        let model_err = |source: ModelError| ValidationError::Model { index, source };
        let mut model = config.build(&train.gradients, dwi.bzero().cloned()).map_err(model_err)?;
        model.fit(train.data.view()).map_err(model_err)?;
        let predicted = model.predict(Some(&test.gradient)).map_err(model_err)?;
        let rmse = masked_rmse(&predicted, &test.data, dwi.brainmask());
        tracing::debug!(index, rmse, "fold scored");
        Ok(FoldScore { index, gradient: test.gradient, rmse })
    }).collect::<Result<Vec<_>, ValidationError>>()?;
    Ok(scores)
}

/// root-mean-square difference over the voxels inside `mask` (all voxels without a mask).
/// Returns NaN for an empty mask.
pub fn masked_rmse(predicted: &Array3<f32>, observed: &Array3<f32>, mask: Option<&Array3<bool>>) -> f32 {
    let sq = |p: f32, o: f32| ((p - o) as f64).powi(2);
    let (sum_sq, n) = match mask {
        Some(mask) => Zip::from(predicted).and(observed).and(mask)
            .fold((0f64, 0usize), |(s, n), &p, &o, &m| if m { (s + sq(p, o), n + 1) } else { (s, n) }),
        None => Zip::from(predicted).and(observed)
            .fold((0f64, 0usize), |(s, n), &p, &o| (s + sq(p, o), n + 1)),
    };
    if n == 0 {
        return f32::NAN;
    }
    (sum_sq / n as f64).sqrt() as f32
}
