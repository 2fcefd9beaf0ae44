//! Signal prediction models.
//!
//! Each model is fit on a 4-D training stack (spatial x gradient index) together with the
//! gradient table describing its last axis, and predicts a 3-D reference volume for a query
//! gradient. Motion and eddy-current correction registers each acquired volume against that
//! prediction.

use crate::array_utils::{mean_last_axis, median, median_last_axis, percentile};
use crate::gradients::{Gradient, GradientTable};
use ndarray::{Array3, Array4, ArrayView4, Axis};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// volumes with a b-value below this are never averaged by [AverageDwModel]
pub const DEFAULT_LOW_B_CUTOFF: f32 = 50.;

/// percentile of the shell centers used as the drift reference
const DRIFT_REFERENCE_PERCENTILE: f32 = 15.;

/// shells whose center falls below this are considered signal-free for drift estimation
const DRIFT_MIN_CENTER: f32 = 1.;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ModelError {
    #[error("{model} requires an S0 reference volume")]
    MissingS0 { model: &'static str },
    #[error("unsupported model '{0}'")]
    UnsupportedModel(String),
    #[error("unsupported statistic '{0}', expected 'mean' or 'median'")]
    UnsupportedStat(String),
    #[error("invalid b-value thresholds: th_low ({th_low}) exceeds th_high ({th_high})")]
    InvalidThresholds { th_low: f32, th_high: f32 },
    #[error("no training volumes with b-value in [{th_low}, {th_high}] at or above the low-b cutoff {cutoff}")]
    EmptySelection { th_low: f32, th_high: f32, cutoff: f32 },
    #[error("data has {found} volumes but the gradient table has {expected} entries")]
    GradientMismatch { expected: usize, found: usize },
    #[error("model must be fit before calling predict")]
    NotFitted,
}

/// Aggregation statistic used by [AverageDwModel]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stat {
    #[default]
    Mean,
    Median,
}

impl Stat {
    /// collapses the gradient axis of `data`
    pub fn reduce(&self, data: ArrayView4<f32>) -> Array3<f32> {
        match self {
            Stat::Mean => mean_last_axis(data),
            Stat::Median => median_last_axis(data),
        }
    }
}

impl FromStr for Stat {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mean" => Ok(Stat::Mean),
            "median" => Ok(Stat::Median),
            _ => Err(ModelError::UnsupportedStat(s.to_string())),
        }
    }
}

impl fmt::Display for Stat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stat::Mean => write!(f, "mean"),
            Stat::Median => write!(f, "median"),
        }
    }
}

/// Keyword configuration shared by all models. Unset entries fall back to each model's
/// defaults; entries a model does not use are ignored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelParams {
    pub s0: Option<Array3<f32>>,
    pub th_low: Option<f32>,
    pub th_high: Option<f32>,
    pub bias: Option<bool>,
    pub stat: Option<Stat>,
    pub low_b_cutoff: Option<f32>,
}

impl ModelParams {
    pub fn with_s0(mut self, s0: Array3<f32>) -> Self {
        self.s0 = Some(s0);
        self
    }
}

/// Common fit/predict contract
pub trait DiffusionModel {
    /// fits the model to a training stack whose last axis matches the model's gradient table
    fn fit(&mut self, data: ArrayView4<f32>) -> Result<(), ModelError>;

    /// predicted signal volume for a gradient
    fn predict(&self, gradient: Option<&Gradient>) -> Result<Array3<f32>, ModelError>;
}

/// Predicts the non-diffusion-weighted reference for every gradient.
#[derive(Debug, Clone, PartialEq)]
pub struct TrivialB0Model {
    s0: Array3<f32>,
}

impl TrivialB0Model {
    pub const NAME: &'static str = "TrivialB0Model";

    pub fn new(_gtab: &GradientTable, params: ModelParams) -> Result<Self, ModelError> {
        let s0 = params.s0.ok_or(ModelError::MissingS0 { model: Self::NAME })?;
        Ok(Self { s0 })
    }

    pub fn s0(&self) -> &Array3<f32> {
        &self.s0
    }
}

impl DiffusionModel for TrivialB0Model {
    fn fit(&mut self, _data: ArrayView4<f32>) -> Result<(), ModelError> {
        Ok(())
    }

    fn predict(&self, _gradient: Option<&Gradient>) -> Result<Array3<f32>, ModelError> {
        Ok(self.s0.clone())
    }
}

/// Predicts a voxelwise statistic over the training volumes within a b-value range. Every
/// gradient in range is treated as interchangeable, so the same volume is predicted for any
/// query.
#[derive(Debug, Clone, PartialEq)]
pub struct AverageDwModel {
    gradients: GradientTable,
    s0: Option<Array3<f32>>,
    th_low: f32,
    th_high: f32,
    low_b_cutoff: f32,
    bias: bool,
    stat: Stat,
    average: Option<Array3<f32>>,
}

impl AverageDwModel {
    pub const NAME: &'static str = "AverageDWModel";

    pub fn new(gtab: &GradientTable, params: ModelParams) -> Result<Self, ModelError> {
        // only explicit bounds can be inverted; a defaulted bound that misses every volume
        // fails at fit with EmptySelection
        if let (Some(th_low), Some(th_high)) = (params.th_low, params.th_high) {
            if th_low > th_high {
                return Err(ModelError::InvalidThresholds { th_low, th_high });
            }
        }
        let low_b_cutoff = params.low_b_cutoff.unwrap_or(DEFAULT_LOW_B_CUTOFF);
        let th_low = params.th_low.unwrap_or(low_b_cutoff);
        let th_high = params.th_high
            .or_else(|| gtab.max_bval())
            .unwrap_or(f32::INFINITY);
        Ok(Self {
            gradients: gtab.clone(),
            s0: params.s0,
            th_low,
            th_high,
            low_b_cutoff,
            bias: params.bias.unwrap_or(true),
            stat: params.stat.unwrap_or_default(),
            average: None,
        })
    }

    /// reference volume handed in at construction. It is kept for callers and does not enter
    /// the fit, drift correction included.
    pub fn s0(&self) -> Option<&Array3<f32>> {
        self.s0.as_ref()
    }

    pub fn stat(&self) -> Stat {
        self.stat
    }

    pub fn bias(&self) -> bool {
        self.bias
    }

    /// inclusive b-value range of the volumes that are averaged
    pub fn thresholds(&self) -> (f32, f32) {
        (self.th_low, self.th_high)
    }

    pub fn is_fitted(&self) -> bool {
        self.average.is_some()
    }

    /// indices of the gradient table entries that take part in the average
    pub fn selection(&self) -> Vec<usize> {
        self.gradients.bvals().iter().enumerate()
            .filter(|(_, &b)| b >= self.low_b_cutoff && b >= self.th_low && b <= self.th_high)
            .map(|(idx, _)| idx)
            .collect()
    }
}

impl DiffusionModel for AverageDwModel {
    fn fit(&mut self, data: ArrayView4<f32>) -> Result<(), ModelError> {
        let found = data.len_of(Axis(3));
        if found != self.gradients.len() {
            return Err(ModelError::GradientMismatch { expected: self.gradients.len(), found });
        }

        let selection = self.selection();
        if selection.is_empty() {
            return Err(ModelError::EmptySelection {
                th_low: self.th_low,
                th_high: self.th_high,
                cutoff: self.low_b_cutoff,
            });
        }
        tracing::debug!(
            n_selected = selection.len(),
            th_low = self.th_low,
            th_high = self.th_high,
            stat = %self.stat,
            bias = self.bias,
            "fitting average dw model"
        );

        let mut shells = data.select(Axis(3), &selection);
        if self.bias {
            correct_drift(&mut shells);
        }
        self.average = Some(self.stat.reduce(shells.view()));
        Ok(())
    }

    fn predict(&self, _gradient: Option<&Gradient>) -> Result<Array3<f32>, ModelError> {
        self.average.clone().ok_or(ModelError::NotFitted)
    }
}

/// regresses out global signal differences between shells. Each volume is scaled so that its
/// center (median over all voxels) matches a common reference, the 15th percentile of the
/// centers that carry signal. The reference comes from the diffusion-weighted shells alone, S0
/// does not take part.
fn correct_drift(shells: &mut Array4<f32>) {
    let centers = shells.axis_iter(Axis(3))
        .map(|vol| median(vol.iter().copied()))
        .collect::<Vec<f32>>();
    let valid = centers.iter().copied().filter(|&c| c >= DRIFT_MIN_CENTER).collect::<Vec<f32>>();
    if valid.is_empty() {
        tracing::warn!("no shell center above {DRIFT_MIN_CENTER}, skipping drift correction");
        return;
    }
    let reference = percentile(&valid, DRIFT_REFERENCE_PERCENTILE);
    tracing::debug!(reference, "drift reference");
    shells.axis_iter_mut(Axis(3)).zip(&centers).for_each(|(mut vol, &center)| {
        let center = if center >= DRIFT_MIN_CENTER { center } else { reference };
        let drift = reference / center;
        vol.mapv_inplace(|x| x * drift);
    });
}

/// Closed set of prediction models
#[derive(Debug, Clone, PartialEq)]
pub enum Model {
    TrivialB0(TrivialB0Model),
    AverageDw(AverageDwModel),
}

impl Model {
    pub fn name(&self) -> &'static str {
        match self {
            Model::TrivialB0(_) => TrivialB0Model::NAME,
            Model::AverageDw(_) => AverageDwModel::NAME,
        }
    }
}

impl DiffusionModel for Model {
    fn fit(&mut self, data: ArrayView4<f32>) -> Result<(), ModelError> {
        match self {
            Model::TrivialB0(m) => m.fit(data),
            Model::AverageDw(m) => m.fit(data),
        }
    }

    fn predict(&self, gradient: Option<&Gradient>) -> Result<Array3<f32>, ModelError> {
        match self {
            Model::TrivialB0(m) => m.predict(gradient),
            Model::AverageDw(m) => m.predict(gradient),
        }
    }
}

impl From<TrivialB0Model> for Model {
    fn from(m: TrivialB0Model) -> Self {
        Model::TrivialB0(m)
    }
}

impl From<AverageDwModel> for Model {
    fn from(m: AverageDwModel) -> Self {
        Model::AverageDw(m)
    }
}
