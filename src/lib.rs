//! Signal prediction models for diffusion MRI motion and eddy-current correction.
//!
//! Each acquired volume is registered against a model prediction for its gradient instead of a
//! single fixed reference. This crate holds the prediction models, the factory selecting them
//! by name, and the leave-one-gradient-out split used to validate them.

mod array_utils;
pub mod config;
pub mod dwi;
pub mod factory;
pub mod gradients;
pub mod logging;
pub mod model;
pub mod validation;

pub use config::{ConfigError, ModelConfig};
pub use dwi::{DatasetError, Dwi, TestSet, TrainSet};
pub use factory::ModelFactory;
pub use gradients::{Gradient, GradientError, GradientTable};
pub use model::{
    AverageDwModel, DiffusionModel, Model, ModelError, ModelParams, Stat, TrivialB0Model,
    DEFAULT_LOW_B_CUTOFF,
};
pub use validation::{logo_cross_validate, FoldScore, ValidationError};
