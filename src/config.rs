//! Model configuration files.
//!
//! A [ModelConfig] names a model and carries its keyword parameters. It is stored as TOML so a
//! default file can be written, edited and passed back to a correction run.

use crate::factory::ModelFactory;
use crate::gradients::GradientTable;
use crate::model::{Model, ModelError, ModelParams, Stat, DEFAULT_LOW_B_CUTOFF};
use ndarray::Array3;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io { path: PathBuf, source: std::io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse { path: PathBuf, source: toml::de::Error },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// symbolic model name, see [ModelFactory::supported]
    pub model: String,
    pub stat: Stat,
    pub bias: bool,
    pub low_b_cutoff: f32,
    /// lower b-value bound, defaults to the low-b cutoff
    pub th_low: Option<f32>,
    /// upper b-value bound, defaults to the largest b-value of the gradient table
    pub th_high: Option<f32>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model: "avg".to_string(),
            stat: Stat::default(),
            bias: true,
            low_b_cutoff: DEFAULT_LOW_B_CUTOFF,
            th_low: None,
            th_high: None,
        }
    }
}

impl ModelConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut toml_str = String::new();
        File::open(path)
            .and_then(|mut f| f.read_to_string(&mut toml_str))
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })?;
        toml::from_str(&toml_str).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let mut toml_string = toml::to_string(self)?;
        toml_string.push('\n');
        File::create(path)
            .and_then(|mut f| f.write_all(toml_string.as_bytes()))
            .map_err(|source| ConfigError::Io { path: path.to_path_buf(), source })
    }

    /// keyword parameters for the factory, with an optional S0 reference volume
    pub fn params(&self, s0: Option<Array3<f32>>) -> ModelParams {
        ModelParams {
            s0,
            th_low: self.th_low,
            th_high: self.th_high,
            bias: Some(self.bias),
            stat: Some(self.stat),
            low_b_cutoff: Some(self.low_b_cutoff),
        }
    }

    /// builds the configured model through the [ModelFactory]
    pub fn build(&self, gtab: &GradientTable, s0: Option<Array3<f32>>) -> Result<Model, ModelError> {
        ModelFactory::init(gtab, &self.model, self.params(s0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DiffusionModel;

    #[test]
    fn default_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.toml");
        let cfg = ModelConfig::default();
        cfg.to_file(&path).unwrap();
        assert_eq!(ModelConfig::from_file(&path).unwrap(), cfg);
    }

    #[test]
    fn partial_files_use_defaults() {
        let cfg: ModelConfig = toml::from_str("model = \"b0\"\nstat = \"median\"\nth_high = 1000.0\n").unwrap();
        assert_eq!(cfg.model, "b0");
        assert_eq!(cfg.stat, Stat::Median);
        assert_eq!(cfg.th_high, Some(1000.));
        assert_eq!(cfg.th_low, None);
        assert!(cfg.bias);
        assert_eq!(cfg.low_b_cutoff, DEFAULT_LOW_B_CUTOFF);
    }

    #[test]
    fn rejects_unknown_stat() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "stat = \"mode\"\n").unwrap();
        assert!(matches!(ModelConfig::from_file(&path), Err(ConfigError::Parse { .. })));
        assert!(matches!(ModelConfig::from_file(dir.path().join("none.toml")), Err(ConfigError::Io { .. })));
    }

    #[test]
    fn build_dispatches_through_factory() {
        let gtab = GradientTable::new(vec![[1., 0., 0.]; 2], vec![0., 1000.]).unwrap();
        let cfg = ModelConfig { model: "trivial".to_string(), ..Default::default() };
        assert_eq!(cfg.build(&gtab, None), Err(ModelError::MissingS0 { model: "TrivialB0Model" }));

        let s0 = Array3::from_elem((2, 2, 2), 7f32);
        let model = cfg.build(&gtab, Some(s0.clone())).unwrap();
        assert_eq!(model.predict(None).unwrap(), s0);

        let cfg = ModelConfig { model: "unknown".to_string(), ..Default::default() };
        assert!(matches!(cfg.build(&gtab, None), Err(ModelError::UnsupportedModel(_))));
    }
}
