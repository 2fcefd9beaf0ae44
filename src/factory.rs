use crate::gradients::GradientTable;
use crate::model::{AverageDwModel, Model, ModelError, ModelParams, TrivialB0Model};

type Constructor = fn(&GradientTable, ModelParams) -> Result<Model, ModelError>;

/// symbolic model keys (lowercase) and the constructors they map to
const MODEL_REGISTRY: &[(&str, Constructor)] = &[
    ("avg", build_average_dw),
    ("average", build_average_dw),
    ("averagedw", build_average_dw),
    ("b0", build_trivial_b0),
    ("s0", build_trivial_b0),
    ("trivial", build_trivial_b0),
];

fn build_average_dw(gtab: &GradientTable, params: ModelParams) -> Result<Model, ModelError> {
    AverageDwModel::new(gtab, params).map(Model::AverageDw)
}

fn build_trivial_b0(gtab: &GradientTable, params: ModelParams) -> Result<Model, ModelError> {
    TrivialB0Model::new(gtab, params).map(Model::TrivialB0)
}

/// Builds models from a symbolic name so callers do not depend on the concrete model types.
pub struct ModelFactory;

impl ModelFactory {
    /// looks up `model` (case-insensitive) and forwards `params` unchanged to that model's
    /// constructor
    pub fn init(gtab: &GradientTable, model: &str, params: ModelParams) -> Result<Model, ModelError> {
        let key = model.trim().to_ascii_lowercase();
        let (_, constructor) = MODEL_REGISTRY.iter()
            .find(|(name, _)| *name == key)
            .ok_or_else(|| ModelError::UnsupportedModel(model.to_string()))?;
        let built = constructor(gtab, params)?;
        tracing::debug!(key = %key, model = built.name(), n_gradients = gtab.len(), "model initialised");
        Ok(built)
    }

    /// every key accepted by [ModelFactory::init]
    pub fn supported() -> impl Iterator<Item = &'static str> {
        MODEL_REGISTRY.iter().map(|(name, _)| *name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dwi::Dwi;
    use crate::model::{DiffusionModel, Stat};
    use ndarray::Array4;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn synthetic_dwi() -> Dwi {
        let bvals = vec![0., 1000., 1000., 2000., 0., 1000., 2000., 1000., 500., 2000., 1000., 0., 1000., 3000.];
        let bvecs = (0..bvals.len()).map(|i| {
            let t = i as f32 * 0.7;
            [t.cos(), t.sin(), 0.5]
        }).collect();
        let gtab = GradientTable::new(bvecs, bvals).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let data = Array4::from_shape_fn((6, 5, 4, gtab.len()), |_| rng.random_range(20.0f32..200.0));
        let dwi = Dwi::new(data, gtab).unwrap();
        let b0 = dwi.estimate_bzero(50.).unwrap();
        dwi.with_bzero(b0).unwrap()
    }

    fn params(dwi: &Dwi) -> ModelParams {
        ModelParams {
            s0: dwi.bzero().cloned(),
            th_low: Some(100.),
            th_high: Some(1000.),
            bias: Some(true),
            stat: Some(Stat::Mean),
            low_b_cutoff: None,
        }
    }

    #[test]
    fn factory_matches_direct_construction() {
        let dwi = synthetic_dwi();
        let (train, test) = dwi.logo_split(10).unwrap();

        let mut direct = AverageDwModel::new(&train.gradients, params(&dwi)).unwrap();
        direct.fit(train.data.view()).unwrap();
        let predicted1 = direct.predict(Some(&test.gradient)).unwrap();

        let mut via_factory = ModelFactory::init(&train.gradients, "avg", params(&dwi)).unwrap();
        via_factory.fit(train.data.view()).unwrap();
        let predicted2 = via_factory.predict(Some(&test.gradient)).unwrap();

        assert_eq!(predicted1, predicted2);
        assert_eq!(via_factory, Model::AverageDw(direct));
    }

    #[test]
    fn factory_keys_are_case_insensitive() {
        let dwi = synthetic_dwi();
        let model = ModelFactory::init(dwi.gradients(), "AVG", params(&dwi)).unwrap();
        assert_eq!(model.name(), AverageDwModel::NAME);
        let model = ModelFactory::init(dwi.gradients(), "Trivial", params(&dwi)).unwrap();
        assert_eq!(model.name(), TrivialB0Model::NAME);
        let model = ModelFactory::init(dwi.gradients(), "b0", params(&dwi)).unwrap();
        assert_eq!(model.predict(None).unwrap(), dwi.bzero().cloned().unwrap());
    }

    #[test]
    fn factory_rejects_unknown_models() {
        let dwi = synthetic_dwi();
        assert_eq!(
            ModelFactory::init(dwi.gradients(), "dti", params(&dwi)),
            Err(ModelError::UnsupportedModel("dti".to_string()))
        );
    }

    #[test]
    fn factory_forwards_construction_errors() {
        let dwi = synthetic_dwi();
        assert_eq!(
            ModelFactory::init(dwi.gradients(), "b0", ModelParams::default()),
            Err(ModelError::MissingS0 { model: TrivialB0Model::NAME })
        );
    }

    #[test]
    fn supported_keys() {
        let keys = ModelFactory::supported().collect::<Vec<_>>();
        assert!(keys.contains(&"avg"));
        assert!(keys.contains(&"b0"));
        assert!(keys.iter().all(|k| k.to_ascii_lowercase() == *k));
    }
}
