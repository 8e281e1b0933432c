//! [`ActionEstimator`] backed by the action-value network.
//!
//! Inference errors are reported to the caller as [`EstimatorError`]; the core
//! scorer then falls back to its heuristic for that batch.

use crate::device::{DevicePreference, device_info, select_device};
use crate::model::ActionMlp;
use anyhow::Result;
use candle_core::Tensor;
use emblem_core::{ActionEstimator, ActionFeatures, EstimatorError, FEATURE_DIM};
use std::path::Path;

pub struct MlpEstimator {
    model: ActionMlp,
    name: String,
}

impl MlpEstimator {
    /// Load a safetensors checkpoint.
    pub fn load(path: impl AsRef<Path>, pref: DevicePreference) -> Result<Self> {
        let path = path.as_ref();
        let device = select_device(pref);
        let model = ActionMlp::load(path, &device)?;
        log::info!(
            "Loaded action estimator {} on {}",
            path.display(),
            device_info(&device)
        );
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "weights".to_string());
        Ok(Self::from_model(model, format!("mlp:{}", stem)))
    }

    pub fn from_model(model: ActionMlp, name: impl Into<String>) -> Self {
        Self {
            model,
            name: name.into(),
        }
    }

    fn infer(&self, batch: &[ActionFeatures]) -> candle_core::Result<Vec<f32>> {
        let flat: Vec<f32> = batch.iter().flat_map(|f| f.to_vector()).collect();
        let xs = Tensor::from_vec(flat, (batch.len(), FEATURE_DIM), self.model.device())?;
        self.model.forward(&xs)?.squeeze(1)?.to_vec1::<f32>()
    }
}

impl ActionEstimator for MlpEstimator {
    fn name(&self) -> &str {
        &self.name
    }

    fn estimate(&self, batch: &[ActionFeatures]) -> Result<Vec<f32>, EstimatorError> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        self.infer(batch).map_err(|e| {
            log::error!("{} inference failed: {}", self.name, e);
            EstimatorError::Inference(e.to_string())
        })
    }
}
