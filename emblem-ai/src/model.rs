//! The action-value network.
//!
//! A four-layer perceptron `FEATURE_DIM -> 64 -> 32 -> 16 -> 1` with ReLU
//! between layers. Weight names follow a sequential layout where linear
//! layers sit at even indices (`network.0`, `network.2`, ...) and the
//! activations in between carry no weights, so checkpoints exported from a
//! sequential training model load unchanged.

use anyhow::{Context, Result};
use candle_core::{DType, Device, Module, Tensor};
use candle_nn::{Linear, VarBuilder, linear};
use emblem_core::FEATURE_DIM;
use safetensors::SafeTensors;
use std::path::Path;
use thiserror::Error;

pub const HIDDEN: [usize; 3] = [64, 32, 16];

const PREFIX: &str = "network";

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("weights file is missing tensor {0}")]
    MissingTensor(String),
    #[error("tensor {name} has shape {actual:?}, expected {expected:?}")]
    Shape {
        name: String,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },
}

/// (input, output) width of each linear layer.
fn layer_dims() -> Vec<(usize, usize)> {
    let widths: Vec<usize> = std::iter::once(FEATURE_DIM)
        .chain(HIDDEN)
        .chain(std::iter::once(1))
        .collect();
    widths.windows(2).map(|w| (w[0], w[1])).collect()
}

fn layer_index(layer: usize) -> String {
    (layer * 2).to_string()
}

pub struct ActionMlp {
    layers: Vec<Linear>,
    device: Device,
}

impl ActionMlp {
    pub fn new(vb: VarBuilder) -> candle_core::Result<Self> {
        let device = vb.device().clone();
        let vb = vb.pp(PREFIX);
        let layers = layer_dims()
            .into_iter()
            .enumerate()
            .map(|(i, (input, output))| linear(input, output, vb.pp(layer_index(i))))
            .collect::<candle_core::Result<Vec<_>>>()?;
        Ok(Self { layers, device })
    }

    /// Load from a safetensors checkpoint after checking every tensor shape.
    pub fn load(path: &Path, device: &Device) -> Result<Self> {
        let data = std::fs::read(path)
            .with_context(|| format!("Failed to read weights {}", path.display()))?;
        let tensors =
            SafeTensors::deserialize(&data).context("Failed to parse estimator safetensors")?;
        validate(&tensors)?;

        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[path], DType::F32, device)? };
        Self::new(vb).context("Failed to build estimator network")
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// `(batch, FEATURE_DIM)` in, `(batch, 1)` out.
    pub fn forward(&self, xs: &Tensor) -> candle_core::Result<Tensor> {
        let last = self.layers.len() - 1;
        let mut h = xs.clone();
        for (i, layer) in self.layers.iter().enumerate() {
            h = layer.forward(&h)?;
            if i < last {
                h = h.relu()?;
            }
        }
        Ok(h)
    }
}

fn validate(tensors: &SafeTensors) -> Result<(), ModelError> {
    for (i, (input, output)) in layer_dims().into_iter().enumerate() {
        let base = format!("{}.{}", PREFIX, layer_index(i));
        check_shape(tensors, &format!("{}.weight", base), &[output, input])?;
        check_shape(tensors, &format!("{}.bias", base), &[output])?;
    }
    Ok(())
}

fn check_shape(tensors: &SafeTensors, name: &str, expected: &[usize]) -> Result<(), ModelError> {
    let view = tensors
        .tensor(name)
        .map_err(|_| ModelError::MissingTensor(name.to_string()))?;
    if view.shape() != expected {
        return Err(ModelError::Shape {
            name: name.to_string(),
            expected: expected.to_vec(),
            actual: view.shape().to_vec(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_dims() {
        assert_eq!(
            layer_dims(),
            vec![(FEATURE_DIM, 64), (64, 32), (32, 16), (16, 1)]
        );
        assert_eq!(layer_index(3), "6");
    }

    #[test]
    fn test_zero_weights_give_zero_scores() {
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let model = ActionMlp::new(vb).unwrap();
        let xs = Tensor::ones((3, FEATURE_DIM), DType::F32, &Device::Cpu).unwrap();
        let out = model.forward(&xs).unwrap();
        assert_eq!(out.dims(), &[3, 1]);
        let values: Vec<f32> = out.flatten_all().unwrap().to_vec1().unwrap();
        assert_eq!(values, vec![0.0; 3]);
    }
}
