//! # Emblem AI
//!
//! Learned action estimator for the tactical turn engine, evaluated with
//! Candle. Weights are a plain safetensors checkpoint; training happens
//! elsewhere.

pub mod device;
pub mod estimator;
pub mod model;

pub use device::{DevicePreference, UnknownDevice, device_info, select_device};
pub use estimator::MlpEstimator;
pub use model::{ActionMlp, ModelError};
