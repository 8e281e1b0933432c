//! Smoke tests for plugging the learned estimator into the core scorer.
//!
//! These run on any platform (CPU fallback).

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use emblem_ai::{ActionMlp, DevicePreference, MlpEstimator, select_device};
use emblem_core::testing::SnapshotBuilder;
use emblem_core::{ActionEnumerator, ActionScorer, FEATURE_DIM, Pos};
use std::collections::HashMap;

#[test]
fn test_gpu_preferred_doesnt_panic() {
    let device = select_device(DevicePreference::GpuPreferred);
    let t = Tensor::ones((4, 4), DType::F32, &device).unwrap();
    let sum: f32 = t.sum_all().unwrap().to_scalar().unwrap();
    assert_eq!(sum, 16.0);
}

#[test]
fn test_scorer_uses_estimator_name_and_ranks_everything() {
    let snapshot = SnapshotBuilder::new(6, 6)
        .ally(1, Pos::new(2, 2), |_| {})
        .enemy(10, Pos::new(2, 4), |_| {})
        .build();
    let unit = snapshot.ally(1).unwrap();
    let actions = ActionEnumerator::new(&snapshot).enumerate(unit, None);
    let count = actions.len();

    let model = ActionMlp::new(VarBuilder::zeros(DType::F32, &Device::Cpu)).unwrap();
    let scorer = ActionScorer::with_estimator(Box::new(MlpEstimator::from_model(model, "zeros")));
    assert_eq!(scorer.name(), "zeros");

    let ranked = scorer.rank(&snapshot, actions.clone());
    assert_eq!(ranked.len(), count);
    // All-zero network: every score ties, so enumeration order survives.
    assert_eq!(
        ranked.iter().map(|a| a.target).collect::<Vec<_>>(),
        actions.iter().map(|a| a.target).collect::<Vec<_>>()
    );
}

#[test]
fn test_bias_only_checkpoint_scores_constant() {
    // Zero weights: every layer emits its bias, so the output is the last bias.
    let mut tensors = HashMap::new();
    let dims = [(FEATURE_DIM, 64usize), (64, 32), (32, 16), (16, 1)];
    for (i, (input, output)) in dims.into_iter().enumerate() {
        let name = format!("network.{}", i * 2);
        tensors.insert(
            format!("{}.weight", name),
            Tensor::zeros((output, input), DType::F32, &Device::Cpu).unwrap(),
        );
        tensors.insert(
            format!("{}.bias", name),
            Tensor::ones(output, DType::F32, &Device::Cpu).unwrap(),
        );
    }
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bias.safetensors");
    candle_core::safetensors::save(&tensors, &path).unwrap();

    let estimator = MlpEstimator::load(&path, DevicePreference::CpuOnly).unwrap();
    let snapshot = SnapshotBuilder::new(3, 3).ally(1, Pos::new(1, 1), |_| {}).build();
    let unit = snapshot.ally(1).unwrap();
    let actions = ActionEnumerator::new(&snapshot).moves(unit, None);
    let ranked = ActionScorer::with_estimator(Box::new(estimator)).rank(&snapshot, actions);
    assert!(!ranked.is_empty());
    assert!(ranked.iter().all(|a| a.score == 1.0));
}
