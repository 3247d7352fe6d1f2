use std::num::NonZeroUsize;

use machine_learning::{
    arch::{Bandwidth, KernelHyperparameters, ModelConfig},
    dataset::Dataset,
    training::TrainSettings,
};
use ndarray::Array2;

pub const FINGERPRINT: usize = 32;
pub const POINTS: usize = 16;

/// Ten fingerprint/spectrum pairs: sparse bit patterns mapped to smooth bumps whose center
/// depends on the set bits.
pub fn synthetic(rows: usize) -> Dataset {
    let x = Array2::from_shape_fn((rows, FINGERPRINT), |(i, j)| {
        if (i * 7 + j * 3) % 5 == 0 { 1. } else { 0. }
    });

    let y = Array2::from_shape_fn((rows, POINTS), |(i, w)| {
        let center = (i % 4) as f32 / 3.;
        let pos = w as f32 / (POINTS - 1) as f32;
        0.2 + 0.6 * (-(pos - center).powi(2) / 0.05).exp()
    });

    Dataset::new(x, y).unwrap()
}

pub fn config(hidden: Vec<usize>, centers: usize) -> ModelConfig {
    ModelConfig::new(
        FINGERPRINT,
        hidden,
        KernelHyperparameters::new(1., Bandwidth::Scalar(0.01)),
        POINTS,
        centers,
    )
}

pub fn settings(epochs: usize, seed: u64) -> TrainSettings {
    TrainSettings {
        epochs,
        batch_size: NonZeroUsize::new(10).unwrap(),
        learning_rate: 0.01,
        seed,
        report_every: 10,
        smoothness: 1.0,
    }
}
