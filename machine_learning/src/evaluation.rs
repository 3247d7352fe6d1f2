use std::path::Path;

use ndarray::{Array2, ArrayView1};
use rayon::prelude::*;

use crate::{
    MlErr, Result,
    arch::{KernelRegression, ModelConfig},
    dataset::Dataset,
    persistence,
};

/// The error measures of one predicted spectrum against its ground truth.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SampleMetrics {
    pub rmse: f32,
    pub r2: f32,
    pub mae: f32,
    /// The RMSE between the first differences of both curves, taken within each channel.
    pub derivative_rmse: f32,
}

impl SampleMetrics {
    /// Computes every metric for one sample.
    ///
    /// # Arguments
    /// * `truth` - The expected spectrum, `R` channels of `points` values each.
    /// * `pred` - The predicted spectrum, same layout.
    /// * `points` - The length of each channel.
    pub fn compute(truth: ArrayView1<f32>, pred: ArrayView1<f32>, points: usize) -> Self {
        let truth: Vec<f32> = truth.iter().copied().collect();
        let pred: Vec<f32> = pred.iter().copied().collect();
        let n = truth.len().max(1) as f32;

        let ss_res: f32 = truth.iter().zip(&pred).map(|(t, p)| (t - p).powi(2)).sum();
        let abs: f32 = truth.iter().zip(&pred).map(|(t, p)| (t - p).abs()).sum();

        let mean = truth.iter().sum::<f32>() / n;
        let ss_tot: f32 = truth.iter().map(|t| (t - mean).powi(2)).sum();

        let r2 = if ss_tot > 0. {
            1. - ss_res / ss_tot
        } else if ss_res == 0. {
            1.
        } else {
            0.
        };

        let slope = |curve: &[f32]| -> Vec<f32> {
            curve
                .chunks(points.max(1))
                .flat_map(|channel| channel.windows(2).map(|w| w[1] - w[0]))
                .collect()
        };

        let (d_truth, d_pred) = (slope(&truth), slope(&pred));
        let d_res: f32 = d_truth.iter().zip(&d_pred).map(|(t, p)| (t - p).powi(2)).sum();
        let derivative_rmse = if d_truth.is_empty() {
            0.
        } else {
            (d_res / d_truth.len() as f32).sqrt()
        };

        Self {
            rmse: (ss_res / n).sqrt(),
            r2,
            mae: abs / n,
            derivative_rmse,
        }
    }

    /// Takes the median of every metric independently.
    ///
    /// # Errors
    /// `EmptyDataset` if there are no samples.
    pub fn median(samples: &[SampleMetrics]) -> Result<Self> {
        let metric = |f: fn(&SampleMetrics) -> f32| {
            let mut values: Vec<f32> = samples.iter().map(f).collect();
            median(&mut values).ok_or(MlErr::EmptyDataset)
        };

        Ok(Self {
            rmse: metric(|m| m.rmse)?,
            r2: metric(|m| m.r2)?,
            mae: metric(|m| m.mae)?,
            derivative_rmse: metric(|m| m.derivative_rmse)?,
        })
    }

    fn zip_with(&self, other: &Self, f: impl Fn(f32, f32) -> f32) -> Self {
        Self {
            rmse: f(self.rmse, other.rmse),
            r2: f(self.r2, other.r2),
            mae: f(self.mae, other.mae),
            derivative_rmse: f(self.derivative_rmse, other.derivative_rmse),
        }
    }
}

/// The median of `values`, the mean of the two middle values for an even amount.
pub fn median(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }

    values.sort_by(f32::total_cmp);
    let mid = values.len() / 2;

    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.)
    } else {
        Some(values[mid])
    }
}

/// The mean and population standard deviation of per seed medians.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aggregate {
    pub mean: SampleMetrics,
    pub std: SampleMetrics,
}

impl Aggregate {
    /// Aggregates the medians of several seed runs of the same configuration.
    ///
    /// # Errors
    /// `EmptyDataset` if there are no runs.
    pub fn across(medians: &[SampleMetrics]) -> Result<Self> {
        if medians.is_empty() {
            return Err(MlErr::EmptyDataset);
        }

        let n = medians.len() as f32;
        let sum = medians
            .iter()
            .fold(SampleMetrics::default(), |acc, m| acc.zip_with(m, |a, b| a + b));
        let mean = sum.zip_with(&sum, |s, _| s / n);

        let sq = medians.iter().fold(SampleMetrics::default(), |acc, m| {
            let dev = m.zip_with(&mean, |v, mu| (v - mu).powi(2));
            acc.zip_with(&dev, |a, b| a + b)
        });
        let std = sq.zip_with(&sq, |s, _| (s / n).sqrt());

        Ok(Self { mean, std })
    }
}

/// The outcome of evaluating a model over a held out dataset.
#[derive(Clone, Debug)]
pub struct Evaluation {
    /// The source row of every evaluated sample, in dataset order.
    pub indices: Vec<usize>,
    pub truth: Array2<f32>,
    pub predictions: Array2<f32>,
    pub samples: Vec<SampleMetrics>,
    pub median: SampleMetrics,
}

/// Scores a trained model against held out data.
pub struct Evaluator {
    model: KernelRegression,
    params: Vec<f32>,
}

impl Evaluator {
    /// Creates an `Evaluator` for an in memory model.
    ///
    /// # Errors
    /// A `SizeMismatch` error if `params` doesn't fit the model.
    pub fn new(model: KernelRegression, params: Vec<f32>) -> Result<Self> {
        if params.len() != model.size() {
            return Err(MlErr::SizeMismatch {
                what: "evaluated parameters",
                got: params.len(),
                expected: model.size(),
            });
        }

        Ok(Self { model, params })
    }

    /// Rebuilds the model of `config` from the snapshot at `path`.
    pub fn load(config: ModelConfig, path: &Path) -> Result<Self> {
        let (model, params) = persistence::load(config, path)?;
        Self::new(model, params)
    }

    pub fn model(&self) -> &KernelRegression {
        &self.model
    }

    /// Predicts every sample of `dataset` and scores each prediction.
    ///
    /// The per sample metrics are computed in parallel and collected in dataset order.
    pub fn evaluate(&mut self, dataset: &Dataset) -> Result<Evaluation> {
        if dataset.is_empty() {
            return Err(MlErr::EmptyDataset);
        }

        let expected = self.model.config().output_size();
        if dataset.y_size() != expected {
            return Err(MlErr::SizeMismatch {
                what: "evaluated targets",
                got: dataset.y_size(),
                expected,
            });
        }

        let predictions = self.model.predict(&self.params, dataset.x())?;
        let truth = dataset.y().to_owned();
        let points = self.model.config().points;

        let samples: Vec<SampleMetrics> = (0..dataset.len())
            .into_par_iter()
            .map(|i| SampleMetrics::compute(truth.row(i), predictions.row(i), points))
            .collect();

        let median = SampleMetrics::median(&samples)?;

        Ok(Evaluation {
            indices: dataset.indices().to_vec(),
            truth,
            predictions,
            samples,
            median,
        })
    }
}
