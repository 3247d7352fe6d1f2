use std::{num::NonZeroUsize, path::Path};

use log::{debug, info};
use ndarray::{ArrayView2, Axis};
use rand::{Rng, seq::SliceRandom};

use crate::{
    MlErr, Result,
    arch::{
        KernelRegression,
        layers::Mode,
        loss::{LossFn, Smoothness},
    },
    dataset::Dataset,
    optimization::Optimizer,
    persistence,
};

/// Trains one kernel regression model by minibatch gradient descent.
///
/// The loss of a batch is the one of `loss_fn` plus the smoothness penalty of the model's
/// baseline. The trainer owns the model, its parameters and the optimizer state for the whole
/// run.
pub struct Trainer<O, L, R>
where
    O: Optimizer,
    L: LossFn,
    R: Rng,
{
    model: KernelRegression,
    params: Vec<f32>,
    grad: Vec<f32>,
    optimizer: O,
    loss_fn: L,
    smoothness: Smoothness,

    epochs: usize,
    batch_size: NonZeroUsize,
    report_every: usize,
    rng: R,
}

impl<O, L, R> Trainer<O, L, R>
where
    O: Optimizer,
    L: LossFn,
    R: Rng,
{
    /// Returns a new `Trainer`.
    ///
    /// # Arguments
    /// * `model` - The model that will be trained.
    /// * `params` - Its initial parameters.
    /// * `optimizer` - The optimizer, sized for `params`.
    /// * `loss_fn` - The loss between the model's output and the expected one.
    /// * `smoothness` - The penalty on the model's baseline.
    /// * `epochs` - The amount of passes over the training data.
    /// * `batch_size` - The amount of samples per optimization step.
    /// * `report_every` - How often to log the epoch loss, `0` never does.
    /// * `rng` - The random number generator used to shuffle the data every epoch.
    ///
    /// # Errors
    /// A `SizeMismatch` error if `params` doesn't fit the model.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        model: KernelRegression,
        params: Vec<f32>,
        optimizer: O,
        loss_fn: L,
        smoothness: Smoothness,
        epochs: usize,
        batch_size: NonZeroUsize,
        report_every: usize,
        rng: R,
    ) -> Result<Self> {
        if params.len() != model.size() {
            return Err(MlErr::SizeMismatch {
                what: "trainer parameters",
                got: params.len(),
                expected: model.size(),
            });
        }

        Ok(Self {
            grad: vec![0.; params.len()],
            model,
            params,
            optimizer,
            loss_fn,
            smoothness,
            epochs,
            batch_size,
            report_every,
            rng,
        })
    }

    pub fn model(&self) -> &KernelRegression {
        &self.model
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    /// Gives up the trained model and its parameters.
    pub fn into_parts(self) -> (KernelRegression, Vec<f32>) {
        (self.model, self.params)
    }

    /// Runs every epoch over `dataset`.
    ///
    /// # Returns
    /// The mean batch loss of every epoch.
    ///
    /// # Errors
    /// If the dataset is empty or its widths don't match the model.
    pub fn train(&mut self, dataset: &Dataset) -> Result<Vec<f32>> {
        self.check_dataset(dataset)?;

        let mut losses = Vec::with_capacity(self.epochs);
        for epoch in 1..=self.epochs {
            let loss = self.epoch(dataset)?;

            if self.report_every > 0 && epoch % self.report_every == 0 {
                info!(epoch = epoch, loss = loss; "training");
            }

            losses.push(loss);
        }

        Ok(losses)
    }

    /// Computes the penalized loss of the current parameters over `dataset` without updating
    /// anything.
    pub fn loss(&mut self, dataset: &Dataset) -> Result<f32> {
        self.check_dataset(dataset)?;

        let y_pred = self.model.predict(&self.params, dataset.x())?;
        let baseline = self.model.baseline(&self.params)?;

        Ok(self.loss_fn.loss(y_pred.view(), dataset.y()) + self.smoothness.penalty(baseline))
    }

    /// Writes the current parameters to `path`.
    pub fn save(&self, path: &Path) -> Result<()> {
        persistence::save(&self.model, &self.params, path)?;
        debug!("saved parameters to {}", path.display());
        Ok(())
    }

    fn epoch(&mut self, dataset: &Dataset) -> Result<f32> {
        let mut order: Vec<usize> = (0..dataset.len()).collect();
        order.shuffle(&mut self.rng);

        let mut total = 0.;
        let mut batches = 0;

        for rows in order.chunks(self.batch_size.get()) {
            let x = dataset.x().select(Axis(0), rows);
            let y = dataset.y().select(Axis(0), rows);

            total += self.step(x.view(), y.view())?;
            batches += 1;
        }

        Ok(total / batches as f32)
    }

    fn step(&mut self, x: ArrayView2<f32>, y: ArrayView2<f32>) -> Result<f32> {
        let y_pred = self.model.forward(&self.params, x, Mode::Train)?;

        let baseline = self.model.baseline(&self.params)?;
        let loss = self.loss_fn.loss(y_pred.view(), y) + self.smoothness.penalty(baseline);
        let d = self.loss_fn.loss_prime(y_pred.view(), y);

        self.model.backward(&self.params, &mut self.grad, d)?;

        let offset = self.params.len() - baseline.len();
        self.smoothness
            .accumulate_grad(&self.params[offset..], &mut self.grad[offset..]);

        self.optimizer.update_params(&self.grad, &mut self.params)?;
        Ok(loss)
    }

    fn check_dataset(&self, dataset: &Dataset) -> Result<()> {
        if dataset.is_empty() {
            return Err(MlErr::EmptyDataset);
        }

        let config = self.model.config();

        if dataset.x_size() != config.input_size {
            return Err(MlErr::SizeMismatch {
                what: "training inputs",
                got: dataset.x_size(),
                expected: config.input_size,
            });
        }

        if dataset.y_size() != config.output_size() {
            return Err(MlErr::SizeMismatch {
                what: "training targets",
                got: dataset.y_size(),
                expected: config.output_size(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array2;

    use super::*;
    use crate::{
        arch::{Bandwidth, KernelHyperparameters, ModelConfig},
        training::{TrainSettings, TrainerBuilder},
    };

    fn config() -> ModelConfig {
        ModelConfig::new(
            4,
            vec![6],
            KernelHyperparameters::new(1., Bandwidth::Scalar(0.05)),
            8,
            3,
        )
    }

    fn dataset(rows: usize, x_size: usize, y_size: usize) -> Dataset {
        let x = Array2::from_shape_fn((rows, x_size), |(i, j)| ((i + j) % 2) as f32);
        let y = Array2::from_shape_fn((rows, y_size), |(i, j)| (i as f32 + j as f32) / 20.);
        Dataset::new(x, y).unwrap()
    }

    #[test]
    fn mismatched_widths_fail_fast() {
        let settings = TrainSettings::default();
        let mut trainer = TrainerBuilder::new().build(config(), &settings).unwrap();

        assert!(matches!(
            trainer.train(&dataset(4, 5, 8)),
            Err(MlErr::SizeMismatch { what: "training inputs", .. })
        ));
        assert!(matches!(
            trainer.train(&dataset(4, 4, 9)),
            Err(MlErr::SizeMismatch { what: "training targets", .. })
        ));
        assert!(matches!(trainer.train(&dataset(0, 4, 8)), Err(MlErr::EmptyDataset)));
    }

    #[test]
    fn reports_one_loss_per_epoch() {
        let settings = TrainSettings {
            epochs: 7,
            batch_size: NonZeroUsize::new(3).unwrap(),
            ..Default::default()
        };

        let mut trainer = TrainerBuilder::new().build(config(), &settings).unwrap();
        let losses = trainer.train(&dataset(5, 4, 8)).unwrap();

        assert_eq!(losses.len(), 7);
        assert!(losses.iter().all(|l| l.is_finite()));
    }
}
