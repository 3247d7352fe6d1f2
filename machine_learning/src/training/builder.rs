use std::{cell::RefCell, rc::Rc};

use rand::{Rng, SeedableRng, rngs::StdRng};

use super::{TrainSettings, Trainer};
use crate::{
    Result,
    arch::{
        KernelRegression, ModelConfig,
        loss::{Mse, Smoothness},
    },
    optimization::Adam,
};

/// The trainer every experiment uses: Adam, mean squared error and a seeded standard generator.
pub type DefaultTrainer = Trainer<Adam, Mse, StdRng>;

/// Builds `Trainer`s given a model configuration and the run settings.
#[derive(Default)]
pub struct TrainerBuilder;

impl TrainerBuilder {
    /// Creates a new `TrainerBuilder`.
    pub fn new() -> Self {
        Self
    }

    /// Builds a freshly initialized model and its trainer.
    ///
    /// Everything random, the initial parameters and the shuffling order, derives from
    /// `settings.seed`.
    ///
    /// # Errors
    /// If the configuration is invalid.
    pub fn build(&self, config: ModelConfig, settings: &TrainSettings) -> Result<DefaultTrainer> {
        let model = KernelRegression::new(config)?;

        let rng = Rc::new(RefCell::new(StdRng::seed_from_u64(settings.seed)));
        let params = model.initial_params(rng.clone())?;
        let shuffle_seed = rng.borrow_mut().random::<u64>();

        let optimizer = Adam::with_defaults(params.len(), settings.learning_rate);

        Trainer::new(
            model,
            params,
            optimizer,
            Mse,
            Smoothness::new(settings.smoothness),
            settings.epochs,
            settings.batch_size,
            settings.report_every,
            StdRng::seed_from_u64(shuffle_seed),
        )
    }
}
