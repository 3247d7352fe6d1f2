use std::num::NonZeroUsize;

const DEFAULT_BATCH_SIZE: NonZeroUsize = NonZeroUsize::new(32).unwrap();

/// The knobs of one training run.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainSettings {
    pub epochs: usize,
    pub batch_size: NonZeroUsize,
    pub learning_rate: f32,
    pub seed: u64,
    /// Log the epoch loss every this many epochs, `0` disables reporting.
    pub report_every: usize,
    /// The weight of the baseline smoothness penalty.
    pub smoothness: f32,
}

impl Default for TrainSettings {
    fn default() -> Self {
        Self {
            epochs: 100,
            batch_size: DEFAULT_BATCH_SIZE,
            learning_rate: 1e-3,
            seed: 0,
            report_every: 10,
            smoothness: 1.0,
        }
    }
}
