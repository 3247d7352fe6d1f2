use std::{
    fs,
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

use machine_learning::{
    arch::{KernelHyperparameters, KernelRegression, ModelConfig, activations::ActFnSpec},
    dataset::DataSplit,
    training::TrainSettings,
};
use serde::{Deserialize, Serialize};

use crate::error::{ExperimentErr, Result};

/// What to do with every configuration of the grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Train a fresh model per seed, save it and evaluate it.
    #[default]
    TrainAndEvaluate,
    /// Evaluate previously saved snapshots only.
    Evaluate,
}

/// The random seeds of the repeated runs, either `n` (seeds `0..n`) or an explicit list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Seeds {
    Count(usize),
    List(Vec<u64>),
}

impl Default for Seeds {
    fn default() -> Self {
        Self::Count(3)
    }
}

impl Seeds {
    pub fn values(&self) -> Vec<u64> {
        match self {
            Seeds::Count(n) => (0..*n as u64).collect(),
            Seeds::List(seeds) => seeds.clone(),
        }
    }
}

/// The single (architecture, hyperparameters) pair to run instead of the whole grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BestCase {
    pub arch: usize,
    pub hyper: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncoderConfig {
    #[serde(default = "default_encoder_width")]
    pub width: usize,
    /// The longest token path hashed into the fingerprint.
    #[serde(default = "default_max_path")]
    pub max_path: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            width: default_encoder_width(),
            max_path: default_max_path(),
        }
    }
}

/// The whole experiment, read from a JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// The dataset name, used in every output file name.
    pub dataset: String,
    /// The input table.
    pub input: PathBuf,
    #[serde(default = "default_id_column")]
    pub id_column: String,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
    #[serde(default)]
    pub encoder: EncoderConfig,

    #[serde(default = "default_valid_frac")]
    pub valid_frac: f32,
    #[serde(default = "default_test_frac")]
    pub test_frac: f32,

    /// The expected amount of points per channel, checked against the table when given.
    #[serde(default)]
    pub points: Option<usize>,
    pub centers: usize,
    #[serde(default = "default_channels")]
    pub channels: usize,
    /// The hidden widths of every architecture in the grid.
    pub architectures: Vec<Vec<usize>>,
    /// The kernel hyperparameters of every point in the grid.
    pub kernels: Vec<KernelHyperparameters>,
    #[serde(default)]
    pub activation: ActFnSpec,
    #[serde(default)]
    pub batch_norm: bool,

    #[serde(default)]
    pub seeds: Seeds,
    #[serde(default = "default_epochs")]
    pub epochs: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,
    #[serde(default = "default_smoothness")]
    pub smoothness: f32,
    #[serde(default = "default_report_every")]
    pub report_every: usize,
    /// The size of the metrics thread pool, `0` lets rayon decide.
    #[serde(default)]
    pub threads: usize,

    #[serde(default)]
    pub best_case: Option<BestCase>,
    #[serde(default)]
    pub mode: RunMode,
}

fn default_encoder_width() -> usize {
    1024
}

fn default_max_path() -> usize {
    7
}

fn default_id_column() -> String {
    "smiles".to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_valid_frac() -> f32 {
    0.1
}

fn default_test_frac() -> f32 {
    0.1
}

fn default_channels() -> usize {
    1
}

fn default_epochs() -> usize {
    1000
}

fn default_batch_size() -> usize {
    32
}

fn default_learning_rate() -> f32 {
    1e-3
}

fn default_smoothness() -> f32 {
    1.0
}

fn default_report_every() -> usize {
    100
}

impl ExperimentConfig {
    /// Reads and validates the configuration at `path`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that would fail halfway through the grid.
    ///
    /// # Errors
    /// A `Config` error describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(ExperimentErr::Config(msg));

        if self.architectures.is_empty() || self.kernels.is_empty() {
            return invalid("at least one architecture and one kernel are required".into());
        }

        if self.seeds.values().is_empty() {
            return invalid("at least one seed is required".into());
        }

        if self.epochs == 0 || self.batch_size == 0 {
            return invalid("epochs and batch size must be positive".into());
        }

        if self.encoder.width == 0 || self.encoder.max_path == 0 {
            return invalid("the encoder width and path length must be positive".into());
        }

        if !(self.learning_rate > 0.) {
            return invalid(format!(
                "the learning rate must be positive, got {}",
                self.learning_rate
            ));
        }

        if let Some(BestCase { arch, hyper }) = self.best_case {
            if arch >= self.architectures.len() || hyper >= self.kernels.len() {
                return invalid(format!(
                    "best case ({arch}, {hyper}) is outside of the {}x{} grid",
                    self.architectures.len(),
                    self.kernels.len()
                ));
            }
        }

        // any split size works as long as the fractions are sound
        DataSplit::new(1_000, self.valid_frac, self.test_frac, 0)
            .map_err(|e| ExperimentErr::Config(e.to_string()))?;

        // building every model catches bad kernels and shapes before training anything
        let points = self.points.unwrap_or(self.centers.max(1));
        for arch in 0..self.architectures.len() {
            for hyper in 0..self.kernels.len() {
                KernelRegression::new(self.model_config(arch, hyper, 1, points))
                    .map_err(|e| ExperimentErr::Config(e.to_string()))?;
            }
        }

        Ok(())
    }

    /// The model at `(arch, hyper)` of the grid, for the given table widths.
    pub fn model_config(
        &self,
        arch: usize,
        hyper: usize,
        input_size: usize,
        points: usize,
    ) -> ModelConfig {
        ModelConfig {
            input_size,
            hidden: self.architectures[arch].clone(),
            kernel: self.kernels[hyper].clone(),
            points,
            centers: self.centers,
            channels: self.channels,
            activation: self.activation,
            batch_norm: self.batch_norm,
        }
    }

    /// The training settings of a run with the given seed.
    pub fn train_settings(&self, seed: u64) -> TrainSettings {
        TrainSettings {
            epochs: self.epochs,
            batch_size: NonZeroUsize::new(self.batch_size).unwrap_or(NonZeroUsize::MIN),
            learning_rate: self.learning_rate,
            seed,
            report_every: self.report_every,
            smoothness: self.smoothness,
        }
    }

    /// Every `(arch, hyper)` pair to run, in grid order.
    pub fn grid(&self) -> Vec<(usize, usize)> {
        if let Some(BestCase { arch, hyper }) = self.best_case {
            return vec![(arch, hyper)];
        }

        (0..self.architectures.len())
            .flat_map(|arch| (0..self.kernels.len()).map(move |hyper| (arch, hyper)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "dataset": "toy",
        "input": "toy.csv",
        "centers": 4,
        "architectures": [[8, 4], [16]],
        "kernels": [
            {"height": 1.0, "bandwidth": 0.01},
            {"height": 0.5, "bandwidth": [0.1, 0.1, 0.2, 0.2]}
        ]
    }"#;

    fn minimal() -> ExperimentConfig {
        serde_json::from_str(MINIMAL).unwrap()
    }

    #[test]
    fn defaults_are_filled_in() {
        let config = minimal();

        assert_eq!(config.id_column, "smiles");
        assert_eq!(config.seeds.values(), [0, 1, 2]);
        assert_eq!(config.mode, RunMode::TrainAndEvaluate);
        assert_eq!(config.encoder, EncoderConfig::default());
        assert_eq!(config.activation, ActFnSpec::LeakyRelu { slope: 0.2 });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn grid_is_the_cartesian_product() {
        let mut config = minimal();
        assert_eq!(config.grid(), [(0, 0), (0, 1), (1, 0), (1, 1)]);

        config.best_case = Some(BestCase { arch: 1, hyper: 0 });
        assert_eq!(config.grid(), [(1, 0)]);
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let mut config = minimal();
        config.best_case = Some(BestCase { arch: 2, hyper: 0 });
        assert!(matches!(config.validate(), Err(ExperimentErr::Config(_))));

        let mut config = minimal();
        config.kernels[1].bandwidth = machine_learning::arch::Bandwidth::PerCenter(vec![0.1; 3]);
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.test_frac = 0.95;
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.points = Some(2);
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.seeds = Seeds::List(vec![]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn seeds_accept_a_count_or_a_list() {
        let config: ExperimentConfig = serde_json::from_str(
            &MINIMAL.replace(r#""centers": 4"#, r#""centers": 4, "seeds": [7, 11]"#),
        )
        .unwrap();

        assert_eq!(config.seeds, Seeds::List(vec![7, 11]));
    }
}
