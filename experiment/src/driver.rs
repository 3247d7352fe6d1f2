use std::path::PathBuf;

use log::{error, info};
use machine_learning::{
    arch::{Bandwidth, ModelConfig},
    dataset::DataSplit,
    evaluation::{Aggregate, Evaluation, Evaluator, SampleMetrics},
    persistence::SnapshotId,
    training::TrainerBuilder,
};

use crate::{
    config::{ExperimentConfig, RunMode},
    data::LoadedData,
    error::{ExperimentErr, Result},
    export::{self, SummaryRow},
};

/// The result of running every seed of one `(arch, hyper)` pair.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub arch: usize,
    pub hyper: usize,
    /// The per seed medians and their aggregate, or why the pair failed.
    pub result: std::result::Result<(Vec<SampleMetrics>, Aggregate), String>,
}

/// Runs the grid search: every architecture and kernel pair, every seed, training then
/// evaluating, and writes the exports and the summary table.
pub struct Driver {
    config: ExperimentConfig,
    data: LoadedData,
}

impl Driver {
    /// Creates a new `Driver`.
    ///
    /// # Errors
    /// If the configuration is invalid or disagrees with the loaded table.
    pub fn new(config: ExperimentConfig, data: LoadedData) -> Result<Self> {
        config.validate()?;

        let columns = data.columns.len();
        if columns % config.channels != 0 {
            return Err(ExperimentErr::Config(format!(
                "{columns} spectral columns can't be split into {} channels",
                config.channels
            )));
        }

        let points = columns / config.channels;
        if let Some(expected) = config.points {
            if expected != points {
                return Err(ExperimentErr::Config(format!(
                    "expected {expected} points per channel, the table has {points}"
                )));
            }
        }

        if config.centers > points {
            return Err(ExperimentErr::Config(format!(
                "{} kernel centers don't fit in {points} points",
                config.centers
            )));
        }

        Ok(Self { config, data })
    }

    /// The amount of spectral points per channel.
    pub fn points(&self) -> usize {
        self.data.columns.len() / self.config.channels
    }

    pub fn model_config(&self, arch: usize, hyper: usize) -> ModelConfig {
        self.config
            .model_config(arch, hyper, self.data.dataset.x_size(), self.points())
    }

    /// Runs every pair of the grid in order.
    ///
    /// A pair whose snapshot can't be read or written is logged and skipped, any other error
    /// stops the whole run.
    pub fn run(&self) -> Result<Vec<Outcome>> {
        let mut outcomes = Vec::new();
        let mut summary = Vec::new();

        for (arch, hyper) in self.config.grid() {
            info!(arch = arch, hyper = hyper; "running configuration");

            let result = match self.run_pair(arch, hyper) {
                Ok((medians, aggregate)) => {
                    info!(
                        arch = arch,
                        hyper = hyper,
                        rmse = aggregate.mean.rmse,
                        rmse_std = aggregate.std.rmse,
                        r2 = aggregate.mean.r2,
                        mae = aggregate.mean.mae,
                        derivative_rmse = aggregate.mean.derivative_rmse;
                        "configuration done"
                    );

                    summary.push(self.summary_row(arch, hyper, medians.len(), &aggregate));
                    Ok((medians, aggregate))
                }
                Err(e) if e.is_snapshot_failure() => {
                    error!("configuration ({arch}, {hyper}) failed: {e}");
                    Err(e.to_string())
                }
                Err(e) => return Err(e),
            };

            outcomes.push(Outcome {
                arch,
                hyper,
                result,
            });
        }

        let path = self
            .config
            .output_dir
            .join(format!("metrics_{}.csv", self.config.dataset));
        export::write_summary(&path, &summary)?;

        Ok(outcomes)
    }

    /// Trains (unless evaluating only) and evaluates every seed of one pair.
    fn run_pair(&self, arch: usize, hyper: usize) -> Result<(Vec<SampleMetrics>, Aggregate)> {
        let model_config = self.model_config(arch, hyper);
        let mut medians = Vec::new();

        for (i, seed) in self.config.seeds.values().into_iter().enumerate() {
            let split = DataSplit::new(
                self.data.dataset.len(),
                self.config.valid_frac,
                self.config.test_frac,
                seed,
            )?;

            let train = self.data.dataset.subset(&split.train)?;
            let test = self.data.dataset.subset(&split.test)?;
            if test.is_empty() {
                return Err(ExperimentErr::Config(format!(
                    "a test fraction of {} leaves no samples out of {}",
                    self.config.test_frac,
                    self.data.dataset.len()
                )));
            }

            let path = self.snapshot_path(SnapshotId::new(i, arch, hyper));

            if self.config.mode == RunMode::TrainAndEvaluate {
                let settings = self.config.train_settings(seed);
                let mut trainer = TrainerBuilder::new().build(model_config.clone(), &settings)?;
                trainer.train(&train)?;
                trainer.save(&path)?;
            }

            let mut evaluator = Evaluator::load(model_config.clone(), &path)?;
            let evaluation = evaluator.evaluate(&test)?;

            info!(
                seed = seed,
                rmse = evaluation.median.rmse,
                r2 = evaluation.median.r2;
                "evaluated ({arch}, {hyper})"
            );

            if i == 0 {
                self.export_profiles(arch, hyper, &evaluation)?;
            }

            medians.push(evaluation.median);
        }

        let aggregate = Aggregate::across(&medians)?;
        Ok((medians, aggregate))
    }

    fn snapshot_path(&self, id: SnapshotId) -> PathBuf {
        self.config.model_dir.join(id.file_name())
    }

    /// The directory of a pair's profiles: the output directory itself when running the best
    /// case only, one subdirectory per pair otherwise.
    pub fn profile_dir(&self, arch: usize, hyper: usize) -> PathBuf {
        let root = &self.config.output_dir;
        match self.config.best_case {
            Some(_) => root.clone(),
            None => root.join(format!("layer{arch:03}_hyper{hyper:03}")),
        }
    }

    /// Writes the ground truth and the predictions of an evaluation in the table's units.
    fn export_profiles(&self, arch: usize, hyper: usize, evaluation: &Evaluation) -> Result<()> {
        let dir = self.profile_dir(arch, hyper);
        let dataset = &self.config.dataset;

        let ids: Vec<String> = evaluation
            .indices
            .iter()
            .map(|&row| {
                self.data
                    .identifier(row)
                    .map_or_else(|| row.to_string(), str::to_string)
            })
            .collect();

        let scaler = &self.data.spectra_scaler;
        let truth = scaler.inverse(evaluation.truth.view());
        let predictions = scaler.inverse(evaluation.predictions.view());

        for (name, values) in [("exp", truth), ("pred", predictions)] {
            let path = dir.join(format!("{name}_profiles_{dataset}.csv"));
            export::write_profiles(&path, &self.data.columns, &ids, values.view())?;
        }

        Ok(())
    }

    fn summary_row(
        &self,
        arch: usize,
        hyper: usize,
        runs: usize,
        aggregate: &Aggregate,
    ) -> SummaryRow {
        let kernel = &self.config.kernels[hyper];
        let bandwidth = match &kernel.bandwidth {
            Bandwidth::Scalar(v) => v.to_string(),
            Bandwidth::PerCenter(v) => v
                .iter()
                .map(f32::to_string)
                .collect::<Vec<_>>()
                .join(" "),
        };

        SummaryRow::new(
            (arch, hyper),
            &self.config.architectures[arch],
            kernel.height,
            bandwidth,
            runs,
            aggregate,
        )
    }
}

/// Sizes the global rayon pool used for the metrics, `0` keeps rayon's default.
pub fn init_thread_pool(threads: usize) {
    if threads == 0 {
        return;
    }

    if let Err(e) = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
    {
        log::warn!("couldn't size the thread pool: {e}");
    }
}
