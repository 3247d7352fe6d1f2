pub mod config;
pub mod data;
pub mod driver;
pub mod error;
pub mod export;
pub mod fingerprint;

pub use config::ExperimentConfig;
pub use driver::{Driver, Outcome};
pub use error::{ExperimentErr, Result};

use fingerprint::PathFingerprint;

/// Loads the input table and runs the whole grid described by `config`.
///
/// # Errors
/// If the configuration is invalid, the table can't be read or a configuration fails for any
/// reason other than its snapshot.
pub fn run(config: ExperimentConfig) -> Result<Vec<Outcome>> {
    config.validate()?;
    driver::init_thread_pool(config.threads);

    let encoder = PathFingerprint::new(config.encoder.width, config.encoder.max_path);
    let data = data::load(&config.input, &config.id_column, &encoder)?;
    log::info!(
        "loaded {} samples of {} points, dropped {} rows",
        data.dataset.len(),
        data.columns.len(),
        data.dropped
    );

    Driver::new(config, data)?.run()
}
