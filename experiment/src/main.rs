use std::{env, io, path::PathBuf};

use log::{info, warn};

use experiment::ExperimentConfig;

const CONFIG_ENV: &str = "EXPERIMENT_CONFIG";

fn main() -> io::Result<()> {
    env_logger::init();

    let path = env::args()
        .nth(1)
        .or_else(|| env::var(CONFIG_ENV).ok())
        .map(PathBuf::from)
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("usage: experiment <config.json> (or set {CONFIG_ENV})"),
            )
        })?;

    let config = ExperimentConfig::from_file(&path)?;
    info!("running {} from {}", config.dataset, path.display());

    let outcomes = experiment::run(config)?;
    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();

    if failed > 0 {
        warn!("{failed} of {} configurations failed", outcomes.len());
    } else {
        info!("all {} configurations done", outcomes.len());
    }

    Ok(())
}
