use std::{error::Error, fmt, io};

use machine_learning::MlErr;

/// The experiment module's result type.
pub type Result<T> = std::result::Result<T, ExperimentErr>;

/// Everything that can stop an experiment.
#[derive(Debug)]
pub enum ExperimentErr {
    /// Invalid configuration, caught before anything is trained.
    Config(String),
    Io(io::Error),
    Csv(csv::Error),
    Json(serde_json::Error),
    Ml(MlErr),
    /// Every row of the input table was dropped.
    EmptyDataset,
}

impl ExperimentErr {
    /// Whether the error only concerns the snapshot of one configuration, so the remaining
    /// configurations can still run.
    pub fn is_snapshot_failure(&self) -> bool {
        matches!(
            self,
            ExperimentErr::Ml(MlErr::Io(_) | MlErr::Snapshot(_) | MlErr::SnapshotMismatch(_))
        )
    }
}

impl fmt::Display for ExperimentErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExperimentErr::Config(msg) => write!(f, "invalid config: {msg}"),
            ExperimentErr::Io(e) => write!(f, "io error: {e}"),
            ExperimentErr::Csv(e) => write!(f, "csv error: {e}"),
            ExperimentErr::Json(e) => write!(f, "json error: {e}"),
            ExperimentErr::Ml(e) => write!(f, "{e}"),
            ExperimentErr::EmptyDataset => write!(f, "no valid rows left in the input table"),
        }
    }
}

impl Error for ExperimentErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ExperimentErr::Io(e) => Some(e),
            ExperimentErr::Csv(e) => Some(e),
            ExperimentErr::Json(e) => Some(e),
            ExperimentErr::Ml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ExperimentErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<csv::Error> for ExperimentErr {
    fn from(value: csv::Error) -> Self {
        Self::Csv(value)
    }
}

impl From<serde_json::Error> for ExperimentErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<MlErr> for ExperimentErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}

/// Boundary conversion for the binary.
impl From<ExperimentErr> for io::Error {
    fn from(value: ExperimentErr) -> Self {
        match value {
            ExperimentErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
