use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use ndarray::ShapeError;
use rand_distr::NormalError;
use safetensors::SafeTensorError;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    InvalidConfig(String),
    InvalidSplit(String),
    Shape(ShapeError),
    Rand(NormalError),
    Io(io::Error),
    Snapshot(SafeTensorError),
    SnapshotMismatch(String),
    EmptyDataset,
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::InvalidConfig(msg) => write!(f, "invalid model configuration: {msg}"),
            MlErr::InvalidSplit(msg) => write!(f, "invalid data split: {msg}"),
            MlErr::Shape(e) => write!(f, "shape error: {e}"),
            MlErr::Rand(e) => write!(f, "failed to build the initialization distribution: {e}"),
            MlErr::Io(e) => write!(f, "io error: {e}"),
            MlErr::Snapshot(e) => write!(f, "malformed parameter snapshot: {e}"),
            MlErr::SnapshotMismatch(msg) => {
                write!(f, "the snapshot doesn't match the model: {msg}")
            }
            MlErr::EmptyDataset => write!(f, "the dataset has no samples"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Shape(e) => Some(e),
            MlErr::Rand(e) => Some(e),
            MlErr::Io(e) => Some(e),
            MlErr::Snapshot(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}

impl From<NormalError> for MlErr {
    fn from(value: NormalError) -> Self {
        Self::Rand(value)
    }
}

impl From<io::Error> for MlErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<SafeTensorError> for MlErr {
    fn from(value: SafeTensorError) -> Self {
        Self::Snapshot(value)
    }
}
