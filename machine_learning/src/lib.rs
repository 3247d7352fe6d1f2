pub mod arch;
pub mod dataset;
pub mod error;
pub mod evaluation;
pub mod initialization;
pub mod optimization;
pub mod persistence;
pub mod training;

pub use error::{MlErr, Result};
