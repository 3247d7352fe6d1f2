pub mod activations;
pub mod config;
pub mod kernel;
mod kernel_regression;
pub mod layers;
pub mod loss;
mod sequential;

pub use config::ModelConfig;
pub use kernel::{Bandwidth, KernelHyperparameters, rbf_kernel_matrix, unit_grid};
pub use kernel_regression::KernelRegression;
pub use sequential::Sequential;
