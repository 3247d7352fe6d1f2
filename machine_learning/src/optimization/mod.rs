mod adam;
mod optimizer;

pub use adam::{Adam, DEFAULT_BETAS, DEFAULT_EPSILON, DEFAULT_WEIGHT_DECAY};
pub use optimizer::Optimizer;
