mod activation;
mod batch_norm;
mod dense;
mod layer;

pub use activation::Activation;
pub use batch_norm::BatchNorm;
pub use dense::Dense;
pub use layer::{Layer, Mode, TensorSpec};
