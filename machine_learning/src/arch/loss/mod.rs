mod loss_fn;
mod mse;
mod smoothness;

pub use loss_fn::LossFn;
pub use mse::Mse;
pub use smoothness::Smoothness;
