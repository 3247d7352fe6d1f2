use crate::Result;

/// An algorithm that updates the model's parameters given their gradient.
pub trait Optimizer {
    /// Takes one optimization step.
    ///
    /// # Errors
    /// A `SizeMismatch` error if `grad` and `params` differ in length.
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()>;
}
