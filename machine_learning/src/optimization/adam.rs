use super::Optimizer;
use crate::{MlErr, Result};

pub const DEFAULT_BETAS: (f32, f32) = (0.5, 0.999);
pub const DEFAULT_EPSILON: f32 = 1e-8;
pub const DEFAULT_WEIGHT_DECAY: f32 = 1e-5;

/// The Adam optimizer with L2 weight decay folded into the gradient.
#[derive(Debug)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    beta1_t: f32,
    beta2_t: f32,
    v: Box<[f32]>,
    s: Box<[f32]>,
    epsilon: f32,
    weight_decay: f32,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `beta1`, `beta2`, `epsilon` - Hyperparameters to the optimization algorithm.
    /// * `weight_decay` - The L2 coefficient, `weight_decay * p` is added to each gradient.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn new(
        len: usize,
        learning_rate: f32,
        beta1: f32,
        beta2: f32,
        epsilon: f32,
        weight_decay: f32,
    ) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            beta1_t: 1.,
            beta2_t: 1.,
            v: vec![0.; len].into_boxed_slice(),
            s: vec![0.; len].into_boxed_slice(),
            epsilon,
            weight_decay,
        }
    }

    /// Creates an `Adam` optimizer with betas `(0.5, 0.999)`, epsilon `1e-8` and weight decay
    /// `1e-5`.
    pub fn with_defaults(len: usize, learning_rate: f32) -> Self {
        let (beta1, beta2) = DEFAULT_BETAS;
        Self::new(
            len,
            learning_rate,
            beta1,
            beta2,
            DEFAULT_EPSILON,
            DEFAULT_WEIGHT_DECAY,
        )
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, grad: &[f32], params: &mut [f32]) -> Result<()> {
        if grad.len() != params.len() || params.len() != self.v.len() {
            return Err(MlErr::SizeMismatch {
                what: "adam update",
                got: grad.len(),
                expected: self.v.len(),
            });
        }

        let Self {
            learning_rate: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            weight_decay: wd,
            ..
        } = *self;

        self.beta1_t *= b1;
        self.beta2_t *= b2;

        let bc1 = 1. - self.beta1_t;
        let bc2 = 1. - self.beta2_t;
        let step_size = lr * (bc2.sqrt() / bc1);

        params
            .iter_mut()
            .zip(grad)
            .zip(self.v.iter_mut())
            .zip(self.s.iter_mut())
            .for_each(|(((p, g), v), s)| {
                let g = g + wd * *p;
                *v = b1 * *v + (1. - b1) * g;
                *s = b2 * *s + (1. - b2) * g.powi(2);
                *p -= step_size * *v / (s.sqrt() + eps);
            });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_moves_by_the_learning_rate() {
        let mut adam = Adam::new(2, 0.1, 0.5, 0.999, 1e-8, 0.);
        let mut params = [1., -1.];

        adam.update_params(&[4., -0.5], &mut params).unwrap();

        assert!((params[0] - 0.9).abs() < 1e-5);
        assert!((params[1] + 0.9).abs() < 1e-5);
    }

    #[test]
    fn weight_decay_pulls_towards_zero() {
        let mut adam = Adam::new(1, 0.01, 0.5, 0.999, 1e-8, 1.);
        let mut params = [2.];

        adam.update_params(&[0.], &mut params).unwrap();

        assert!(params[0] < 2.);
    }

    #[test]
    fn size_mismatch() {
        let mut adam = Adam::with_defaults(3, 0.01);
        let mut params = [0.; 3];

        assert!(adam.update_params(&[0.; 2], &mut params).is_err());
    }
}
