use ndarray::{Array2, ArrayView2};

use super::LossFn;

/// Mean squared error, averaged over every sample and every output point.
#[derive(Debug, Default, Clone, Copy)]
pub struct Mse;

impl LossFn for Mse {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        (&y_pred - &y).mapv(|e| e * e).mean().unwrap_or_default()
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        (&y_pred - &y) * (2.0 / y_pred.len() as f32)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn loss_is_averaged_over_all_points() {
        let y_pred = array![[1f32, 2.], [3., 4.]];
        let y = array![[1f32, 0.], [3., 2.]];

        assert_eq!(Mse.loss(y_pred.view(), y.view()), 2.);
        assert_eq!(Mse.loss_prime(y_pred.view(), y.view()), array![[0f32, 1.], [0., 1.]]);
    }
}
