use ndarray::{linalg, prelude::*};

use super::{Mode, TensorSpec};
use crate::{MlErr, Result};

/// A fully connected layer, `z = x · w + b`.
///
/// The weights are laid out row major with shape `(inputs, outputs)` and are followed by the
/// biases in the parameter slice.
#[derive(Clone, Debug)]
pub struct Dense {
    dim: (usize, usize),
    size: usize,

    // Forward metadata
    x: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The amount of inputs and outputs of the layer.
    pub fn new(dim: (usize, usize)) -> Self {
        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            x: Array2::zeros((0, dim.0)),
        }
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    pub fn layout(&self) -> Vec<TensorSpec> {
        vec![
            TensorSpec::new("weight", vec![self.dim.0, self.dim.1]),
            TensorSpec::new("bias", vec![self.dim.1]),
        ]
    }

    /// Computes the affine transformation of `x`, caching the input when training.
    pub fn forward(
        &mut self,
        params: &[f32],
        x: ArrayView2<f32>,
        mode: Mode,
    ) -> Result<Array2<f32>> {
        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense layer input",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let (w, b) = self.view_params(params)?;
        let mut z = Array2::zeros((x.nrows(), self.dim.1));
        linalg::general_mat_mul(1.0, &x, &w, 0.0, &mut z);
        z += &b;

        if mode == Mode::Train {
            self.x = x.to_owned();
        }

        Ok(z)
    }

    /// Writes the weight and bias gradients into `grad` and returns the delta for the previous
    /// layer.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        if d.nrows() != self.x.nrows() {
            return Err(MlErr::SizeMismatch {
                what: "dense layer delta rows",
                got: d.nrows(),
                expected: self.x.nrows(),
            });
        }

        let (mut dw, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &self.x.t(), &d, 0.0, &mut dw);
        db.assign(&d.sum_axis(Axis(0)));

        let (w, _) = self.view_params(params)?;
        let mut dx = Array2::zeros((d.nrows(), self.dim.0));
        linalg::general_mat_mul(1.0, &d, &w.t(), 0.0, &mut dx);

        Ok(dx)
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        let w_size = self.size - self.dim.1;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw)?;
        let db = ArrayViewMut1::from_shape(self.dim.1, db_raw)?;
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        if params.len() != self.size {
            return Err(MlErr::SizeMismatch {
                what: "dense layer parameters",
                got: params.len(),
                expected: self.size,
            });
        }

        let w_size = self.size - self.dim.1;
        let weights = ArrayView2::from_shape(self.dim, &params[..w_size])?;
        let biases = ArrayView1::from_shape(self.dim.1, &params[w_size..])?;
        Ok((weights, biases))
    }
}
