use ndarray::prelude::*;

use super::{Mode, TensorSpec};
use crate::{MlErr, Result};

const EPSILON: f32 = 1e-5;
const MOMENTUM: f32 = 0.1;

/// Normalizes each feature over the batch, then scales and shifts it.
///
/// The parameter slice holds the scales followed by the shifts. While training the batch
/// statistics are used and folded into running estimates; at inference the running estimates are
/// used instead, so predictions don't depend on the batch composition.
#[derive(Clone, Debug)]
pub struct BatchNorm {
    dim: usize,
    running_mean: Array1<f32>,
    running_var: Array1<f32>,

    // Forward metadata
    x_hat: Array2<f32>,
    inv_std: Array1<f32>,
}

impl BatchNorm {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            running_mean: Array1::zeros(dim),
            running_var: Array1::ones(dim),
            x_hat: Array2::zeros((0, dim)),
            inv_std: Array1::zeros(dim),
        }
    }

    pub fn size(&self) -> usize {
        2 * self.dim
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn layout(&self) -> Vec<TensorSpec> {
        vec![
            TensorSpec::new("gamma", vec![self.dim]),
            TensorSpec::new("beta", vec![self.dim]),
        ]
    }

    pub fn buffer_layout(&self) -> Vec<TensorSpec> {
        vec![
            TensorSpec::new("running_mean", vec![self.dim]),
            TensorSpec::new("running_var", vec![self.dim]),
        ]
    }

    pub fn write_buffers(&self, out: &mut Vec<f32>) {
        out.extend(self.running_mean.iter());
        out.extend(self.running_var.iter());
    }

    pub fn read_buffers(&mut self, data: &[f32]) -> Result<()> {
        if data.len() != 2 * self.dim {
            return Err(MlErr::SizeMismatch {
                what: "batch norm buffers",
                got: data.len(),
                expected: 2 * self.dim,
            });
        }

        let (mean, var) = data.split_at(self.dim);
        self.running_mean.assign(&ArrayView1::from(mean));
        self.running_var.assign(&ArrayView1::from(var));
        Ok(())
    }

    pub fn forward(
        &mut self,
        params: &[f32],
        x: ArrayView2<f32>,
        mode: Mode,
    ) -> Result<Array2<f32>> {
        if x.ncols() != self.dim {
            return Err(MlErr::SizeMismatch {
                what: "batch norm input",
                got: x.ncols(),
                expected: self.dim,
            });
        }

        let (gamma, beta) = self.view_params(params)?;

        let (mean, var) = match mode {
            Mode::Train => {
                let n = x.nrows();
                let mean = x.mean_axis(Axis(0)).ok_or(MlErr::EmptyDataset)?;
                let var = (&x - &mean)
                    .mapv(|v| v * v)
                    .mean_axis(Axis(0))
                    .ok_or(MlErr::EmptyDataset)?;

                // a single row has no spread, folding it in would drag the variance to zero
                if n > 1 {
                    let unbiased = &var * (n as f32 / (n - 1) as f32);
                    self.running_mean = &self.running_mean * (1. - MOMENTUM) + &mean * MOMENTUM;
                    self.running_var = &self.running_var * (1. - MOMENTUM) + &unbiased * MOMENTUM;
                }

                (mean, var)
            }
            Mode::Infer => (self.running_mean.clone(), self.running_var.clone()),
        };

        let inv_std = var.mapv(|v| 1. / (v + EPSILON).sqrt());
        let x_hat = (&x - &mean) * &inv_std;
        let y = &x_hat * &gamma + &beta;

        if mode == Mode::Train {
            self.x_hat = x_hat;
            self.inv_std = inv_std;
        }

        Ok(y)
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        if d.dim() != self.x_hat.dim() {
            return Err(MlErr::SizeMismatch {
                what: "batch norm delta rows",
                got: d.nrows(),
                expected: self.x_hat.nrows(),
            });
        }

        let (gamma, _) = self.view_params(params)?;
        let n = d.nrows() as f32;

        let (dgamma, dbeta) = grad.split_at_mut(self.dim);
        let sum_d_x_hat = (&d * &self.x_hat).sum_axis(Axis(0));
        ArrayViewMut1::from(dgamma).assign(&sum_d_x_hat);
        ArrayViewMut1::from(dbeta).assign(&d.sum_axis(Axis(0)));

        let dx_hat = &d * &gamma;
        let sum_dx_hat = dx_hat.sum_axis(Axis(0));
        let sum_dx_hat_x_hat = (&dx_hat * &self.x_hat).sum_axis(Axis(0));

        let dx = (&dx_hat * n - &sum_dx_hat - &self.x_hat * &sum_dx_hat_x_hat)
            * (&self.inv_std / n);
        Ok(dx)
    }

    fn view_params<'a>(
        &self,
        params: &'a [f32],
    ) -> Result<(ArrayView1<'a, f32>, ArrayView1<'a, f32>)> {
        if params.len() != self.size() {
            return Err(MlErr::SizeMismatch {
                what: "batch norm parameters",
                got: params.len(),
                expected: self.size(),
            });
        }

        let (gamma, beta) = params.split_at(self.dim);
        Ok((ArrayView1::from(gamma), ArrayView1::from(beta)))
    }
}
