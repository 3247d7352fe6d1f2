use ndarray::prelude::*;

use super::Mode;
use crate::{MlErr, Result, arch::activations::ActFn};

/// A parameterless layer applying an activation function element-wise.
#[derive(Clone, Debug)]
pub struct Activation {
    act_fn: ActFn,

    // Forward metadata
    z: Array2<f32>,
}

impl Activation {
    pub fn new(act_fn: ActFn) -> Self {
        Self {
            act_fn,
            z: Array2::zeros((0, 0)),
        }
    }

    pub fn forward(&mut self, z: ArrayView2<f32>, mode: Mode) -> Array2<f32> {
        if mode == Mode::Train {
            self.z = z.to_owned();
        }

        z.mapv(|z| self.act_fn.f(z))
    }

    pub fn backward(&mut self, mut d: Array2<f32>) -> Result<Array2<f32>> {
        if d.dim() != self.z.dim() {
            return Err(MlErr::SizeMismatch {
                what: "activation delta rows",
                got: d.nrows(),
                expected: self.z.nrows(),
            });
        }

        d.zip_mut_with(&self.z, |d, &z| *d *= self.act_fn.df(z));
        Ok(d)
    }
}
