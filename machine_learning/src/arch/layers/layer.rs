use ndarray::{Array2, ArrayView2};

use super::{Activation, BatchNorm, Dense};
use crate::{Result, arch::activations::ActFn};

/// Whether a forward pass is part of training or of inference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Train,
    Infer,
}

/// The name and shape of one tensor inside a layer's parameter or buffer slice.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TensorSpec {
    pub name: &'static str,
    pub shape: Vec<usize>,
}

impl TensorSpec {
    pub fn new(name: &'static str, shape: Vec<usize>) -> Self {
        Self { name, shape }
    }

    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }
}

#[derive(Clone, Debug)]
pub enum Layer {
    Dense(Dense),
    BatchNorm(BatchNorm),
    Activation(Activation),
}

impl Layer {
    pub fn dense(dim: (usize, usize)) -> Self {
        Self::Dense(Dense::new(dim))
    }

    pub fn batch_norm(dim: usize) -> Self {
        Self::BatchNorm(BatchNorm::new(dim))
    }

    pub fn activation(act_fn: ActFn) -> Self {
        Self::Activation(Activation::new(act_fn))
    }

    /// Returns the amount of trainable parameters of the layer.
    pub fn size(&self) -> usize {
        match self {
            Self::Dense(l) => l.size(),
            Self::BatchNorm(l) => l.size(),
            Self::Activation(_) => 0,
        }
    }

    /// Returns the amount of non trainable values the layer keeps between passes.
    pub fn buffer_size(&self) -> usize {
        self.buffer_layout().iter().map(TensorSpec::len).sum()
    }

    pub fn layout(&self) -> Vec<TensorSpec> {
        match self {
            Self::Dense(l) => l.layout(),
            Self::BatchNorm(l) => l.layout(),
            Self::Activation(_) => Vec::new(),
        }
    }

    pub fn buffer_layout(&self) -> Vec<TensorSpec> {
        match self {
            Self::BatchNorm(l) => l.buffer_layout(),
            _ => Vec::new(),
        }
    }

    pub fn write_buffers(&self, out: &mut Vec<f32>) {
        if let Self::BatchNorm(l) = self {
            l.write_buffers(out);
        }
    }

    pub fn read_buffers(&mut self, data: &[f32]) -> Result<()> {
        match self {
            Self::BatchNorm(l) => l.read_buffers(data),
            _ => Ok(()),
        }
    }

    pub fn forward(
        &mut self,
        params: &[f32],
        x: ArrayView2<f32>,
        mode: Mode,
    ) -> Result<Array2<f32>> {
        match self {
            Self::Dense(l) => l.forward(params, x, mode),
            Self::BatchNorm(l) => l.forward(params, x, mode),
            Self::Activation(l) => Ok(l.forward(x, mode)),
        }
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        match self {
            Self::Dense(l) => l.backward(params, grad, d),
            Self::BatchNorm(l) => l.backward(params, grad, d),
            Self::Activation(l) => l.backward(d),
        }
    }
}
