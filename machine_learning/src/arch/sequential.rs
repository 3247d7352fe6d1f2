use ndarray::{Array2, ArrayView2};

use super::layers::{Layer, Mode, TensorSpec};
use crate::{MlErr, Result};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
///
/// The parameters of every layer live in a single flat slice, one after the other, in the same
/// order as the layers.
#[derive(Clone, Debug)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Returns the amount of parameters in the model.
    pub fn size(&self) -> usize {
        self.layers.iter().map(Layer::size).sum()
    }

    pub fn buffer_size(&self) -> usize {
        self.layers.iter().map(Layer::buffer_size).sum()
    }

    /// Returns the names and shapes of every parameter tensor, prefixed with the layer index.
    pub fn layout(&self) -> Vec<(String, TensorSpec)> {
        Self::prefixed(&self.layers, Layer::layout)
    }

    /// Returns the names and shapes of every buffer tensor, prefixed with the layer index.
    pub fn buffer_layout(&self) -> Vec<(String, TensorSpec)> {
        Self::prefixed(&self.layers, Layer::buffer_layout)
    }

    pub fn buffers(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.buffer_size());
        for layer in &self.layers {
            layer.write_buffers(&mut out);
        }

        out
    }

    pub fn set_buffers(&mut self, mut data: &[f32]) -> Result<()> {
        let expected = self.buffer_size();
        if data.len() != expected {
            return Err(MlErr::SizeMismatch {
                what: "sequential buffers",
                got: data.len(),
                expected,
            });
        }

        for layer in &mut self.layers {
            let (head, tail) = data.split_at(layer.buffer_size());
            layer.read_buffers(head)?;
            data = tail;
        }

        Ok(())
    }

    /// Makes a forward pass through the network.
    ///
    /// # Arguments
    /// * `params` - The parameters of every layer.
    /// * `x` - The input data, one sample per row.
    /// * `mode` - Whether the pass is part of training.
    ///
    /// # Returns
    /// The prediction for the given input or an error if occurred.
    pub fn forward(
        &mut self,
        params: &[f32],
        x: ArrayView2<f32>,
        mode: Mode,
    ) -> Result<Array2<f32>> {
        self.check_params(params.len())?;

        let mut rest = params;
        let mut x = x.to_owned();

        for layer in self.layers.iter_mut() {
            let (head, tail) = rest.split_at(layer.size());
            x = layer.forward(head, x.view(), mode)?;
            rest = tail;
        }

        Ok(x)
    }

    /// Backpropagates `d`, the derivative of the loss with respect to the output of the last
    /// forward pass, writing each layer's gradient into its section of `grad`.
    ///
    /// # Returns
    /// The derivative of the loss with respect to the input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        self.check_params(params.len())?;
        self.check_params(grad.len())?;

        let mut end = params.len();
        for layer in self.layers.iter_mut().rev() {
            let start = end - layer.size();
            d = layer.backward(&params[start..end], &mut grad[start..end], d)?;
            end = start;
        }

        Ok(d)
    }

    fn check_params(&self, got: usize) -> Result<()> {
        let expected = self.size();
        if got != expected {
            return Err(MlErr::SizeMismatch {
                what: "sequential parameters",
                got,
                expected,
            });
        }

        Ok(())
    }

    fn prefixed<F>(layers: &[Layer], layout: F) -> Vec<(String, TensorSpec)>
    where
        F: Fn(&Layer) -> Vec<TensorSpec>,
    {
        layers
            .iter()
            .enumerate()
            .flat_map(|(i, layer)| {
                layout(layer)
                    .into_iter()
                    .map(move |spec| (format!("trunk.{i}.{}", spec.name), spec))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::arch::activations::ActFn;

    fn two_layer() -> Sequential {
        Sequential::new([
            Layer::dense((2, 2)),
            Layer::batch_norm(2),
            Layer::activation(ActFn::leaky_relu(0.2)),
            Layer::dense((2, 1)),
        ])
    }

    #[test]
    fn size_and_layout_agree() {
        let model = two_layer();
        let layout = model.layout();

        assert_eq!(model.size(), 6 + 4 + 3);
        assert_eq!(layout.iter().map(|(_, spec)| spec.len()).sum::<usize>(), model.size());
        assert_eq!(layout[0].0, "trunk.0.weight");
        assert_eq!(layout[2].0, "trunk.1.gamma");
        assert_eq!(model.buffer_layout()[1].0, "trunk.1.running_var");
        assert_eq!(model.buffer_size(), 4);
    }

    #[test]
    fn wrong_amount_of_params_fails() {
        let mut model = two_layer();
        let params = vec![0.; model.size() - 1];
        let x = array![[1f32, 2.]];

        assert!(model.forward(&params, x.view(), Mode::Infer).is_err());
    }

    #[test]
    fn backward_returns_input_shaped_delta() {
        let mut model = two_layer();
        let params: Vec<f32> = (0..model.size()).map(|i| i as f32 * 0.1).collect();
        let mut grad = vec![0.; model.size()];
        let x = array![[1f32, 2.], [3., -1.], [0.5, 0.5]];

        let y = model.forward(&params, x.view(), Mode::Train).unwrap();
        let d = model.backward(&params, &mut grad, Array2::ones(y.dim())).unwrap();

        assert_eq!(d.dim(), x.dim());
        assert!(grad.iter().any(|g| *g != 0.));
    }
}
