use std::{cell::RefCell, rc::Rc};

use ndarray::{Array2, Array3, ArrayView1, ArrayView2, Axis, linalg, s};
use rand::Rng;

use super::{
    Sequential,
    activations::ActFn,
    config::ModelConfig,
    layers::{Layer, Mode, TensorSpec},
};
use crate::{
    MlErr, Result,
    initialization::{ChainedParamGen, ConstParamGen, ParamGen, RandParamGen},
};

const BATCH_NORM_SCALE_STD: f32 = 0.02;

/// Maps fingerprints to spectra.
///
/// A feed forward trunk predicts `G` coefficients per channel, which the fixed RBF kernel matrix
/// expands into `W` spectral points. A learned baseline shared by every channel is added on top.
///
/// The parameters are the trunk's, followed by the `W` baseline values. The kernel matrix is not
/// trainable and is rebuilt from the configuration.
#[derive(Clone, Debug)]
pub struct KernelRegression {
    config: ModelConfig,
    trunk: Sequential,
    kernel: Array2<f32>,
}

impl KernelRegression {
    /// Builds the model described by `config`.
    ///
    /// # Errors
    /// If the configuration or its kernel hyperparameters are invalid.
    pub fn new(config: ModelConfig) -> Result<Self> {
        config.validate()?;
        let kernel = config.kernel.matrix(config.centers, config.points)?;

        let act_fn = ActFn::from(config.activation);
        let mut layers = Vec::with_capacity(3 * config.hidden.len() + 1);
        let mut fan_in = config.input_size;

        for &width in &config.hidden {
            layers.push(Layer::dense((fan_in, width)));
            if config.batch_norm {
                layers.push(Layer::batch_norm(width));
            }
            layers.push(Layer::activation(act_fn.clone()));
            fan_in = width;
        }

        layers.push(Layer::dense((fan_in, config.coefficients())));

        Ok(Self {
            config,
            trunk: Sequential::new(layers),
            kernel,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn kernel(&self) -> ArrayView2<'_, f32> {
        self.kernel.view()
    }

    /// Returns the amount of trainable parameters, trunk and baseline.
    pub fn size(&self) -> usize {
        self.trunk.size() + self.config.points
    }

    /// Returns the baseline section of `params`.
    pub fn baseline<'a>(&self, params: &'a [f32]) -> Result<&'a [f32]> {
        let (_, baseline) = self.split(params)?;
        Ok(baseline)
    }

    /// Samples a fresh set of parameters: Xavier normal dense weights, unit centered batch norm
    /// scales and zeros everywhere else.
    pub fn initial_params<R: Rng + 'static>(&self, rng: Rc<RefCell<R>>) -> Result<Vec<f32>> {
        let mut param_gens: Vec<Box<dyn ParamGen>> = Vec::new();

        for layer in self.trunk.layers() {
            match layer {
                Layer::Dense(dense) => {
                    let (fan_in, fan_out) = dense.dim();
                    let weights =
                        RandParamGen::xavier(rng.clone(), fan_in * fan_out, fan_in, fan_out)?;
                    param_gens.push(Box::new(weights));
                    param_gens.push(Box::new(ConstParamGen::zeros(fan_out)));
                }
                Layer::BatchNorm(batch_norm) => {
                    let dim = batch_norm.dim();
                    let scales = RandParamGen::normal(rng.clone(), dim, 1., BATCH_NORM_SCALE_STD)?;
                    param_gens.push(Box::new(scales));
                    param_gens.push(Box::new(ConstParamGen::zeros(dim)));
                }
                Layer::Activation(_) => {}
            }
        }

        param_gens.push(Box::new(ConstParamGen::zeros(self.config.points)));

        let size = self.size();
        let params = ChainedParamGen::new(param_gens)
            .sample(size)
            .unwrap_or_default();

        if params.len() != size {
            return Err(MlErr::SizeMismatch {
                what: "initial parameters",
                got: params.len(),
                expected: size,
            });
        }

        Ok(params)
    }

    /// Predicts a batch of spectra, one `R * W` row per fingerprint row of `x`.
    ///
    /// # Arguments
    /// * `params` - The trunk parameters followed by the baseline.
    /// * `x` - The fingerprints, one per row.
    /// * `mode` - Training caches what `backward` needs and updates the batch norm statistics.
    pub fn forward(
        &mut self,
        params: &[f32],
        x: ArrayView2<f32>,
        mode: Mode,
    ) -> Result<Array2<f32>> {
        let (trunk_params, baseline) = self.split(params)?;
        let coefficients = self.trunk.forward(trunk_params, x, mode)?;
        self.expand(coefficients.view(), ArrayView1::from(baseline))
    }

    /// Inference only forward pass.
    pub fn predict(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.forward(params, x, Mode::Infer)
    }

    /// Backpropagates `d`, the derivative of the loss with respect to the last training forward
    /// pass, writing the gradient of every parameter into `grad`.
    pub fn backward(&mut self, params: &[f32], grad: &mut [f32], d: Array2<f32>) -> Result<()> {
        let (trunk_params, _) = self.split(params)?;
        if grad.len() != params.len() {
            return Err(MlErr::SizeMismatch {
                what: "kernel regression gradient",
                got: grad.len(),
                expected: params.len(),
            });
        }

        let (batch, centers, channels, points) = self.dims(d.nrows());
        if d.ncols() != channels * points {
            return Err(MlErr::SizeMismatch {
                what: "kernel regression delta",
                got: d.ncols(),
                expected: channels * points,
            });
        }

        let (trunk_grad, baseline_grad) = grad.split_at_mut(trunk_params.len());
        baseline_grad.fill(0.);

        let mut d_coefficients = Array3::zeros((batch, centers, channels));
        for r in 0..channels {
            let d_r = d.slice(s![.., r * points..(r + 1) * points]);

            for (b, g) in baseline_grad.iter_mut().zip(d_r.sum_axis(Axis(0))) {
                *b += g;
            }

            linalg::general_mat_mul(
                1.0,
                &d_r,
                &self.kernel.t(),
                0.0,
                &mut d_coefficients.index_axis_mut(Axis(2), r),
            );
        }

        let d_coefficients = d_coefficients.into_shape_with_order((batch, centers * channels))?;
        self.trunk.backward(trunk_params, trunk_grad, d_coefficients)?;

        Ok(())
    }

    /// Returns the names and shapes of every trainable tensor, in parameter order.
    pub fn layout(&self) -> Vec<(String, TensorSpec)> {
        let mut layout = self.trunk.layout();
        layout.push((
            "baseline".to_string(),
            TensorSpec::new("baseline", vec![self.config.points]),
        ));

        layout
    }

    /// Returns the names and shapes of every non trainable tensor kept between passes.
    pub fn buffer_layout(&self) -> Vec<(String, TensorSpec)> {
        self.trunk.buffer_layout()
    }

    pub fn buffers(&self) -> Vec<f32> {
        self.trunk.buffers()
    }

    pub fn set_buffers(&mut self, data: &[f32]) -> Result<()> {
        self.trunk.set_buffers(data)
    }

    fn expand(
        &self,
        coefficients: ArrayView2<f32>,
        baseline: ArrayView1<f32>,
    ) -> Result<Array2<f32>> {
        let (batch, centers, channels, points) = self.dims(coefficients.nrows());

        let coefficients = coefficients.as_standard_layout();
        let coefficients = coefficients.view().into_shape_with_order((batch, centers, channels))?;

        let mut out = Array2::zeros((batch, channels * points));
        for r in 0..channels {
            let mut out_r = out.slice_mut(s![.., r * points..(r + 1) * points]);
            linalg::general_mat_mul(
                1.0,
                &coefficients.index_axis(Axis(2), r),
                &self.kernel,
                0.0,
                &mut out_r,
            );
            out_r += &baseline;
        }

        Ok(out)
    }

    fn split<'a>(&self, params: &'a [f32]) -> Result<(&'a [f32], &'a [f32])> {
        let expected = self.size();
        if params.len() != expected {
            return Err(MlErr::SizeMismatch {
                what: "kernel regression parameters",
                got: params.len(),
                expected,
            });
        }

        Ok(params.split_at(self.trunk.size()))
    }

    fn dims(&self, batch: usize) -> (usize, usize, usize, usize) {
        let ModelConfig {
            centers,
            channels,
            points,
            ..
        } = self.config;

        (batch, centers, channels, points)
    }
}
