use serde::{Deserialize, Serialize};

use super::{activations::ActFnSpec, kernel::KernelHyperparameters};
use crate::{MlErr, Result};

/// Everything that determines the shape of a kernel regression model.
///
/// Two models built from equal configurations accept each other's parameter snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// The width of the fingerprint fed to the trunk.
    pub input_size: usize,
    /// The widths of the hidden dense layers, in order.
    pub hidden: Vec<usize>,
    pub kernel: KernelHyperparameters,
    /// The amount of spectral points per channel, `W`.
    pub points: usize,
    /// The amount of kernel centers, `G`.
    pub centers: usize,
    #[serde(default = "default_channels")]
    pub channels: usize,
    #[serde(default)]
    pub activation: ActFnSpec,
    #[serde(default)]
    pub batch_norm: bool,
}

fn default_channels() -> usize {
    1
}

impl ModelConfig {
    /// Creates a single channel configuration with the default activation and no batch
    /// normalization.
    pub fn new(
        input_size: usize,
        hidden: Vec<usize>,
        kernel: KernelHyperparameters,
        points: usize,
        centers: usize,
    ) -> Self {
        Self {
            input_size,
            hidden,
            kernel,
            points,
            centers,
            channels: default_channels(),
            activation: ActFnSpec::default(),
            batch_norm: false,
        }
    }

    /// The width of the trunk's last layer, `G * R`.
    pub fn coefficients(&self) -> usize {
        self.centers * self.channels
    }

    /// The length of a predicted sample, `R * W`.
    pub fn output_size(&self) -> usize {
        self.points * self.channels
    }

    /// Checks the configuration describes a buildable model.
    ///
    /// # Errors
    /// An `InvalidConfig` error naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(MlErr::InvalidConfig(msg));

        if self.input_size == 0 {
            return invalid("the input size must be positive".into());
        }

        if let Some(i) = self.hidden.iter().position(|&h| h == 0) {
            return invalid(format!("hidden layer {i} has no units"));
        }

        if self.points == 0 || self.centers == 0 || self.channels == 0 {
            return invalid(format!(
                "points ({}), centers ({}) and channels ({}) must be positive",
                self.points, self.centers, self.channels
            ));
        }

        if self.centers > self.points {
            return invalid(format!(
                "there can't be more kernel centers ({}) than points ({})",
                self.centers, self.points
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::kernel::Bandwidth;

    fn config() -> ModelConfig {
        ModelConfig::new(
            32,
            vec![8, 4],
            KernelHyperparameters::new(1., Bandwidth::Scalar(0.01)),
            16,
            4,
        )
    }

    #[test]
    fn defaults_are_filled_in() {
        let json = r#"{
            "input_size": 32,
            "hidden": [8, 4],
            "kernel": {"height": 1.0, "bandwidth": 0.01},
            "points": 16,
            "centers": 4
        }"#;

        let parsed: ModelConfig = serde_json::from_str(json).unwrap();
        assert_eq!(parsed, config());
        assert_eq!(parsed.output_size(), 16);
    }

    #[test]
    fn more_centers_than_points_is_invalid() {
        let mut config = config();
        config.centers = 17;
        assert!(matches!(config.validate(), Err(MlErr::InvalidConfig(_))));
    }

    #[test]
    fn empty_hidden_layer_is_invalid() {
        let mut config = config();
        config.hidden = vec![8, 0];
        assert!(config.validate().is_err());

        config.hidden = vec![];
        assert!(config.validate().is_ok());
    }
}
