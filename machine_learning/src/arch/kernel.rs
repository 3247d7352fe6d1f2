use ndarray::{Array1, Array2, ArrayD, ArrayView1, ArrayViewD, arr0};
use serde::{Deserialize, Serialize};

use crate::{MlErr, Result};

/// The squared bandwidth of the RBF kernel, shared by every center or given per center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Bandwidth {
    Scalar(f32),
    PerCenter(Vec<f32>),
}

impl Bandwidth {
    /// Returns the bandwidth as a 0-d (scalar) or 1-d (per center) array.
    pub fn to_array(&self) -> ArrayD<f32> {
        match self {
            Bandwidth::Scalar(v) => arr0(*v).into_dyn(),
            Bandwidth::PerCenter(v) => Array1::from(v.clone()).into_dyn(),
        }
    }
}

/// The shape of the RBF kernel: its `height` and its squared `bandwidth`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KernelHyperparameters {
    pub height: f32,
    pub bandwidth: Bandwidth,
}

impl KernelHyperparameters {
    pub fn new(height: f32, bandwidth: Bandwidth) -> Self {
        Self { height, bandwidth }
    }

    /// Builds the `(centers, points)` kernel matrix over two evenly spaced unit grids.
    pub fn matrix(&self, centers: usize, points: usize) -> Result<Array2<f32>> {
        let centers = unit_grid(centers);
        let points = unit_grid(points);
        rbf_kernel_matrix(
            centers.view(),
            points.view(),
            self.height,
            self.bandwidth.to_array().view(),
        )
    }
}

/// Returns `n` evenly spaced positions in `[0, 1]`, both ends included.
///
/// A single position sits at `0`.
pub fn unit_grid(n: usize) -> Array1<f32> {
    if n < 2 {
        return Array1::zeros(n);
    }

    let last = (n - 1) as f32;
    Array1::from_iter((0..n).map(|i| i as f32 / last))
}

/// Computes `m[g][w] = height * exp(-(centers[g] - positions[w])² / (2 * bandwidth[g]))`.
///
/// `bandwidth` is either a scalar shared by every center or a vector with one entry per center
/// (a single entry is broadcast as a scalar). The result always has shape
/// `(centers.len(), positions.len())`, a single center yields a one row matrix.
///
/// # Errors
/// An `InvalidConfig` error if the bandwidth has more than one dimension or a length that isn't
/// 1 or the number of centers, if any bandwidth or the height isn't strictly positive, or if
/// either grid is empty.
pub fn rbf_kernel_matrix(
    centers: ArrayView1<f32>,
    positions: ArrayView1<f32>,
    height: f32,
    bandwidth: ArrayViewD<f32>,
) -> Result<Array2<f32>> {
    if centers.is_empty() || positions.is_empty() {
        return Err(MlErr::InvalidConfig(format!(
            "the kernel grids can't be empty, got {} centers and {} positions",
            centers.len(),
            positions.len()
        )));
    }

    if !(height > 0.) {
        return Err(MlErr::InvalidConfig(format!(
            "the kernel height must be positive, got {height}"
        )));
    }

    let bandwidths: Vec<f32> = match (bandwidth.ndim(), bandwidth.len()) {
        (0, _) | (1, 1) => {
            let shared = bandwidth.iter().copied().next().unwrap_or_default();
            vec![shared; centers.len()]
        }
        (1, len) if len == centers.len() => bandwidth.iter().copied().collect(),
        (1, _) => {
            return Err(MlErr::InvalidConfig(format!(
                "expected 1 or {} bandwidths, got {}",
                centers.len(),
                bandwidth.len()
            )));
        }
        (n, _) => {
            return Err(MlErr::InvalidConfig(format!(
                "the bandwidth must be a scalar or a vector, got {n} dimensions"
            )));
        }
    };

    if let Some(bad) = bandwidths.iter().find(|b| !(**b > 0.)) {
        return Err(MlErr::InvalidConfig(format!(
            "the kernel bandwidth must be positive, got {bad}"
        )));
    }

    let below_height = f32::from_bits(height.to_bits() - 1);
    let matrix = Array2::from_shape_fn((centers.len(), positions.len()), |(g, w)| {
        let dist = centers[g] - positions[w];
        let weight = height * (-(dist * dist) / (2. * bandwidths[g])).exp();

        // keep entries strictly positive when the gaussian underflows and strictly below the
        // height when rounding reaches it away from the center
        let weight = weight.max(f32::MIN_POSITIVE);
        if dist != 0. {
            weight.min(below_height)
        } else {
            weight
        }
    });

    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use ndarray::{Array, arr1};

    use super::*;

    #[test]
    fn unit_grid_spans_zero_to_one() {
        assert_eq!(unit_grid(3), arr1(&[0f32, 0.5, 1.]));
        assert_eq!(unit_grid(1), arr1(&[0f32]));
        assert!(unit_grid(0).is_empty());
    }

    #[test]
    fn entries_are_bounded_by_the_height() {
        let cases = [
            (4, 16, 1., 0.01),
            (128, 181, 0.5, 0.001),
            (3, 7, 2., 5.),
            (128, 2151, 1., 0.01),
        ];
        for (g, w, height, bandwidth) in cases {
            let hyper = KernelHyperparameters::new(height, Bandwidth::Scalar(bandwidth));
            let centers = unit_grid(g);
            let positions = unit_grid(w);
            let matrix = hyper.matrix(g, w).unwrap();

            assert_eq!(matrix.dim(), (g, w));
            for ((i, j), &v) in matrix.indexed_iter() {
                assert!(v > 0.);
                if centers[i] == positions[j] {
                    assert_eq!(v, height);
                } else {
                    assert!(v < height);
                }
            }
        }
    }

    #[test]
    fn per_center_bandwidth_is_used_per_row() {
        let centers = arr1(&[0f32, 1.]);
        let positions = arr1(&[0.5f32]);
        let bandwidth = Array::from_vec(vec![0.5f32, 0.125]).into_dyn();

        let matrix =
            rbf_kernel_matrix(centers.view(), positions.view(), 1., bandwidth.view()).unwrap();

        assert!((matrix[[0, 0]] - (-0.25f32).exp()).abs() < 1e-6);
        assert!((matrix[[1, 0]] - (-1f32).exp()).abs() < 1e-6);
    }

    #[test]
    fn single_center_yields_a_single_row() {
        let hyper = KernelHyperparameters::new(1., Bandwidth::PerCenter(vec![0.1]));
        let matrix = hyper.matrix(1, 16).unwrap();

        assert_eq!(matrix.dim(), (1, 16));
        assert_eq!(matrix[[0, 0]], 1.);
    }

    #[test]
    fn two_dimensional_bandwidth_fails() {
        let centers = unit_grid(2);
        let positions = unit_grid(4);
        let bandwidth = Array::from_elem((2, 1), 0.1f32).into_dyn();

        let err = rbf_kernel_matrix(centers.view(), positions.view(), 1., bandwidth.view());
        assert!(matches!(err, Err(MlErr::InvalidConfig(_))));
    }

    #[test]
    fn mismatched_or_non_positive_bandwidth_fails() {
        let hyper = KernelHyperparameters::new(1., Bandwidth::PerCenter(vec![0.1, 0.2]));
        assert!(hyper.matrix(3, 8).is_err());

        let hyper = KernelHyperparameters::new(1., Bandwidth::Scalar(0.));
        assert!(hyper.matrix(3, 8).is_err());

        let hyper = KernelHyperparameters::new(-1., Bandwidth::Scalar(0.1));
        assert!(hyper.matrix(3, 8).is_err());
    }

    #[test]
    fn bandwidth_deserializes_from_scalar_or_list() {
        let scalar: KernelHyperparameters =
            serde_json::from_str(r#"{"height": 1.0, "bandwidth": 0.01}"#).unwrap();
        let list: KernelHyperparameters =
            serde_json::from_str(r#"{"height": 1.0, "bandwidth": [0.01, 0.02]}"#).unwrap();

        assert_eq!(scalar.bandwidth, Bandwidth::Scalar(0.01));
        assert_eq!(list.bandwidth, Bandwidth::PerCenter(vec![0.01, 0.02]));
    }
}
