use ndarray::{Array2, ArrayView2, Axis};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use crate::{MlErr, Result};

/// Paired fingerprints and spectra, one sample per row.
///
/// Each sample remembers the row of the source table it came from, so predictions can be joined
/// back to their identifiers.
#[derive(Clone, Debug)]
pub struct Dataset {
    x: Array2<f32>,
    y: Array2<f32>,
    indices: Vec<usize>,
}

impl Dataset {
    /// Creates a dataset whose samples are indexed `0..n`.
    pub fn new(x: Array2<f32>, y: Array2<f32>) -> Result<Self> {
        let indices = (0..x.nrows()).collect();
        Self::with_indices(x, y, indices)
    }

    /// Creates a dataset with explicit source indices.
    ///
    /// # Errors
    /// A `SizeMismatch` error if `x`, `y` and `indices` don't hold the same amount of samples.
    pub fn with_indices(x: Array2<f32>, y: Array2<f32>, indices: Vec<usize>) -> Result<Self> {
        if x.nrows() != y.nrows() {
            return Err(MlErr::SizeMismatch {
                what: "dataset targets",
                got: y.nrows(),
                expected: x.nrows(),
            });
        }

        if indices.len() != x.nrows() {
            return Err(MlErr::SizeMismatch {
                what: "dataset indices",
                got: indices.len(),
                expected: x.nrows(),
            });
        }

        Ok(Self { x, y, indices })
    }

    pub fn len(&self) -> usize {
        self.x.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn x(&self) -> ArrayView2<'_, f32> {
        self.x.view()
    }

    pub fn y(&self) -> ArrayView2<'_, f32> {
        self.y.view()
    }

    pub fn x_size(&self) -> usize {
        self.x.ncols()
    }

    pub fn y_size(&self) -> usize {
        self.y.ncols()
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    /// Copies the given rows (positions in this dataset, not source indices) into a new dataset.
    pub fn subset(&self, rows: &[usize]) -> Result<Self> {
        if let Some(&row) = rows.iter().find(|&&row| row >= self.len()) {
            return Err(MlErr::InvalidSplit(format!(
                "row {row} is out of bounds for {} samples",
                self.len()
            )));
        }

        let x = self.x.select(Axis(0), rows);
        let y = self.y.select(Axis(0), rows);
        let indices = rows.iter().map(|&row| self.indices[row]).collect();

        Ok(Self { x, y, indices })
    }
}

/// Rescales values into `[0, 1]` using a single global minimum and maximum.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinMax {
    min: f32,
    max: f32,
}

impl MinMax {
    /// Fits the scaler to every value of `data`.
    ///
    /// # Errors
    /// `EmptyDataset` if there is nothing to fit.
    pub fn fit(data: ArrayView2<f32>) -> Result<Self> {
        let (min, max) = data
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });

        if data.is_empty() {
            return Err(MlErr::EmptyDataset);
        }

        Ok(Self { min, max })
    }

    pub fn min(&self) -> f32 {
        self.min
    }

    pub fn max(&self) -> f32 {
        self.max
    }

    /// A constant input leaves nothing to stretch, so its range counts as `1`.
    fn range(&self) -> f32 {
        let range = self.max - self.min;
        if range > 0. { range } else { 1. }
    }

    pub fn transform(&self, data: ArrayView2<f32>) -> Array2<f32> {
        let range = self.range();
        data.mapv(|v| (v - self.min) / range)
    }

    pub fn inverse(&self, data: ArrayView2<f32>) -> Array2<f32> {
        let range = self.range();
        data.mapv(|v| v * range + self.min)
    }
}

/// Disjoint train, validation and test partitions of `0..n`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DataSplit {
    pub train: Vec<usize>,
    pub valid: Vec<usize>,
    pub test: Vec<usize>,
}

impl DataSplit {
    /// Shuffles `0..n` with a generator seeded by `seed` and cuts it into
    /// `[train | valid | test]`.
    ///
    /// The validation and test partitions hold `floor(frac * n)` samples each, the training
    /// partition takes the rest.
    ///
    /// # Errors
    /// An `InvalidSplit` error if a fraction is outside of `[0, 1)`, if both fractions add up to
    /// one or more, or if the training partition ends up empty.
    pub fn new(n: usize, valid_frac: f32, test_frac: f32, seed: u64) -> Result<Self> {
        for (name, frac) in [("validation", valid_frac), ("test", test_frac)] {
            if !(0. ..1.).contains(&frac) {
                return Err(MlErr::InvalidSplit(format!(
                    "the {name} fraction must be in [0, 1), got {frac}"
                )));
            }
        }

        if valid_frac + test_frac >= 1. {
            return Err(MlErr::InvalidSplit(format!(
                "the validation and test fractions add up to {}",
                valid_frac + test_frac
            )));
        }

        let n_valid = (valid_frac * n as f32).floor() as usize;
        let n_test = (test_frac * n as f32).floor() as usize;
        let n_train = n.saturating_sub(n_valid + n_test);

        if n_train == 0 {
            return Err(MlErr::InvalidSplit(format!(
                "no samples left to train on out of {n}"
            )));
        }

        let mut order: Vec<usize> = (0..n).collect();
        order.shuffle(&mut StdRng::seed_from_u64(seed));

        let test = order.split_off(n_train + n_valid);
        let valid = order.split_off(n_train);

        Ok(Self {
            train: order,
            valid,
            test,
        })
    }
}
