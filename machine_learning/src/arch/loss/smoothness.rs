/// Penalizes the roughness of a curve as the weighted sum of squared differences between
/// adjacent entries, `weight * Σ (b[i + 1] - b[i])²`.
#[derive(Debug, Clone, Copy)]
pub struct Smoothness {
    weight: f32,
}

impl Smoothness {
    pub fn new(weight: f32) -> Self {
        Self { weight }
    }

    pub fn penalty(&self, curve: &[f32]) -> f32 {
        let sum: f32 = curve.windows(2).map(|w| (w[1] - w[0]).powi(2)).sum();
        self.weight * sum
    }

    /// Adds the derivative of the penalty with respect to every entry of `curve` to `grad`.
    pub fn accumulate_grad(&self, curve: &[f32], grad: &mut [f32]) {
        let k = 2. * self.weight;

        for (i, w) in curve.windows(2).enumerate() {
            let diff = k * (w[1] - w[0]);
            grad[i] -= diff;
            grad[i + 1] += diff;
        }
    }
}

impl Default for Smoothness {
    fn default() -> Self {
        Self::new(1.0)
    }
}
