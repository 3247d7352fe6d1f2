use super::{ParamGen, draw};

/// Yields the same value a fixed amount of times, used for biases, shifts and the baseline.
pub struct ConstParamGen {
    value: f32,
    remaining: usize,
}

impl ConstParamGen {
    pub fn new(value: f32, len: usize) -> Self {
        Self {
            value,
            remaining: len,
        }
    }

    pub fn zeros(len: usize) -> Self {
        Self::new(0., len)
    }
}

impl ParamGen for ConstParamGen {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        draw(&mut self.remaining, n).map(|n| vec![self.value; n])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_out_after_len_values() {
        let mut zeros = ConstParamGen::zeros(4);

        assert_eq!(zeros.sample(3), Some(vec![0.; 3]));
        assert_eq!(zeros.sample(3), Some(vec![0.]));
        assert_eq!(zeros.sample(3), None);
        assert_eq!(ConstParamGen::new(1., 0).sample(1), None);
    }
}
