use super::ParamGen;

/// A parameter generator that delegates the generation to a chain of generators.
///
/// Each tensor of the model gets its own generator, already sized to the amount of values it
/// holds, so sampling the whole parameter vector at once walks the chain in layout order.
pub struct ChainedParamGen {
    param_gens: Vec<Box<dyn ParamGen>>,
    curr: usize,
}

impl ChainedParamGen {
    /// Creates a new `ChainedParamGen`.
    ///
    /// # Arguments
    /// * `param_gens` - A vec of potentially different parameter generators.
    pub fn new(param_gens: Vec<Box<dyn ParamGen>>) -> Self {
        Self {
            param_gens,
            curr: 0,
        }
    }
}

impl ParamGen for ChainedParamGen {
    fn sample(&mut self, n: usize) -> Option<Vec<f32>> {
        let mut sample = Vec::with_capacity(n);

        while sample.len() < n && self.curr < self.param_gens.len() {
            match self.param_gens[self.curr].sample(n - sample.len()) {
                Some(values) if !values.is_empty() => sample.extend(values),
                _ => self.curr += 1,
            }
        }

        if sample.is_empty() { None } else { Some(sample) }
    }
}
