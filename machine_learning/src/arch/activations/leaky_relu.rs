/// Rectifier that lets a `slope` fraction of negative inputs through.
#[derive(Clone, Copy, Debug)]
pub struct LeakyRelu {
    slope: f32,
}

impl LeakyRelu {
    pub fn new(slope: f32) -> Self {
        Self { slope }
    }

    pub fn f(&self, z: f32) -> f32 {
        if z > 0. { z } else { self.slope * z }
    }

    pub fn df(&self, z: f32) -> f32 {
        if z > 0. { 1. } else { self.slope }
    }
}

impl Default for LeakyRelu {
    fn default() -> Self {
        Self::new(0.2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_inputs_are_scaled_by_the_slope() {
        let act = LeakyRelu::default();

        assert_eq!(act.f(2.), 2.);
        assert_eq!(act.f(-1.), -0.2);
        assert_eq!(act.df(3.), 1.);
        assert_eq!(act.df(-3.), 0.2);
    }
}
