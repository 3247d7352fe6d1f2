/// Logistic function scaled to `(0, amp)`.
#[derive(Clone, Copy, Debug)]
pub struct Sigmoid {
    amp: f32,
}

impl Sigmoid {
    pub fn new(amp: f32) -> Self {
        Self { amp }
    }

    fn logistic(z: f32) -> f32 {
        1. / (1. + (-z).exp())
    }

    pub fn f(&self, z: f32) -> f32 {
        self.amp * Self::logistic(z)
    }

    pub fn df(&self, z: f32) -> f32 {
        let s = Self::logistic(z);
        self.amp * s * (1. - s)
    }
}

impl Default for Sigmoid {
    fn default() -> Self {
        Self::new(1.)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivative_stays_finite_far_from_zero() {
        let act = Sigmoid::new(2.);

        assert_eq!(act.f(0.), 1.);
        assert_eq!(act.df(0.), 0.5);
        assert_eq!(act.df(-200.), 0.);
        assert!(act.df(200.).abs() < 1e-30);
    }
}
