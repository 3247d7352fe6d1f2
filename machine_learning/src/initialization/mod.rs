//! Initial values for a model's flat parameter vector.
//!
//! Every tensor gets a generator sized to its length, and a `ChainedParamGen` walks them in
//! layout order so one `sample(size)` call yields the whole vector.

mod chained;
mod constant;
mod random;

pub use chained::ChainedParamGen;
pub use constant::ConstParamGen;
pub use random::RandParamGen;

/// A finite source of initial parameter values.
pub trait ParamGen {
    /// Yields up to `n` values, fewer once the generator runs low and `None` once it's spent.
    fn sample(&mut self, n: usize) -> Option<Vec<f32>>;
}

/// Takes up to `n` values out of a `remaining` budget, returning how many were taken.
fn draw(remaining: &mut usize, n: usize) -> Option<usize> {
    if *remaining == 0 {
        return None;
    }

    let n = n.min(*remaining);
    *remaining -= n;
    Some(n)
}
