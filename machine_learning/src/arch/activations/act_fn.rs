use serde::{Deserialize, Serialize};

use super::{LeakyRelu, Sigmoid, Tanh};

/// An element-wise activation function and its derivative.
#[derive(Clone, Debug)]
pub enum ActFn {
    LeakyRelu(LeakyRelu),
    Sigmoid(Sigmoid),
    Tanh(Tanh),
}

impl ActFn {
    pub fn leaky_relu(slope: f32) -> Self {
        Self::LeakyRelu(LeakyRelu::new(slope))
    }

    pub fn sigmoid(amp: f32) -> Self {
        Self::Sigmoid(Sigmoid::new(amp))
    }

    pub fn tanh() -> Self {
        Self::Tanh(Tanh)
    }

    pub fn f(&self, x: f32) -> f32 {
        match self {
            Self::LeakyRelu(a) => a.f(x),
            Self::Sigmoid(a) => a.f(x),
            Self::Tanh(a) => a.f(x),
        }
    }

    pub fn df(&self, x: f32) -> f32 {
        match self {
            Self::LeakyRelu(a) => a.df(x),
            Self::Sigmoid(a) => a.df(x),
            Self::Tanh(a) => a.df(x),
        }
    }
}

/// The specification for the `ActFn` enum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ActFnSpec {
    LeakyRelu { slope: f32 },
    Sigmoid { amp: f32 },
    Tanh,
}

impl Default for ActFnSpec {
    fn default() -> Self {
        Self::LeakyRelu { slope: 0.2 }
    }
}

impl From<ActFnSpec> for ActFn {
    fn from(spec: ActFnSpec) -> Self {
        match spec {
            ActFnSpec::LeakyRelu { slope } => ActFn::leaky_relu(slope),
            ActFnSpec::Sigmoid { amp } => ActFn::sigmoid(amp),
            ActFnSpec::Tanh => ActFn::tanh(),
        }
    }
}
