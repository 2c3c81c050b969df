//! Activation functions
//!
//! Closed set of activations selectable from the configuration surface. Names
//! are resolved once at setup; an unknown name is a configuration error before
//! any training step runs. Each variant supplies both the function and its
//! derivative so architecture implementations can form exact VJPs.

use crate::{Error, Result};
use std::str::FromStr;

const SQRT_2_OVER_PI: f32 = 0.797_884_6;
const GELU_CUBIC: f32 = 0.044_715;
const LEAKY_SLOPE: f32 = 0.01;

/// Pointwise nonlinearity
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Activation {
    /// Identity
    Linear,
    /// Rectified linear unit
    Relu,
    /// Leaky rectified linear unit (slope 0.01)
    LeakyRelu,
    /// Gaussian error linear unit (tanh approximation)
    Gelu,
    /// Hyperbolic tangent
    Tanh,
    /// Logistic sigmoid
    Sigmoid,
    /// Softplus
    Softplus,
}

impl FromStr for Activation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "linear" => Ok(Activation::Linear),
            "relu" => Ok(Activation::Relu),
            "leaky_relu" => Ok(Activation::LeakyRelu),
            "gelu" => Ok(Activation::Gelu),
            "tanh" => Ok(Activation::Tanh),
            "sigmoid" => Ok(Activation::Sigmoid),
            "softplus" => Ok(Activation::Softplus),
            other => Err(Error::Config(format!(
                "unknown activation '{other}', expected one of \
                 linear, relu, leaky_relu, gelu, tanh, sigmoid, softplus"
            ))),
        }
    }
}

impl Activation {
    /// Apply the activation to one value
    pub fn apply(&self, x: f32) -> f32 {
        match self {
            Activation::Linear => x,
            Activation::Relu => x.max(0.0),
            Activation::LeakyRelu => {
                if x > 0.0 {
                    x
                } else {
                    LEAKY_SLOPE * x
                }
            }
            Activation::Gelu => 0.5 * x * (1.0 + gelu_inner(x).tanh()),
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => sigmoid(x),
            Activation::Softplus => x.exp().ln_1p(),
        }
    }

    /// Derivative of the activation at one value
    pub fn derivative(&self, x: f32) -> f32 {
        match self {
            Activation::Linear => 1.0,
            Activation::Relu => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::LeakyRelu => {
                if x > 0.0 {
                    1.0
                } else {
                    LEAKY_SLOPE
                }
            }
            Activation::Gelu => {
                let u = gelu_inner(x);
                let tanh_u = u.tanh();
                let sech_sq = 1.0 - tanh_u * tanh_u;
                0.5 * (1.0 + tanh_u)
                    + 0.5 * x * sech_sq * SQRT_2_OVER_PI * (1.0 + 3.0 * GELU_CUBIC * x * x)
            }
            Activation::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            Activation::Sigmoid => {
                let s = sigmoid(x);
                s * (1.0 - s)
            }
            Activation::Softplus => sigmoid(x),
        }
    }
}

fn gelu_inner(x: f32) -> f32 {
    SQRT_2_OVER_PI * (x + GELU_CUBIC * x * x * x)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    const ALL: [Activation; 7] = [
        Activation::Linear,
        Activation::Relu,
        Activation::LeakyRelu,
        Activation::Gelu,
        Activation::Tanh,
        Activation::Sigmoid,
        Activation::Softplus,
    ];

    #[test]
    fn test_parse_known_names() {
        assert_eq!(Activation::from_str("gelu").unwrap(), Activation::Gelu);
        assert_eq!(Activation::from_str("leaky_relu").unwrap(), Activation::LeakyRelu);
    }

    #[test]
    fn test_parse_unknown_name_is_config_error() {
        let err = Activation::from_str("swishish").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_relu_values() {
        assert_eq!(Activation::Relu.apply(-1.0), 0.0);
        assert_eq!(Activation::Relu.apply(2.5), 2.5);
    }

    #[test]
    fn test_gelu_known_values() {
        assert_abs_diff_eq!(Activation::Gelu.apply(0.0), 0.0, epsilon = 1e-6);
        // gelu(1) ~ 0.8412 under the tanh approximation.
        assert_abs_diff_eq!(Activation::Gelu.apply(1.0), 0.8412, epsilon = 1e-3);
    }

    #[test]
    fn test_derivatives_match_finite_differences() {
        let h = 1e-3_f32;
        for activation in ALL {
            for &x in &[-2.0_f32, -0.5, 0.3, 1.7] {
                let numeric = (activation.apply(x + h) - activation.apply(x - h)) / (2.0 * h);
                let analytic = activation.derivative(x);
                assert_abs_diff_eq!(numeric, analytic, epsilon = 1e-2);
            }
        }
    }
}
