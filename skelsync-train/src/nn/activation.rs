//! Activation and loss strategies

use serde::{Deserialize, Serialize};

/// Neuron activation applied after each layer's weighted sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Sigmoid,
    Relu,
}

impl Activation {
    pub fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            Activation::Relu => x.max(0.0),
        }
    }

    /// Derivative expressed in terms of the activation's output `y`.
    pub fn derivative_from_output(self, y: f32) -> f32 {
        match self {
            Activation::Sigmoid => y * (1.0 - y),
            Activation::Relu => {
                if y > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Training objective, evaluated per output element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Loss {
    #[default]
    MeanSquaredError,
}

impl Loss {
    pub fn value(self, prediction: f32, expected: f32) -> f32 {
        match self {
            Loss::MeanSquaredError => 0.5 * (prediction - expected).powi(2),
        }
    }

    /// Derivative with respect to the prediction.
    pub fn gradient(self, prediction: f32, expected: f32) -> f32 {
        match self {
            Loss::MeanSquaredError => prediction - expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid() {
        let s = Activation::Sigmoid;
        assert_eq!(s.apply(0.0), 0.5);
        assert!(s.apply(10.0) > 0.9999);
        assert!(s.apply(-10.0) < 0.0001);
        assert_eq!(s.derivative_from_output(0.5), 0.25);
    }

    #[test]
    fn test_sigmoid_saturates_without_nan() {
        let s = Activation::Sigmoid;
        assert_eq!(s.apply(f32::MIN), 0.0);
        assert_eq!(s.apply(f32::MAX), 1.0);
    }

    #[test]
    fn test_relu() {
        let r = Activation::Relu;
        assert_eq!(r.apply(-2.0), 0.0);
        assert_eq!(r.apply(3.0), 3.0);
        assert_eq!(r.derivative_from_output(3.0), 1.0);
        assert_eq!(r.derivative_from_output(0.0), 0.0);
    }

    #[test]
    fn test_mse_gradient_sign() {
        let l = Loss::MeanSquaredError;
        assert_eq!(l.value(3.0, 1.0), 2.0);
        assert_eq!(l.gradient(3.0, 1.0), 2.0);
        assert_eq!(l.gradient(1.0, 3.0), -2.0);
    }
}
