//! Activation and loss functions
//!
//! Everything here is a pure elementwise function with an explicit derivative
//! mode. The sigmoid derivative is evaluated at the pre-activation value `x`,
//! not at `sigmoid(x)`.

use crate::error::Result;
use crate::tensor::Tensor;

/// Sigmoid activation: 1 / (1 + exp(-x)).
///
/// Split on the sign of `x` so `exp` never overflows.
pub fn sigmoid(x: f64) -> f64 {
    if x >= 0.0 {
        1.0 / (1.0 + (-x).exp())
    } else {
        let e = x.exp();
        e / (1.0 + e)
    }
}

/// Derivative of the sigmoid at the pre-activation `x`: s(x) * (1 - s(x)).
pub fn sigmoid_prime(x: f64) -> f64 {
    let s = sigmoid(x);
    s * (1.0 - s)
}

/// Sigmoid or its derivative, selected by `derivative`.
pub fn activate(x: f64, derivative: bool) -> f64 {
    if derivative {
        sigmoid_prime(x)
    } else {
        sigmoid(x)
    }
}

/// An elementwise nonlinearity together with its derivative.
///
/// Layers receive one of these at construction instead of hard-coding a
/// function, so the same `DenseLayer` code serves any activation.
#[derive(Debug, Clone, Copy)]
pub struct Activation {
    name: &'static str,
    function: fn(f64) -> f64,
    derivative: fn(f64) -> f64,
}

impl Activation {
    pub const SIGMOID: Activation = Activation {
        name: "sigmoid",
        function: sigmoid,
        derivative: sigmoid_prime,
    };

    pub fn new(name: &'static str, function: fn(f64) -> f64, derivative: fn(f64) -> f64) -> Self {
        Self {
            name,
            function,
            derivative,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Apply the activation (or its derivative) to every element.
    pub fn apply(&self, z: &Tensor, derivative: bool) -> Tensor {
        if derivative {
            z.map(self.derivative)
        } else {
            z.map(self.function)
        }
    }
}

impl Default for Activation {
    fn default() -> Self {
        Activation::SIGMOID
    }
}

/// Elementwise squared error: (truth - pred)^2 / 2.
pub fn mse_loss(pred: &Tensor, truth: &Tensor) -> Result<Tensor> {
    pred.zip_map(truth, "mse_loss", |p, t| (t - p).powi(2) / 2.0)
}

/// Gradient of [`mse_loss`] with respect to the prediction: pred - truth.
pub fn mse_loss_derivative(pred: &Tensor, truth: &Tensor) -> Result<Tensor> {
    pred.zip_map(truth, "mse_loss_derivative", |p, t| -(t - p))
}
