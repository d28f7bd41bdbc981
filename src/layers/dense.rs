//! Dense (fully connected) layer implementation
//!
//! This module provides a DenseLayer that performs the transformation
//! `A = activation(x × weights + biases)` and its hand-written backward pass.

use crate::error::{NetworkError, Result};
use crate::tensor::Tensor;
use crate::utils::{Activation, SimpleRng};

/// Gradients of one dense backward step, computed without touching the layer.
#[derive(Debug, Clone)]
pub struct DenseGradients {
    /// activation'(Z) ⊙ upstream gradient, shape (batch × output_size)
    pub delta: Tensor,
    /// Aᵀ_prev · delta, shape (input_size × output_size)
    pub weights: Tensor,
    /// Column sums of delta, shape (1 × output_size)
    pub biases: Tensor,
    /// delta · Wᵀ, shape (batch × input_size), to hand to the previous layer
    pub input: Tensor,
}

/// Dense (fully connected) layer with weights, biases and an injected activation.
///
/// Performs `Z = xW + b`, `A = activation(Z)` where x is (batch × input_size),
/// W is (input_size × output_size) and b is (1 × output_size), broadcast over
/// the batch rows.
///
/// # Fields
///
/// * `weights` - Weight matrix (input_size × output_size)
/// * `biases` - Bias row (1 × output_size)
/// * `activation` - Elementwise nonlinearity applied after the affine map
/// * `last_input` / `last_pre_activation` - Cached by `forward` for `backward_cached`
///
/// # Example
///
/// ```
/// use rust_conv_net::layers::DenseLayer;
/// use rust_conv_net::tensor::Tensor;
/// use rust_conv_net::utils::{Activation, SimpleRng};
///
/// let mut rng = SimpleRng::new(42);
/// let mut layer = DenseLayer::new(4, 3, Activation::SIGMOID, &mut rng);
/// let (z, a) = layer.forward(&Tensor::zeros(&[1, 4])).unwrap();
/// assert_eq!(z.shape(), &[1, 3]);
/// assert_eq!(a.shape(), &[1, 3]);
/// ```
pub struct DenseLayer {
    input_size: usize,
    output_size: usize,
    weights: Tensor,
    biases: Tensor,
    activation: Activation,
    last_input: Option<Tensor>,
    last_pre_activation: Option<Tensor>,
}

impl DenseLayer {
    /// Create a new DenseLayer with standard normal weights and biases.
    ///
    /// # Arguments
    ///
    /// * `input_size` - Number of input features
    /// * `output_size` - Number of output features
    /// * `activation` - Nonlinearity applied to the layer output
    /// * `rng` - Random number generator for parameter initialization
    pub fn new(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        rng: &mut SimpleRng,
    ) -> Self {
        let weights = Tensor::from_fn(&[input_size, output_size], || rng.next_gaussian());
        let biases = Tensor::from_fn(&[1, output_size], || rng.next_gaussian());

        Self {
            input_size,
            output_size,
            weights,
            biases,
            activation,
            last_input: None,
            last_pre_activation: None,
        }
    }

    /// Create a layer from explicit parameters.
    ///
    /// `weights` must be 2-D and `biases` must be `[1, weights.cols]`.
    pub fn from_parameters(weights: Tensor, biases: Tensor, activation: Activation) -> Result<Self> {
        let (input_size, output_size) = weights.dims2("DenseLayer::from_parameters")?;
        biases.expect_shape("DenseLayer::from_parameters", &[1, output_size])?;

        Ok(Self {
            input_size,
            output_size,
            weights,
            biases,
            activation,
            last_input: None,
            last_pre_activation: None,
        })
    }

    pub fn input_size(&self) -> usize {
        self.input_size
    }

    pub fn output_size(&self) -> usize {
        self.output_size
    }

    pub fn weights(&self) -> &Tensor {
        &self.weights
    }

    pub fn biases(&self) -> &Tensor {
        &self.biases
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    /// Returns input_size × output_size (weights) + output_size (biases).
    pub fn parameter_count(&self) -> usize {
        self.weights.len() + self.biases.len()
    }

    /// Forward propagation: returns `(Z, A)` and caches `x` and `Z`.
    ///
    /// Fails with `ShapeMismatch` unless `x` is 2-D with `input_size` columns.
    pub fn forward(&mut self, x: &Tensor) -> Result<(Tensor, Tensor)> {
        let (rows, cols) = x.dims2("DenseLayer::forward")?;
        if cols != self.input_size {
            return Err(NetworkError::shape(
                "DenseLayer::forward",
                &[rows, self.input_size],
                x.shape(),
            ));
        }

        let mut z = x.matmul(&self.weights)?;
        let bias = self.biases.data();
        for row in z.data_mut().chunks_exact_mut(self.output_size.max(1)) {
            for (v, b) in row.iter_mut().zip(bias) {
                *v += b;
            }
        }
        let a = self.activation.apply(&z, false);

        self.last_input = Some(x.clone());
        self.last_pre_activation = Some(z.clone());
        Ok((z, a))
    }

    /// Compute the gradients of a backward step without updating parameters.
    ///
    /// * `z` - Pre-activation output of this layer from the forward pass
    /// * `a_prev` - Input this layer received in the forward pass
    /// * `gradient` - Loss gradient w.r.t. this layer's activated output when
    ///   `next_weights` is `None`; otherwise the downstream layer's delta
    /// * `next_weights` - Weights (output_size × next_size) of the downstream
    ///   layer that `gradient` must be routed back through
    pub fn gradients(
        &self,
        z: &Tensor,
        a_prev: &Tensor,
        gradient: &Tensor,
        next_weights: Option<&Tensor>,
    ) -> Result<DenseGradients> {
        let upstream = match next_weights {
            None => {
                if gradient.cols() != self.output_size {
                    return Err(NetworkError::shape(
                        "DenseLayer::backward gradient",
                        &[self.output_size],
                        &[gradient.cols()],
                    ));
                }
                gradient.clone()
            }
            Some(next) => {
                next.expect_shape(
                    "DenseLayer::backward next_weights",
                    &[self.output_size, gradient.cols()],
                )?;
                gradient.matmul(&next.transpose()?)?
            }
        };

        let delta = self
            .activation
            .apply(z, true)
            .zip_map(&upstream, "DenseLayer::backward delta", |d, g| d * g)?;

        let weights = a_prev.transpose()?.matmul(&delta)?;
        weights.expect_shape(
            "DenseLayer::backward weight gradient",
            &[self.input_size, self.output_size],
        )?;
        let biases = delta.sum_rows()?;
        let input = delta.matmul(&self.weights.transpose()?)?;

        Ok(DenseGradients {
            delta,
            weights,
            biases,
            input,
        })
    }

    /// Backward propagation with an immediate SGD update.
    ///
    /// Returns `delta · Wᵀ` computed with the weights as they were before this
    /// call, then applies `W -= lr · Aᵀ_prev·delta` and `b -= lr · Σ delta`.
    pub fn backward(
        &mut self,
        z: &Tensor,
        a_prev: &Tensor,
        gradient: &Tensor,
        learning_rate: f64,
        next_weights: Option<&Tensor>,
    ) -> Result<Tensor> {
        let grads = self.gradients(z, a_prev, gradient, next_weights)?;
        self.apply(grads, learning_rate)
    }

    /// [`backward`](Self::backward) for an output-style call, using the
    /// input and pre-activation cached by the last `forward`.
    pub fn backward_cached(&mut self, gradient: &Tensor, learning_rate: f64) -> Result<Tensor> {
        let grads = {
            let missing = || NetworkError::MissingForwardPass { layer: "DenseLayer" };
            let x = self.last_input.as_ref().ok_or_else(missing)?;
            let z = self.last_pre_activation.as_ref().ok_or_else(missing)?;
            self.gradients(z, x, gradient, None)?
        };
        self.apply(grads, learning_rate)
    }

    fn apply(&mut self, grads: DenseGradients, learning_rate: f64) -> Result<Tensor> {
        self.weights.sub_scaled(&grads.weights, learning_rate)?;
        self.biases.sub_scaled(&grads.biases, learning_rate)?;
        Ok(grads.input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_layer_creation() {
        let mut rng = SimpleRng::new(42);
        let layer = DenseLayer::new(10, 5, Activation::SIGMOID, &mut rng);

        assert_eq!(layer.input_size(), 10);
        assert_eq!(layer.output_size(), 5);
        assert_eq!(layer.weights.shape(), &[10, 5]);
        assert_eq!(layer.biases.shape(), &[1, 5]);
    }

    #[test]
    fn test_dense_layer_parameter_count() {
        let mut rng = SimpleRng::new(42);
        let layer = DenseLayer::new(7 * 24 * 24, 100, Activation::SIGMOID, &mut rng);

        assert_eq!(layer.parameter_count(), 7 * 24 * 24 * 100 + 100);
    }

    #[test]
    fn test_deterministic_initialization() {
        let mut rng1 = SimpleRng::new(42);
        let layer1 = DenseLayer::new(10, 5, Activation::SIGMOID, &mut rng1);

        let mut rng2 = SimpleRng::new(42);
        let layer2 = DenseLayer::new(10, 5, Activation::SIGMOID, &mut rng2);

        assert_eq!(layer1.weights, layer2.weights);
        assert_eq!(layer1.biases, layer2.biases);
    }

    #[test]
    fn test_forward_adds_bias() {
        let weights = Tensor::new(vec![2, 1], vec![1.0, 2.0]).unwrap();
        let biases = Tensor::new(vec![1, 1], vec![0.5]).unwrap();
        let mut layer = DenseLayer::from_parameters(weights, biases, Activation::SIGMOID).unwrap();

        let x = Tensor::new(vec![1, 2], vec![1.0, 1.0]).unwrap();
        let (z, _) = layer.forward(&x).unwrap();
        assert!((z.data()[0] - 3.5).abs() < 1e-12);
    }

    #[test]
    fn test_backward_cached_requires_forward() {
        let mut rng = SimpleRng::new(1);
        let mut layer = DenseLayer::new(3, 2, Activation::SIGMOID, &mut rng);
        let err = layer.backward_cached(&Tensor::zeros(&[1, 2]), 0.1).unwrap_err();
        assert!(matches!(err, NetworkError::MissingForwardPass { .. }));
    }

    #[test]
    fn test_from_parameters_rejects_bad_bias() {
        let weights = Tensor::zeros(&[3, 2]);
        let biases = Tensor::zeros(&[1, 3]);
        assert!(DenseLayer::from_parameters(weights, biases, Activation::SIGMOID).is_err());
    }
}
