//! 2D Convolutional layer implementation
//!
//! This module provides a Conv2DLayer performing multi-channel, valid-mode,
//! stride-1 cross-correlation. The layer is activation-agnostic: `forward`
//! returns the raw feature maps and `backward` expects a gradient that the
//! caller has already multiplied by the derivative of whatever activation it
//! applied.

use crate::error::{NetworkError, Result};
use crate::tensor::Tensor;
use crate::utils::correlation::{convolve_full_accumulate, correlate_valid_accumulate};
use crate::utils::SimpleRng;

/// Gradients of one convolutional backward step.
#[derive(Debug, Clone)]
pub struct ConvGradients {
    /// Shape (out_channels × in_channels × kernel_size × kernel_size)
    pub kernels: Tensor,
    /// Same shape as the layer input
    pub input: Tensor,
}

/// 2D Convolutional layer with learnable kernels and per-position biases.
///
/// # Fields
///
/// * `in_channels` - Number of input channels (1 for grayscale)
/// * `out_channels` - Number of output feature maps
/// * `kernel_size` - Side of the square kernel
/// * `input_height` / `input_width` - Spatial size of every input plane
/// * `kernels` - Filters (out_channels × in_channels × kernel_size × kernel_size)
/// * `biases` - One bias per output element (out_channels × out_h × out_w)
/// * `last_input` - Input cached by `forward` for `backward`
///
/// # Example
///
/// ```
/// use rust_conv_net::layers::Conv2DLayer;
/// use rust_conv_net::utils::SimpleRng;
///
/// let mut rng = SimpleRng::new(42);
/// // 1 input channel (grayscale) 28x28, 7 output channels, 5x5 kernel
/// let layer = Conv2DLayer::new((1, 28, 28), 7, 5, &mut rng).unwrap();
/// assert_eq!(layer.output_shape(), [7, 24, 24]);
/// ```
pub struct Conv2DLayer {
    in_channels: usize,
    out_channels: usize,
    kernel_size: usize,
    input_height: usize,
    input_width: usize,
    kernels: Tensor,
    biases: Tensor,
    last_input: Option<Tensor>,
}

impl Conv2DLayer {
    /// Create a new Conv2DLayer with kernels and biases drawn uniformly from [0, 1).
    ///
    /// # Arguments
    ///
    /// * `input_shape` - `(in_channels, input_height, input_width)`
    /// * `out_channels` - Number of output feature maps
    /// * `kernel_size` - Size of the square kernel (e.g. 5 for 5×5)
    /// * `rng` - Random number generator for parameter initialization
    ///
    /// Fails with `ShapeMismatch` if the kernel does not fit inside the input.
    pub fn new(
        input_shape: (usize, usize, usize),
        out_channels: usize,
        kernel_size: usize,
        rng: &mut SimpleRng,
    ) -> Result<Self> {
        let (in_channels, input_height, input_width) = input_shape;
        if kernel_size == 0 || kernel_size > input_height || kernel_size > input_width {
            return Err(NetworkError::shape(
                "Conv2DLayer::new: kernel larger than input",
                &[input_height, input_width],
                &[kernel_size, kernel_size],
            ));
        }

        let out_h = input_height - kernel_size + 1;
        let out_w = input_width - kernel_size + 1;
        let kernels = Tensor::from_fn(
            &[out_channels, in_channels, kernel_size, kernel_size],
            || rng.next_f64(),
        );
        let biases = Tensor::from_fn(&[out_channels, out_h, out_w], || rng.next_f64());

        Ok(Self {
            in_channels,
            out_channels,
            kernel_size,
            input_height,
            input_width,
            kernels,
            biases,
            last_input: None,
        })
    }

    /// Create a layer from explicit kernels and biases.
    ///
    /// `kernels` must be `[out, in, k, k]` and `biases` `[out, H - k + 1, W - k + 1]`.
    pub fn from_parameters(
        input_shape: (usize, usize, usize),
        kernels: Tensor,
        biases: Tensor,
    ) -> Result<Self> {
        let (in_channels, input_height, input_width) = input_shape;
        let (out_channels, kernel_size) = match kernels.shape() {
            &[out, inp, kh, kw] if inp == in_channels && kh == kw => (out, kh),
            other => {
                return Err(NetworkError::shape(
                    "Conv2DLayer::from_parameters kernels",
                    &[0, in_channels, 0, 0],
                    other,
                ))
            }
        };
        if kernel_size == 0 || kernel_size > input_height || kernel_size > input_width {
            return Err(NetworkError::shape(
                "Conv2DLayer::from_parameters: kernel larger than input",
                &[input_height, input_width],
                &[kernel_size, kernel_size],
            ));
        }

        let layer = Self {
            in_channels,
            out_channels,
            kernel_size,
            input_height,
            input_width,
            kernels,
            biases,
            last_input: None,
        };
        layer
            .biases
            .expect_shape("Conv2DLayer::from_parameters biases", &layer.output_shape())?;
        Ok(layer)
    }

    pub fn in_channels(&self) -> usize {
        self.in_channels
    }

    pub fn out_channels(&self) -> usize {
        self.out_channels
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    pub fn kernels(&self) -> &Tensor {
        &self.kernels
    }

    pub fn biases(&self) -> &Tensor {
        &self.biases
    }

    /// Output height: input_height - kernel_size + 1.
    pub fn output_height(&self) -> usize {
        self.input_height - self.kernel_size + 1
    }

    /// Output width: input_width - kernel_size + 1.
    pub fn output_width(&self) -> usize {
        self.input_width - self.kernel_size + 1
    }

    pub fn input_shape(&self) -> [usize; 3] {
        [self.in_channels, self.input_height, self.input_width]
    }

    pub fn output_shape(&self) -> [usize; 3] {
        [self.out_channels, self.output_height(), self.output_width()]
    }

    /// Returns kernels count + biases count.
    pub fn parameter_count(&self) -> usize {
        self.kernels.len() + self.biases.len()
    }

    /// Forward propagation: `out[i] = bias[i] + Σ_j correlate(input[j], kernel[i][j])`.
    ///
    /// Caches `input` for the next `backward`. No activation is applied.
    pub fn forward(&mut self, input: &Tensor) -> Result<Tensor> {
        input.expect_shape("Conv2DLayer::forward", &self.input_shape())?;

        let in_dims = (self.input_height, self.input_width);
        let k_dims = (self.kernel_size, self.kernel_size);
        let mut output = self.biases.clone();

        for i in 0..self.out_channels {
            let out_plane = output.slab_mut(i);
            for j in 0..self.in_channels {
                correlate_valid_accumulate(
                    input.slab(j),
                    in_dims,
                    self.kernel_plane(i, j),
                    k_dims,
                    out_plane,
                );
            }
        }

        self.last_input = Some(input.clone());
        Ok(output)
    }

    /// Compute kernel and input gradients for `gradient` without updating.
    ///
    /// `gradient` must have the layer's output shape and already include the
    /// derivative of the activation applied by the caller.
    pub fn gradients(&self, gradient: &Tensor) -> Result<ConvGradients> {
        gradient.expect_shape("Conv2DLayer::backward gradient", &self.output_shape())?;
        let input = self
            .last_input
            .as_ref()
            .ok_or(NetworkError::MissingForwardPass { layer: "Conv2DLayer" })?;

        let in_dims = (self.input_height, self.input_width);
        let out_dims = (self.output_height(), self.output_width());
        let k_dims = (self.kernel_size, self.kernel_size);

        let mut kernel_grad = Tensor::zeros(self.kernels.shape());
        let mut input_grad = Tensor::zeros(input.shape());
        let k_len = self.kernel_size * self.kernel_size;

        for i in 0..self.out_channels {
            let g = gradient.slab(i);
            for j in 0..self.in_channels {
                let offset = (i * self.in_channels + j) * k_len;
                correlate_valid_accumulate(
                    input.slab(j),
                    in_dims,
                    g,
                    out_dims,
                    &mut kernel_grad.data_mut()[offset..offset + k_len],
                );
                convolve_full_accumulate(
                    g,
                    out_dims,
                    self.kernel_plane(i, j),
                    k_dims,
                    input_grad.slab_mut(j),
                );
            }
        }

        Ok(ConvGradients {
            kernels: kernel_grad,
            input: input_grad,
        })
    }

    /// Backward propagation with an immediate SGD update.
    ///
    /// Returns the gradient w.r.t. the cached input (computed with the
    /// pre-update kernels), then applies `kernels -= lr · kernel_grad` and
    /// `biases -= lr · gradient`.
    pub fn backward(&mut self, gradient: &Tensor, learning_rate: f64) -> Result<Tensor> {
        let grads = self.gradients(gradient)?;
        self.kernels.sub_scaled(&grads.kernels, learning_rate)?;
        self.biases.sub_scaled(gradient, learning_rate)?;
        Ok(grads.input)
    }

    fn kernel_plane(&self, out_channel: usize, in_channel: usize) -> &[f64] {
        let k_len = self.kernel_size * self.kernel_size;
        let offset = (out_channel * self.in_channels + in_channel) * k_len;
        &self.kernels.data()[offset..offset + k_len]
    }
}
