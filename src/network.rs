//! The Conv → sigmoid → flatten → Dense → Dense classifier.
//!
//! `ConvNet` owns its three layers and wires the forward chain and the reverse
//! gradient chain between them, including the flatten/reshape boundary and the
//! sigmoid derivative that the activation-agnostic conv layer does not apply.

use crate::data::Sample;
use crate::error::{NetworkError, Result};
use crate::layers::{Conv2DLayer, DenseLayer};
use crate::tensor::Tensor;
use crate::utils::{mse_loss, mse_loss_derivative, sigmoid, sigmoid_prime, Activation, SimpleRng};

/// Layer sizes of a [`ConvNet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkShape {
    /// `(channels, height, width)` of every input image
    pub input: (usize, usize, usize),
    pub conv_channels: usize,
    pub kernel_size: usize,
    pub hidden_size: usize,
    pub num_classes: usize,
}

impl NetworkShape {
    /// Shape of the conv feature maps: `[channels, H - k + 1, W - k + 1]`.
    pub fn conv_output(&self) -> [usize; 3] {
        let (_, h, w) = self.input;
        [
            self.conv_channels,
            (h + 1).saturating_sub(self.kernel_size),
            (w + 1).saturating_sub(self.kernel_size),
        ]
    }

    /// Width of the first dense layer's input.
    pub fn flattened_size(&self) -> usize {
        self.conv_output().iter().product()
    }
}

/// Every intermediate tensor of one forward pass, kept for the backward chain.
#[derive(Debug, Clone)]
pub struct ForwardPass {
    /// Raw conv output, before the sigmoid
    pub conv_output: Tensor,
    /// Sigmoid of the conv output flattened to `[1, n]`
    pub flattened: Tensor,
    pub hidden_z: Tensor,
    pub hidden_a: Tensor,
    pub output_z: Tensor,
    pub output_a: Tensor,
}

impl ForwardPass {
    /// Index of the highest output activation.
    pub fn prediction(&self) -> Option<usize> {
        self.output_a.argmax()
    }
}

/// Result of a single training step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub prediction: usize,
    pub target: usize,
    /// Summed squared-error loss of this sample, before the update
    pub loss: f64,
}

impl StepOutcome {
    pub fn is_correct(&self) -> bool {
        self.prediction == self.target
    }
}

pub struct ConvNet {
    shape: NetworkShape,
    conv: Conv2DLayer,
    hidden: DenseLayer,
    output: DenseLayer,
}

impl ConvNet {
    /// Build a network with freshly initialized parameters.
    pub fn new(shape: NetworkShape, rng: &mut SimpleRng) -> Result<Self> {
        let conv = Conv2DLayer::new(shape.input, shape.conv_channels, shape.kernel_size, rng)?;
        let hidden = DenseLayer::new(
            shape.flattened_size(),
            shape.hidden_size,
            Activation::SIGMOID,
            rng,
        );
        let output = DenseLayer::new(shape.hidden_size, shape.num_classes, Activation::SIGMOID, rng);

        let net = Self {
            shape,
            conv,
            hidden,
            output,
        };
        log::debug!(
            "built ConvNet {:?} ({} dense activation) with {} parameters",
            net.shape,
            net.hidden.activation().name(),
            net.parameter_count()
        );
        Ok(net)
    }

    /// Assemble a network from existing layers, checking that they chain.
    pub fn from_layers(conv: Conv2DLayer, hidden: DenseLayer, output: DenseLayer) -> Result<Self> {
        let [in_c, in_h, in_w] = conv.input_shape();
        let flattened: usize = conv.output_shape().iter().product();
        if hidden.input_size() != flattened {
            return Err(NetworkError::shape(
                "ConvNet::from_layers hidden input",
                &[flattened],
                &[hidden.input_size()],
            ));
        }
        if output.input_size() != hidden.output_size() {
            return Err(NetworkError::shape(
                "ConvNet::from_layers output input",
                &[hidden.output_size()],
                &[output.input_size()],
            ));
        }

        let shape = NetworkShape {
            input: (in_c, in_h, in_w),
            conv_channels: conv.out_channels(),
            kernel_size: conv.kernel_size(),
            hidden_size: hidden.output_size(),
            num_classes: output.output_size(),
        };
        Ok(Self {
            shape,
            conv,
            hidden,
            output,
        })
    }

    pub fn shape(&self) -> NetworkShape {
        self.shape
    }

    pub fn conv(&self) -> &Conv2DLayer {
        &self.conv
    }

    pub fn hidden(&self) -> &DenseLayer {
        &self.hidden
    }

    pub fn output(&self) -> &DenseLayer {
        &self.output
    }

    pub fn parameter_count(&self) -> usize {
        self.conv.parameter_count() + self.hidden.parameter_count() + self.output.parameter_count()
    }

    /// Run one image through the network. Parameters are not modified.
    ///
    /// Fails with `NonFinite` if the output contains NaN or infinity.
    pub fn forward(&mut self, image: &Tensor) -> Result<ForwardPass> {
        let conv_output = self.conv.forward(image)?;
        let flattened = conv_output
            .map(sigmoid)
            .reshape(&[1, self.shape.flattened_size()])?;

        let (hidden_z, hidden_a) = self.hidden.forward(&flattened)?;
        let (output_z, output_a) = self.output.forward(&hidden_a)?;
        if !output_a.is_finite() {
            return Err(NetworkError::NonFinite {
                context: "ConvNet::forward",
            });
        }

        Ok(ForwardPass {
            conv_output,
            flattened,
            hidden_z,
            hidden_a,
            output_z,
            output_a,
        })
    }

    /// Predicted class of one image.
    pub fn predict(&mut self, image: &Tensor) -> Result<usize> {
        let pass = self.forward(image)?;
        pass.prediction().ok_or_else(|| {
            NetworkError::shape("ConvNet::predict", &[self.shape.num_classes], &[0])
        })
    }

    /// Fail with `ShapeMismatch` unless `label` is a `[1, num_classes]` row.
    pub fn check_label(&self, label: &Tensor) -> Result<()> {
        label.expect_shape("ConvNet label", &[1, self.shape.num_classes])
    }

    /// Forward, loss, and backward through all three layers with immediate updates.
    pub fn train_step(&mut self, sample: &Sample, learning_rate: f64) -> Result<StepOutcome> {
        self.check_label(&sample.label)?;

        let pass = self.forward(&sample.image)?;
        let prediction = pass.prediction().unwrap_or_default();
        let target = sample.label.argmax().unwrap_or_default();
        let loss = mse_loss(&pass.output_a, &sample.label)?.sum();

        let grad = mse_loss_derivative(&pass.output_a, &sample.label)?;
        let grad = self
            .output
            .backward(&pass.output_z, &pass.hidden_a, &grad, learning_rate, None)?;
        let grad = self
            .hidden
            .backward(&pass.hidden_z, &pass.flattened, &grad, learning_rate, None)?;

        // Undo the flatten, then route through the sigmoid applied after the conv.
        let conv_grad = grad.reshape(&self.conv.output_shape())?.zip_map(
            &pass.conv_output,
            "ConvNet::train_step conv gradient",
            |g, z| g * sigmoid_prime(z),
        )?;
        self.conv.backward(&conv_grad, learning_rate)?;

        Ok(StepOutcome {
            prediction,
            target,
            loss,
        })
    }
}
