//! Data-loading collaborators.
//!
//! The network only consumes [`Sample`]s: a `[1, H, W]` image scaled to [0, 1]
//! and a one-hot `[1, classes]` label. Loaders for MNIST IDX files and for
//! deterministic synthetic patterns live here.

pub mod mnist;
pub mod synthetic;

use crate::error::{NetworkError, Result};
use crate::tensor::Tensor;

/// One labeled training or test image.
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    /// Image planes `[channels, height, width]`, values in [0, 1]
    pub image: Tensor,
    /// One-hot row `[1, classes]`
    pub label: Tensor,
}

impl Sample {
    /// Pair an image with its one-hot label, checking both shapes.
    pub fn new(image: Tensor, label: Tensor) -> Result<Self> {
        image.dims3("Sample::new image")?;
        let (rows, _) = label.dims2("Sample::new label")?;
        if rows != 1 {
            return Err(NetworkError::shape("Sample::new label", &[1, label.cols()], label.shape()));
        }
        Ok(Self { image, label })
    }

    /// Class index encoded by the label.
    pub fn class(&self) -> Option<usize> {
        self.label.argmax()
    }
}

/// One-hot encode `label` as a `[1, num_classes]` row.
///
/// # Example
///
/// ```
/// use rust_conv_net::data::one_hot;
///
/// let y = one_hot(2, 4).unwrap();
/// assert_eq!(y.data(), &[0.0, 0.0, 1.0, 0.0]);
/// ```
pub fn one_hot(label: usize, num_classes: usize) -> Result<Tensor> {
    if label >= num_classes {
        return Err(NetworkError::InvalidDataset(format!(
            "label {} out of range for {} classes",
            label, num_classes
        )));
    }
    let mut row = Tensor::zeros(&[1, num_classes]);
    row.data_mut()[label] = 1.0;
    Ok(row)
}
