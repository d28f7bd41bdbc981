//! Deterministic synthetic images for smoke tests and offline runs.
//!
//! Class `c` of `n` is a horizontal bright band covering rows
//! `[c * H / n, (c + 1) * H / n)`, at one of three brightness levels so
//! consecutive samples of the same class are not identical.

use super::{one_hot, Sample};
use crate::error::{NetworkError, Result};
use crate::tensor::Tensor;

/// Generate `count` samples cycling through the classes in order.
///
/// # Example
///
/// ```
/// use rust_conv_net::data::synthetic::stripe_patterns;
///
/// let samples = stripe_patterns(10, (28, 28), 10).unwrap();
/// assert_eq!(samples.len(), 10);
/// assert_eq!(samples[3].class(), Some(3));
/// ```
pub fn stripe_patterns(
    count: usize,
    (rows, cols): (usize, usize),
    num_classes: usize,
) -> Result<Vec<Sample>> {
    if num_classes == 0 || rows < num_classes {
        return Err(NetworkError::InvalidDataset(format!(
            "cannot draw {} classes into {} rows",
            num_classes, rows
        )));
    }

    (0..count)
        .map(|i| {
            let class = i % num_classes;
            let level = (i / num_classes) % 3;
            let intensity = 0.6 + 0.2 * level as f64;
            let band = (class * rows / num_classes)..((class + 1) * rows / num_classes);

            let mut image = Tensor::zeros(&[1, rows, cols]);
            for r in band {
                image.data_mut()[r * cols..(r + 1) * cols].fill(intensity);
            }
            Sample::new(image, one_hot(class, num_classes)?)
        })
        .collect()
}
