//! Configuration structures for training
//!
//! Every hyperparameter has a compile-time default matching the reference
//! setup (1100 MNIST training images, 100 test images, 100 epochs at lr 0.1,
//! Conv 7×5×5 → Dense 100 → Dense 10). A JSON file may override any subset.

use crate::error::{NetworkError, Result};
use crate::network::NetworkShape;
use serde::Deserialize;
use std::fs;

pub const IMG_H: usize = 28;
pub const IMG_W: usize = 28;
pub const NUM_CLASSES: usize = 10;

pub const EPOCHS: usize = 100;
pub const LEARNING_RATE: f64 = 0.1;
pub const TRAIN_SAMPLES: usize = 1100;
pub const TEST_SAMPLES: usize = 100;
pub const CONV_CHANNELS: usize = 7;
pub const KERNEL_SIZE: usize = 5;
pub const HIDDEN_SIZE: usize = 100;

/// Training configuration.
///
/// Missing fields fall back to the constants above; unknown fields are
/// rejected so typos do not silently run with defaults.
///
/// # Example
///
/// ```json
/// {
///   "epochs": 10,
///   "learning_rate": 0.05,
///   "seed": 42,
///   "use_synthetic": true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    /// Number of full passes over the training set
    pub epochs: usize,

    /// SGD step size shared by all three layers
    pub learning_rate: f64,

    /// RNG seed for parameter initialization; `None` seeds from the clock
    pub seed: Option<u64>,

    /// Maximum number of training images read from the dataset
    pub train_samples: usize,

    /// Maximum number of test images read from the dataset
    pub test_samples: usize,

    /// Directory holding the four MNIST IDX files
    pub data_dir: String,

    /// Train on generated stripe patterns instead of MNIST
    pub use_synthetic: bool,

    /// Output channels of the convolutional layer
    pub conv_channels: usize,

    /// Side of the square convolution kernel
    pub kernel_size: usize,

    /// Width of the hidden dense layer
    pub hidden_size: usize,

    /// CSV file receiving one `epoch,accuracy,loss,time` line per epoch
    pub log_path: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: EPOCHS,
            learning_rate: LEARNING_RATE,
            seed: None,
            train_samples: TRAIN_SAMPLES,
            test_samples: TEST_SAMPLES,
            data_dir: "./data".to_string(),
            use_synthetic: false,
            conv_channels: CONV_CHANNELS,
            kernel_size: KERNEL_SIZE,
            hidden_size: HIDDEN_SIZE,
            log_path: "./logs/training_accuracy_cnn.txt".to_string(),
        }
    }
}

impl TrainingConfig {
    /// Layer sizes implied by this configuration for 28×28 single-channel input.
    pub fn network_shape(&self) -> NetworkShape {
        NetworkShape {
            input: (1, IMG_H, IMG_W),
            conv_channels: self.conv_channels,
            kernel_size: self.kernel_size,
            hidden_size: self.hidden_size,
            num_classes: NUM_CLASSES,
        }
    }
}

/// Loads a training configuration from a JSON file.
///
/// # Examples
///
/// ```no_run
/// use rust_conv_net::config::load_config;
///
/// let cfg = load_config("config/mnist_cnn.json").unwrap();
/// assert!(cfg.epochs > 0);
/// ```
pub fn load_config(path: &str) -> Result<TrainingConfig> {
    let contents = fs::read_to_string(path)?;
    parse_config(&contents)
}

/// Parses and validates a JSON configuration string.
pub fn parse_config(contents: &str) -> Result<TrainingConfig> {
    let config: TrainingConfig = serde_json::from_str(contents)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &TrainingConfig) -> Result<()> {
    if !(config.learning_rate.is_finite() && config.learning_rate > 0.0) {
        return Err(NetworkError::InvalidConfig(format!(
            "learning_rate must be positive, got {}",
            config.learning_rate
        )));
    }

    if config.epochs == 0 {
        return Err(NetworkError::InvalidConfig("epochs must be at least 1".into()));
    }

    if config.train_samples == 0 {
        return Err(NetworkError::InvalidConfig(
            "train_samples must be at least 1".into(),
        ));
    }

    if config.conv_channels == 0 || config.hidden_size == 0 {
        return Err(NetworkError::InvalidConfig(
            "conv_channels and hidden_size must be positive".into(),
        ));
    }

    if config.kernel_size == 0 || config.kernel_size > IMG_H.min(IMG_W) {
        return Err(NetworkError::InvalidConfig(format!(
            "kernel_size must be in 1..={}, got {}",
            IMG_H.min(IMG_W),
            config.kernel_size
        )));
    }

    Ok(())
}
