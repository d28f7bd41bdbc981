//! Shared utilities: random number generation, activation/loss functions and
//! the 2-D correlation primitives used by the convolutional layer.

pub mod activations;
pub mod correlation;
pub mod rng;

pub use activations::{activate, mse_loss, mse_loss_derivative, sigmoid, sigmoid_prime, Activation};
pub use correlation::{full_convolve, valid_cross_correlate};
pub use rng::SimpleRng;
